//! The client capability trait and its result types.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use sidechat_core::{
    AudioSource, ChatMessage, ChatOptions, FinishReason, NormalizedError, TokenUsage,
};
use sidechat_providers::{ModelInfo, ProviderKind};
use sidechat_streaming::StreamEvent;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for a boxed, normalized event stream.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, NormalizedError>> + Send>>;

/// One provider client.
///
/// This is a capability set, not a class hierarchy: `chat`, `chat_stream`
/// and `list_models` are required; the remaining operations default to a
/// distinct "unsupported by this provider" error rather than a silent no-op.
/// Implementations are selected by [`crate::factory::client_for`].
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Which provider family this client talks to.
    fn provider(&self) -> ProviderKind;

    /// Non-streaming chat completion.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatReply, NormalizedError>;

    /// Streaming chat completion. The returned stream yields at most one
    /// terminal item: a [`StreamEvent::Done`] or an `Err`.
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<EventStream, NormalizedError>;

    /// List the models the provider serves.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, NormalizedError>;

    /// Generate images from a prompt.
    async fn generate_image(
        &self,
        _prompt: &str,
        _options: &ImageOptions,
    ) -> Result<Vec<GeneratedImage>, NormalizedError> {
        Err(NormalizedError::unsupported(
            "image generation",
            self.provider().as_str(),
        ))
    }

    /// Compute embedding vectors for the inputs.
    async fn embeddings(&self, _input: &[String]) -> Result<Vec<Embedding>, NormalizedError> {
        Err(NormalizedError::unsupported(
            "embeddings",
            self.provider().as_str(),
        ))
    }

    /// Transcribe audio to text.
    async fn transcribe(&self, _audio: &AudioSource) -> Result<Transcript, NormalizedError> {
        Err(NormalizedError::unsupported(
            "audio transcription",
            self.provider().as_str(),
        ))
    }
}

/// Boxed client for dynamic dispatch.
pub type BoxedClient = Arc<dyn ApiClient>;

/// Result of a non-streaming chat completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    /// The answer text.
    pub text: String,
    /// Reasoning channel text, when the model emitted any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Why the reply stopped.
    pub finish_reason: FinishReason,
    /// Usage reported by the vendor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// The model that produced the reply, as reported by the vendor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatReply {
    /// Create a plain text reply.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reasoning: None,
            finish_reason: FinishReason::Stop,
            usage: None,
            model: None,
        }
    }
}

/// Options for image generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ImageOptions {
    /// Model to use; provider default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Image dimensions, e.g. `1024x1024`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Number of images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    /// Quality hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    /// Style hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// One generated image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Hosted URL, when the provider returns one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Base64 payload, when requested that way.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,
    /// Prompt as revised by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

/// One embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// Index of the input this vector belongs to.
    pub index: usize,
    /// The vector.
    pub values: Vec<f32>,
}

/// Result of an audio transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Transcribed text.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MinimalClient;

    #[async_trait]
    impl ApiClient for MinimalClient {
        fn provider(&self) -> ProviderKind {
            ProviderKind::Anthropic
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: &ChatOptions,
        ) -> Result<ChatReply, NormalizedError> {
            Ok(ChatReply::new("ok"))
        }

        async fn chat_stream(
            &self,
            _messages: &[ChatMessage],
            _options: &ChatOptions,
        ) -> Result<EventStream, NormalizedError> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>, NormalizedError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_optional_operations_default_to_unsupported() {
        let client = MinimalClient;

        let error = client
            .generate_image("a cat", &ImageOptions::default())
            .await
            .unwrap_err();
        assert!(error.is_unsupported());
        assert_eq!(error.provider.as_deref(), Some("anthropic"));

        assert!(client.embeddings(&["x".into()]).await.unwrap_err().is_unsupported());
        assert!(client
            .transcribe(&AudioSource::DataUri { uri: "data:audio/webm;base64,AAAA".into() })
            .await
            .unwrap_err()
            .is_unsupported());
    }
}
