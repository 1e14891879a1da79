//! OpenAI client (also used by OpenAI-compatible hosts).

pub mod mapper;
pub mod types;

pub use mapper::OpenAiEventMapper;

use async_trait::async_trait;
use base64::Engine;
use sidechat_core::{
    AudioSource, ChatMessage, ChatOptions, FinishReason, NormalizedError,
};
use sidechat_providers::{ModelInfo, ProviderConfig, ProviderKind};
use sidechat_streaming::WireDecoder;
use std::time::Duration;

use crate::client::{
    ApiClient, ChatReply, Embedding, EventStream, GeneratedImage, ImageOptions, Transcript,
};
use crate::http::{execute, read_json, response_framing};
use crate::stream::MappedStream;
use types::*;

const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const TRANSCRIPTION_MODEL: &str = "whisper-1";

/// OpenAI chat client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: ProviderConfig,
    client: reqwest::Client,
    default_timeout: Duration,
}

impl OpenAiClient {
    /// Create a client from a provider config.
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            default_timeout: Duration::from_secs(120),
        }
    }

    /// Use a custom HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> Result<String, NormalizedError> {
        Ok(format!("{}/{path}", self.config.host()?))
    }

    fn resolve_model(&self, options: &ChatOptions) -> Result<String, NormalizedError> {
        options
            .model
            .clone()
            .or_else(|| self.config.default_model.clone())
            .ok_or_else(|| {
                NormalizedError::validation("No model selected, check the provider configuration")
                    .with_provider(self.provider().as_str())
            })
    }

    /// Build the chat-completions request body.
    ///
    /// System messages stay `system`-role messages; multimodal parts keep
    /// the typed `text` / `image_url` nesting.
    pub fn build_request_body(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        stream: bool,
    ) -> Result<ChatCompletionRequest, NormalizedError> {
        if messages.is_empty() {
            return Err(NormalizedError::validation(
                "A chat request needs at least one message",
            ));
        }

        Ok(ChatCompletionRequest {
            model: self.resolve_model(options)?,
            messages: messages
                .iter()
                .map(|message| WireMessage {
                    role: message.role.as_str().to_string(),
                    content: message.content.clone(),
                })
                .collect(),
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            stream,
        })
    }

}

/// Convert a chat-completions response into a reply. Shared with the Azure
/// client, which receives the same shape.
pub(crate) fn reply_from_chat_response(
    response: ChatCompletionResponse,
) -> Result<ChatReply, NormalizedError> {
    let model = response.model;
    let usage = response.usage.map(Into::into);
    let choice = response.choices.into_iter().next().ok_or_else(|| {
        NormalizedError::api("The provider returned no choices").with_provider("openai")
    })?;

    Ok(ChatReply {
        text: choice.message.content.unwrap_or_default(),
        reasoning: choice.message.reasoning.filter(|r| !r.is_empty()),
        finish_reason: choice
            .finish_reason
            .as_deref()
            .map(FinishReason::from_wire)
            .unwrap_or_default(),
        usage,
        model,
    })
}

#[async_trait]
impl ApiClient for OpenAiClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatReply, NormalizedError> {
        let body = self.build_request_body(messages, options, false)?;
        let builder = self
            .client
            .post(self.endpoint("chat/completions")?)
            .bearer_auth(&self.config.api_key)
            .timeout(self.default_timeout)
            .json(&body);

        let response = execute(builder, "openai", Some(&body.model)).await?;
        let parsed: ChatCompletionResponse =
            read_json(response, "openai", Some(&body.model)).await?;
        reply_from_chat_response(parsed)
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<EventStream, NormalizedError> {
        let body = self.build_request_body(messages, options, true)?;
        let builder = self
            .client
            .post(self.endpoint("chat/completions")?)
            .bearer_auth(&self.config.api_key)
            .timeout(self.default_timeout)
            .json(&body);

        let response = execute(builder, "openai", Some(&body.model)).await?;
        let decoder = WireDecoder::new(response_framing(&response));
        let stream = MappedStream::new(
            response.bytes_stream(),
            decoder,
            OpenAiEventMapper::new(),
            "openai",
        );
        Ok(Box::pin(stream))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, NormalizedError> {
        let builder = self
            .client
            .get(self.endpoint("models")?)
            .bearer_auth(&self.config.api_key)
            .timeout(self.default_timeout);

        let response = execute(builder, "openai", None).await?;
        let parsed: ModelsResponse = read_json(response, "openai", None).await?;
        Ok(parsed
            .data
            .into_iter()
            .map(|entry| ModelInfo::new(entry.id, ProviderKind::OpenAi))
            .collect())
    }

    async fn generate_image(
        &self,
        prompt: &str,
        options: &ImageOptions,
    ) -> Result<Vec<GeneratedImage>, NormalizedError> {
        let body = serde_json::json!({
            "model": options.model.as_deref().unwrap_or(DEFAULT_IMAGE_MODEL),
            "prompt": prompt,
            "n": options.n.unwrap_or(1),
            "size": options.size.as_deref().unwrap_or("1024x1024"),
            "quality": options.quality,
            "style": options.style,
        });

        let builder = self
            .client
            .post(self.endpoint("images/generations")?)
            .bearer_auth(&self.config.api_key)
            .timeout(self.default_timeout)
            .json(&body);

        let response = execute(builder, "openai", options.model.as_deref()).await?;
        let parsed: ImagesResponse = read_json(response, "openai", None).await?;
        Ok(parsed
            .data
            .into_iter()
            .map(|datum| GeneratedImage {
                url: datum.url,
                b64_json: datum.b64_json,
                revised_prompt: datum.revised_prompt,
            })
            .collect())
    }

    async fn embeddings(&self, input: &[String]) -> Result<Vec<Embedding>, NormalizedError> {
        let body = serde_json::json!({
            "model": DEFAULT_EMBEDDING_MODEL,
            "input": input,
        });

        let builder = self
            .client
            .post(self.endpoint("embeddings")?)
            .bearer_auth(&self.config.api_key)
            .timeout(self.default_timeout)
            .json(&body);

        let response = execute(builder, "openai", None).await?;
        let parsed: EmbeddingsResponse = read_json(response, "openai", None).await?;
        Ok(parsed
            .data
            .into_iter()
            .map(|datum| Embedding {
                index: datum.index,
                values: datum.embedding,
            })
            .collect())
    }

    async fn transcribe(&self, audio: &AudioSource) -> Result<Transcript, NormalizedError> {
        let (data, mime_type) = audio_bytes(audio)?;

        let part = reqwest::multipart::Part::bytes(data)
            .file_name("audio")
            .mime_str(&mime_type)
            .map_err(|error| {
                NormalizedError::validation("Unrecognized audio format")
                    .with_details(error.to_string())
            })?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", TRANSCRIPTION_MODEL);

        let builder = self
            .client
            .post(self.endpoint("audio/transcriptions")?)
            .bearer_auth(&self.config.api_key)
            .timeout(self.default_timeout)
            .multipart(form);

        let response = execute(builder, "openai", None).await?;
        let parsed: TranscriptionResponse = read_json(response, "openai", None).await?;
        Ok(Transcript { text: parsed.text })
    }
}

/// Extract raw bytes + MIME type from an audio source.
fn audio_bytes(audio: &AudioSource) -> Result<(Vec<u8>, String), NormalizedError> {
    match audio {
        AudioSource::Bytes { data, mime_type } => Ok((data.clone(), mime_type.clone())),
        AudioSource::DataUri { uri } => {
            let (header, payload) = uri.split_once(',').ok_or_else(|| {
                NormalizedError::validation("Malformed audio data URI")
            })?;
            let mime_type = header
                .strip_prefix("data:")
                .and_then(|h| h.split(';').next())
                .filter(|m| !m.is_empty())
                .unwrap_or("audio/webm")
                .to_string();
            let data = base64::engine::general_purpose::STANDARD
                .decode(payload)
                .map_err(|error| {
                    NormalizedError::validation("Malformed base64 audio payload")
                        .with_details(error.to_string())
                })?;
            Ok((data, mime_type))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::EventMapper;
    use pretty_assertions::assert_eq;
    use sidechat_core::ContentPart;
    use sidechat_streaming::{RawFrame, StreamEvent};

    fn client() -> OpenAiClient {
        OpenAiClient::new(
            ProviderConfig::new(ProviderKind::OpenAi, "sk-test").with_default_model("gpt-4o"),
        )
    }

    #[test]
    fn test_build_request_body_maps_options() {
        let messages = vec![
            ChatMessage::system("Describe the video scene."),
            ChatMessage::user("What happens at 2:10?"),
        ];
        let options = ChatOptions::new()
            .with_model("gpt-4o-mini")
            .with_temperature(0.5)
            .with_max_tokens(512);

        let body = client()
            .build_request_body(&messages, &options, true)
            .unwrap();

        assert_eq!(body.model, "gpt-4o-mini");
        assert_eq!(body.temperature, Some(0.5));
        assert_eq!(body.max_tokens, Some(512));
        assert!(body.stream);
        // System messages stay system-role for OpenAI.
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages.len(), 2);
    }

    #[test]
    fn test_build_request_body_preserves_multimodal_parts() {
        let messages = vec![ChatMessage::user_parts(vec![
            ContentPart::text("what is shown here?"),
            ContentPart::image_url("https://example.com/still.png"),
        ])];

        let body = client()
            .build_request_body(&messages, &ChatOptions::new(), false)
            .unwrap();
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][0]["content"][1]["image_url"]["url"],
            "https://example.com/still.png"
        );
    }

    #[test]
    fn test_model_falls_back_to_config_default() {
        let body = client()
            .build_request_body(&[ChatMessage::user("hi")], &ChatOptions::new(), false)
            .unwrap();
        assert_eq!(body.model, "gpt-4o");
    }

    #[test]
    fn test_empty_messages_rejected() {
        let error = client()
            .build_request_body(&[], &ChatOptions::new(), false)
            .unwrap_err();
        assert_eq!(error.kind, sidechat_core::ErrorKind::Validation);
    }

    #[test]
    fn test_round_trip_through_echo_vendor() {
        // A mock vendor that echoes the request text back as deltas must
        // reconstruct the original message exactly.
        let original = "Exact text, no lossy transcoding: caf\u{e9} \u{65e5}\u{672c} ✓";
        let body = client()
            .build_request_body(&[ChatMessage::user(original)], &ChatOptions::new(), true)
            .unwrap();

        let sent_text = body.messages.last().unwrap().content.text();
        assert_eq!(sent_text, original);

        let mut mapper = OpenAiEventMapper::new();
        let mut last_accumulated = String::new();
        // The echo splits at arbitrary char boundaries.
        let chars: Vec<char> = sent_text.chars().collect();
        for piece in chars.chunks(3) {
            let delta: String = piece.iter().collect();
            let events = mapper
                .map_frame(RawFrame::Event(serde_json::json!({
                    "choices": [{"delta": {"content": delta}}]
                })))
                .unwrap();
            if let StreamEvent::Content { accumulated, .. } = &events[0] {
                last_accumulated = accumulated.clone();
            }
        }

        assert_eq!(last_accumulated, original);
    }

    #[test]
    fn test_audio_bytes_from_data_uri() {
        let uri = format!(
            "data:audio/ogg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(b"oggdata")
        );
        let (data, mime) = audio_bytes(&AudioSource::DataUri { uri }).unwrap();
        assert_eq!(data, b"oggdata");
        assert_eq!(mime, "audio/ogg");
    }

    #[test]
    fn test_audio_bytes_rejects_malformed_uri() {
        let error = audio_bytes(&AudioSource::DataUri {
            uri: "not-a-data-uri".into(),
        })
        .unwrap_err();
        assert_eq!(error.kind, sidechat_core::ErrorKind::Validation);
    }
}
