//! Google Gemini client.

pub mod mapper;
pub mod types;

pub use mapper::GoogleEventMapper;

use async_trait::async_trait;
use sidechat_core::{
    ChatMessage, ChatOptions, ContentPart, FinishReason, MessageContent, NormalizedError, Role,
};
use sidechat_providers::{ModelInfo, ProviderConfig, ProviderKind};
use sidechat_streaming::WireDecoder;
use std::time::Duration;

use crate::client::{ApiClient, ChatReply, EventStream};
use crate::http::{execute, read_json, response_framing};
use crate::stream::MappedStream;
use types::*;

/// Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: ProviderConfig,
    client: reqwest::Client,
    default_timeout: Duration,
}

impl GeminiClient {
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

    fn generate_endpoint(&self, model: &str, stream: bool) -> Result<String, NormalizedError> {
        let host = self.config.host()?;
        Ok(if stream {
            format!("{host}/models/{model}:streamGenerateContent?alt=sse")
        } else {
            format!("{host}/models/{model}:generateContent")
        })
    }

    /// Build the request body.
    ///
    /// Gemini has no system slot in `contents`, so system prompts are folded
    /// into the first user turn's parts; roles map onto `user`/`model`.
    pub fn build_request_body(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<GenerateContentRequest, NormalizedError> {
        if messages.is_empty() {
            return Err(NormalizedError::validation(
                "A chat request needs at least one message",
            ));
        }

        let system_text = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.text())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut contents: Vec<GeminiContent> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|message| GeminiContent {
                role: if message.role == Role::Assistant {
                    "model".to_string()
                } else {
                    "user".to_string()
                },
                parts: convert_parts(&message.content),
            })
            .collect();

        if !system_text.is_empty() {
            if let Some(first_user) = contents.iter_mut().find(|c| c.role == "user") {
                first_user.parts.insert(0, GeminiPart::text(&system_text));
            } else {
                contents.insert(
                    0,
                    GeminiContent {
                        role: "user".to_string(),
                        parts: vec![GeminiPart::text(&system_text)],
                    },
                );
            }
        }

        let generation_config = GenerationConfig {
            temperature: options.temperature,
            top_p: options.top_p,
            max_output_tokens: options.max_tokens,
        };

        Ok(GenerateContentRequest {
            contents,
            generation_config: Some(generation_config),
        })
    }

    fn reply_from_response(response: GenerateContentResponse) -> Result<ChatReply, NormalizedError> {
        let model = response.model_version;
        let usage = response.usage_metadata.map(Into::into);
        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            NormalizedError::api("The provider returned no candidates").with_provider("gemini")
        })?;

        let mut text = String::new();
        let mut reasoning = String::new();
        if let Some(content) = candidate.content {
            for part in content.parts {
                let Some(t) = part.text else { continue };
                if part.thought {
                    reasoning.push_str(&t);
                } else {
                    text.push_str(&t);
                }
            }
        }

        Ok(ChatReply {
            text,
            reasoning: (!reasoning.is_empty()).then_some(reasoning),
            finish_reason: candidate
                .finish_reason
                .as_deref()
                .map(FinishReason::from_wire)
                .unwrap_or_default(),
            usage,
            model,
        })
    }
}

fn convert_parts(content: &MessageContent) -> Vec<GeminiPart> {
    match content {
        MessageContent::Text(text) => vec![GeminiPart::text(text)],
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => GeminiPart::text(text),
                ContentPart::ImageUrl { image_url } => GeminiPart::file(&image_url.url),
            })
            .collect(),
    }
}

#[async_trait]
impl ApiClient for GeminiClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatReply, NormalizedError> {
        let model = self.resolve_model(options)?;
        let body = self.build_request_body(messages, options)?;
        let builder = self
            .client
            .post(self.generate_endpoint(&model, false)?)
            .header("x-goog-api-key", &self.config.api_key)
            .timeout(self.default_timeout)
            .json(&body);

        let response = execute(builder, "gemini", Some(&model)).await?;
        let parsed: GenerateContentResponse = read_json(response, "gemini", Some(&model)).await?;
        Self::reply_from_response(parsed)
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<EventStream, NormalizedError> {
        let model = self.resolve_model(options)?;
        let body = self.build_request_body(messages, options)?;
        let builder = self
            .client
            .post(self.generate_endpoint(&model, true)?)
            .header("x-goog-api-key", &self.config.api_key)
            .timeout(self.default_timeout)
            .json(&body);

        let response = execute(builder, "gemini", Some(&model)).await?;
        let decoder = WireDecoder::new(response_framing(&response));
        let stream = MappedStream::new(
            response.bytes_stream(),
            decoder,
            GoogleEventMapper::new(),
            "gemini",
        );
        Ok(Box::pin(stream))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, NormalizedError> {
        let builder = self
            .client
            .get(format!("{}/models", self.config.host()?))
            .header("x-goog-api-key", &self.config.api_key)
            .timeout(self.default_timeout);

        let response = execute(builder, "gemini", None).await?;
        let parsed: ModelsListResponse = read_json(response, "gemini", None).await?;
        Ok(parsed
            .models
            .into_iter()
            .map(|entry| {
                let id = entry
                    .name
                    .strip_prefix("models/")
                    .unwrap_or(&entry.name)
                    .to_string();
                let mut info = ModelInfo::new(id, ProviderKind::Gemini);
                if let Some(display_name) = entry.display_name {
                    info = info.with_name(display_name);
                }
                info
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client() -> GeminiClient {
        GeminiClient::new(
            ProviderConfig::new(ProviderKind::Gemini, "g-key")
                .with_default_model("gemini-2.0-flash"),
        )
    }

    #[test]
    fn test_stream_endpoint_shape() {
        let url = client()
            .generate_endpoint("gemini-2.0-flash", true)
            .unwrap();
        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn test_system_folded_into_first_user_turn() {
        let messages = vec![
            ChatMessage::system("You narrate the video."),
            ChatMessage::user("what now?"),
            ChatMessage::assistant("A chase scene."),
        ];

        let body = client()
            .build_request_body(&messages, &ChatOptions::new())
            .unwrap();

        assert_eq!(body.contents.len(), 2);
        assert_eq!(body.contents[0].role, "user");
        assert_eq!(
            body.contents[0].parts[0].text.as_deref(),
            Some("You narrate the video.")
        );
        assert_eq!(body.contents[0].parts[1].text.as_deref(), Some("what now?"));
        assert_eq!(body.contents[1].role, "model");
    }

    #[test]
    fn test_system_only_history_becomes_user_turn() {
        let messages = vec![ChatMessage::system("Prompt only.")];
        let body = client()
            .build_request_body(&messages, &ChatOptions::new())
            .unwrap();
        assert_eq!(body.contents.len(), 1);
        assert_eq!(body.contents[0].role, "user");
    }

    #[test]
    fn test_generation_config_field_names() {
        let body = client()
            .build_request_body(
                &[ChatMessage::user("hi")],
                &ChatOptions::new().with_temperature(0.3).with_max_tokens(64),
            )
            .unwrap();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["generationConfig"]["temperature"], 0.3);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 64);
    }

    #[test]
    fn test_reply_from_response() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking it over", "thought": true},
                    {"text": "The answer."}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5}
        }))
        .unwrap();

        let reply = GeminiClient::reply_from_response(response).unwrap();
        assert_eq!(reply.text, "The answer.");
        assert_eq!(reply.reasoning.as_deref(), Some("thinking it over"));
        assert_eq!(reply.finish_reason, FinishReason::Stop);
    }
}
