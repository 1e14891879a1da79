//! Anthropic client.

pub mod mapper;
pub mod types;

pub use mapper::AnthropicEventMapper;

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

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Anthropic has no model-listing endpoint; this catalog stands in.
const BUILTIN_MODELS: &[(&str, &str)] = &[
    ("claude-3-5-sonnet-latest", "Claude 3.5 Sonnet"),
    ("claude-3-5-haiku-latest", "Claude 3.5 Haiku"),
    ("claude-3-opus-20240229", "Claude 3 Opus"),
    ("claude-3-sonnet-20240229", "Claude 3 Sonnet"),
    ("claude-3-haiku-20240307", "Claude 3 Haiku"),
];

/// Anthropic Messages API client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    config: ProviderConfig,
    client: reqwest::Client,
    default_timeout: Duration,
}

impl AnthropicClient {
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

    fn endpoint(&self) -> Result<String, NormalizedError> {
        Ok(format!("{}/messages", self.config.host()?))
    }

    fn api_version(&self) -> &str {
        self.config.api_version.as_deref().unwrap_or(ANTHROPIC_VERSION)
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

    /// Build the Messages API request body.
    ///
    /// System-role messages are relocated into the top-level `system` field;
    /// the remaining turns keep user/assistant alternation.
    pub fn build_request_body(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        stream: bool,
    ) -> Result<MessagesRequest, NormalizedError> {
        if messages.is_empty() {
            return Err(NormalizedError::validation(
                "A chat request needs at least one message",
            ));
        }

        let system_text: Vec<&ChatMessage> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .collect();
        let system = if system_text.is_empty() {
            None
        } else {
            Some(
                system_text
                    .iter()
                    .map(|m| m.text())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            )
        };

        let turns = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|message| AnthropicMessage {
                role: if message.role == Role::Assistant {
                    "assistant".to_string()
                } else {
                    "user".to_string()
                },
                content: convert_content(&message.content),
            })
            .collect();

        Ok(MessagesRequest {
            model: self.resolve_model(options)?,
            messages: turns,
            system,
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: options.temperature,
            top_p: options.top_p,
            stream,
        })
    }

    fn reply_from_response(response: MessagesResponse) -> ChatReply {
        let mut text = String::new();
        let mut reasoning = String::new();
        for block in response.content {
            match block {
                ResponseBlock::Text { text: t } => text.push_str(&t),
                ResponseBlock::Thinking { thinking } => reasoning.push_str(&thinking),
                ResponseBlock::Unknown => {}
            }
        }

        ChatReply {
            text,
            reasoning: (!reasoning.is_empty()).then_some(reasoning),
            finish_reason: response
                .stop_reason
                .as_deref()
                .map(FinishReason::from_wire)
                .unwrap_or_default(),
            usage: response.usage.map(Into::into),
            model: response.model,
        }
    }
}

fn convert_content(content: &MessageContent) -> AnthropicContent {
    match content {
        MessageContent::Text(text) => AnthropicContent::Text(text.clone()),
        MessageContent::Parts(parts) => AnthropicContent::Blocks(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => RequestBlock::Text { text: text.clone() },
                    ContentPart::ImageUrl { image_url } => RequestBlock::Image {
                        source: ImageSource::Url {
                            url: image_url.url.clone(),
                        },
                    },
                })
                .collect(),
        ),
    }
}

#[async_trait]
impl ApiClient for AnthropicClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatReply, NormalizedError> {
        let body = self.build_request_body(messages, options, false)?;
        let builder = self
            .client
            .post(self.endpoint()?)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", self.api_version())
            .timeout(self.default_timeout)
            .json(&body);

        let response = execute(builder, "anthropic", Some(&body.model)).await?;
        let parsed: MessagesResponse =
            read_json(response, "anthropic", Some(&body.model)).await?;
        Ok(Self::reply_from_response(parsed))
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<EventStream, NormalizedError> {
        let body = self.build_request_body(messages, options, true)?;
        let builder = self
            .client
            .post(self.endpoint()?)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", self.api_version())
            .header("accept", "text/event-stream")
            .timeout(self.default_timeout)
            .json(&body);

        let response = execute(builder, "anthropic", Some(&body.model)).await?;
        let decoder = WireDecoder::new(response_framing(&response));
        let stream = MappedStream::new(
            response.bytes_stream(),
            decoder,
            AnthropicEventMapper::new(),
            "anthropic",
        );
        Ok(Box::pin(stream))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, NormalizedError> {
        Ok(BUILTIN_MODELS
            .iter()
            .map(|(id, name)| ModelInfo::new(*id, ProviderKind::Anthropic).with_name(*name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client() -> AnthropicClient {
        AnthropicClient::new(
            ProviderConfig::new(ProviderKind::Anthropic, "sk-ant-test")
                .with_default_model("claude-3-5-sonnet-latest"),
        )
    }

    #[test]
    fn test_system_message_relocated() {
        let messages = vec![
            ChatMessage::system("You explain the current video."),
            ChatMessage::user("What is happening?"),
            ChatMessage::assistant("A goal was scored."),
            ChatMessage::user("By whom?"),
        ];

        let body = client()
            .build_request_body(&messages, &ChatOptions::new(), true)
            .unwrap();

        assert_eq!(
            body.system.as_deref(),
            Some("You explain the current video.")
        );
        assert_eq!(body.messages.len(), 3);
        assert_eq!(body.messages[0].role, "user");
        assert_eq!(body.messages[1].role, "assistant");
        assert!(body.stream);
    }

    #[test]
    fn test_multiple_system_messages_merged() {
        let messages = vec![
            ChatMessage::system("Base prompt."),
            ChatMessage::system("Web search context."),
            ChatMessage::user("hi"),
        ];

        let body = client()
            .build_request_body(&messages, &ChatOptions::new(), false)
            .unwrap();
        assert_eq!(
            body.system.as_deref(),
            Some("Base prompt.\n\nWeb search context.")
        );
    }

    #[test]
    fn test_max_tokens_defaulted() {
        let body = client()
            .build_request_body(&[ChatMessage::user("hi")], &ChatOptions::new(), false)
            .unwrap();
        assert_eq!(body.max_tokens, DEFAULT_MAX_TOKENS);

        let body = client()
            .build_request_body(
                &[ChatMessage::user("hi")],
                &ChatOptions::new().with_max_tokens(99),
                false,
            )
            .unwrap();
        assert_eq!(body.max_tokens, 99);
    }

    #[test]
    fn test_multimodal_blocks() {
        let messages = vec![ChatMessage::user_parts(vec![
            ContentPart::text("what is this?"),
            ContentPart::image_url("https://example.com/still.jpg"),
        ])];

        let body = client()
            .build_request_body(&messages, &ChatOptions::new(), false)
            .unwrap();
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][1]["type"], "image");
        assert_eq!(
            json["messages"][0]["content"][1]["source"]["url"],
            "https://example.com/still.jpg"
        );
    }

    #[test]
    fn test_reply_from_response_splits_channels() {
        let response: MessagesResponse = serde_json::from_value(serde_json::json!({
            "model": "claude-3-5-sonnet-latest",
            "content": [
                {"type": "thinking", "thinking": "check the scoreboard"},
                {"type": "text", "text": "It is 2-1."}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 9, "output_tokens": 5}
        }))
        .unwrap();

        let reply = AnthropicClient::reply_from_response(response);
        assert_eq!(reply.text, "It is 2-1.");
        assert_eq!(reply.reasoning.as_deref(), Some("check the scoreboard"));
        assert_eq!(reply.finish_reason, FinishReason::Stop);
        assert_eq!(reply.usage.unwrap().total_tokens, 14);
    }

    #[tokio::test]
    async fn test_static_catalog() {
        let models = client().list_models().await.unwrap();
        assert!(!models.is_empty());
        assert!(models
            .iter()
            .all(|m| m.provider == ProviderKind::Anthropic));
        assert!(models.iter().any(|m| m.id == "claude-3-5-sonnet-latest"));
    }
}
