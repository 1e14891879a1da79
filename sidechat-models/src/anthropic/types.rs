//! Anthropic Messages API wire types.

use serde::{Deserialize, Serialize};
use sidechat_core::TokenUsage;

/// `POST /messages` request body.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    /// Model id.
    pub model: String,
    /// Non-system conversation turns.
    pub messages: Vec<AnthropicMessage>,
    /// System prompt, relocated out of the message array.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Reply token budget. Required by the API.
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling cutoff.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Whether to stream the reply.
    pub stream: bool,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicMessage {
    /// `user` or `assistant`.
    pub role: String,
    /// Plain text or typed blocks.
    pub content: AnthropicContent,
}

/// Message content: plain string or typed blocks.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnthropicContent {
    /// Plain text.
    Text(String),
    /// Typed content blocks.
    Blocks(Vec<RequestBlock>),
}

/// One typed request content block.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestBlock {
    /// Text block.
    Text {
        /// The text.
        text: String,
    },
    /// Image block.
    Image {
        /// Where the image comes from.
        source: ImageSource,
    },
}

/// Image source reference.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    /// Fetch by URL.
    Url {
        /// Image URL.
        url: String,
    },
}

/// Non-streaming response.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    /// Vendor model name.
    #[serde(default)]
    pub model: Option<String>,
    /// Reply content blocks.
    #[serde(default)]
    pub content: Vec<ResponseBlock>,
    /// Stop reason string.
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Token usage.
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// One response content block.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    /// Answer text.
    Text {
        /// The text.
        text: String,
    },
    /// Extended-thinking block.
    Thinking {
        /// The thinking text.
        thinking: String,
    },
    /// Any block shape this client does not model.
    #[serde(other)]
    Unknown,
}

/// Usage counters on the wire.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct AnthropicUsage {
    /// Prompt tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Reply tokens.
    #[serde(default)]
    pub output_tokens: u64,
}

impl From<AnthropicUsage> for TokenUsage {
    fn from(value: AnthropicUsage) -> Self {
        TokenUsage::new(value.input_tokens, value.output_tokens)
    }
}

/// Streaming events, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    /// Stream opened; carries message metadata.
    MessageStart {
        /// Message metadata.
        message: MessageStartInfo,
    },
    /// A content block opened.
    ContentBlockStart {
        /// Block index.
        index: usize,
        /// Initial block payload.
        content_block: ContentBlockInfo,
    },
    /// Incremental block update.
    ContentBlockDelta {
        /// Block index.
        index: usize,
        /// The delta payload.
        delta: BlockDelta,
    },
    /// A content block closed.
    ContentBlockStop {
        /// Block index.
        index: usize,
    },
    /// Message-level delta; carries the stop reason and output usage.
    MessageDelta {
        /// Stop metadata.
        #[serde(default)]
        delta: MessageDeltaInfo,
        /// Usage so far.
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    /// Terminal event.
    MessageStop,
    /// Keep-alive.
    Ping,
    /// Vendor error envelope.
    Error {
        /// The error payload.
        error: StreamErrorInfo,
    },
    /// Any event this client does not model.
    #[serde(other)]
    Unknown,
}

/// Metadata from `message_start`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageStartInfo {
    /// Vendor model name.
    #[serde(default)]
    pub model: Option<String>,
    /// Initial usage (input tokens).
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// Initial payload of a content block.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockInfo {
    /// Text block.
    Text {
        /// Initial text, usually empty.
        #[serde(default)]
        text: String,
    },
    /// Extended-thinking block.
    Thinking {
        /// Initial thinking text, usually empty.
        #[serde(default)]
        thinking: String,
    },
    /// Any block kind this client does not model.
    #[serde(other)]
    Unknown,
}

/// Delta payload of `content_block_delta`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    /// Answer text delta.
    TextDelta {
        /// The text.
        text: String,
    },
    /// Thinking text delta.
    ThinkingDelta {
        /// The thinking text.
        thinking: String,
    },
    /// Thinking signature delta.
    SignatureDelta {
        /// Signature fragment.
        signature: String,
    },
    /// Any delta kind this client does not model.
    #[serde(other)]
    Unknown,
}

/// Stop metadata of `message_delta`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MessageDeltaInfo {
    /// Stop reason string, e.g. `end_turn`.
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Error payload of a stream `error` event.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamErrorInfo {
    /// Vendor error type, e.g. `rate_limit_error`.
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    /// Vendor message.
    #[serde(default)]
    pub message: String,
}
