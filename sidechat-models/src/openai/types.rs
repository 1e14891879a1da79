//! OpenAI wire types.

use serde::{Deserialize, Serialize};
use sidechat_core::{MessageContent, TokenUsage};

/// `POST /chat/completions` request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model id.
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<WireMessage>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling cutoff.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Reply token budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether to stream the reply.
    pub stream: bool,
}

/// One message on the wire. `MessageContent` already serializes to the
/// OpenAI shape (plain string or typed parts), so it is reused directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    /// Role string.
    pub role: String,
    /// Plain or multimodal content.
    pub content: MessageContent,
}

/// Non-streaming response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    /// Vendor model name.
    #[serde(default)]
    pub model: Option<String>,
    /// Reply choices; only the first is used.
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    /// Token usage.
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

/// One non-streaming choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// The assistant message.
    pub message: AssistantMessage,
    /// Finish reason string.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant message body.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantMessage {
    /// Answer text.
    #[serde(default)]
    pub content: Option<String>,
    /// Reasoning channel, emitted by reasoning-capable models.
    #[serde(default, alias = "reasoning_content")]
    pub reasoning: Option<String>,
}

/// Streaming chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    /// Vendor model name.
    #[serde(default)]
    pub model: Option<String>,
    /// Delta choices; only the first is used.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Usage, present on the final chunk for some hosts.
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

/// One streaming choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    /// The incremental delta.
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Finish reason, present on the last content chunk.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental delta fields.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChunkDelta {
    /// Answer text delta.
    #[serde(default)]
    pub content: Option<String>,
    /// Reasoning text delta.
    #[serde(default, alias = "reasoning_content")]
    pub reasoning: Option<String>,
}

/// Token usage on the wire.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireUsage {
    /// Prompt tokens.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Completion tokens.
    #[serde(default)]
    pub completion_tokens: u64,
    /// Total tokens.
    #[serde(default)]
    pub total_tokens: u64,
}

impl From<WireUsage> for TokenUsage {
    fn from(value: WireUsage) -> Self {
        Self {
            prompt_tokens: value.prompt_tokens,
            completion_tokens: value.completion_tokens,
            total_tokens: value.total_tokens,
        }
    }
}

/// `GET /models` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsResponse {
    /// Model entries.
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

/// One listed model.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    /// Model id.
    pub id: String,
}

/// `POST /images/generations` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagesResponse {
    /// Generated images.
    #[serde(default)]
    pub data: Vec<ImageDatum>,
}

/// One generated image.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageDatum {
    /// Hosted URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Base64 payload.
    #[serde(default)]
    pub b64_json: Option<String>,
    /// Revised prompt.
    #[serde(default)]
    pub revised_prompt: Option<String>,
}

/// `POST /embeddings` response.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsResponse {
    /// Embedding entries.
    #[serde(default)]
    pub data: Vec<EmbeddingDatum>,
}

/// One embedding.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingDatum {
    /// Input index.
    #[serde(default)]
    pub index: usize,
    /// The vector.
    pub embedding: Vec<f32>,
}

/// `POST /audio/transcriptions` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionResponse {
    /// Transcribed text.
    pub text: String,
}
