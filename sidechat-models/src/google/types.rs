//! Google Gemini wire types.

use serde::{Deserialize, Serialize};
use sidechat_core::TokenUsage;

/// `generateContent` / `streamGenerateContent` request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation turns.
    pub contents: Vec<GeminiContent>,
    /// Generation options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    /// `user` or `model`.
    pub role: String,
    /// Content parts.
    pub parts: Vec<GeminiPart>,
}

/// One content part. Parts carry at most one payload field.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    /// Text payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Marks a reasoning part in thinking-capable models.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub thought: bool,
    /// Remote file reference, used for images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
}

impl GeminiPart {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Create a file-reference part.
    pub fn file(uri: impl Into<String>) -> Self {
        Self {
            file_data: Some(FileData {
                file_uri: uri.into(),
            }),
            ..Self::default()
        }
    }
}

/// Remote file reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    /// File URI.
    pub file_uri: String,
}

/// Generation options.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling cutoff.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Reply token budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

/// `generateContent` response; streaming chunks use the same shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Reply candidates; only the first is used.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Usage counters.
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
    /// Vendor model version.
    #[serde(default)]
    pub model_version: Option<String>,
}

/// One reply candidate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// The candidate content.
    #[serde(default)]
    pub content: Option<CandidateContent>,
    /// Finish reason, e.g. `STOP`.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Candidate content body.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    /// Content parts.
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// Usage counters.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Prompt tokens.
    #[serde(default)]
    pub prompt_token_count: u64,
    /// Reply tokens.
    #[serde(default)]
    pub candidates_token_count: u64,
    /// Total tokens.
    #[serde(default)]
    pub total_token_count: u64,
}

impl From<UsageMetadata> for TokenUsage {
    fn from(value: UsageMetadata) -> Self {
        Self {
            prompt_tokens: value.prompt_token_count,
            completion_tokens: value.candidates_token_count,
            total_tokens: value.total_token_count,
        }
    }
}

/// `GET /models` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsListResponse {
    /// Listed models.
    #[serde(default)]
    pub models: Vec<GeminiModelEntry>,
}

/// One listed model.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiModelEntry {
    /// Resource name, e.g. `models/gemini-2.0-flash`.
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
}
