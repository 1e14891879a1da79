//! Request options.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options for a chat or chat-stream request.
///
/// Generic sampling options map onto each provider's field names inside the
/// adapters. The `audio` / `web_search` / `document` fields are plugin
/// triggers: the matching plugin consumes the field and removes it so later
/// stages never reprocess it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChatOptions {
    /// Target model id. `None` falls back to the provider's default model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling cutoff.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Reply token budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether the caller expects a streamed reply.
    #[serde(default)]
    pub stream: bool,
    /// Audio payload to transcribe before dispatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioSource>,
    /// Run a web search and inject results into the context.
    #[serde(default)]
    pub web_search: bool,
    /// Document to extract and inject into the context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentSource>,
    /// Additional models mentioned for a fan-out turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_models: Vec<String>,
    /// Provider-specific passthrough fields.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl ChatOptions {
    /// Create empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the reply token budget.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Mark the request as streaming.
    #[must_use]
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Attach audio for transcription.
    #[must_use]
    pub fn with_audio(mut self, audio: AudioSource) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Enable web-search context injection.
    #[must_use]
    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }

    /// Attach a document for context injection.
    #[must_use]
    pub fn with_document(mut self, document: DocumentSource) -> Self {
        self.document = Some(document);
        self
    }

    /// Fan the next turn out to the given models.
    #[must_use]
    pub fn with_mentioned_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mentioned_models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Set a provider-specific passthrough field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Audio payload handed to the transcription plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioSource {
    /// Raw audio bytes plus MIME type.
    Bytes {
        /// Encoded audio bytes.
        data: Vec<u8>,
        /// MIME type, e.g. `audio/webm`.
        mime_type: String,
    },
    /// `data:` URI with base64 payload.
    DataUri {
        /// Full data URI.
        uri: String,
    },
}

/// Document handed to the document-context plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentSource {
    /// Already-extracted text.
    Text {
        /// Display name.
        name: String,
        /// Extracted content.
        content: String,
    },
    /// Remote document to fetch and extract.
    Url {
        /// Document URL.
        url: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let options = ChatOptions::new()
            .with_model("gpt-4o")
            .with_temperature(0.7)
            .with_max_tokens(2048)
            .streaming()
            .with_web_search();

        assert_eq!(options.model.as_deref(), Some("gpt-4o"));
        assert_eq!(options.temperature, Some(0.7));
        assert_eq!(options.max_tokens, Some(2048));
        assert!(options.stream);
        assert!(options.web_search);
    }

    #[test]
    fn test_plugin_triggers_skipped_when_absent() {
        let json = serde_json::to_value(ChatOptions::new().with_model("m")).unwrap();
        assert!(json.get("audio").is_none());
        assert!(json.get("document").is_none());
        assert_eq!(json["web_search"], false);
    }

    #[test]
    fn test_mentioned_models() {
        let options = ChatOptions::new().with_mentioned_models(["gpt-4o", "claude-3-5-sonnet-latest"]);
        assert_eq!(options.mentioned_models.len(), 2);
    }
}
