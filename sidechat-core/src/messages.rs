//! Chat message types.
//!
//! Messages use the OpenAI-style role/content shape as the vendor-neutral
//! baseline; adapters reshape them into each provider's wire format.

use serde::{Deserialize, Serialize};

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single chat message. Immutable once sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: Role,
    /// Message content (plain text or multimodal parts).
    pub content: MessageContent,
}

impl ChatMessage {
    /// Create a message with plain text content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a user message from multimodal parts.
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }

    /// Plain-text view of the content (image parts are skipped).
    #[must_use]
    pub fn text(&self) -> String {
        self.content.text()
    }

    /// Check whether the message carries any image part.
    #[must_use]
    pub fn has_images(&self) -> bool {
        match &self.content {
            MessageContent::Text(_) => false,
            MessageContent::Parts(parts) => parts
                .iter()
                .any(|p| matches!(p, ContentPart::ImageUrl { .. })),
        }
    }
}

/// Message content: either a plain string or structured multimodal parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Multimodal content blocks.
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of the content; image parts contribute nothing.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Check whether there is no usable content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Parts(parts) => parts.is_empty(),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One block of multimodal content, in the OpenAI nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text block.
    Text {
        /// The text.
        text: String,
    },
    /// Image reference block.
    ImageUrl {
        /// Image location.
        image_url: ImageUrl,
    },
}

impl ContentPart {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an image part from a URL or data URI.
    pub fn image_url(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// Image URL wrapper matching the OpenAI content-part shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// HTTP(S) URL or `data:` URI.
    pub url: String,
}

/// Why a reply stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of turn.
    #[default]
    Stop,
    /// Token limit reached.
    Length,
    /// Provider content filter fired.
    ContentFilter,
    /// Cancelled by the caller.
    Cancelled,
    /// Anything else the vendor reported.
    Other,
}

impl FinishReason {
    /// Map a vendor finish-reason string onto the shared enum.
    ///
    /// Covers the OpenAI-style strings and Gemini's upper-case variants.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value {
            "stop" | "STOP" | "end_turn" => Self::Stop,
            "length" | "max_tokens" | "MAX_TOKENS" => Self::Length,
            "content_filter" | "SAFETY" => Self::ContentFilter,
            "cancelled" => Self::Cancelled,
            _ => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_roundtrip() {
        let msg = ChatMessage::user("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hello"}"#);

        let parsed: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_multimodal_serialization() {
        let msg = ChatMessage::user_parts(vec![
            ContentPart::text("what is in this frame?"),
            ContentPart::image_url("https://example.com/frame.png"),
        ]);

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(
            json["content"][1]["image_url"]["url"],
            "https://example.com/frame.png"
        );
    }

    #[test]
    fn test_text_extraction_skips_images() {
        let msg = ChatMessage::user_parts(vec![
            ContentPart::text("a"),
            ContentPart::image_url("data:image/png;base64,xyz"),
            ContentPart::text("b"),
        ]);
        assert_eq!(msg.text(), "a\nb");
        assert!(msg.has_images());
    }

    #[test]
    fn test_finish_reason_from_wire() {
        assert_eq!(FinishReason::from_wire("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::from_wire("STOP"), FinishReason::Stop);
        assert_eq!(FinishReason::from_wire("end_turn"), FinishReason::Stop);
        assert_eq!(FinishReason::from_wire("length"), FinishReason::Length);
        assert_eq!(FinishReason::from_wire("MAX_TOKENS"), FinishReason::Length);
        assert_eq!(FinishReason::from_wire("weird"), FinishReason::Other);
    }

    #[test]
    fn test_content_is_empty() {
        assert!(MessageContent::Text("   ".into()).is_empty());
        assert!(!MessageContent::Text("hi".into()).is_empty());
        assert!(MessageContent::Parts(vec![]).is_empty());
    }
}
