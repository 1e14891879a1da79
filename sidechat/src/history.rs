//! Conversation history: message records and the store seam.
//!
//! The store itself is a collaborator, the extension persists messages in
//! its own storage layer, so it sits behind a trait, with an in-memory
//! implementation for direct use and tests.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sidechat_core::{
    ChatMessage, ContentPart, MessageContent, NormalizedError, Role, TokenUsage,
};
use std::collections::HashMap;

/// Delivery state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Reply in flight.
    Sending,
    /// Delivered.
    Success,
    /// Terminally failed.
    Error,
}

/// Progress of a thinking block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingStatus {
    /// Still streaming.
    Thinking,
    /// Finished.
    Complete,
}

/// One renderable block of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBlock {
    /// Answer text.
    Text {
        /// The text.
        content: String,
    },
    /// Reasoning text, shown collapsed in the sidebar.
    Thinking {
        /// The reasoning text.
        content: String,
        /// Whether the model is still thinking.
        status: ThinkingStatus,
    },
    /// An attached image.
    Image {
        /// Image URL or data URI.
        url: String,
    },
    /// A normalized failure.
    Error {
        /// The error.
        error: NormalizedError,
    },
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique id; also keys the cancellation session while streaming.
    pub id: String,
    /// Conversation (assistant) this message belongs to.
    pub conversation_id: String,
    /// Author role.
    pub role: Role,
    /// Delivery state.
    pub status: MessageStatus,
    /// Renderable blocks.
    pub blocks: Vec<MessageBlock>,
    /// Model that produced (or will produce) this message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// The user message this reply answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Usage reported for this reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a delivered user message.
    pub fn user(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            role: Role::User,
            status: MessageStatus::Success,
            blocks: vec![MessageBlock::Text {
                content: content.into(),
            }],
            model: None,
            parent_id: None,
            usage: None,
            created_at: Utc::now(),
        }
    }

    /// Create an empty assistant placeholder awaiting a streamed reply.
    pub fn assistant_placeholder(
        conversation_id: impl Into<String>,
        model: impl Into<String>,
        parent_id: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            role: Role::Assistant,
            status: MessageStatus::Sending,
            blocks: vec![MessageBlock::Text {
                content: String::new(),
            }],
            model: Some(model.into()),
            parent_id: Some(parent_id.into()),
            usage: None,
            created_at: Utc::now(),
        }
    }

    /// Attach an image block.
    #[must_use]
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.blocks.push(MessageBlock::Image { url: url.into() });
        self
    }

    /// Joined text of the text blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                MessageBlock::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether the message carries an error block.
    #[must_use]
    pub fn has_error_block(&self) -> bool {
        self.blocks
            .iter()
            .any(|block| matches!(block, MessageBlock::Error { .. }))
    }

    /// Outbound content for the provider: plain text, or multimodal parts
    /// when the message carries images. Thinking and error blocks never
    /// leave the sidebar.
    fn outbound_content(&self) -> Option<MessageContent> {
        let text = self.text();
        let images: Vec<&str> = self
            .blocks
            .iter()
            .filter_map(|block| match block {
                MessageBlock::Image { url } => Some(url.as_str()),
                _ => None,
            })
            .collect();

        if images.is_empty() {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            return Some(MessageContent::Text(trimmed.to_string()));
        }

        let mut parts = Vec::new();
        if !text.trim().is_empty() {
            parts.push(ContentPart::text(text.trim()));
        }
        for url in images {
            parts.push(ContentPart::image_url(url));
        }
        Some(MessageContent::Parts(parts))
    }
}

/// Storage seam for conversation history.
pub trait MessageStore: Send + Sync {
    /// Append a message.
    fn add(&self, message: Message);

    /// Fetch one message.
    fn get(&self, conversation_id: &str, message_id: &str) -> Option<Message>;

    /// Mutate one message in place. Returns false when it does not exist.
    fn update(
        &self,
        conversation_id: &str,
        message_id: &str,
        apply: &dyn Fn(&mut Message),
    ) -> bool;

    /// All messages of a conversation, oldest first.
    fn messages(&self, conversation_id: &str) -> Vec<Message>;

    /// Replies whose `parent_id` is the given message.
    fn children(&self, conversation_id: &str, parent_id: &str) -> Vec<Message> {
        self.messages(conversation_id)
            .into_iter()
            .filter(|m| m.parent_id.as_deref() == Some(parent_id))
            .collect()
    }
}

/// In-memory message store.
#[derive(Default)]
pub struct InMemoryMessageStore {
    conversations: RwLock<HashMap<String, Vec<Message>>>,
}

impl InMemoryMessageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageStore for InMemoryMessageStore {
    fn add(&self, message: Message) {
        self.conversations
            .write()
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message);
    }

    fn get(&self, conversation_id: &str, message_id: &str) -> Option<Message> {
        self.conversations
            .read()
            .get(conversation_id)?
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
    }

    fn update(
        &self,
        conversation_id: &str,
        message_id: &str,
        apply: &dyn Fn(&mut Message),
    ) -> bool {
        let mut conversations = self.conversations.write();
        let Some(messages) = conversations.get_mut(conversation_id) else {
            return false;
        };
        let Some(message) = messages.iter_mut().find(|m| m.id == message_id) else {
            return false;
        };
        apply(message);
        true
    }

    fn messages(&self, conversation_id: &str) -> Vec<Message> {
        self.conversations
            .read()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Flatten a conversation into the outbound message array: the system
/// prompt first, then every delivered (`Success`) message. In-flight and
/// failed messages never reach the provider.
pub fn build_chat_messages(
    store: &dyn MessageStore,
    conversation_id: &str,
    system_prompt: Option<&str>,
) -> Vec<ChatMessage> {
    let mut chat_messages = Vec::new();

    if let Some(prompt) = system_prompt {
        if !prompt.trim().is_empty() {
            chat_messages.push(ChatMessage::system(prompt));
        }
    }

    for message in store.messages(conversation_id) {
        if message.status != MessageStatus::Success {
            continue;
        }
        if let Some(content) = message.outbound_content() {
            chat_messages.push(ChatMessage {
                role: message.role,
                content,
            });
        }
    }

    chat_messages
}
