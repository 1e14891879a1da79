//! # sidechat-core
//!
//! Core types for the sidechat provider layer:
//!
//! - **Messages**: role/content chat messages with multimodal parts
//! - **Options**: generic request options plus plugin trigger fields
//! - **Errors**: the normalized error taxonomy every failure reduces to
//! - **Usage**: token accounting
//!
//! ## Example
//!
//! ```rust
//! use sidechat_core::{ChatMessage, ChatOptions};
//!
//! let messages = vec![
//!     ChatMessage::system("You explain what happens in the video."),
//!     ChatMessage::user("What is this scene about?"),
//! ];
//! let options = ChatOptions::new().with_model("gpt-4o").with_temperature(0.7);
//! assert_eq!(messages.len(), 2);
//! assert!(options.temperature.is_some());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod messages;
pub mod options;
pub mod usage;

pub use error::{friendly_message, ErrorKind, NormalizedError, Result, UNSUPPORTED_OPERATION};
pub use messages::{ChatMessage, ContentPart, FinishReason, ImageUrl, MessageContent, Role};
pub use options::{AudioSource, ChatOptions, DocumentSource};
pub use usage::TokenUsage;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::error::{ErrorKind, NormalizedError, Result};
    pub use crate::messages::{ChatMessage, ContentPart, FinishReason, MessageContent, Role};
    pub use crate::options::{AudioSource, ChatOptions, DocumentSource};
    pub use crate::usage::TokenUsage;
}
