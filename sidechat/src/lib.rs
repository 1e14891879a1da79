//! # sidechat
//!
//! The provider-and-streaming core of an AI chat sidebar for video pages:
//! one uniform, incrementally-updatable message model over the streaming
//! wire formats of OpenAI, Anthropic, Gemini, and Azure OpenAI, with
//! plugin-based request enrichment, multi-model fan-out, and cooperative
//! cancellation.
//!
//! The crate is a facade over the workspace:
//!
//! - [`sidechat_core`]: messages, options, the normalized error taxonomy
//! - [`sidechat_streaming`]: SSE/NDJSON decoding and stream accumulation
//! - [`sidechat_providers`]: provider configuration and registry
//! - [`sidechat_models`]: per-vendor API clients and event mappers
//! - [`sidechat_plugins`]: the request/response plugin pipeline
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sidechat::{Assistant, ChatService, InMemoryMessageStore, NoopHandler};
//! use sidechat_core::ChatOptions;
//! use sidechat_plugins::PluginManager;
//! use sidechat_providers::{ProviderConfig, ProviderKind, ProviderRegistry};
//!
//! # async fn run() -> Result<(), sidechat_core::NormalizedError> {
//! let mut registry = ProviderRegistry::new();
//! registry.register(
//!     ProviderConfig::from_env(ProviderKind::OpenAi)?.with_default_model("gpt-4o"),
//! );
//!
//! let service = ChatService::new(
//!     registry,
//!     PluginManager::new(),
//!     Arc::new(InMemoryMessageStore::new()),
//! );
//!
//! let assistant = Assistant::new("video-123", "gpt-4o")
//!     .with_prompt("You answer questions about the playing video.");
//! let replies = service
//!     .send_stream_message(&assistant, "What just happened?", &ChatOptions::new(), &NoopHandler)
//!     .await?;
//! println!("{}", replies[0].text());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod history;
pub mod service;
pub mod session;

pub use history::{
    build_chat_messages, InMemoryMessageStore, Message, MessageBlock, MessageStatus,
    MessageStore, ThinkingStatus,
};
pub use service::{Assistant, ChatService, NoopHandler, ServiceConfig, StreamHandler};
pub use session::{SessionGuard, SessionRegistry};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::history::{InMemoryMessageStore, Message, MessageStatus, MessageStore};
    pub use crate::service::{Assistant, ChatService, ServiceConfig, StreamHandler};
    pub use crate::session::SessionRegistry;
    pub use sidechat_core::prelude::*;
    pub use sidechat_models::prelude::*;
    pub use sidechat_plugins::prelude::*;
    pub use sidechat_providers::prelude::*;
    pub use sidechat_streaming::prelude::*;
}
