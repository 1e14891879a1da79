//! # sidechat-plugins
//!
//! The request/response plugin pipeline: an ordered chain of transformers
//! applied before dispatch and around the streaming lifecycle. Plugins are
//! best-effort, a failing plugin is logged and skipped, never allowed to
//! block core chat.
//!
//! ## Example
//!
//! ```rust
//! use sidechat_plugins::{PluginManager, PluginRequest};
//! use sidechat_core::{ChatMessage, ChatOptions};
//!
//! # tokio_test::block_on(async {
//! let manager = PluginManager::new();
//! let request = PluginRequest::new(vec![ChatMessage::user("hi")], ChatOptions::new());
//! let processed = manager.process_request(request).await;
//! assert_eq!(processed.messages.len(), 1);
//! # });
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod builtin;
pub mod manager;
pub mod plugin;

pub use builtin::{
    AudioTranscriptionPlugin, DocumentContextPlugin, DocumentFetcher, SearchProvider,
    SearchResult, Transcriber, WebSearchPlugin,
};
pub use manager::PluginManager;
pub use plugin::{LlmPlugin, PluginError, PluginRequest, RequestPhase};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::manager::PluginManager;
    pub use crate::plugin::{LlmPlugin, PluginError, PluginRequest, RequestPhase};
}
