//! # sidechat-models
//!
//! Vendor API clients for sidechat. Each provider family implements the
//! [`ApiClient`] capability set: request-body building in the provider's
//! wire shape, streaming with normalized events, model listing, and the
//! optional image / embedding / transcription operations.
//!
//! Streams are driven by a shared pipeline: the response byte stream feeds
//! a [`sidechat_streaming::WireDecoder`], whose frames feed a per-vendor
//! [`EventMapper`]; the [`MappedStream`] adapter enforces the
//! one-terminal-event invariant.
//!
//! ## Example
//!
//! ```rust
//! use sidechat_models::factory::client_for;
//! use sidechat_providers::{ProviderConfig, ProviderKind};
//!
//! let config = ProviderConfig::new(ProviderKind::OpenAi, "sk-test");
//! let client = client_for(&config).unwrap();
//! assert_eq!(client.provider(), ProviderKind::OpenAi);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod anthropic;
pub mod azure;
pub mod client;
pub mod factory;
pub mod google;
mod http;
pub mod mock;
pub mod openai;
pub mod stream;

pub use anthropic::AnthropicClient;
pub use azure::AzureOpenAiClient;
pub use client::{
    ApiClient, BoxedClient, ChatReply, Embedding, EventStream, GeneratedImage, ImageOptions,
    Transcript,
};
pub use factory::client_for;
pub use google::GeminiClient;
pub use mock::MockApiClient;
pub use openai::OpenAiClient;
pub use stream::{EventMapper, MappedStream};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::client::{ApiClient, BoxedClient, ChatReply, EventStream};
    pub use crate::factory::client_for;
    pub use crate::mock::MockApiClient;
}
