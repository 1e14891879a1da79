//! # sidechat-providers
//!
//! Provider configuration for sidechat: which provider families exist, how
//! their credentials and endpoints are described, and the registry that
//! resolves a request's target model to a configured provider.
//!
//! ## Example
//!
//! ```rust
//! use sidechat_providers::{ProviderConfig, ProviderKind, ProviderRegistry};
//!
//! let mut registry = ProviderRegistry::new();
//! registry.register(
//!     ProviderConfig::new(ProviderKind::OpenAi, "sk-test").with_default_model("gpt-4o"),
//! );
//!
//! let provider = registry.provider_for_model("gpt-4o").unwrap();
//! assert_eq!(provider.kind, ProviderKind::OpenAi);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod registry;

pub use catalog::ModelInfo;
pub use config::{ProviderConfig, ProviderKind};
pub use registry::ProviderRegistry;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{ModelInfo, ProviderConfig, ProviderKind, ProviderRegistry};
}
