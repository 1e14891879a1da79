//! Provider-normalized model descriptions.

use serde::{Deserialize, Serialize};

use crate::config::ProviderKind;

/// One model as listed by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Provider-scoped model id, e.g. `gpt-4o` or a deployment name.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Which provider serves it.
    pub provider: ProviderKind,
}

impl ModelInfo {
    /// Create a model entry; the display name defaults to the id.
    pub fn new(id: impl Into<String>, provider: ProviderKind) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            provider,
        }
    }

    /// Set a display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
