//! Registry of configured providers.

use sidechat_core::NormalizedError;

use crate::config::{ProviderConfig, ProviderKind};

/// Ordered collection of provider configurations.
///
/// Lookup rules mirror the sidebar's settings store: an explicit model id
/// resolves to the provider that claims it, otherwise the first enabled
/// provider is the default.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the config for a provider kind.
    pub fn register(&mut self, config: ProviderConfig) {
        if let Some(existing) = self
            .providers
            .iter_mut()
            .find(|p| p.kind == config.kind)
        {
            *existing = config;
        } else {
            self.providers.push(config);
        }
    }

    /// Remove a provider.
    pub fn remove(&mut self, kind: ProviderKind) -> Option<ProviderConfig> {
        let index = self.providers.iter().position(|p| p.kind == kind)?;
        Some(self.providers.remove(index))
    }

    /// Get the config for a provider kind.
    #[must_use]
    pub fn get(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.kind == kind)
    }

    /// All registered configs, in registration order.
    #[must_use]
    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    /// The first enabled provider, used when a request names no model.
    pub fn default_provider(&self) -> Result<&ProviderConfig, NormalizedError> {
        self.providers
            .iter()
            .find(|p| p.enabled)
            .ok_or_else(|| {
                NormalizedError::validation(
                    "No AI provider is available, configure an API key in the settings",
                )
            })
    }

    /// Resolve the provider that serves a model id.
    pub fn provider_for_model(&self, model_id: &str) -> Result<&ProviderConfig, NormalizedError> {
        self.providers
            .iter()
            .filter(|p| p.enabled)
            .find(|p| p.serves_model(model_id))
            .ok_or_else(|| {
                NormalizedError::validation(format!(
                    "No provider is configured for model {model_id}"
                ))
                .with_model(model_id)
            })
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
