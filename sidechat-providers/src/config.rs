//! Provider kinds and credential configuration.

use serde::{Deserialize, Serialize};
use sidechat_core::NormalizedError;

/// The provider families sidechat can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// OpenAI and OpenAI-compatible hosts.
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
    /// Google Gemini.
    Gemini,
    /// Azure-hosted OpenAI deployments.
    AzureOpenAi,
}

impl ProviderKind {
    /// Stable wire name, used in error records and model catalogs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::AzureOpenAi => "azure-openai",
        }
    }

    /// Default API host for the provider.
    #[must_use]
    pub fn default_host(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Anthropic => Some("https://api.anthropic.com/v1"),
            Self::Gemini => Some("https://generativelanguage.googleapis.com/v1beta"),
            // Azure hosts are per-resource; there is no sensible default.
            Self::AzureOpenAi => None,
        }
    }

    /// Environment variable prefix for [`ProviderConfig::from_env`].
    #[must_use]
    pub fn env_prefix(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI",
            Self::Anthropic => "ANTHROPIC",
            Self::Gemini => "GEMINI",
            Self::AzureOpenAi => "AZURE_OPENAI",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials and endpoint configuration for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Which provider family this is.
    pub kind: ProviderKind,
    /// API key. Sent as the provider's expected auth header.
    pub api_key: String,
    /// Override for the API host; defaults per provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_host: Option<String>,
    /// API version, required by Azure (`api-version` query parameter).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Default model when a request names none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Whether this provider participates in default selection.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Model ids this provider is known to serve, for registry lookup.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    /// Create a config with an API key and defaults for everything else.
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            api_host: None,
            api_version: None,
            default_model: None,
            enabled: true,
            models: Vec::new(),
        }
    }

    /// Load from `{PREFIX}_API_KEY`, `{PREFIX}_API_HOST`,
    /// `{PREFIX}_API_VERSION` environment variables.
    pub fn from_env(kind: ProviderKind) -> Result<Self, NormalizedError> {
        let prefix = kind.env_prefix();
        let api_key = std::env::var(format!("{prefix}_API_KEY")).map_err(|_| {
            NormalizedError::auth(format!("{prefix}_API_KEY is not set"))
                .with_provider(kind.as_str())
        })?;

        let mut config = Self::new(kind, api_key);
        config.api_host = std::env::var(format!("{prefix}_API_HOST")).ok();
        config.api_version = std::env::var(format!("{prefix}_API_VERSION")).ok();
        Ok(config)
    }

    /// Set the API host.
    #[must_use]
    pub fn with_api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = Some(host.into());
        self
    }

    /// Set the API version.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set the default model.
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Declare the model ids this provider serves.
    #[must_use]
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Disable the provider.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Resolved API host (explicit override or provider default).
    ///
    /// Errors for Azure when no host was configured, since Azure endpoints
    /// are per-resource.
    pub fn host(&self) -> Result<String, NormalizedError> {
        if let Some(host) = &self.api_host {
            return Ok(host.trim_end_matches('/').to_string());
        }
        self.kind
            .default_host()
            .map(str::to_string)
            .ok_or_else(|| {
                NormalizedError::validation(format!(
                    "{} requires an explicit api_host",
                    self.kind
                ))
                .with_provider(self.kind.as_str())
            })
    }

    /// Check whether this config claims to serve the given model id.
    #[must_use]
    pub fn serves_model(&self, model_id: &str) -> bool {
        self.default_model.as_deref() == Some(model_id)
            || self.models.iter().any(|m| m == model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
        assert_eq!(ProviderKind::AzureOpenAi.to_string(), "azure-openai");
    }

    #[test]
    fn test_host_defaults_and_overrides() {
        let config = ProviderConfig::new(ProviderKind::OpenAi, "sk-test");
        assert_eq!(config.host().unwrap(), "https://api.openai.com/v1");

        let config = config.with_api_host("https://proxy.example.com/v1/");
        assert_eq!(config.host().unwrap(), "https://proxy.example.com/v1");
    }

    #[test]
    fn test_azure_requires_host() {
        let config = ProviderConfig::new(ProviderKind::AzureOpenAi, "key");
        assert!(config.host().is_err());

        let config = config.with_api_host("https://my-resource.openai.azure.com");
        assert!(config.host().is_ok());
    }

    #[test]
    fn test_serves_model() {
        let config = ProviderConfig::new(ProviderKind::OpenAi, "k")
            .with_default_model("gpt-4o")
            .with_models(["gpt-4o-mini"]);
        assert!(config.serves_model("gpt-4o"));
        assert!(config.serves_model("gpt-4o-mini"));
        assert!(!config.serves_model("claude-3-5-sonnet-latest"));
    }

    #[test]
    fn test_from_env_missing_key() {
        std::env::remove_var("GEMINI_API_KEY");
        let result = ProviderConfig::from_env(ProviderKind::Gemini);
        assert!(result.is_err());
    }
}
