//! Client selection by provider kind.

use sidechat_core::NormalizedError;
use sidechat_providers::{ProviderConfig, ProviderKind};
use std::sync::Arc;

use crate::anthropic::AnthropicClient;
use crate::azure::AzureOpenAiClient;
use crate::client::BoxedClient;
use crate::google::GeminiClient;
use crate::openai::OpenAiClient;

/// Build the client for a provider config.
///
/// Tagged-variant dispatch: the provider kind alone selects the
/// implementation. Configuration problems (e.g. a missing Azure host)
/// surface on the first call, not here.
pub fn client_for(config: &ProviderConfig) -> Result<BoxedClient, NormalizedError> {
    let client: BoxedClient = match config.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiClient::new(config.clone())),
        ProviderKind::Anthropic => Arc::new(AnthropicClient::new(config.clone())),
        ProviderKind::Gemini => Arc::new(GeminiClient::new(config.clone())),
        ProviderKind::AzureOpenAi => Arc::new(AzureOpenAiClient::new(config.clone())),
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiClient;

    #[test]
    fn test_dispatch_by_kind() {
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::Gemini,
            ProviderKind::AzureOpenAi,
        ] {
            let config = ProviderConfig::new(kind, "key");
            let client = client_for(&config).unwrap();
            assert_eq!(client.provider(), kind);
        }
    }
}
