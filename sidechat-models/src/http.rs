//! Shared HTTP plumbing for the vendor clients.
//!
//! Transport failures and HTTP error bodies are normalized exactly once
//! here, at the adapter boundary; higher layers never re-wrap them.

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use sidechat_core::NormalizedError;
use sidechat_streaming::Framing;

/// Send a request and normalize transport or status failures.
pub(crate) async fn execute(
    builder: RequestBuilder,
    provider: &str,
    model: Option<&str>,
) -> Result<Response, NormalizedError> {
    let response = builder
        .send()
        .await
        .map_err(|error| normalize_transport(&error, provider, model))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(NormalizedError::from_status(
            status.as_u16(),
            &body,
            provider,
            model,
        ));
    }

    Ok(response)
}

/// Read a JSON body, normalizing decode failures.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    provider: &str,
    model: Option<&str>,
) -> Result<T, NormalizedError> {
    response.json::<T>().await.map_err(|error| {
        let mut normalized =
            NormalizedError::api("The provider returned an unreadable response")
                .with_details(error.to_string())
                .with_provider(provider);
        normalized.model = model.map(str::to_string);
        normalized
    })
}

/// Classify a reqwest error into the taxonomy.
///
/// Order matters: timeout beats the generic connect/request checks, matching
/// the classification order of the normalizer.
pub(crate) fn normalize_transport(
    error: &reqwest::Error,
    provider: &str,
    model: Option<&str>,
) -> NormalizedError {
    let mut normalized = if error.is_timeout() {
        NormalizedError::timeout("The request timed out, try again shortly")
    } else if error.is_connect() || error.is_request() {
        NormalizedError::network("Network failure, check the connection")
    } else {
        NormalizedError::unknown("An unknown error occurred, try again shortly")
    };

    normalized = normalized
        .with_details(error.to_string())
        .with_provider(provider);
    normalized.model = model.map(str::to_string);
    normalized
}

/// Pick the stream framing from the response content type. Decided once per
/// stream, not per line.
pub(crate) fn response_framing(response: &Response) -> Framing {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    Framing::from_content_type(content_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidechat_core::ErrorKind;

    #[tokio::test]
    async fn test_connect_error_is_network_kind() {
        // Nothing listens on this port; reqwest fails at connect.
        let client = reqwest::Client::new();
        let builder = client.get("http://127.0.0.1:9/none");
        let error = execute(builder, "openai", Some("gpt-4o"))
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Network);
        assert_eq!(error.provider.as_deref(), Some("openai"));
        assert_eq!(error.model.as_deref(), Some("gpt-4o"));
    }
}
