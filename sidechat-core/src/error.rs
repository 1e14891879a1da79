//! Error taxonomy and normalization.
//!
//! Every transport failure, HTTP error body, and vendor error envelope is
//! reduced once, at the adapter boundary, into a [`NormalizedError`]. Higher
//! layers pass it through unchanged; re-normalizing is a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The seven error kinds every failure is reduced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport-level failure reaching the provider.
    Network,
    /// The request ran out of time or was aborted.
    Timeout,
    /// The request itself was rejected as invalid.
    Validation,
    /// Credentials missing, invalid, or lacking permission.
    Auth,
    /// Rate limit or account quota exhausted.
    Quota,
    /// The provider failed server-side.
    Api,
    /// Nothing else matched.
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Validation => "validation",
            Self::Auth => "auth",
            Self::Quota => "quota",
            Self::Api => "api",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, NormalizedError>;

const MAX_RAW_MESSAGE_LEN: usize = 100;

/// Error code marking an operation a provider does not implement.
pub const UNSUPPORTED_OPERATION: &str = "unsupported_operation";

/// A classified error with a user-facing message.
///
/// `message` is always phrased for the end user; `details` preserves the raw
/// vendor text for diagnostics.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct NormalizedError {
    /// Classified kind.
    pub kind: ErrorKind,
    /// Vendor or HTTP code, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// User-facing message.
    pub message: String,
    /// Raw underlying message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Provider that produced the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model in use when the error occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// When the error was classified.
    pub timestamp: DateTime<Utc>,
    /// Whether retrying the request may succeed.
    pub retryable: bool,
}

impl NormalizedError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let retryable = matches!(
            kind,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::Quota | ErrorKind::Api
        );
        Self {
            kind,
            code: None,
            message: message.into(),
            details: None,
            provider: None,
            model: None,
            timestamp: Utc::now(),
            retryable,
        }
    }

    /// Network-kind error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// Timeout-kind error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Validation-kind error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Auth-kind error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    /// Quota-kind error.
    pub fn quota(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Quota, message)
    }

    /// Api-kind error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Api, message)
    }

    /// Unknown-kind error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Error signalling an operation the provider does not implement.
    ///
    /// Distinct from a silent no-op: callers can detect it via
    /// [`NormalizedError::is_unsupported`].
    pub fn unsupported(operation: &str, provider: &str) -> Self {
        Self::validation(format!(
            "The {provider} provider does not support {operation}"
        ))
        .with_code(UNSUPPORTED_OPERATION)
        .with_provider(provider)
    }

    /// Check for the unsupported-operation marker.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        self.code.as_deref() == Some(UNSUPPORTED_OPERATION)
    }

    /// Set the code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the raw details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Set the provider.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Whether retrying the request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Classify an HTTP error status plus response body.
    ///
    /// The body is probed for a vendor error envelope to refine the code and
    /// raw message; classification of the kind follows the status first.
    pub fn from_status(status: u16, body: &str, provider: &str, model: Option<&str>) -> Self {
        let (kind, message) = match status {
            400 | 422 => (
                ErrorKind::Validation,
                "The request was rejected, check the input",
            ),
            401 => (
                ErrorKind::Auth,
                "Invalid API key, check the provider configuration",
            ),
            403 => (ErrorKind::Auth, "Access denied, check the API permissions"),
            429 => (
                ErrorKind::Quota,
                "Too many requests or quota exhausted, try again shortly",
            ),
            500..=599 => (
                ErrorKind::Api,
                "The AI service is temporarily unavailable, try again shortly",
            ),
            _ => (ErrorKind::Api, "The API request failed"),
        };

        let envelope_message = envelope_message(body);
        let details = envelope_message
            .clone()
            .unwrap_or_else(|| format!("HTTP {status}: {}", truncate(body, MAX_RAW_MESSAGE_LEN)));

        let mut error = Self::new(kind, message).with_code(status.to_string());
        if let Some(code) = envelope_code(body) {
            error.code = Some(code);
        }
        error
            .with_details(details)
            .with_provider(provider)
            .with_optional_model(model)
    }

    /// Classify a vendor error envelope that arrived without an HTTP status,
    /// e.g. an `error` event inside a stream.
    ///
    /// Idempotent: a value that is already a serialized [`NormalizedError`]
    /// (it carries both a known `kind` and a `message`) is returned
    /// unchanged rather than re-wrapped.
    pub fn from_envelope(value: &Value, provider: &str, model: Option<&str>) -> Self {
        if let Some(already) = Self::detect_normalized(value) {
            return already;
        }

        let envelope = value.get("error").unwrap_or(value);
        let raw_message = envelope
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("request failed")
            .to_string();

        let kind = envelope
            .get("type")
            .and_then(Value::as_str)
            .map(kind_for_vendor_type)
            .or_else(|| {
                envelope
                    .get("status")
                    .and_then(Value::as_str)
                    .map(kind_for_google_status)
            })
            .or_else(|| {
                envelope
                    .get("code")
                    .and_then(Value::as_u64)
                    .map(|code| Self::from_status(code as u16, "", provider, model).kind)
            })
            .unwrap_or(ErrorKind::Api);

        let code = envelope
            .get("code")
            .map(|c| match c {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .or_else(|| {
                envelope
                    .get("type")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });

        let mut error = Self::new(kind, friendly_message(&raw_message)).with_details(raw_message);
        error.code = code;
        error.with_provider(provider).with_optional_model(model)
    }

    /// Detect a value that is already a serialized normalized error.
    fn detect_normalized(value: &Value) -> Option<Self> {
        let has_message = value.get("message").and_then(Value::as_str).is_some();
        let has_kind = value
            .get("kind")
            .or_else(|| value.get("type"))
            .and_then(Value::as_str)
            .map(|k| {
                matches!(
                    k,
                    "network" | "timeout" | "validation" | "auth" | "quota" | "api" | "unknown"
                )
            })
            .unwrap_or(false);

        if has_message && has_kind {
            serde_json::from_value(value.clone()).ok()
        } else {
            None
        }
    }

    fn with_optional_model(mut self, model: Option<&str>) -> Self {
        self.model = model.map(str::to_string);
        self
    }
}

/// Map an OpenAI/Anthropic `error.type` string onto a kind.
fn kind_for_vendor_type(error_type: &str) -> ErrorKind {
    match error_type {
        "invalid_request_error" | "not_found_error" => ErrorKind::Validation,
        "authentication_error" | "permission_error" => ErrorKind::Auth,
        "rate_limit_error" | "insufficient_quota" => ErrorKind::Quota,
        "server_error" | "api_error" | "overloaded_error" => ErrorKind::Api,
        _ => ErrorKind::Api,
    }
}

/// Map a Google RPC status string onto a kind.
fn kind_for_google_status(status: &str) -> ErrorKind {
    match status {
        "INVALID_ARGUMENT" | "FAILED_PRECONDITION" => ErrorKind::Validation,
        "UNAUTHENTICATED" | "PERMISSION_DENIED" => ErrorKind::Auth,
        "RESOURCE_EXHAUSTED" => ErrorKind::Quota,
        "UNAVAILABLE" | "INTERNAL" => ErrorKind::Api,
        _ => ErrorKind::Api,
    }
}

/// Derive a user-facing message from a raw vendor message.
///
/// Pattern-matches well-known phrasings and falls back to the raw text
/// truncated to 100 characters.
pub fn friendly_message(raw: &str) -> String {
    if raw.is_empty() {
        return "An unknown error occurred".to_string();
    }

    let lower = raw.to_lowercase();

    if lower.contains("api key") || lower.contains("unauthorized") || lower.contains("authentication")
    {
        return "Invalid API key, check the provider configuration".to_string();
    }
    if lower.contains("rate limit") || lower.contains("too many requests") {
        return "Too many requests, try again shortly".to_string();
    }
    if lower.contains("quota") || lower.contains("billing") || lower.contains("insufficient") {
        return "Provider quota exhausted, check the account".to_string();
    }
    if lower.contains("model") && lower.contains("not found") {
        return "The requested model does not exist or is unavailable".to_string();
    }
    if lower.contains("timeout") || lower.contains("timed out") {
        return "The request timed out, try again shortly".to_string();
    }
    if lower.contains("network") || lower.contains("connection") {
        return "Network failure, check the connection".to_string();
    }
    if lower.contains("server error") || lower.contains("internal error") {
        return "The AI service is temporarily unavailable, try again shortly".to_string();
    }

    truncate(raw, MAX_RAW_MESSAGE_LEN)
}

fn truncate(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    let mut out: String = input.chars().take(max).collect();
    out.push_str("...");
    out
}

fn envelope_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

fn envelope_code(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let code = value.get("error")?.get("code")?;
    match code {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            NormalizedError::from_status(400, "", "openai", None).kind,
            ErrorKind::Validation
        );
        assert_eq!(
            NormalizedError::from_status(401, "", "openai", None).kind,
            ErrorKind::Auth
        );
        assert_eq!(
            NormalizedError::from_status(403, "", "openai", None).kind,
            ErrorKind::Auth
        );
        assert_eq!(
            NormalizedError::from_status(429, "", "openai", None).kind,
            ErrorKind::Quota
        );
        assert_eq!(
            NormalizedError::from_status(503, "", "openai", None).kind,
            ErrorKind::Api
        );
    }

    #[test]
    fn test_status_picks_up_envelope_details() {
        let body = r#"{"error":{"message":"model `gpt-5` not found","code":"model_not_found"}}"#;
        let error = NormalizedError::from_status(400, body, "openai", Some("gpt-5"));
        assert_eq!(error.code.as_deref(), Some("model_not_found"));
        assert_eq!(error.details.as_deref(), Some("model `gpt-5` not found"));
        assert_eq!(error.model.as_deref(), Some("gpt-5"));
    }

    #[test]
    fn test_vendor_type_mapping() {
        let envelope = json!({"error": {"type": "rate_limit_error", "message": "Rate limited"}});
        let error = NormalizedError::from_envelope(&envelope, "anthropic", None);
        assert_eq!(error.kind, ErrorKind::Quota);
        assert_eq!(error.provider.as_deref(), Some("anthropic"));

        let envelope = json!({"error": {"type": "authentication_error", "message": "bad key"}});
        assert_eq!(
            NormalizedError::from_envelope(&envelope, "openai", None).kind,
            ErrorKind::Auth
        );
    }

    #[test]
    fn test_google_code_mapping() {
        let envelope = json!({"error": {"code": 429, "message": "Resource exhausted", "status": "RESOURCE_EXHAUSTED"}});
        let error = NormalizedError::from_envelope(&envelope, "gemini", None);
        assert_eq!(error.kind, ErrorKind::Quota);
    }

    #[test]
    fn test_renormalization_is_identity() {
        let original = NormalizedError::auth("Invalid API key, check the provider configuration")
            .with_provider("openai")
            .with_details("401 Unauthorized");

        let value = serde_json::to_value(&original).unwrap();
        let round = NormalizedError::from_envelope(&value, "somewhere-else", Some("other"));

        assert_eq!(round, original);
    }

    #[test]
    fn test_friendly_message_keywords() {
        assert!(friendly_message("Incorrect API key provided").contains("Invalid API key"));
        assert!(friendly_message("Rate limit reached for gpt-4o").contains("Too many requests"));
        assert!(friendly_message("You exceeded your current quota").contains("quota exhausted"));
        assert!(
            friendly_message("The model `nope` not found").contains("does not exist")
        );
        assert!(friendly_message("connection reset by peer").contains("Network failure"));
    }

    #[test]
    fn test_friendly_message_truncates_fallback() {
        let raw = "x".repeat(300);
        let message = friendly_message(&raw);
        assert!(message.len() < 120);
        assert!(message.ends_with("..."));
    }

    #[test]
    fn test_unsupported_marker() {
        let error = NormalizedError::unsupported("image generation", "anthropic");
        assert!(error.is_unsupported());
        assert_eq!(error.kind, ErrorKind::Validation);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_retryability() {
        assert!(NormalizedError::timeout("t").is_retryable());
        assert!(NormalizedError::quota("q").is_retryable());
        assert!(NormalizedError::network("n").is_retryable());
        assert!(!NormalizedError::auth("a").is_retryable());
        assert!(!NormalizedError::validation("v").is_retryable());
    }
}
