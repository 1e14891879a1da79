//! Vendor-neutral stream events.
//!
//! Adapters translate provider-native frames into these events. Content and
//! thinking events carry both the delta and the authoritative running total,
//! because some vendors deliver deltas and others deliver the accumulated
//! text so far.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sidechat_core::{FinishReason, TokenUsage};

/// One normalized event in a streamed reply.
///
/// Invariants for consumers:
/// - Events arrive in source order.
/// - `accumulated` in successive events of one channel is a prefix-extension
///   of the previous value.
/// - `Done` is terminal; nothing follows it. Abnormal termination travels as
///   the `Err` arm of the stream item instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental answer text.
    Content {
        /// Text added by this event.
        delta: String,
        /// Authoritative running total for the content channel.
        accumulated: String,
    },
    /// Incremental reasoning/chain-of-thought text.
    Thinking {
        /// Text added by this event.
        delta: String,
        /// Authoritative running total for the thinking channel.
        accumulated: String,
    },
    /// A provider-native event the adapter did not recognize, forwarded
    /// verbatim so callers keep access to vendor extensions.
    Raw {
        /// The provider-native payload.
        payload: Value,
    },
    /// Normal end of the stream.
    Done {
        /// Why the reply stopped.
        finish_reason: FinishReason,
        /// Usage reported by the vendor, when available.
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<TokenUsage>,
    },
}

impl StreamEvent {
    /// Create a content event.
    #[must_use]
    pub fn content(delta: impl Into<String>, accumulated: impl Into<String>) -> Self {
        Self::Content {
            delta: delta.into(),
            accumulated: accumulated.into(),
        }
    }

    /// Create a thinking event.
    #[must_use]
    pub fn thinking(delta: impl Into<String>, accumulated: impl Into<String>) -> Self {
        Self::Thinking {
            delta: delta.into(),
            accumulated: accumulated.into(),
        }
    }

    /// Create a raw passthrough event.
    #[must_use]
    pub fn raw(payload: Value) -> Self {
        Self::Raw { payload }
    }

    /// Create a terminal event.
    #[must_use]
    pub fn done(finish_reason: FinishReason, usage: Option<TokenUsage>) -> Self {
        Self::Done {
            finish_reason,
            usage,
        }
    }

    /// Check whether this event ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    /// The delta text, for content and thinking events.
    #[must_use]
    pub fn delta(&self) -> Option<&str> {
        match self {
            Self::Content { delta, .. } | Self::Thinking { delta, .. } => Some(delta),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_tagging() {
        let event = StreamEvent::content("lo", "Hello");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "content");
        assert_eq!(json["delta"], "lo");
        assert_eq!(json["accumulated"], "Hello");

        let parsed: StreamEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_terminal_detection() {
        assert!(StreamEvent::done(FinishReason::Stop, None).is_terminal());
        assert!(!StreamEvent::content("a", "a").is_terminal());
        assert!(!StreamEvent::raw(serde_json::json!({"ping": true})).is_terminal());
    }
}
