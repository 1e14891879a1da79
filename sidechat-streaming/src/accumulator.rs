//! Reduction of a stream-event sequence into a final reply.

use serde::{Deserialize, Serialize};
use sidechat_core::{FinishReason, NormalizedError, TokenUsage};

use crate::events::StreamEvent;

/// Running state for one streamed reply.
///
/// Adapters supply the authoritative running total on every content and
/// thinking event, so the accumulator adopts that total instead of
/// re-concatenating deltas, some vendors deliver "accumulated so far"
/// rather than a delta.
#[derive(Debug, Default, Clone)]
pub struct StreamAccumulator {
    content: String,
    thinking: String,
    finish_reason: Option<FinishReason>,
    usage: Option<TokenUsage>,
}

impl StreamAccumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event.
    pub fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Content { accumulated, .. } => {
                self.content = accumulated.clone();
            }
            StreamEvent::Thinking { accumulated, .. } => {
                self.thinking = accumulated.clone();
            }
            StreamEvent::Raw { .. } => {}
            StreamEvent::Done {
                finish_reason,
                usage,
            } => {
                self.finish_reason = Some(*finish_reason);
                self.usage = *usage;
            }
        }
    }

    /// Content accumulated so far.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Thinking text accumulated so far.
    #[must_use]
    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    /// Whether a terminal `Done` has been applied.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finish_reason.is_some()
    }

    /// Freeze the accumulated state into a completed reply.
    #[must_use]
    pub fn finish(self) -> StreamedReply {
        StreamedReply {
            text: self.content,
            reasoning: non_empty(self.thinking),
            finish_reason: self.finish_reason.unwrap_or_default(),
            usage: self.usage,
            error: None,
        }
    }

    /// Freeze the accumulated state with an error attached.
    ///
    /// Partial output is preserved, never discarded, a half answer is still
    /// useful to the caller.
    #[must_use]
    pub fn fail(self, error: NormalizedError) -> StreamedReply {
        StreamedReply {
            text: self.content,
            reasoning: non_empty(self.thinking),
            finish_reason: FinishReason::Other,
            usage: self.usage,
            error: Some(error),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// The final composed record of one streamed reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamedReply {
    /// Final answer text (possibly partial on error).
    pub text: String,
    /// Reasoning channel text, when the model emitted any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Why the reply stopped.
    pub finish_reason: FinishReason,
    /// Usage reported by the vendor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// The terminal error, for abnormally ended streams.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<NormalizedError>,
}
