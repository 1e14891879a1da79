//! OpenAI stream-event mapping.

use serde_json::Value;
use sidechat_core::{FinishReason, NormalizedError, TokenUsage};
use sidechat_streaming::{RawFrame, StreamEvent};

use super::types::ChatCompletionChunk;
use crate::stream::EventMapper;

/// Maps OpenAI chat-completion chunks onto normalized events.
///
/// `choices[0].delta.content` feeds the content channel,
/// `choices[0].delta.reasoning` the thinking channel; a `finish_reason` is
/// the terminal signal, with the `[DONE]` sentinel as fallback for hosts
/// that never send one.
#[derive(Debug, Default)]
pub struct OpenAiEventMapper {
    content: String,
    thinking: String,
    finish_reason: Option<FinishReason>,
    usage: Option<TokenUsage>,
    finished: bool,
}

impl OpenAiEventMapper {
    /// Create a fresh mapper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map_chunk(&mut self, value: Value) -> Vec<StreamEvent> {
        let chunk: ChatCompletionChunk = match serde_json::from_value(value.clone()) {
            Ok(chunk) => chunk,
            Err(_) => return vec![StreamEvent::raw(value)],
        };

        if let Some(usage) = chunk.usage {
            self.usage = Some(usage.into());
        }

        let Some(choice) = chunk.choices.first() else {
            // Usage-only frames are absorbed; anything else unrecognized is
            // forwarded rather than dropped.
            if chunk.usage.is_some() {
                return vec![];
            }
            return vec![StreamEvent::raw(value)];
        };

        let mut events = Vec::new();

        if let Some(content) = choice.delta.content.as_deref() {
            if !content.is_empty() {
                self.content.push_str(content);
                events.push(StreamEvent::content(content, self.content.clone()));
            }
        }

        if let Some(reasoning) = choice.delta.reasoning.as_deref() {
            if !reasoning.is_empty() {
                self.thinking.push_str(reasoning);
                events.push(StreamEvent::thinking(reasoning, self.thinking.clone()));
            }
        }

        // Content in the same frame is emitted before the terminal.
        if let Some(reason) = choice.finish_reason.as_deref() {
            self.finish_reason = Some(FinishReason::from_wire(reason));
            self.finished = true;
            events.push(StreamEvent::done(
                self.finish_reason.unwrap_or_default(),
                self.usage,
            ));
        }

        events
    }
}

impl EventMapper for OpenAiEventMapper {
    fn map_frame(&mut self, frame: RawFrame) -> Result<Vec<StreamEvent>, NormalizedError> {
        if self.finished {
            return Ok(vec![]);
        }
        match frame {
            RawFrame::Event(value) => Ok(self.map_chunk(value)),
            RawFrame::DoneMarker => {
                self.finished = true;
                Ok(vec![StreamEvent::done(
                    self.finish_reason.unwrap_or_default(),
                    self.usage,
                )])
            }
        }
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return vec![];
        }
        self.finished = true;
        vec![StreamEvent::done(FinishReason::Other, self.usage)]
    }
}
