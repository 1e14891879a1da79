//! Anthropic stream-event mapping.

use serde_json::Value;
use sidechat_core::{FinishReason, NormalizedError, TokenUsage};
use sidechat_streaming::{RawFrame, StreamEvent};
use std::collections::HashSet;

use super::types::{
    AnthropicStreamEvent, BlockDelta, ContentBlockInfo,
};
use crate::stream::EventMapper;

/// Maps Anthropic `message` stream events onto normalized events.
///
/// Thinking classification, in priority order:
/// 1. `thinking_delta` payloads and deltas for blocks whose
///    `content_block_start` declared type `thinking`, the documented wire
///    contract.
/// 2. Literal `<thinking>`/`</thinking>` markers inside text deltas.
///    This is a provisional heuristic, not a vendor guarantee; the markers
///    themselves are excluded from the accumulated text.
#[derive(Debug, Default)]
pub struct AnthropicEventMapper {
    content: String,
    thinking: String,
    thinking_blocks: HashSet<usize>,
    in_thinking_tag: bool,
    input_tokens: u64,
    output_tokens: u64,
    saw_usage: bool,
    stop_reason: Option<FinishReason>,
    finished: bool,
}

impl AnthropicEventMapper {
    /// Create a fresh mapper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn usage(&self) -> Option<TokenUsage> {
        self.saw_usage
            .then(|| TokenUsage::new(self.input_tokens, self.output_tokens))
    }

    /// Classify a text delta for a block not declared `thinking`.
    ///
    /// Toggles on the literal tag markers and strips them from the text.
    fn classify_tagged_text(&mut self, text: &str) -> (bool, String) {
        let opens = text.contains("<thinking>");
        let closes = text.contains("</thinking>");
        if opens {
            self.in_thinking_tag = true;
        }
        let is_thinking = self.in_thinking_tag || closes;
        if closes {
            self.in_thinking_tag = false;
        }

        if is_thinking {
            let stripped = text.replace("<thinking>", "").replace("</thinking>", "");
            (true, stripped)
        } else {
            (false, text.to_string())
        }
    }

    fn push_content(&mut self, text: &str) -> Vec<StreamEvent> {
        if text.is_empty() {
            return vec![];
        }
        self.content.push_str(text);
        vec![StreamEvent::content(text, self.content.clone())]
    }

    fn push_thinking(&mut self, text: &str) -> Vec<StreamEvent> {
        if text.is_empty() {
            return vec![];
        }
        self.thinking.push_str(text);
        vec![StreamEvent::thinking(text, self.thinking.clone())]
    }

    fn map_event(&mut self, value: Value) -> Result<Vec<StreamEvent>, NormalizedError> {
        let event: AnthropicStreamEvent = match serde_json::from_value(value.clone()) {
            Ok(event) => event,
            Err(_) => return Ok(vec![StreamEvent::raw(value)]),
        };

        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.input_tokens = usage.input_tokens;
                    self.saw_usage = true;
                }
                Ok(vec![])
            }
            AnthropicStreamEvent::ContentBlockStart {
                index,
                content_block,
            } => match content_block {
                ContentBlockInfo::Thinking { thinking } => {
                    self.thinking_blocks.insert(index);
                    Ok(self.push_thinking(&thinking))
                }
                ContentBlockInfo::Text { text } => Ok(self.push_content(&text)),
                ContentBlockInfo::Unknown => Ok(vec![StreamEvent::raw(value)]),
            },
            AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::ThinkingDelta { thinking } => {
                    self.thinking_blocks.insert(index);
                    Ok(self.push_thinking(&thinking))
                }
                BlockDelta::TextDelta { text } => {
                    if self.thinking_blocks.contains(&index) {
                        return Ok(self.push_thinking(&text));
                    }
                    let (is_thinking, cleaned) = self.classify_tagged_text(&text);
                    if is_thinking {
                        Ok(self.push_thinking(&cleaned))
                    } else {
                        Ok(self.push_content(&cleaned))
                    }
                }
                // Signatures are vendor extensions; keep them reachable.
                BlockDelta::SignatureDelta { .. } | BlockDelta::Unknown => {
                    Ok(vec![StreamEvent::raw(value)])
                }
            },
            AnthropicStreamEvent::ContentBlockStop { index } => {
                self.thinking_blocks.remove(&index);
                Ok(vec![])
            }
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                if let Some(usage) = usage {
                    self.output_tokens = usage.output_tokens;
                    self.saw_usage = true;
                }
                if let Some(reason) = delta.stop_reason.as_deref() {
                    self.stop_reason = Some(FinishReason::from_wire(reason));
                }
                Ok(vec![])
            }
            AnthropicStreamEvent::MessageStop => {
                self.finished = true;
                Ok(vec![StreamEvent::done(
                    self.stop_reason.unwrap_or_default(),
                    self.usage(),
                )])
            }
            AnthropicStreamEvent::Ping | AnthropicStreamEvent::Unknown => {
                Ok(vec![StreamEvent::raw(value)])
            }
            AnthropicStreamEvent::Error { error } => {
                let envelope = serde_json::json!({
                    "error": {
                        "type": error.error_type,
                        "message": error.message,
                    }
                });
                Err(NormalizedError::from_envelope(&envelope, "anthropic", None))
            }
        }
    }
}

impl EventMapper for AnthropicEventMapper {
    fn map_frame(&mut self, frame: RawFrame) -> Result<Vec<StreamEvent>, NormalizedError> {
        if self.finished {
            return Ok(vec![]);
        }
        match frame {
            RawFrame::Event(value) => self.map_event(value),
            // Anthropic does not send [DONE]; treat it as message_stop for
            // compatible proxies that do.
            RawFrame::DoneMarker => {
                self.finished = true;
                Ok(vec![StreamEvent::done(
                    self.stop_reason.unwrap_or_default(),
                    self.usage(),
                )])
            }
        }
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return vec![];
        }
        self.finished = true;
        vec![StreamEvent::done(FinishReason::Other, self.usage())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(mapper: &mut AnthropicEventMapper, value: Value) -> Vec<StreamEvent> {
        mapper.map_frame(RawFrame::Event(value)).unwrap()
    }

    #[test]
    fn test_text_stream_end_to_end() {
        let mut mapper = AnthropicEventMapper::new();

        assert!(map(
            &mut mapper,
            json!({"type":"message_start","message":{"model":"claude-3-5-sonnet-latest","usage":{"input_tokens":12,"output_tokens":0}}}),
        )
        .is_empty());

        assert!(map(
            &mut mapper,
            json!({"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}),
        )
        .is_empty());

        let events = map(
            &mut mapper,
            json!({"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}),
        );
        assert_eq!(events, vec![StreamEvent::content("Hello", "Hello")]);

        assert!(map(&mut mapper, json!({"type":"content_block_stop","index":0})).is_empty());

        assert!(map(
            &mut mapper,
            json!({"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":7}}),
        )
        .is_empty());

        let done = map(&mut mapper, json!({"type":"message_stop"}));
        match &done[0] {
            StreamEvent::Done {
                finish_reason,
                usage,
            } => {
                assert_eq!(*finish_reason, FinishReason::Stop);
                assert_eq!(usage.unwrap().prompt_tokens, 12);
                assert_eq!(usage.unwrap().completion_tokens, 7);
            }
            other => panic!("expected Done, got {other:?}"),
        }

        // Nothing after the terminal.
        assert!(map(
            &mut mapper,
            json!({"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"ghost"}}),
        )
        .is_empty());
    }

    #[test]
    fn test_thinking_block_routes_to_thinking_channel() {
        let mut mapper = AnthropicEventMapper::new();

        map(
            &mut mapper,
            json!({"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}),
        );
        let events = map(
            &mut mapper,
            json!({"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"step 1"}}),
        );
        assert_eq!(events, vec![StreamEvent::thinking("step 1", "step 1")]);
        assert_eq!(mapper.content, "");
    }

    #[test]
    fn test_thinking_delta_is_first_class() {
        let mut mapper = AnthropicEventMapper::new();
        let events = map(
            &mut mapper,
            json!({"type":"content_block_delta","index":1,"delta":{"type":"thinking_delta","thinking":"hmm"}}),
        );
        assert_eq!(events, vec![StreamEvent::thinking("hmm", "hmm")]);
    }

    #[test]
    fn test_thinking_tag_heuristic_excludes_from_content() {
        let mut mapper = AnthropicEventMapper::new();

        let events = map(
            &mut mapper,
            json!({"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"<thinking>reason</thinking>"}}),
        );
        assert_eq!(events, vec![StreamEvent::thinking("reason", "reason")]);

        let events = map(
            &mut mapper,
            json!({"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"The answer"}}),
        );
        assert_eq!(
            events,
            vec![StreamEvent::content("The answer", "The answer")]
        );

        // Final content excludes the thinking text entirely.
        assert_eq!(mapper.content, "The answer");
        assert_eq!(mapper.thinking, "reason");
    }

    #[test]
    fn test_thinking_tag_spanning_deltas() {
        let mut mapper = AnthropicEventMapper::new();

        map(
            &mut mapper,
            json!({"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"<thinking>part one"}}),
        );
        map(
            &mut mapper,
            json!({"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":" part two</thinking>"}}),
        );
        let events = map(
            &mut mapper,
            json!({"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"visible"}}),
        );

        assert_eq!(mapper.thinking, "part one part two");
        assert_eq!(events, vec![StreamEvent::content("visible", "visible")]);
    }

    #[test]
    fn test_error_event_terminates_with_normalized_error() {
        let mut mapper = AnthropicEventMapper::new();
        let error = mapper
            .map_frame(RawFrame::Event(json!({
                "type":"error",
                "error":{"type":"rate_limit_error","message":"Rate limited"}
            })))
            .unwrap_err();
        assert_eq!(error.kind, sidechat_core::ErrorKind::Quota);
        assert_eq!(error.provider.as_deref(), Some("anthropic"));
    }

    #[test]
    fn test_ping_and_unknown_are_raw() {
        let mut mapper = AnthropicEventMapper::new();

        let ping = json!({"type":"ping"});
        assert_eq!(
            map(&mut mapper, ping.clone()),
            vec![StreamEvent::raw(ping)]
        );

        let exotic = json!({"type":"some_future_event","data":{"x":1}});
        assert_eq!(
            map(&mut mapper, exotic.clone()),
            vec![StreamEvent::raw(exotic)]
        );
    }
}
