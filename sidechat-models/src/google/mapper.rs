//! Gemini stream-event mapping.

use serde_json::Value;
use sidechat_core::{FinishReason, NormalizedError, TokenUsage};
use sidechat_streaming::{RawFrame, StreamEvent};

use super::types::GenerateContentResponse;
use crate::stream::EventMapper;

/// Maps Gemini `streamGenerateContent` chunks onto normalized events.
///
/// Every part of a chunk is processed for text before the finish reason is
/// checked, so content co-occurring with the finish signal in one frame is
/// never dropped.
#[derive(Debug, Default)]
pub struct GoogleEventMapper {
    content: String,
    thinking: String,
    usage: Option<TokenUsage>,
    finished: bool,
}

impl GoogleEventMapper {
    /// Create a fresh mapper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map_chunk(&mut self, value: Value) -> Vec<StreamEvent> {
        let response: GenerateContentResponse = match serde_json::from_value(value.clone()) {
            Ok(response) => response,
            Err(_) => return vec![StreamEvent::raw(value)],
        };

        if let Some(usage) = response.usage_metadata {
            self.usage = Some(usage.into());
        }

        let Some(candidate) = response.candidates.first() else {
            if response.usage_metadata.is_some() {
                return vec![];
            }
            return vec![StreamEvent::raw(value)];
        };

        let mut events = Vec::new();

        // All parts first; the finish reason is checked only afterwards.
        if let Some(content) = &candidate.content {
            for part in &content.parts {
                let Some(text) = part.text.as_deref() else {
                    continue;
                };
                if text.is_empty() {
                    continue;
                }
                if part.thought {
                    self.thinking.push_str(text);
                    events.push(StreamEvent::thinking(text, self.thinking.clone()));
                } else {
                    self.content.push_str(text);
                    events.push(StreamEvent::content(text, self.content.clone()));
                }
            }
        }

        if candidate.finish_reason.is_some() {
            let reason = candidate
                .finish_reason
                .as_deref()
                .map(FinishReason::from_wire)
                .unwrap_or_default();
            self.finished = true;
            events.push(StreamEvent::done(reason, self.usage));
        }

        events
    }
}

impl EventMapper for GoogleEventMapper {
    fn map_frame(&mut self, frame: RawFrame) -> Result<Vec<StreamEvent>, NormalizedError> {
        if self.finished {
            return Ok(vec![]);
        }
        match frame {
            RawFrame::Event(value) => Ok(self.map_chunk(value)),
            RawFrame::DoneMarker => {
                self.finished = true;
                Ok(vec![StreamEvent::done(FinishReason::Stop, self.usage)])
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(mapper: &mut GoogleEventMapper, value: Value) -> Vec<StreamEvent> {
        mapper.map_frame(RawFrame::Event(value)).unwrap()
    }

    #[test]
    fn test_text_parts_accumulate() {
        let mut mapper = GoogleEventMapper::new();

        let events = map(
            &mut mapper,
            json!({"candidates":[{"content":{"role":"model","parts":[{"text":"Hello"}]}}]}),
        );
        assert_eq!(events, vec![StreamEvent::content("Hello", "Hello")]);

        let events = map(
            &mut mapper,
            json!({"candidates":[{"content":{"role":"model","parts":[{"text":" there"}]}}]}),
        );
        assert_eq!(events, vec![StreamEvent::content(" there", "Hello there")]);
    }

    #[test]
    fn test_content_with_finish_in_same_frame_is_not_dropped() {
        let mut mapper = GoogleEventMapper::new();

        let events = map(
            &mut mapper,
            json!({
                "candidates":[{
                    "content":{"role":"model","parts":[{"text":"final words"}]},
                    "finishReason":"STOP"
                }],
                "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6}
            }),
        );

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::content("final words", "final words"));
        match &events[1] {
            StreamEvent::Done {
                finish_reason,
                usage,
            } => {
                assert_eq!(*finish_reason, FinishReason::Stop);
                assert_eq!(usage.unwrap().total_tokens, 6);
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn test_thought_parts_route_to_thinking() {
        let mut mapper = GoogleEventMapper::new();

        let events = map(
            &mut mapper,
            json!({"candidates":[{"content":{"role":"model","parts":[
                {"text":"considering the scene", "thought": true},
                {"text":"It is a penalty kick."}
            ]}}]}),
        );

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            StreamEvent::thinking("considering the scene", "considering the scene")
        );
        assert_eq!(
            events[1],
            StreamEvent::content("It is a penalty kick.", "It is a penalty kick.")
        );
    }

    #[test]
    fn test_multiple_parts_processed_in_order() {
        let mut mapper = GoogleEventMapper::new();
        let events = map(
            &mut mapper,
            json!({"candidates":[{"content":{"role":"model","parts":[
                {"text":"a"},{"text":"b"},{"text":"c"}
            ]}}]}),
        );
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], StreamEvent::content("c", "abc"));
    }

    #[test]
    fn test_unrecognized_chunk_is_raw() {
        let mut mapper = GoogleEventMapper::new();
        let payload = json!({"somethingElse": 1});
        assert_eq!(
            map(&mut mapper, payload.clone()),
            vec![StreamEvent::raw(payload)]
        );
    }

    #[test]
    fn test_nothing_after_finish() {
        let mut mapper = GoogleEventMapper::new();
        map(
            &mut mapper,
            json!({"candidates":[{"content":{"role":"model","parts":[]},"finishReason":"STOP"}]}),
        );
        assert!(map(
            &mut mapper,
            json!({"candidates":[{"content":{"role":"model","parts":[{"text":"ghost"}]}}]}),
        )
        .is_empty());
        assert!(mapper.finish().is_empty());
    }
}
