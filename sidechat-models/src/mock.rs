//! Scripted client for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use sidechat_core::{ChatMessage, ChatOptions, NormalizedError};
use sidechat_providers::{ModelInfo, ProviderKind};
use sidechat_streaming::StreamEvent;
use std::collections::HashMap;

use crate::client::{ApiClient, ChatReply, EventStream};

/// One recorded request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// The messages as dispatched.
    pub messages: Vec<ChatMessage>,
    /// The options as dispatched.
    pub options: ChatOptions,
}

type Script = Vec<Result<StreamEvent, NormalizedError>>;

/// An [`ApiClient`] that replays scripted event sequences and records what
/// was sent to it. Streams can be scripted per model id, which is how
/// fan-out tests give one model a failing stream and another a good one.
pub struct MockApiClient {
    provider: ProviderKind,
    reply: ChatReply,
    default_script: Script,
    scripts: HashMap<String, Script>,
    models: Vec<ModelInfo>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockApiClient {
    /// Create a mock for the given provider kind.
    #[must_use]
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            reply: ChatReply::new("mock reply"),
            default_script: Vec::new(),
            scripts: HashMap::new(),
            models: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Set the non-streaming reply.
    #[must_use]
    pub fn with_reply(mut self, reply: ChatReply) -> Self {
        self.reply = reply;
        self
    }

    /// Set the default stream script.
    #[must_use]
    pub fn with_stream(mut self, events: Script) -> Self {
        self.default_script = events;
        self
    }

    /// Set the stream script for a specific model id.
    #[must_use]
    pub fn with_stream_for(mut self, model: impl Into<String>, events: Script) -> Self {
        self.scripts.insert(model.into(), events);
        self
    }

    /// Set the model listing.
    #[must_use]
    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = models;
        self
    }

    /// Everything dispatched through this mock so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    fn record(&self, messages: &[ChatMessage], options: &ChatOptions) {
        self.requests.lock().push(RecordedRequest {
            messages: messages.to_vec(),
            options: options.clone(),
        });
    }

    fn script_for(&self, options: &ChatOptions) -> Script {
        options
            .model
            .as_deref()
            .and_then(|model| self.scripts.get(model))
            .unwrap_or(&self.default_script)
            .clone()
    }
}

#[async_trait]
impl ApiClient for MockApiClient {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatReply, NormalizedError> {
        self.record(messages, options);
        Ok(self.reply.clone())
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<EventStream, NormalizedError> {
        self.record(messages, options);
        let script = self.script_for(options);
        Ok(Box::pin(futures::stream::iter(script)))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, NormalizedError> {
        Ok(self.models.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use sidechat_core::FinishReason;

    #[tokio::test]
    async fn test_mock_replays_script_and_records() {
        let mock = MockApiClient::new(ProviderKind::OpenAi).with_stream(vec![
            Ok(StreamEvent::content("a", "a")),
            Ok(StreamEvent::done(FinishReason::Stop, None)),
        ]);

        let stream = mock
            .chat_stream(
                &[ChatMessage::user("hi")],
                &ChatOptions::new().with_model("gpt-4o"),
            )
            .await
            .unwrap();
        let events: Vec<_> = stream.collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(mock.requests().len(), 1);
        assert_eq!(
            mock.requests()[0].options.model.as_deref(),
            Some("gpt-4o")
        );
    }

    #[tokio::test]
    async fn test_per_model_scripts() {
        let mock = MockApiClient::new(ProviderKind::OpenAi)
            .with_stream_for("good", vec![Ok(StreamEvent::done(FinishReason::Stop, None))])
            .with_stream_for("bad", vec![Err(NormalizedError::api("boom"))]);

        let good: Vec<_> = mock
            .chat_stream(&[], &ChatOptions::new().with_model("good"))
            .await
            .unwrap()
            .collect()
            .await;
        assert!(good[0].is_ok());

        let bad: Vec<_> = mock
            .chat_stream(&[], &ChatOptions::new().with_model("bad"))
            .await
            .unwrap()
            .collect()
            .await;
        assert!(bad[0].is_err());
    }
}
