//! The plugin contract.

use async_trait::async_trait;
use sidechat_core::{ChatMessage, ChatOptions};
use sidechat_models::ChatReply;
use sidechat_streaming::{StreamEvent, StreamedReply};
use thiserror::Error;

/// The messages and options of a request as they flow through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginRequest {
    /// Outbound conversation.
    pub messages: Vec<ChatMessage>,
    /// Request options, including plugin trigger fields.
    pub options: ChatOptions,
}

impl PluginRequest {
    /// Bundle messages and options.
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>, options: ChatOptions) -> Self {
        Self { messages, options }
    }
}

/// A plugin failure. The pipeline catches these and degrades to a no-op
/// transform; a plugin can never fail the request it decorates.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin's own processing failed.
    #[error("plugin failed: {0}")]
    Failed(String),
    /// A collaborator service (search, transcription, parsing) failed.
    #[error("collaborator call failed: {0}")]
    Collaborator(String),
}

impl PluginError {
    /// Wrap any error as a collaborator failure.
    pub fn collaborator<E: std::fmt::Display>(error: E) -> Self {
        Self::Collaborator(error.to_string())
    }
}

/// One request/response transformer.
///
/// Only [`LlmPlugin::process_request`] is mandatory; the stream hooks
/// default to the identity transform.
#[async_trait]
pub trait LlmPlugin: Send + Sync {
    /// Stable plugin name.
    fn name(&self) -> &str;

    /// Short human description.
    fn description(&self) -> &str {
        ""
    }

    /// Transform the outbound request before dispatch.
    async fn process_request(&self, request: PluginRequest) -> Result<PluginRequest, PluginError>;

    /// Transform a non-streaming reply.
    async fn process_response(&self, reply: ChatReply) -> Result<ChatReply, PluginError> {
        Ok(reply)
    }

    /// Adjust options once just before the stream opens.
    async fn on_stream_start(&self, options: ChatOptions) -> Result<ChatOptions, PluginError> {
        Ok(options)
    }

    /// Transform one live stream event.
    async fn process_stream_chunk(&self, event: StreamEvent) -> Result<StreamEvent, PluginError> {
        Ok(event)
    }

    /// Transform the final reply after the stream closed.
    async fn on_stream_end(&self, reply: StreamedReply) -> Result<StreamedReply, PluginError> {
        Ok(reply)
    }
}

/// Lifecycle of one dispatched request as it moves through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    /// Created, not yet through the request plugins.
    Pending,
    /// Request plugins have run.
    Preprocessed,
    /// Handed to the provider client.
    Dispatched,
    /// Events are flowing.
    Streaming,
    /// Terminal done delivered.
    Completed,
    /// Terminal error delivered.
    Errored,
}

impl RequestPhase {
    /// Whether the request has reached a terminal phase.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Identity;

    #[async_trait]
    impl LlmPlugin for Identity {
        fn name(&self) -> &str {
            "identity"
        }

        async fn process_request(
            &self,
            request: PluginRequest,
        ) -> Result<PluginRequest, PluginError> {
            Ok(request)
        }
    }

    #[tokio::test]
    async fn test_default_hooks_are_identity() {
        let plugin = Identity;

        let event = StreamEvent::content("a", "a");
        assert_eq!(
            plugin.process_stream_chunk(event.clone()).await.unwrap(),
            event
        );

        let options = ChatOptions::new().with_model("m");
        assert_eq!(
            plugin.on_stream_start(options.clone()).await.unwrap(),
            options
        );
    }

    #[test]
    fn test_phase_terminality() {
        assert!(RequestPhase::Completed.is_terminal());
        assert!(RequestPhase::Errored.is_terminal());
        assert!(!RequestPhase::Streaming.is_terminal());
        assert!(!RequestPhase::Pending.is_terminal());
    }
}
