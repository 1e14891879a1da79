//! Audio transcription on send.

use async_trait::async_trait;
use sidechat_core::{AudioSource, ChatMessage};
use sidechat_models::{ApiClient, BoxedClient};
use std::sync::Arc;

use crate::plugin::{LlmPlugin, PluginError, PluginRequest};

/// A transcription backend the plugin calls out to.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Turn audio into text.
    async fn transcribe(&self, audio: &AudioSource) -> Result<String, PluginError>;
}

/// Any API client with transcription support can serve as the backend.
#[async_trait]
impl Transcriber for BoxedClient {
    async fn transcribe(&self, audio: &AudioSource) -> Result<String, PluginError> {
        ApiClient::transcribe(self.as_ref(), audio)
            .await
            .map(|transcript| transcript.text)
            .map_err(PluginError::collaborator)
    }
}

/// Transcribes the request's audio attachment and appends the transcript as
/// a user message.
///
/// The `audio` option is cleared on success (idempotence by option removal).
pub struct AudioTranscriptionPlugin {
    transcriber: Arc<dyn Transcriber>,
}

impl AudioTranscriptionPlugin {
    /// Plugin name in the pipeline.
    pub const NAME: &'static str = "audio-transcription";

    /// Create the plugin around a transcription backend.
    #[must_use]
    pub fn new(transcriber: Arc<dyn Transcriber>) -> Self {
        Self { transcriber }
    }
}

#[async_trait]
impl LlmPlugin for AudioTranscriptionPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Transcribes attached audio and adds the text to the conversation"
    }

    async fn process_request(
        &self,
        mut request: PluginRequest,
    ) -> Result<PluginRequest, PluginError> {
        let Some(audio) = request.options.audio.clone() else {
            return Ok(request);
        };

        let transcript = self.transcriber.transcribe(&audio).await?;
        if !transcript.is_empty() {
            request.messages.push(ChatMessage::user(transcript));
        }
        request.options.audio = None;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidechat_core::ChatOptions;

    struct FakeTranscriber(&'static str);

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, _audio: &AudioSource) -> Result<String, PluginError> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenTranscriber;

    #[async_trait]
    impl Transcriber for BrokenTranscriber {
        async fn transcribe(&self, _audio: &AudioSource) -> Result<String, PluginError> {
            Err(PluginError::Collaborator("service down".into()))
        }
    }

    fn audio() -> AudioSource {
        AudioSource::Bytes {
            data: vec![1, 2, 3],
            mime_type: "audio/webm".into(),
        }
    }

    #[tokio::test]
    async fn test_transcript_appended_and_option_stripped() {
        let plugin = AudioTranscriptionPlugin::new(Arc::new(FakeTranscriber("play it again")));
        let request = PluginRequest::new(
            vec![ChatMessage::user("see attachment")],
            ChatOptions::new().with_audio(audio()),
        );

        let result = plugin.process_request(request).await.unwrap();

        assert!(result.options.audio.is_none(), "option must be stripped");
        assert_eq!(result.messages.len(), 2);
        assert_eq!(result.messages[1].text(), "play it again");
    }

    #[tokio::test]
    async fn test_no_audio_is_untouched() {
        let plugin = AudioTranscriptionPlugin::new(Arc::new(FakeTranscriber("x")));
        let request = PluginRequest::new(vec![ChatMessage::user("hi")], ChatOptions::new());

        let result = plugin.process_request(request.clone()).await.unwrap();
        assert_eq!(result, request);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates_for_pipeline_degradation() {
        let plugin = AudioTranscriptionPlugin::new(Arc::new(BrokenTranscriber));
        let request = PluginRequest::new(vec![], ChatOptions::new().with_audio(audio()));

        // The manager catches this and passes the original request on.
        assert!(plugin.process_request(request).await.is_err());
    }
}
