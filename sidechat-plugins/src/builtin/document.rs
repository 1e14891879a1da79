//! Document context injection.

use async_trait::async_trait;
use sidechat_core::DocumentSource;
use std::sync::Arc;

use crate::builtin::search::merge_into_system;
use crate::plugin::{LlmPlugin, PluginError, PluginRequest};

/// Fetches remote documents for extraction.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch a document and return its extracted text.
    async fn fetch(&self, url: &str) -> Result<String, PluginError>;
}

/// Extracts an attached document and merges its content into the system
/// context.
///
/// The `document` option is cleared on success.
pub struct DocumentContextPlugin {
    fetcher: Arc<dyn DocumentFetcher>,
}

impl DocumentContextPlugin {
    /// Plugin name in the pipeline.
    pub const NAME: &'static str = "document-context";

    /// Create the plugin around a document fetcher.
    #[must_use]
    pub fn new(fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self { fetcher }
    }

    async fn extract(&self, document: &DocumentSource) -> Result<String, PluginError> {
        match document {
            DocumentSource::Text { content, .. } => Ok(content.clone()),
            DocumentSource::Url { url } => self.fetcher.fetch(url).await,
        }
    }
}

#[async_trait]
impl LlmPlugin for DocumentContextPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Extracts an attached document and adds its content to the context"
    }

    async fn process_request(
        &self,
        mut request: PluginRequest,
    ) -> Result<PluginRequest, PluginError> {
        let Some(document) = request.options.document.clone() else {
            return Ok(request);
        };

        let content = self.extract(&document).await?;
        if content.is_empty() {
            return Ok(request);
        }

        let context = format!(
            "The user attached a document; refer to its content when answering:\n\n{content}"
        );
        merge_into_system(&mut request.messages, &context);
        request.options.document = None;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidechat_core::{ChatMessage, ChatOptions, Role};

    struct FakeFetcher;

    #[async_trait]
    impl DocumentFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String, PluginError> {
            Ok(format!("fetched from {url}"))
        }
    }

    #[tokio::test]
    async fn test_inline_text_document_injected() {
        let plugin = DocumentContextPlugin::new(Arc::new(FakeFetcher));
        let request = PluginRequest::new(
            vec![ChatMessage::user("summarize it")],
            ChatOptions::new().with_document(DocumentSource::Text {
                name: "notes.txt".into(),
                content: "Chapter one: the setup.".into(),
            }),
        );

        let result = plugin.process_request(request).await.unwrap();

        assert!(result.options.document.is_none());
        assert_eq!(result.messages[0].role, Role::System);
        assert!(result.messages[0].text().contains("Chapter one: the setup."));
    }

    #[tokio::test]
    async fn test_url_document_fetched() {
        let plugin = DocumentContextPlugin::new(Arc::new(FakeFetcher));
        let request = PluginRequest::new(
            vec![ChatMessage::user("what does it say?")],
            ChatOptions::new().with_document(DocumentSource::Url {
                url: "https://example.com/doc".into(),
            }),
        );

        let result = plugin.process_request(request).await.unwrap();
        assert!(result.messages[0]
            .text()
            .contains("fetched from https://example.com/doc"));
    }

    #[tokio::test]
    async fn test_without_document_is_untouched() {
        let plugin = DocumentContextPlugin::new(Arc::new(FakeFetcher));
        let request = PluginRequest::new(vec![ChatMessage::user("hi")], ChatOptions::new());

        let result = plugin.process_request(request.clone()).await.unwrap();
        assert_eq!(result, request);
    }
}
