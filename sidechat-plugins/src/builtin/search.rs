//! Web-search context injection.

use async_trait::async_trait;
use sidechat_core::{ChatMessage, Role};
use std::sync::Arc;

use crate::plugin::{LlmPlugin, PluginError, PluginRequest};

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub url: String,
    /// Snippet text.
    pub snippet: String,
}

impl SearchResult {
    fn render(&self) -> String {
        format!(
            "Title: {}\nLink: {}\nSnippet: {}",
            self.title, self.url, self.snippet
        )
    }
}

/// A search backend the plugin calls out to.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run a query and return ranked hits.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, PluginError>;
}

/// Injects web-search results into the system context when the request
/// carries the `web_search` flag.
///
/// The flag is cleared on success so downstream stages never reprocess it;
/// an empty result set leaves the request untouched.
pub struct WebSearchPlugin {
    provider: Arc<dyn SearchProvider>,
}

impl WebSearchPlugin {
    /// Plugin name in the pipeline.
    pub const NAME: &'static str = "web-search";

    /// Create the plugin around a search backend.
    #[must_use]
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl LlmPlugin for WebSearchPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Runs a web search for the latest question and adds the results to the context"
    }

    async fn process_request(
        &self,
        mut request: PluginRequest,
    ) -> Result<PluginRequest, PluginError> {
        if !request.options.web_search {
            return Ok(request);
        }

        let Some(query) = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text())
        else {
            return Ok(request);
        };

        let results = self.provider.search(&query).await?;
        if results.is_empty() {
            return Ok(request);
        }

        let rendered = results
            .iter()
            .map(SearchResult::render)
            .collect::<Vec<_>>()
            .join("\n\n");
        let context = format!(
            "Here are web search results related to the user's latest question; \
             consider them when answering:\n\n{rendered}"
        );

        merge_into_system(&mut request.messages, &context);
        request.options.web_search = false;
        Ok(request)
    }
}

/// Append context to the existing system message, or prepend a new one.
pub(crate) fn merge_into_system(messages: &mut Vec<ChatMessage>, context: &str) {
    if let Some(system) = messages.iter_mut().find(|m| m.role == Role::System) {
        let merged = format!("{}\n\n{context}", system.text());
        *system = ChatMessage::system(merged);
    } else {
        messages.insert(0, ChatMessage::system(context));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use sidechat_core::ChatOptions;

    struct FakeSearch {
        results: Vec<SearchResult>,
        queries: Mutex<Vec<String>>,
    }

    impl FakeSearch {
        fn new(results: Vec<SearchResult>) -> Self {
            Self {
                results,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SearchProvider for FakeSearch {
        async fn search(&self, query: &str) -> Result<Vec<SearchResult>, PluginError> {
            self.queries.lock().push(query.to_string());
            Ok(self.results.clone())
        }
    }

    fn hit() -> SearchResult {
        SearchResult {
            title: "Match recap".into(),
            url: "https://example.com/recap".into(),
            snippet: "The final score was 2-1.".into(),
        }
    }

    #[tokio::test]
    async fn test_injects_results_and_strips_flag() {
        let search = Arc::new(FakeSearch::new(vec![hit()]));
        let plugin = WebSearchPlugin::new(search.clone());

        let request = PluginRequest::new(
            vec![
                ChatMessage::system("Base prompt."),
                ChatMessage::user("What was the score?"),
            ],
            ChatOptions::new().with_web_search(),
        );

        let result = plugin.process_request(request).await.unwrap();

        assert!(!result.options.web_search, "flag must be stripped");
        assert_eq!(search.queries.lock().as_slice(), ["What was the score?"]);
        let system = result.messages[0].text();
        assert!(system.starts_with("Base prompt."));
        assert!(system.contains("https://example.com/recap"));
    }

    #[tokio::test]
    async fn test_prepends_system_when_none_exists() {
        let plugin = WebSearchPlugin::new(Arc::new(FakeSearch::new(vec![hit()])));
        let request = PluginRequest::new(
            vec![ChatMessage::user("score?")],
            ChatOptions::new().with_web_search(),
        );

        let result = plugin.process_request(request).await.unwrap();
        assert_eq!(result.messages[0].role, Role::System);
        assert_eq!(result.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_without_flag_is_untouched() {
        let search = Arc::new(FakeSearch::new(vec![hit()]));
        let plugin = WebSearchPlugin::new(search.clone());
        let request = PluginRequest::new(vec![ChatMessage::user("hi")], ChatOptions::new());

        let result = plugin.process_request(request.clone()).await.unwrap();
        assert_eq!(result, request);
        assert!(search.queries.lock().is_empty());
    }

    #[tokio::test]
    async fn test_empty_results_leave_request_unchanged() {
        let plugin = WebSearchPlugin::new(Arc::new(FakeSearch::new(vec![])));
        let request = PluginRequest::new(
            vec![ChatMessage::user("obscure question")],
            ChatOptions::new().with_web_search(),
        );

        let result = plugin.process_request(request.clone()).await.unwrap();
        assert_eq!(result, request);
    }
}
