//! Ordered, best-effort plugin pipeline.

use sidechat_core::ChatOptions;
use sidechat_models::ChatReply;
use sidechat_streaming::{StreamEvent, StreamedReply};
use std::sync::Arc;

use crate::plugin::{LlmPlugin, PluginRequest};

struct RegisteredPlugin {
    plugin: Arc<dyn LlmPlugin>,
    enabled: bool,
}

/// Runs plugins in registration order with fold semantics: each plugin sees
/// the previous plugin's output. A plugin that fails is logged and skipped;
/// the input it received flows unchanged to the next plugin, because a
/// non-critical enrichment must never block core chat.
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<RegisteredPlugin>,
}

impl PluginManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin; a plugin with the same name is replaced in place,
    /// keeping its pipeline position.
    pub fn register(&mut self, plugin: Arc<dyn LlmPlugin>) {
        if let Some(existing) = self
            .plugins
            .iter_mut()
            .find(|p| p.plugin.name() == plugin.name())
        {
            existing.plugin = plugin;
        } else {
            self.plugins.push(RegisteredPlugin {
                plugin,
                enabled: true,
            });
        }
    }

    /// Remove a plugin by name.
    pub fn remove(&mut self, name: &str) {
        self.plugins.retain(|p| p.plugin.name() != name);
    }

    /// Enable a plugin by name.
    pub fn enable(&mut self, name: &str) {
        self.set_enabled(name, true);
    }

    /// Disable a plugin by name.
    pub fn disable(&mut self, name: &str) {
        self.set_enabled(name, false);
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) {
        if let Some(entry) = self.plugins.iter_mut().find(|p| p.plugin.name() == name) {
            entry.enabled = enabled;
        }
    }

    /// Names of all registered plugins, in pipeline order.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.plugin.name()).collect()
    }

    fn enabled_plugins(&self) -> impl Iterator<Item = &Arc<dyn LlmPlugin>> {
        self.plugins
            .iter()
            .filter(|p| p.enabled)
            .map(|p| &p.plugin)
    }

    /// Fold the request through every enabled plugin.
    pub async fn process_request(&self, request: PluginRequest) -> PluginRequest {
        let mut current = request;
        for plugin in self.enabled_plugins() {
            match plugin.process_request(current.clone()).await {
                Ok(next) => current = next,
                Err(error) => {
                    tracing::warn!(plugin = plugin.name(), %error, "request plugin failed");
                }
            }
        }
        current
    }

    /// Fold a non-streaming reply through every enabled plugin.
    pub async fn process_response(&self, reply: ChatReply) -> ChatReply {
        let mut current = reply;
        for plugin in self.enabled_plugins() {
            match plugin.process_response(current.clone()).await {
                Ok(next) => current = next,
                Err(error) => {
                    tracing::warn!(plugin = plugin.name(), %error, "response plugin failed");
                }
            }
        }
        current
    }

    /// Fold the options through the stream-start hooks.
    pub async fn on_stream_start(&self, options: ChatOptions) -> ChatOptions {
        let mut current = options;
        for plugin in self.enabled_plugins() {
            match plugin.on_stream_start(current.clone()).await {
                Ok(next) => current = next,
                Err(error) => {
                    tracing::warn!(plugin = plugin.name(), %error, "stream-start plugin failed");
                }
            }
        }
        current
    }

    /// Fold one live event through the chunk hooks.
    pub async fn process_stream_chunk(&self, event: StreamEvent) -> StreamEvent {
        let mut current = event;
        for plugin in self.enabled_plugins() {
            match plugin.process_stream_chunk(current.clone()).await {
                Ok(next) => current = next,
                Err(error) => {
                    tracing::warn!(plugin = plugin.name(), %error, "stream-chunk plugin failed");
                }
            }
        }
        current
    }

    /// Fold the final reply through the stream-end hooks.
    pub async fn on_stream_end(&self, reply: StreamedReply) -> StreamedReply {
        let mut current = reply;
        for plugin in self.enabled_plugins() {
            match plugin.on_stream_end(current.clone()).await {
                Ok(next) => current = next,
                Err(error) => {
                    tracing::warn!(plugin = plugin.name(), %error, "stream-end plugin failed");
                }
            }
        }
        current
    }
}
