//! The chat service: dispatch, streaming, fan-out, retry, cancellation.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sidechat_core::{
    AudioSource, ChatMessage, ChatOptions, FinishReason, NormalizedError,
};
use sidechat_models::{
    client_for, BoxedClient, ChatReply, Embedding, GeneratedImage, ImageOptions, Transcript,
};
use sidechat_plugins::{PluginManager, PluginRequest, RequestPhase};
use sidechat_providers::{ModelInfo, ProviderConfig, ProviderRegistry};
use sidechat_streaming::{StreamAccumulator, StreamEvent, StreamedReply};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

use crate::history::{
    build_chat_messages, Message, MessageBlock, MessageStatus, MessageStore, ThinkingStatus,
};
use crate::session::{SessionGuard, SessionRegistry};

const MAX_MESSAGE_CHARS: usize = 10_000;

/// An assistant context: the system prompt and default model of one
/// conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    /// Conversation id this assistant owns.
    pub id: String,
    /// System prompt, when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Default model id.
    pub model: String,
    /// Default sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Default reply token budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Assistant {
    /// Create an assistant with just an id and model.
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: None,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the system prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Set the default temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Service-level configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Safety-net bound on one streamed request; vendor streams can stall
    /// indefinitely otherwise. `None` disables it.
    pub request_timeout: Option<Duration>,
    /// Temperature used when neither request nor assistant sets one.
    pub default_temperature: f32,
    /// Token budget used when neither request nor assistant sets one.
    pub default_max_tokens: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(120)),
            default_temperature: 0.7,
            default_max_tokens: 2048,
        }
    }
}

/// Callbacks for one streamed session.
///
/// Every call carries the session id, so fan-out callers can route chunks
/// without any cross-session ordering assumption. Guarantees per session:
/// `on_start` strictly first; at most one of `on_complete` / `on_error`,
/// after all delivered chunks; nothing at all after cancellation.
pub trait StreamHandler: Send + Sync {
    /// The stream is about to open.
    fn on_start(&self, _session_id: &str) {}

    /// One normalized event arrived.
    fn on_chunk(&self, _session_id: &str, _event: &StreamEvent) {}

    /// The stream ended normally.
    fn on_complete(&self, _session_id: &str, _reply: &StreamedReply) {}

    /// The stream ended abnormally. Partial text is still available on the
    /// settled message / reply.
    fn on_error(&self, _session_id: &str, _error: &NormalizedError) {}
}

/// Handler that ignores everything.
pub struct NoopHandler;

impl StreamHandler for NoopHandler {}

type ClientFactory =
    dyn Fn(&ProviderConfig) -> Result<BoxedClient, NormalizedError> + Send + Sync;

/// The orchestrator: owns the provider registry, plugin pipeline, message
/// store, and the cancellation registry for in-flight sessions.
///
/// Explicitly constructed and dependency-injected; tests instantiate
/// isolated copies with fake clients and stores.
pub struct ChatService {
    registry: ProviderRegistry,
    plugins: PluginManager,
    store: Arc<dyn MessageStore>,
    sessions: SessionRegistry,
    client_factory: Arc<ClientFactory>,
    config: ServiceConfig,
}

impl ChatService {
    /// Create a service over a provider registry, plugin pipeline, and
    /// message store.
    pub fn new(
        registry: ProviderRegistry,
        plugins: PluginManager,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            registry,
            plugins,
            store,
            sessions: SessionRegistry::new(),
            client_factory: Arc::new(|config| client_for(config)),
            config: ServiceConfig::default(),
        }
    }

    /// Override the service configuration.
    #[must_use]
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Override how provider configs become clients. Tests inject fakes
    /// here.
    #[must_use]
    pub fn with_client_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&ProviderConfig) -> Result<BoxedClient, NormalizedError> + Send + Sync + 'static,
    {
        self.client_factory = Arc::new(factory);
        self
    }

    /// The cancellation registry.
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// The plugin pipeline.
    #[must_use]
    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    /// Cancel an in-flight session. Any events still buffered for it are
    /// discarded. Returns whether a session was registered under the id.
    pub fn stop(&self, session_id: &str) -> bool {
        self.sessions.cancel(session_id)
    }

    fn resolve_client(
        &self,
        model: Option<&str>,
    ) -> Result<(BoxedClient, String), NormalizedError> {
        let provider = match model {
            Some(model) => self.registry.provider_for_model(model)?,
            None => self.registry.default_provider()?,
        };
        let resolved = model
            .map(str::to_string)
            .or_else(|| provider.default_model.clone())
            .ok_or_else(|| {
                NormalizedError::validation(
                    "No model is available, check the provider configuration",
                )
            })?;
        let client = (self.client_factory)(provider)?;
        Ok((client, resolved))
    }

    /// Non-streaming chat completion through the plugin pipeline.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatReply, NormalizedError> {
        if options.stream {
            return Err(NormalizedError::validation(
                "chat does not stream, use chat_stream for streaming requests",
            ));
        }

        let request = self
            .plugins
            .process_request(PluginRequest::new(messages.to_vec(), options.clone()))
            .await;
        tracing::debug!(phase = ?RequestPhase::Preprocessed, "request preprocessed");

        let (client, model) = self.resolve_client(request.options.model.as_deref())?;
        let mut options = request.options;
        options.model = Some(model);

        let reply = client.chat(&request.messages, &options).await?;
        Ok(self.plugins.process_response(reply).await)
    }

    /// Streaming chat completion through the plugin pipeline.
    ///
    /// Returns the settled reply; progress is delivered through `handler`.
    /// The session id passed to the handler can be fed to [`Self::stop`].
    pub async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        handler: &dyn StreamHandler,
    ) -> Result<StreamedReply, NormalizedError> {
        let request = self
            .plugins
            .process_request(PluginRequest::new(messages.to_vec(), options.clone()))
            .await;
        tracing::debug!(phase = ?RequestPhase::Preprocessed, "request preprocessed");

        let (client, model) = self.resolve_client(request.options.model.as_deref())?;
        let mut options = request.options;
        options.model = Some(model);

        let session_id = uuid::Uuid::new_v4().to_string();
        let guard = self.sessions.register(&session_id);
        Ok(self
            .run_stream(client, request.messages, options, &guard, handler)
            .await)
    }

    /// Drive one stream end to end: open, decode, plugin hooks, accumulate,
    /// callbacks, under the session's cancellation token and the
    /// service-level timeout.
    async fn run_stream(
        &self,
        client: BoxedClient,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
        guard: &SessionGuard,
        handler: &dyn StreamHandler,
    ) -> StreamedReply {
        let mut options = self.plugins.on_stream_start(options).await;
        options.stream = true;

        handler.on_start(guard.id());
        tracing::debug!(phase = ?RequestPhase::Dispatched, session = guard.id(), "stream dispatched");

        let deadline = self
            .config
            .request_timeout
            .map(|timeout| Instant::now() + timeout);
        let mut accumulator = StreamAccumulator::new();

        let mut stream = tokio::select! {
            biased;
            _ = guard.token().cancelled() => return cancelled_reply(accumulator),
            result = client.chat_stream(&messages, &options) => match result {
                Ok(stream) => stream,
                Err(error) => {
                    if !guard.is_cancelled() {
                        handler.on_error(guard.id(), &error);
                    }
                    return accumulator.fail(error);
                }
            },
        };
        tracing::debug!(phase = ?RequestPhase::Streaming, session = guard.id(), "stream open");

        loop {
            let item = tokio::select! {
                biased;
                _ = guard.token().cancelled() => return cancelled_reply(accumulator),
                _ = sleep_until(deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(86400 * 365 * 30))), if deadline.is_some() => {
                    let error = NormalizedError::timeout(
                        "The request timed out, try again shortly",
                    )
                    .with_provider(client.provider().as_str());
                    if !guard.is_cancelled() {
                        handler.on_error(guard.id(), &error);
                    }
                    return accumulator.fail(error);
                }
                item = stream.next() => item,
            };

            match item {
                Some(Ok(event)) => {
                    let event = self.plugins.process_stream_chunk(event).await;
                    accumulator.apply(&event);
                    // Check-before-apply: cancellation may have raced the
                    // network read; the caller considers the session dead.
                    if guard.is_cancelled() {
                        return cancelled_reply(accumulator);
                    }
                    if event.is_terminal() {
                        break;
                    }
                    handler.on_chunk(guard.id(), &event);
                }
                Some(Err(error)) => {
                    if !guard.is_cancelled() {
                        handler.on_error(guard.id(), &error);
                    }
                    return accumulator.fail(error);
                }
                // The mapper synthesizes a terminal, so exhaustion without
                // one means it was already applied.
                None => break,
            }
        }

        let reply = self.plugins.on_stream_end(accumulator.finish()).await;
        if !guard.is_cancelled() {
            handler.on_complete(guard.id(), &reply);
        }
        reply
    }

    /// Send a user turn and wait for the full (non-streamed) reply.
    pub async fn send_message(
        &self,
        assistant: &Assistant,
        content: &str,
        options: &ChatOptions,
    ) -> Result<Message, NormalizedError> {
        validate_input(content)?;

        let user = Message::user(&assistant.id, content);
        let user_id = user.id.clone();
        self.store.add(user);

        let placeholder = Message::assistant_placeholder(&assistant.id, &assistant.model, &user_id);
        let message_id = placeholder.id.clone();
        self.store.add(placeholder);

        let history =
            build_chat_messages(self.store.as_ref(), &assistant.id, assistant.prompt.as_deref());
        let options = self.dispatch_options(assistant, &assistant.model, options, false);

        match self.chat(&history, &options).await {
            Ok(reply) => {
                self.store.update(&assistant.id, &message_id, &|message| {
                    message.blocks = reply_blocks(&reply.text, reply.reasoning.as_deref());
                    message.status = MessageStatus::Success;
                    message.usage = reply.usage;
                });
                Ok(self
                    .store
                    .get(&assistant.id, &message_id)
                    .expect("placeholder was just stored"))
            }
            Err(error) => {
                let failed = error.clone();
                self.store.update(&assistant.id, &message_id, &move |message| {
                    message.status = MessageStatus::Error;
                    if !message.has_error_block() {
                        message.blocks.push(MessageBlock::Error {
                            error: failed.clone(),
                        });
                    }
                });
                Err(error)
            }
        }
    }

    /// Send a user turn and stream the reply, to one model, or to every
    /// model mentioned in `options.mentioned_models` concurrently.
    ///
    /// Each target gets its own placeholder message, session, and
    /// accumulator; one stream failing neither cancels nor corrupts the
    /// others. Returns the settled reply messages.
    pub async fn send_stream_message(
        &self,
        assistant: &Assistant,
        content: &str,
        options: &ChatOptions,
        handler: &dyn StreamHandler,
    ) -> Result<Vec<Message>, NormalizedError> {
        validate_input(content)?;

        let user = Message::user(&assistant.id, content);
        let user_id = user.id.clone();
        self.store.add(user);

        let targets = if options.mentioned_models.is_empty() {
            vec![assistant.model.clone()]
        } else {
            options.mentioned_models.clone()
        };

        let mut reply_ids = Vec::with_capacity(targets.len());
        for model in &targets {
            let placeholder = Message::assistant_placeholder(&assistant.id, model, &user_id);
            reply_ids.push((placeholder.id.clone(), model.clone()));
            self.store.add(placeholder);
        }

        let runs = reply_ids.iter().map(|(message_id, model)| {
            self.stream_to_message(assistant, message_id, model, options, handler)
        });
        futures::future::join_all(runs).await;

        Ok(reply_ids
            .iter()
            .filter_map(|(message_id, _)| self.store.get(&assistant.id, message_id))
            .collect())
    }

    /// Re-issue a prior turn.
    ///
    /// Retrying a user message regenerates each of its replies (or creates
    /// one if none exist); retrying an assistant message regenerates that
    /// reply with its original model.
    pub async fn retry(
        &self,
        assistant: &Assistant,
        message_id: &str,
        handler: &dyn StreamHandler,
    ) -> Result<(), NormalizedError> {
        let message = self
            .store
            .get(&assistant.id, message_id)
            .ok_or_else(|| NormalizedError::validation("The message to retry does not exist"))?;

        match message.role {
            sidechat_core::Role::User => {
                let replies: Vec<Message> = self
                    .store
                    .children(&assistant.id, message_id)
                    .into_iter()
                    .filter(|m| m.role == sidechat_core::Role::Assistant)
                    .collect();

                if replies.is_empty() {
                    let placeholder =
                        Message::assistant_placeholder(&assistant.id, &assistant.model, message_id);
                    let reply_id = placeholder.id.clone();
                    self.store.add(placeholder);
                    self.stream_to_message(
                        assistant,
                        &reply_id,
                        &assistant.model.clone(),
                        &ChatOptions::new(),
                        handler,
                    )
                    .await;
                } else {
                    for reply in replies {
                        self.regenerate(assistant, &reply.id, handler).await?;
                    }
                }
                Ok(())
            }
            sidechat_core::Role::Assistant => {
                if message.parent_id.is_none() {
                    return Err(NormalizedError::validation(
                        "The reply has no originating user message to retry from",
                    ));
                }
                self.regenerate(assistant, message_id, handler).await
            }
            sidechat_core::Role::System => {
                Err(NormalizedError::validation("System messages cannot be retried"))
            }
        }
    }

    /// Regenerate an existing assistant reply, reusing its original model.
    ///
    /// The message content is reset to empty before restreaming, an
    /// explicit state reset, not an append.
    pub async fn regenerate(
        &self,
        assistant: &Assistant,
        message_id: &str,
        handler: &dyn StreamHandler,
    ) -> Result<(), NormalizedError> {
        let existing = self
            .store
            .get(&assistant.id, message_id)
            .ok_or_else(|| NormalizedError::validation("The message to regenerate does not exist"))?;
        if existing.role != sidechat_core::Role::Assistant {
            return Err(NormalizedError::validation(
                "Only assistant replies can be regenerated",
            ));
        }

        let model = existing.model.clone().unwrap_or_else(|| assistant.model.clone());
        let reset_model = model.clone();
        self.store.update(&assistant.id, message_id, &move |message| {
            message.blocks = vec![MessageBlock::Text {
                content: String::new(),
            }];
            message.status = MessageStatus::Sending;
            message.model = Some(reset_model.clone());
            message.usage = None;
        });

        self.stream_to_message(assistant, message_id, &model, &ChatOptions::new(), handler)
            .await;
        Ok(())
    }

    /// Stream one reply into one stored message, isolating every failure
    /// inside that message's slot.
    async fn stream_to_message(
        &self,
        assistant: &Assistant,
        message_id: &str,
        model: &str,
        options: &ChatOptions,
        handler: &dyn StreamHandler,
    ) {
        let history =
            build_chat_messages(self.store.as_ref(), &assistant.id, assistant.prompt.as_deref());
        let options = self.dispatch_options(assistant, model, options, true);

        let request = self
            .plugins
            .process_request(PluginRequest::new(history, options))
            .await;

        let store_handler = StoreProgressHandler {
            store: self.store.as_ref(),
            conversation_id: &assistant.id,
            inner: handler,
        };

        let (client, resolved_model) =
            match self.resolve_client(request.options.model.as_deref()) {
                Ok(resolved) => resolved,
                Err(error) => {
                    store_handler.on_error(message_id, &error);
                    return;
                }
            };

        let mut options = request.options;
        options.model = Some(resolved_model);

        let guard = self.sessions.register(message_id);
        let reply = self
            .run_stream(client, request.messages, options, &guard, &store_handler)
            .await;

        // A stopped session fires no callbacks, so the record is settled
        // here with its partial text kept.
        if reply.error.is_none() && reply.finish_reason == FinishReason::Cancelled {
            self.store.update(&assistant.id, message_id, &|message| {
                complete_thinking_block(message);
                message.status = MessageStatus::Success;
            });
        }
    }

    fn dispatch_options(
        &self,
        assistant: &Assistant,
        model: &str,
        options: &ChatOptions,
        stream: bool,
    ) -> ChatOptions {
        let mut options = options.clone();
        options.model = Some(model.to_string());
        options.mentioned_models = Vec::new();
        options.stream = stream;
        options.temperature = options
            .temperature
            .or(assistant.temperature)
            .or(Some(self.config.default_temperature));
        options.max_tokens = options
            .max_tokens
            .or(assistant.max_tokens)
            .or(Some(self.config.default_max_tokens));
        options
    }

    /// List models from the default provider.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, NormalizedError> {
        let provider = self.registry.default_provider()?;
        let client = (self.client_factory)(provider)?;
        client.list_models().await
    }

    /// Generate images through the default provider.
    pub async fn generate_image(
        &self,
        prompt: &str,
        options: &ImageOptions,
    ) -> Result<Vec<GeneratedImage>, NormalizedError> {
        let provider = self.registry.default_provider()?;
        let client = (self.client_factory)(provider)?;
        client.generate_image(prompt, options).await
    }

    /// Compute embeddings through the default provider.
    pub async fn embeddings(&self, input: &[String]) -> Result<Vec<Embedding>, NormalizedError> {
        let provider = self.registry.default_provider()?;
        let client = (self.client_factory)(provider)?;
        client.embeddings(input).await
    }

    /// Transcribe audio through the default provider.
    pub async fn transcribe(&self, audio: &AudioSource) -> Result<Transcript, NormalizedError> {
        let provider = self.registry.default_provider()?;
        let client = (self.client_factory)(provider)?;
        client.transcribe(audio).await
    }
}

fn validate_input(content: &str) -> Result<(), NormalizedError> {
    if content.trim().is_empty() {
        return Err(NormalizedError::validation("Message content must not be empty"));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(NormalizedError::validation(format!(
            "Message content is too long, keep it under {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(())
}

fn cancelled_reply(accumulator: StreamAccumulator) -> StreamedReply {
    let mut reply = accumulator.finish();
    reply.finish_reason = FinishReason::Cancelled;
    reply
}

fn reply_blocks(text: &str, reasoning: Option<&str>) -> Vec<MessageBlock> {
    let mut blocks = Vec::new();
    if let Some(reasoning) = reasoning {
        blocks.push(MessageBlock::Thinking {
            content: reasoning.to_string(),
            status: ThinkingStatus::Complete,
        });
    }
    blocks.push(MessageBlock::Text {
        content: text.to_string(),
    });
    blocks
}

fn upsert_text_block(message: &mut Message, content: &str) {
    for block in &mut message.blocks {
        if let MessageBlock::Text { content: existing } = block {
            *existing = content.to_string();
            return;
        }
    }
    message.blocks.push(MessageBlock::Text {
        content: content.to_string(),
    });
}

fn upsert_thinking_block(message: &mut Message, content: &str) {
    for block in &mut message.blocks {
        if let MessageBlock::Thinking {
            content: existing, ..
        } = block
        {
            *existing = content.to_string();
            return;
        }
    }
    // Thinking renders above the answer.
    message.blocks.insert(
        0,
        MessageBlock::Thinking {
            content: content.to_string(),
            status: ThinkingStatus::Thinking,
        },
    );
}

fn complete_thinking_block(message: &mut Message) {
    for block in &mut message.blocks {
        if let MessageBlock::Thinking { status, .. } = block {
            *status = ThinkingStatus::Complete;
        }
    }
}

/// Mirrors stream progress into the message store, then forwards to the
/// caller's handler.
struct StoreProgressHandler<'a> {
    store: &'a dyn MessageStore,
    conversation_id: &'a str,
    inner: &'a dyn StreamHandler,
}

impl StreamHandler for StoreProgressHandler<'_> {
    fn on_start(&self, session_id: &str) {
        self.store.update(self.conversation_id, session_id, &|message| {
            message.status = MessageStatus::Sending;
        });
        self.inner.on_start(session_id);
    }

    fn on_chunk(&self, session_id: &str, event: &StreamEvent) {
        match event {
            StreamEvent::Content { accumulated, .. } => {
                self.store.update(self.conversation_id, session_id, &|message| {
                    upsert_text_block(message, accumulated);
                });
            }
            StreamEvent::Thinking { accumulated, .. } => {
                self.store.update(self.conversation_id, session_id, &|message| {
                    upsert_thinking_block(message, accumulated);
                });
            }
            StreamEvent::Raw { .. } | StreamEvent::Done { .. } => {}
        }
        self.inner.on_chunk(session_id, event);
    }

    fn on_complete(&self, session_id: &str, reply: &StreamedReply) {
        let usage = reply.usage;
        self.store.update(self.conversation_id, session_id, &move |message| {
            complete_thinking_block(message);
            message.status = MessageStatus::Success;
            message.usage = usage;
        });
        self.inner.on_complete(session_id, reply);
    }

    fn on_error(&self, session_id: &str, error: &NormalizedError) {
        self.store.update(self.conversation_id, session_id, &|message| {
            complete_thinking_block(message);
            message.status = MessageStatus::Error;
            if !message.has_error_block() {
                message.blocks.push(MessageBlock::Error {
                    error: error.clone(),
                });
            }
        });
        self.inner.on_error(session_id, error);
    }
}
