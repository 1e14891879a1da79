//! Azure-hosted OpenAI client.
//!
//! The wire format is OpenAI's; only the URL scheme and authentication
//! differ: requests target a deployment
//! (`/openai/deployments/{id}/chat/completions?api-version=...`) and
//! authenticate with an `api-key` header instead of a bearer token.

use async_trait::async_trait;
use sidechat_core::{ChatMessage, ChatOptions, NormalizedError};
use sidechat_providers::{ModelInfo, ProviderConfig, ProviderKind};
use sidechat_streaming::WireDecoder;
use std::time::Duration;

use crate::client::{ApiClient, ChatReply, Embedding, EventStream};
use crate::http::{execute, read_json, response_framing};
use crate::openai::types::{ChatCompletionRequest, ChatCompletionResponse, EmbeddingsResponse};
use crate::openai::{OpenAiClient, OpenAiEventMapper};
use crate::stream::MappedStream;
use serde::Deserialize;

/// Default `api-version` query parameter.
pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

const DEFAULT_EMBEDDING_DEPLOYMENT: &str = "text-embedding-ada-002";

/// Azure OpenAI client.
#[derive(Debug, Clone)]
pub struct AzureOpenAiClient {
    config: ProviderConfig,
    client: reqwest::Client,
    // Body building is identical to OpenAI; delegate instead of duplicating.
    body_builder: OpenAiClient,
    default_timeout: Duration,
}

impl AzureOpenAiClient {
    /// Create a client from a provider config.
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            body_builder: OpenAiClient::new(config.clone()),
            config,
            client: reqwest::Client::new(),
            default_timeout: Duration::from_secs(120),
        }
    }

    /// Use a custom HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn api_version(&self) -> &str {
        self.config
            .api_version
            .as_deref()
            .unwrap_or(DEFAULT_API_VERSION)
    }

    /// The deployment id doubles as the model id.
    fn resolve_deployment(&self, options: &ChatOptions) -> Result<String, NormalizedError> {
        options
            .model
            .clone()
            .or_else(|| self.config.default_model.clone())
            .ok_or_else(|| {
                NormalizedError::validation(
                    "Azure OpenAI requires a deployment id, set the model option",
                )
                .with_provider(self.provider().as_str())
            })
    }

    fn deployment_endpoint(
        &self,
        deployment: &str,
        path: &str,
    ) -> Result<String, NormalizedError> {
        Ok(format!(
            "{}/openai/deployments/{deployment}/{path}?api-version={}",
            self.config.host()?,
            self.api_version()
        ))
    }

    /// Build the request body, the OpenAI shape with the deployment id in
    /// the model slot.
    pub fn build_request_body(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        stream: bool,
    ) -> Result<ChatCompletionRequest, NormalizedError> {
        let deployment = self.resolve_deployment(options)?;
        let mut body = self.body_builder.build_request_body(
            messages,
            &options.clone().with_model(&deployment),
            stream,
        )?;
        body.model = deployment;
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct DeploymentsResponse {
    #[serde(default)]
    data: Vec<DeploymentEntry>,
}

#[derive(Debug, Deserialize)]
struct DeploymentEntry {
    id: String,
    #[serde(default)]
    model: Option<String>,
}

#[async_trait]
impl ApiClient for AzureOpenAiClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::AzureOpenAi
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatReply, NormalizedError> {
        let deployment = self.resolve_deployment(options)?;
        let body = self.build_request_body(messages, options, false)?;
        let builder = self
            .client
            .post(self.deployment_endpoint(&deployment, "chat/completions")?)
            .header("api-key", &self.config.api_key)
            .timeout(self.default_timeout)
            .json(&body);

        let response = execute(builder, "azure-openai", Some(&deployment)).await?;
        let parsed: ChatCompletionResponse =
            read_json(response, "azure-openai", Some(&deployment)).await?;

        // Same response shape as OpenAI.
        let mut reply = crate::openai::reply_from_chat_response(parsed)?;
        reply.model.get_or_insert(deployment);
        Ok(reply)
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<EventStream, NormalizedError> {
        let deployment = self.resolve_deployment(options)?;
        let body = self.build_request_body(messages, options, true)?;
        let builder = self
            .client
            .post(self.deployment_endpoint(&deployment, "chat/completions")?)
            .header("api-key", &self.config.api_key)
            .timeout(self.default_timeout)
            .json(&body);

        let response = execute(builder, "azure-openai", Some(&deployment)).await?;
        let decoder = WireDecoder::new(response_framing(&response));
        let stream = MappedStream::new(
            response.bytes_stream(),
            decoder,
            OpenAiEventMapper::new(),
            "azure-openai",
        );
        Ok(Box::pin(stream))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, NormalizedError> {
        let url = format!(
            "{}/openai/deployments?api-version={}",
            self.config.host()?,
            self.api_version()
        );
        let builder = self
            .client
            .get(url)
            .header("api-key", &self.config.api_key)
            .timeout(self.default_timeout);

        let response = execute(builder, "azure-openai", None).await?;
        let parsed: DeploymentsResponse = read_json(response, "azure-openai", None).await?;
        Ok(parsed
            .data
            .into_iter()
            .map(|entry| {
                let name = entry.model.unwrap_or_else(|| entry.id.clone());
                ModelInfo::new(entry.id, ProviderKind::AzureOpenAi).with_name(name)
            })
            .collect())
    }

    async fn embeddings(&self, input: &[String]) -> Result<Vec<Embedding>, NormalizedError> {
        let body = serde_json::json!({ "input": input });
        let builder = self
            .client
            .post(self.deployment_endpoint(DEFAULT_EMBEDDING_DEPLOYMENT, "embeddings")?)
            .header("api-key", &self.config.api_key)
            .timeout(self.default_timeout)
            .json(&body);

        let response = execute(builder, "azure-openai", None).await?;
        let parsed: EmbeddingsResponse = read_json(response, "azure-openai", None).await?;
        Ok(parsed
            .data
            .into_iter()
            .map(|datum| Embedding {
                index: datum.index,
                values: datum.embedding,
            })
            .collect())
    }
}
