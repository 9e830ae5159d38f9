//! Local OpenAI-compatible service (LM Studio and friends).
//!
//! Same wire protocol as the hosted API, but pointed at a user-supplied
//! endpoint. Local servers ignore credentials, so any non-empty API key is
//! accepted and a placeholder is sent when none is configured.
//!
//! - `POST {endpoint}/chat/completions` — chat completion, optional tools
//! - `POST {endpoint}/embeddings`       — batched embeddings retrieval

use std::time::{Duration, Instant};

use reqwest::header;
use tracing::{debug, error, info};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, HttpError, ProviderError, ProviderErrorKind, make_snippet},
    services::wire::{
        ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatOutcome,
        EmbeddingsRequest, EmbeddingsResponse, ToolSpec,
    },
};

/// Placeholder credential for servers that require a non-empty key field.
const PLACEHOLDER_API_KEY: &str = "lm-studio";

/// Thin client for a local OpenAI-compatible endpoint.
#[derive(Debug)]
pub struct LocalAiService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    url_embeddings: String,
}

impl LocalAiService {
    /// Creates a new [`LocalAiService`] from the given config.
    ///
    /// # Errors
    /// - [`ProviderErrorKind::InvalidProvider`] if `cfg.provider` is not Local
    /// - [`ProviderErrorKind::InvalidEndpoint`] if `cfg.endpoint` is invalid
    /// - [`AiLlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::Local {
            return Err(
                ProviderError::new(LlmProvider::Local, ProviderErrorKind::InvalidProvider).into(),
            );
        }

        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(ProviderError::new(
                LlmProvider::Local,
                ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone()),
            )
            .into());
        }

        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| PLACEHOLDER_API_KEY.to_string());

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(120));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                ProviderError::new(
                    LlmProvider::Local,
                    ProviderErrorKind::Decode(format!("invalid API key header: {e}")),
                )
            })?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        let base = endpoint.trim_end_matches('/').to_string();
        let url_chat = format!("{base}/chat/completions");
        let url_embeddings = format!("{base}/embeddings");

        info!(
            provider = %cfg.provider,
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = cfg.timeout_secs.unwrap_or(120),
            "LocalAiService initialized"
        );

        Ok(Self {
            client,
            cfg,
            url_chat,
            url_embeddings,
        })
    }

    /// Performs a **non-streaming** chat completion, with optional tools.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
    ) -> Result<ChatOutcome, AiLlmError> {
        let started = Instant::now();
        let body = ChatCompletionRequest::from_cfg(&self.cfg, messages, tools);

        debug!(
            model = %self.cfg.model,
            messages = messages.len(),
            has_tools = tools.is_some(),
            "POST {}", self.url_chat
        );

        let resp = self.client.post(&self.url_chat).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url_chat.clone();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);

            error!(
                %status,
                %url,
                %snippet,
                model = %self.cfg.model,
                latency_ms = started.elapsed().as_millis(),
                "chat completion returned non-success status"
            );

            return Err(ProviderError::new(
                LlmProvider::Local,
                ProviderErrorKind::HttpStatus(HttpError {
                    status,
                    url,
                    snippet,
                }),
            )
            .into());
        }

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                LlmProvider::Local,
                ProviderErrorKind::Decode(format!(
                    "serde error: {e}; ensure the server runs in non-streaming mode"
                )),
            )
        })?;

        let outcome = out
            .into_outcome()
            .ok_or_else(|| ProviderError::new(LlmProvider::Local, ProviderErrorKind::EmptyChoices))?;

        info!(
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis(),
            "chat completion completed"
        );

        Ok(outcome)
    }

    /// Retrieves one embedding vector.
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let mut batch = self.embeddings_batch(&[input.to_string()]).await?;
        batch.pop().ok_or_else(|| {
            ProviderError::new(
                LlmProvider::Local,
                ProviderErrorKind::Decode("empty `data` in embeddings response".into()),
            )
            .into()
        })
    }

    /// Retrieves embeddings for a batch of inputs via array `input`.
    pub async fn embeddings_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AiLlmError> {
        let started = Instant::now();
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            input: inputs,
        };

        debug!(
            model = %self.cfg.model,
            inputs = inputs.len(),
            "POST {}", self.url_embeddings
        );

        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url_embeddings.clone();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);

            error!(
                %status,
                %url,
                %snippet,
                model = %self.cfg.model,
                latency_ms = started.elapsed().as_millis(),
                "embeddings returned non-success status"
            );

            return Err(ProviderError::new(
                LlmProvider::Local,
                ProviderErrorKind::HttpStatus(HttpError {
                    status,
                    url,
                    snippet,
                }),
            )
            .into());
        }

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                LlmProvider::Local,
                ProviderErrorKind::Decode(format!("serde error: {e}; expected `data[].embedding`")),
            )
        })?;

        info!(
            model = %self.cfg.model,
            inputs = inputs.len(),
            latency_ms = started.elapsed().as_millis(),
            "embeddings completed"
        );

        Ok(out.data.into_iter().map(|d| d.embedding).collect())
    }
}
