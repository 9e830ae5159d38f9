//! Shared LLM service with two active profiles: `review` and `embedding`.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Caches underlying HTTP clients per config (endpoint+model+key+timeout).
//! - Provides chat via the review profile and single/batch embeddings via
//!   the embedding profile.

use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
    sync::Arc,
    time::Instant,
};

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::AiLlmError,
    health_service::{HealthService, HealthStatus},
    services::{
        local_ai_service::LocalAiService,
        open_ai_service::OpenAiService,
        wire::{ChatMessage, ChatOutcome, ToolSpec},
    },
};

/// Shared service that manages the **review** and **embedding** profiles.
///
/// Internally caches OpenAI/local clients keyed by their configuration so
/// repeated calls do not rebuild HTTP clients.
#[derive(Debug)]
pub struct LlmServiceProfiles {
    review: LlmModelConfig,
    embedding: LlmModelConfig,

    openai: RwLock<HashMap<ClientKey, Arc<OpenAiService>>>,
    local: RwLock<HashMap<ClientKey, Arc<LocalAiService>>>,

    health: HealthService,
}

impl LlmServiceProfiles {
    /// Creates a new service with the two profiles.
    pub fn new(
        review: LlmModelConfig,
        embedding: LlmModelConfig,
        health_timeout_secs: Option<u64>,
    ) -> Result<Self, AiLlmError> {
        info!(
            review.provider = %review.provider,
            review.model = %review.model,
            review.endpoint = %review.endpoint,
            embedding.provider = %embedding.provider,
            embedding.model = %embedding.model,
            embedding.endpoint = %embedding.endpoint,
            health_timeout_secs,
            "LlmServiceProfiles initialized"
        );

        Ok(Self {
            review,
            embedding,
            openai: RwLock::new(HashMap::new()),
            local: RwLock::new(HashMap::new()),
            health: HealthService::new(health_timeout_secs)?,
        })
    }

    /// Chat completion on the **review** profile, with optional tools.
    ///
    /// # Errors
    /// Returns [`AiLlmError`] if the completion fails.
    pub async fn chat_review(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
    ) -> Result<ChatOutcome, AiLlmError> {
        let started = Instant::now();

        let out = match self.review.provider {
            LlmProvider::OpenAi => {
                let cli = self.get_or_init_openai(&self.review).await?;
                cli.chat(messages, tools).await
            }
            LlmProvider::Local => {
                let cli = self.get_or_init_local(&self.review).await?;
                cli.chat(messages, tools).await
            }
        };

        if out.is_ok() {
            info!(
                provider = %self.review.provider,
                model = %self.review.model,
                endpoint = %self.review.endpoint,
                messages = messages.len(),
                latency_ms = started.elapsed().as_millis(),
                "review chat completed"
            );
        }
        out
    }

    /// Computes one embedding using the **embedding** profile.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let started = Instant::now();

        let out = match self.embedding.provider {
            LlmProvider::OpenAi => {
                let cli = self.get_or_init_openai(&self.embedding).await?;
                cli.embeddings(input).await
            }
            LlmProvider::Local => {
                let cli = self.get_or_init_local(&self.embedding).await?;
                cli.embeddings(input).await
            }
        };

        if out.is_ok() {
            info!(
                provider = %self.embedding.provider,
                model = %self.embedding.model,
                input_len = input.len(),
                latency_ms = started.elapsed().as_millis(),
                "embedding completed"
            );
        }
        out
    }

    /// Computes a batch of embeddings using the **embedding** profile.
    ///
    /// Output order matches input order.
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AiLlmError> {
        let started = Instant::now();

        let out = match self.embedding.provider {
            LlmProvider::OpenAi => {
                let cli = self.get_or_init_openai(&self.embedding).await?;
                cli.embeddings_batch(inputs).await
            }
            LlmProvider::Local => {
                let cli = self.get_or_init_local(&self.embedding).await?;
                cli.embeddings_batch(inputs).await
            }
        };

        if out.is_ok() {
            info!(
                provider = %self.embedding.provider,
                model = %self.embedding.model,
                inputs = inputs.len(),
                latency_ms = started.elapsed().as_millis(),
                "batch embedding completed"
            );
        }
        out
    }

    /// Returns a health snapshot for the distinct profiles.
    ///
    /// If the embedding profile equals the review profile, it is checked once.
    pub async fn health_all(&self) -> Vec<HealthStatus> {
        let mut list = Vec::<LlmModelConfig>::with_capacity(2);
        list.push(self.review.clone());
        if self.embedding != self.review {
            list.push(self.embedding.clone());
        }
        debug!(profiles = list.len(), "running health checks");
        self.health.check_many(&list).await
    }

    /// Returns references to the current profiles `(review, embedding)`.
    pub fn profiles(&self) -> (&LlmModelConfig, &LlmModelConfig) {
        (&self.review, &self.embedding)
    }

    /* --------------------- Internals --------------------- */

    async fn get_or_init_openai(
        &self,
        cfg: &LlmModelConfig,
    ) -> Result<Arc<OpenAiService>, AiLlmError> {
        let key = ClientKey::from(cfg);

        if let Some(cli) = self.openai.read().await.get(&key).cloned() {
            debug!(model = %cfg.model, endpoint = %cfg.endpoint, "openai client cache hit");
            return Ok(cli);
        }

        debug!(
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            "openai client cache miss (initializing)"
        );

        let fresh = Arc::new(OpenAiService::new(cfg.clone())?);
        let mut w = self.openai.write().await;
        let cli = w.entry(key).or_insert(fresh);
        Ok(cli.clone())
    }

    async fn get_or_init_local(
        &self,
        cfg: &LlmModelConfig,
    ) -> Result<Arc<LocalAiService>, AiLlmError> {
        let key = ClientKey::from(cfg);

        if let Some(cli) = self.local.read().await.get(&key).cloned() {
            debug!(model = %cfg.model, endpoint = %cfg.endpoint, "local client cache hit");
            return Ok(cli);
        }

        debug!(
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            "local client cache miss (initializing)"
        );

        let fresh = Arc::new(LocalAiService::new(cfg.clone())?);
        let mut w = self.local.write().await;
        let cli = w.entry(key).or_insert(fresh);
        Ok(cli.clone())
    }
}

/// Internal cache key to identify unique client configs.
///
/// `api_key` participates in the key to isolate clients with different
/// credentials, but the key's fields are never logged.
#[derive(Clone, Eq, Debug)]
struct ClientKey {
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Option<u64>,
}

impl From<&LlmModelConfig> for ClientKey {
    fn from(cfg: &LlmModelConfig) -> Self {
        Self {
            provider: cfg.provider,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            timeout: cfg.timeout_secs,
        }
    }
}

impl PartialEq for ClientKey {
    fn eq(&self, other: &Self) -> bool {
        self.provider == other.provider
            && self.endpoint == other.endpoint
            && self.model == other.model
            && self.api_key == other.api_key
            && self.timeout == other.timeout
    }
}

impl Hash for ClientKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.provider.hash(state);
        self.endpoint.hash(state);
        self.model.hash(state);
        if let Some(ref k) = self.api_key {
            k.hash(state);
        } else {
            0usize.hash(state);
        }
        self.timeout.hash(state);
    }
}
