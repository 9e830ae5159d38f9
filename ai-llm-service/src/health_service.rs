//! Best-effort health checks for configured LLM endpoints.
//!
//! Both providers are OpenAI-compatible, so the probe is the same:
//! `GET {endpoint}/models` with Bearer auth when a key is configured.
//! [`HealthService::check`] never fails — every error is mapped into an
//! `ok = false` snapshot — which makes it safe to call on the hot path of
//! agent construction and only log the result.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::llm_model_config::LlmModelConfig;
use crate::error_handler::AiLlmError;

/// A serializable health snapshot for a single profile.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub ok: bool,
    pub latency_ms: u128,
    pub message: String,
}

/// Lightweight health checker with its own short-timeout client.
#[derive(Debug)]
pub struct HealthService {
    client: reqwest::Client,
}

impl HealthService {
    /// Builds the checker; `timeout_secs` defaults to 5.
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, AiLlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(5)))
            .build()?;
        Ok(Self { client })
    }

    /// Probes one profile. Never fails; errors become `ok = false`.
    pub async fn check(&self, cfg: &LlmModelConfig) -> HealthStatus {
        let url = format!("{}/models", cfg.endpoint.trim_end_matches('/'));
        let started = Instant::now();

        let mut req = self.client.get(&url);
        if let Some(key) = &cfg.api_key {
            req = req.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }

        let (ok, message) = match req.send().await {
            Ok(resp) if resp.status().is_success() => (true, "reachable".to_string()),
            Ok(resp) => (false, format!("status {}", resp.status())),
            Err(e) => (false, format!("transport: {e}")),
        };

        let status = HealthStatus {
            provider: cfg.provider.to_string(),
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            ok,
            latency_ms: started.elapsed().as_millis(),
            message,
        };

        if status.ok {
            debug!(endpoint = %status.endpoint, latency_ms = status.latency_ms, "health probe ok");
        } else {
            warn!(endpoint = %status.endpoint, message = %status.message, "health probe failed");
        }
        status
    }

    /// Probes a list of profiles sequentially.
    pub async fn check_many(&self, cfgs: &[LlmModelConfig]) -> Vec<HealthStatus> {
        let mut out = Vec::with_capacity(cfgs.len());
        for cfg in cfgs {
            out.push(self.check(cfg).await);
        }
        out
    }
}
