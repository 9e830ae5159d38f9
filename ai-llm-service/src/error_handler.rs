//! Unified error types for `ai-llm-service`.
//!
//! All error messages include the `[AI LLM Service]` prefix so bubbled-up
//! failures can be attributed to this library at a glance.

use reqwest::StatusCode;
use thiserror::Error;

use crate::config::llm_provider::LlmProvider;

/// Root error type for every public operation in this crate.
#[derive(Debug, Error)]
pub enum AiLlmError {
    /// Transport-level failure (DNS, connect, timeout, TLS).
    #[error("[AI LLM Service] transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// Provider-tagged failure (bad status, decode error, config misuse).
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// A failure attributed to a specific provider.
#[derive(Debug, Error)]
#[error("[AI LLM Service] {provider} provider error: {kind}")]
pub struct ProviderError {
    pub provider: LlmProvider,
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(provider: LlmProvider, kind: ProviderErrorKind) -> Self {
        Self { provider, kind }
    }
}

#[derive(Debug, Error)]
pub enum ProviderErrorKind {
    /// Config carried the wrong provider for this service.
    #[error("invalid provider for this service")]
    InvalidProvider,

    /// Hosted provider requires an API key.
    #[error("missing API key")]
    MissingApiKey,

    /// Endpoint was empty or not http(s).
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Upstream returned a non-2xx status.
    #[error("{0}")]
    HttpStatus(HttpError),

    /// Response body could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Chat completion returned no usable choices.
    #[error("empty choices in completion response")]
    EmptyChoices,
}

/// Non-2xx response details: status, URL and a short body snippet.
#[derive(Debug, Error)]
#[error("unexpected HTTP status {status} from {url}: {snippet}")]
pub struct HttpError {
    pub status: StatusCode,
    pub url: String,
    pub snippet: String,
}

/// First 240 chars of a response body, for log- and error-friendly output.
pub fn make_snippet(body: &str) -> String {
    body.chars().take(240).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_is_truncated() {
        let long = "x".repeat(1000);
        assert_eq!(make_snippet(&long).len(), 240);
        assert_eq!(make_snippet("short"), "short");
    }

    #[test]
    fn messages_carry_service_prefix() {
        let err = AiLlmError::Provider(ProviderError::new(
            LlmProvider::Local,
            ProviderErrorKind::MissingApiKey,
        ));
        assert!(err.to_string().contains("[AI LLM Service]"));
        assert!(err.to_string().contains("local"));
    }
}
