//! Agent and retry-engine errors.

use thiserror::Error;

use ai_llm_service::AiLlmError;

/// Failures raised by agent construction or invocation.
#[derive(Debug, Error)]
pub enum AgentError {
    /// LLM service failure (transport, status, decode).
    #[error(transparent)]
    Llm(#[from] AiLlmError),

    /// A prompt file the chain needs is missing.
    #[error("prompt file not found: {0}")]
    PromptMissing(std::path::PathBuf),

    /// Prompt file I/O failure.
    #[error("prompt read error: {0}")]
    PromptIo(#[from] std::io::Error),

    /// Unknown review mode name.
    #[error("unknown review mode: {0}")]
    UnknownMode(String),

    /// Transport value was not one of "openai" / "local".
    #[error("invalid transport {value:?} (source: {origin}); must be one of: local, openai")]
    InvalidTransport { value: String, origin: String },

    /// The model asked for tools but none are wired up.
    #[error("model requested tool calls but no toolkit is configured")]
    UnexpectedToolCalls,

    /// Session transcript I/O failure.
    #[error("session transcript error: {0}")]
    Session(String),
}

/// Raised when every retry attempt failed to produce a valid review.
#[derive(Debug)]
pub struct ReviewParseError {
    /// Total attempts made (`max_retries + 1`).
    pub attempts: u32,
    /// First 2000 chars of the last raw agent output.
    pub last_raw: String,
    /// One entry per failed attempt, oldest first.
    pub errors: Vec<String>,
}

impl std::fmt::Display for ReviewParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let preview: String = self.last_raw.chars().take(500).collect();
        let recent = self
            .errors
            .iter()
            .rev()
            .take(3)
            .rev()
            .cloned()
            .collect::<Vec<_>>()
            .join("; ");
        write!(
            f,
            "failed to parse review after {} attempts. Last raw output: {preview:?}. Errors: {recent}",
            self.attempts
        )
    }
}

impl std::error::Error for ReviewParseError {}

/// Retry-engine outcome: either the agent transport broke, or every
/// attempt parsed invalid.
#[derive(Debug, Error)]
pub enum RetryError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Parse(#[from] ReviewParseError),
}
