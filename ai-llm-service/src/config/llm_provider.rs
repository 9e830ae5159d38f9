use std::fmt;

/// Backend used for LLM inference and embeddings.
///
/// Both variants speak the OpenAI-compatible wire protocol; they differ in
/// where the endpoint lives and how strictly credentials are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProvider {
    /// Hosted OpenAI API (requires a real API key).
    OpenAi,
    /// Local OpenAI-compatible server (e.g. LM Studio); accepts any key.
    Local,
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::OpenAi => write!(f, "openai"),
            LlmProvider::Local => write!(f, "local"),
        }
    }
}
