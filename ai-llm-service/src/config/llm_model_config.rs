use crate::config::llm_provider::LlmProvider;

/// Configuration for one LLM model endpoint.
///
/// `endpoint` is the OpenAI-compatible base **including** the version
/// segment (e.g. `https://api.openai.com/v1` or `http://localhost:1234/v1`);
/// services append `/chat/completions` and `/embeddings` to it.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmModelConfig {
    /// Which backend serves this config.
    pub provider: LlmProvider,

    /// Model identifier at the endpoint.
    pub model: String,

    /// OpenAI-compatible API base URL, version segment included.
    pub endpoint: String,

    /// API key. Required for [`LlmProvider::OpenAi`]; local servers accept
    /// any non-empty placeholder.
    pub api_key: Option<String>,

    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,

    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
}
