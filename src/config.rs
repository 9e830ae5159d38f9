//! Environment-driven pipeline configuration.
//!
//! Read once at startup. Only the token and the event path are required;
//! everything else has a workable default for a local LM Studio setup.

use std::path::PathBuf;

use crate::pipeline::PipelineError;

/// Env surface of one CI invocation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// GitHub API token (required).
    pub token: String,
    /// Path to the PR event JSON (required).
    pub event_path: PathBuf,
    /// GitHub API base, e.g. `https://api.github.com`.
    pub api_base: String,
    /// OpenAI-compatible endpoint for the local transport.
    pub base_url: String,
    /// Model identifier at the inference endpoint.
    pub model_id: String,
    /// Embedding model identifier.
    pub embedding_model_id: String,
    /// Explicit transport override (`openai` / `local`), if any.
    pub transport: Option<String>,
    /// API key for the hosted transport.
    pub openai_api_key: Option<String>,
    /// Data directory for the dual store and session transcripts.
    pub data_dir: PathBuf,
    /// Wall-clock budget for the agent invocation; `<= 0` disables it.
    pub timeout_secs: i64,
    /// Checked-out workspace to index for code search, if any.
    pub workspace: Option<PathBuf>,
    /// Prompt corpus directory.
    pub prompts_dir: PathBuf,
    /// Review mode name.
    pub mode: String,
    /// CI output sink file, if the platform provides one.
    pub ci_output_path: Option<PathBuf>,
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

impl PipelineConfig {
    /// Loads the configuration, failing on missing required variables.
    pub fn from_env() -> Result<Self, PipelineError> {
        let token = env_opt("GITHUB_TOKEN")
            .ok_or_else(|| PipelineError::Config("GITHUB_TOKEN not set".into()))?;
        let event_path = env_opt("GITHUB_EVENT_PATH")
            .map(PathBuf::from)
            .ok_or_else(|| PipelineError::Config("GITHUB_EVENT_PATH not set".into()))?;

        let timeout_secs = match env_opt("GRIPPY_TIMEOUT_SECONDS") {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                PipelineError::Config(format!("GRIPPY_TIMEOUT_SECONDS not an integer: {raw}"))
            })?,
            None => 600,
        };

        Ok(Self {
            token,
            event_path,
            api_base: env_or("GITHUB_API_URL", "https://api.github.com"),
            base_url: env_or("GRIPPY_BASE_URL", "http://localhost:1234/v1"),
            model_id: env_or("GRIPPY_MODEL_ID", "devstral-small-2-24b-instruct-2512"),
            embedding_model_id: env_or("GRIPPY_EMBEDDING_MODEL_ID", "text-embedding-3-large"),
            transport: env_opt("GRIPPY_TRANSPORT"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            data_dir: PathBuf::from(env_or("GRIPPY_DATA_DIR", ".grippy")),
            timeout_secs,
            workspace: env_opt("GRIPPY_WORKSPACE").map(PathBuf::from),
            prompts_dir: PathBuf::from(env_or("GRIPPY_PROMPTS_DIR", "prompts")),
            mode: env_or("GRIPPY_MODE", "pr_review"),
            ci_output_path: env_opt("GITHUB_OUTPUT").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set(name: &str, value: &str) {
        // SAFETY: tests are serialized via #[serial].
        unsafe { std::env::set_var(name, value) };
    }

    fn unset(name: &str) {
        unsafe { std::env::remove_var(name) };
    }

    #[test]
    #[serial]
    fn required_vars_are_enforced() {
        unset("GITHUB_TOKEN");
        unset("GITHUB_EVENT_PATH");
        assert!(matches!(
            PipelineConfig::from_env(),
            Err(PipelineError::Config(msg)) if msg.contains("GITHUB_TOKEN")
        ));

        set("GITHUB_TOKEN", "t");
        assert!(matches!(
            PipelineConfig::from_env(),
            Err(PipelineError::Config(msg)) if msg.contains("GITHUB_EVENT_PATH")
        ));
        unset("GITHUB_TOKEN");
    }

    #[test]
    #[serial]
    fn defaults_and_overrides_apply() {
        set("GITHUB_TOKEN", "t");
        set("GITHUB_EVENT_PATH", "/tmp/event.json");
        unset("GRIPPY_TIMEOUT_SECONDS");
        unset("GRIPPY_BASE_URL");

        let cfg = PipelineConfig::from_env().unwrap();
        assert_eq!(cfg.timeout_secs, 600);
        assert_eq!(cfg.base_url, "http://localhost:1234/v1");
        assert_eq!(cfg.mode, "pr_review");

        set("GRIPPY_TIMEOUT_SECONDS", "-1");
        let cfg = PipelineConfig::from_env().unwrap();
        assert_eq!(cfg.timeout_secs, -1);

        set("GRIPPY_TIMEOUT_SECONDS", "abc");
        assert!(PipelineConfig::from_env().is_err());

        unset("GRIPPY_TIMEOUT_SECONDS");
        unset("GITHUB_TOKEN");
        unset("GITHUB_EVENT_PATH");
    }
}
