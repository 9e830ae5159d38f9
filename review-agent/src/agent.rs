//! The concrete review agent: prompt chain + chat loop + tools + history.
//!
//! `ReviewAgent` wraps the shared LLM profiles. One `run()` sends the
//! composed system prompt, optional session history, and the PR context;
//! when the model answers with tool calls they are executed against the
//! codebase toolkit and the loop continues until the model yields text
//! (or the tool budget runs out and it is told to answer).

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use ai_llm_service::{ChatMessage, ChatOutcome, LlmProvider, LlmServiceProfiles, ToolSpec};
use codebase_index::CodebaseToolkit;

use crate::errors::AgentError;
use crate::prompts::{ReviewMode, load_identity, load_instructions};
use crate::session::SessionLog;
use crate::{Agent, AgentContent, AgentResponse};

/// Valid transport names, for error messages.
const VALID_TRANSPORTS: &str = "local, openai";

/// Resolve the transport via three-tier priority.
///
/// Resolution order:
/// 1. Explicit parameter
/// 2. `GRIPPY_TRANSPORT` environment variable
/// 3. Inferred `openai` from `OPENAI_API_KEY` presence (with a notice)
/// 4. Default `local`
///
/// Returns the provider and a source tag such as `"param"` or
/// `"env:GRIPPY_TRANSPORT"`. Invalid names are an error, never a default.
pub fn resolve_transport(explicit: Option<&str>) -> Result<(LlmProvider, String), AgentError> {
    let mut resolved: Option<String> = None;
    let mut source = "default".to_string();

    if let Some(value) = explicit {
        resolved = Some(value.trim().to_lowercase());
        source = "param".to_string();
    }

    if resolved.is_none() {
        if let Ok(value) = std::env::var("GRIPPY_TRANSPORT") {
            if !value.trim().is_empty() {
                resolved = Some(value.trim().to_lowercase());
                source = "env:GRIPPY_TRANSPORT".to_string();
            }
        }
    }

    if resolved.is_none() {
        if std::env::var("OPENAI_API_KEY").is_ok_and(|v| !v.is_empty()) {
            println!(
                "::notice::transport inferred from OPENAI_API_KEY. \
                 Set GRIPPY_TRANSPORT=openai to make this explicit."
            );
            resolved = Some("openai".to_string());
            source = "inferred:OPENAI_API_KEY".to_string();
        }
    }

    let value = resolved.unwrap_or_else(|| "local".to_string());
    let provider = match value.as_str() {
        "openai" => LlmProvider::OpenAi,
        "local" => LlmProvider::Local,
        _ => {
            return Err(AgentError::InvalidTransport {
                value,
                origin: source,
            });
        }
    };
    info!(transport = %provider, source = %source, valid = VALID_TRANSPORTS, "transport resolved");
    Ok((provider, source))
}

/// Optional pieces of a [`ReviewAgent`].
#[derive(Default)]
pub struct ReviewAgentOptions {
    /// Codebase search toolkit; absent means diff-only review.
    pub toolkit: Option<CodebaseToolkit>,
    /// Max tool calls per run. `None` = unlimited.
    pub tool_call_limit: Option<u32>,
    /// Session transcript for cross-round continuity.
    pub session: Option<SessionLog>,
    /// Extra context appended to the system message.
    pub additional_context: Option<String>,
}

/// Concrete agent: LLM profiles + composed system prompt + tools + history.
pub struct ReviewAgent {
    llm: Arc<LlmServiceProfiles>,
    system: String,
    toolkit: Option<CodebaseToolkit>,
    tool_specs: Vec<ToolSpec>,
    tool_call_limit: Option<u32>,
    session: Option<SessionLog>,
}

impl ReviewAgent {
    /// Assembles the agent from the prompt corpus and options.
    pub fn create(
        llm: Arc<LlmServiceProfiles>,
        prompts_dir: &Path,
        mode: ReviewMode,
        options: ReviewAgentOptions,
    ) -> Result<Self, AgentError> {
        let mut system = load_identity(prompts_dir)?;
        for part in load_instructions(prompts_dir, mode)? {
            system.push_str("\n\n");
            system.push_str(&part);
        }
        if let Some(extra) = &options.additional_context {
            system.push_str("\n\n");
            system.push_str(extra);
        }

        let tool_specs = options
            .toolkit
            .as_ref()
            .map(|tk| tk.specs())
            .unwrap_or_default();

        info!(
            mode = mode.as_str(),
            system_len = system.len(),
            tools = tool_specs.len(),
            has_session = options.session.is_some(),
            "review agent assembled"
        );

        Ok(Self {
            llm,
            system,
            toolkit: options.toolkit,
            tool_specs,
            tool_call_limit: options.tool_call_limit,
            session: options.session,
        })
    }

    async fn run_loop(&mut self, message: &str) -> Result<AgentResponse, AgentError> {
        let mut messages = vec![ChatMessage::system(self.system.clone())];
        if let Some(log) = &self.session {
            if let Some(history) = log.history_context() {
                messages.push(ChatMessage::system(history));
            }
        }
        messages.push(ChatMessage::user(message));

        let mut calls_made: u32 = 0;
        loop {
            let budget_left = self.tool_call_limit.is_none_or(|limit| calls_made < limit);
            let tools = if self.toolkit.is_some() && budget_left {
                Some(self.tool_specs.as_slice())
            } else {
                None
            };

            match self.llm.chat_review(&messages, tools).await? {
                ChatOutcome::Content(text) => {
                    if let Some(log) = &self.session {
                        if let Err(e) = log.append(&text) {
                            warn!(error = %e, "failed to append session transcript");
                        }
                    }
                    return Ok(AgentResponse {
                        content: AgentContent::Text(text),
                    });
                }
                ChatOutcome::ToolCalls(calls) => {
                    let Some(toolkit) = &self.toolkit else {
                        return Err(AgentError::UnexpectedToolCalls);
                    };
                    debug!(count = calls.len(), calls_made, "executing tool calls");
                    messages.push(ChatMessage::assistant_tool_calls(calls.clone()));
                    for call in calls {
                        let output = toolkit
                            .dispatch(&call.function.name, &call.function.arguments)
                            .await;
                        messages.push(ChatMessage::tool(call.id, output));
                        calls_made += 1;
                    }
                    if self.tool_call_limit.is_some_and(|limit| calls_made >= limit) {
                        messages.push(ChatMessage::user(
                            "Tool budget exhausted. Produce the final JSON review now.",
                        ));
                    }
                }
            }
        }
    }
}

impl Agent for ReviewAgent {
    async fn run(&mut self, message: &str) -> Result<AgentResponse, AgentError> {
        self.run_loop(message).await
    }
}

/// Format the PR context as the user message.
///
/// Optional sections are omitted when empty; diff stats are derived from
/// the diff text itself.
#[allow(clippy::too_many_arguments)]
pub fn format_pr_context(
    title: &str,
    author: &str,
    branch: &str,
    description: &str,
    diff: &str,
    labels: &str,
    file_context: &str,
    governance_rules: &str,
    learnings: &str,
) -> String {
    let mut sections = Vec::new();

    if !governance_rules.is_empty() {
        sections.push(format!(
            "<governance_rules>\n{governance_rules}\n</governance_rules>"
        ));
    }

    let additions = diff.matches("\n+").count().saturating_sub(diff.matches("\n+++").count());
    let deletions = diff.matches("\n-").count().saturating_sub(diff.matches("\n---").count());
    let changed_files = diff.matches("diff --git").count();

    sections.push(format!(
        "<pr_metadata>\n\
         Title: {title}\n\
         Author: {author}\n\
         Branch: {branch}\n\
         Description: {description}\n\
         Labels: {labels}\n\
         Changed Files: {changed_files}\n\
         Additions: {additions}\n\
         Deletions: {deletions}\n\
         </pr_metadata>"
    ));

    sections.push(format!("<diff>\n{diff}\n</diff>"));

    if !file_context.is_empty() {
        sections.push(format!("<file_context>\n{file_context}\n</file_context>"));
    }
    if !learnings.is_empty() {
        sections.push(format!("<learnings>\n{learnings}\n</learnings>"));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        // SAFETY: tests are serialized via #[serial]; no concurrent env access.
        unsafe {
            std::env::remove_var("GRIPPY_TRANSPORT");
            std::env::remove_var("OPENAI_API_KEY");
        }
    }

    #[test]
    #[serial]
    fn explicit_param_wins_over_env() {
        clear_env();
        unsafe { std::env::set_var("GRIPPY_TRANSPORT", "openai") };
        let (provider, source) = resolve_transport(Some("local")).unwrap();
        assert_eq!(provider, LlmProvider::Local);
        assert_eq!(source, "param");
        clear_env();
    }

    #[test]
    #[serial]
    fn env_var_beats_inference() {
        clear_env();
        unsafe {
            std::env::set_var("GRIPPY_TRANSPORT", "local");
            std::env::set_var("OPENAI_API_KEY", "sk-test");
        }
        let (provider, source) = resolve_transport(None).unwrap();
        assert_eq!(provider, LlmProvider::Local);
        assert_eq!(source, "env:GRIPPY_TRANSPORT");
        clear_env();
    }

    #[test]
    #[serial]
    fn api_key_presence_infers_openai() {
        clear_env();
        unsafe { std::env::set_var("OPENAI_API_KEY", "sk-test") };
        let (provider, source) = resolve_transport(None).unwrap();
        assert_eq!(provider, LlmProvider::OpenAi);
        assert_eq!(source, "inferred:OPENAI_API_KEY");
        clear_env();
    }

    #[test]
    #[serial]
    fn default_is_local_and_invalid_is_rejected() {
        clear_env();
        let (provider, source) = resolve_transport(None).unwrap();
        assert_eq!(provider, LlmProvider::Local);
        assert_eq!(source, "default");

        let err = resolve_transport(Some("banana")).unwrap_err();
        assert!(matches!(err, AgentError::InvalidTransport { .. }));
        clear_env();
    }

    #[test]
    fn pr_context_counts_diff_stats() {
        let diff = "diff --git a/a.py b/a.py\n--- a/a.py\n+++ b/a.py\n@@ -1,2 +1,3 @@\n ctx\n+new\n-old\n";
        let out = format_pr_context("T", "me", "x → y", "desc", diff, "", "", "", "");
        assert!(out.contains("Changed Files: 1"));
        assert!(out.contains("Additions: 1"));
        assert!(out.contains("Deletions: 1"));
        assert!(out.contains("<diff>\ndiff --git"));
        assert!(!out.contains("<governance_rules>"));
    }

    #[test]
    fn optional_sections_are_emitted_when_present() {
        let out = format_pr_context("T", "me", "x → y", "", "", "", "fc", "rules", "learned");
        assert!(out.starts_with("<governance_rules>\nrules"));
        assert!(out.contains("<file_context>\nfc"));
        assert!(out.contains("<learnings>\nlearned"));
    }
}
