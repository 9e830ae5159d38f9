//! Prompt chain loader.
//!
//! The persona corpus lives on disk as markdown files. Identity files form
//! the agent description; each review mode has its own instruction chain.
//! Composition order: CONSTITUTION + PERSONA + system-core + [mode prompt]
//! + scoring-rubric + output-schema.

use std::path::Path;

use crate::errors::AgentError;

/// Identity layer, always loaded first.
pub const IDENTITY_FILES: [&str; 2] = ["CONSTITUTION.md", "PERSONA.md"];

/// The audit mode selects the instruction chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewMode {
    PrReview,
    SecurityAudit,
    GovernanceCheck,
    SurpriseAudit,
}

impl ReviewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewMode::PrReview => "pr_review",
            ReviewMode::SecurityAudit => "security_audit",
            ReviewMode::GovernanceCheck => "governance_check",
            ReviewMode::SurpriseAudit => "surprise_audit",
        }
    }

    /// Parse a mode name; unknown names are an error, not a default.
    pub fn parse(name: &str) -> Result<Self, AgentError> {
        match name {
            "pr_review" => Ok(ReviewMode::PrReview),
            "security_audit" => Ok(ReviewMode::SecurityAudit),
            "governance_check" => Ok(ReviewMode::GovernanceCheck),
            "surprise_audit" => Ok(ReviewMode::SurpriseAudit),
            other => Err(AgentError::UnknownMode(other.to_string())),
        }
    }

    /// Instruction chain for this mode, in composition order.
    pub fn chain(&self) -> [&'static str; 4] {
        let mode_file = match self {
            ReviewMode::PrReview => "pr-review.md",
            ReviewMode::SecurityAudit => "security-audit.md",
            ReviewMode::GovernanceCheck => "governance-check.md",
            ReviewMode::SurpriseAudit => "surprise-audit.md",
        };
        ["system-core.md", mode_file, "scoring-rubric.md", "output-schema.md"]
    }
}

/// Loads a single prompt file.
pub fn load_prompt_file(prompts_dir: &Path, filename: &str) -> Result<String, AgentError> {
    let path = prompts_dir.join(filename);
    if !path.is_file() {
        return Err(AgentError::PromptMissing(path));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// CONSTITUTION + PERSONA — the identity layer.
pub fn load_identity(prompts_dir: &Path) -> Result<String, AgentError> {
    let mut parts = Vec::with_capacity(IDENTITY_FILES.len());
    for file in IDENTITY_FILES {
        parts.push(load_prompt_file(prompts_dir, file)?);
    }
    Ok(parts.join("\n\n"))
}

/// The mode-specific instruction chain, one string per prompt file.
pub fn load_instructions(prompts_dir: &Path, mode: ReviewMode) -> Result<Vec<String>, AgentError> {
    mode.chain()
        .iter()
        .map(|file| load_prompt_file(prompts_dir, file))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_corpus(dir: &Path) {
        for name in [
            "CONSTITUTION.md",
            "PERSONA.md",
            "system-core.md",
            "pr-review.md",
            "scoring-rubric.md",
            "output-schema.md",
        ] {
            fs::write(dir.join(name), format!("contents of {name}")).unwrap();
        }
    }

    #[test]
    fn identity_and_instructions_compose_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());

        let identity = load_identity(dir.path()).unwrap();
        assert!(identity.starts_with("contents of CONSTITUTION.md"));
        assert!(identity.contains("PERSONA.md"));

        let chain = load_instructions(dir.path(), ReviewMode::PrReview).unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain[1], "contents of pr-review.md");
        assert_eq!(chain[3], "contents of output-schema.md");
    }

    #[test]
    fn missing_prompt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_identity(dir.path()),
            Err(AgentError::PromptMissing(_))
        ));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(matches!(
            ReviewMode::parse("cli"),
            Err(AgentError::UnknownMode(_))
        ));
        assert_eq!(
            ReviewMode::parse("security_audit").unwrap(),
            ReviewMode::SecurityAudit
        );
    }
}
