//! Structured-output retry engine.
//!
//! Coerces whatever the agent produced — a review value, a JSON object, a
//! raw string, a markdown-fenced string, or nothing — into a validated
//! [`Review`], feeding the validation error back to the model and retrying
//! up to a bound. `max_retries = 0` means exactly one attempt.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use review_model::{Review, SchemaError};

use crate::errors::{ReviewParseError, RetryError};
use crate::{Agent, AgentContent};

/// How much of the last raw output is preserved for diagnostics.
const LAST_RAW_CHARS: usize = 2000;

lazy_static! {
    static ref FENCE_RE: Regex =
        Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)\n?\s*```").expect("static fence regex");
}

/// One attempt's failure to become a review.
#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("Agent returned None")]
    Nil,

    #[error("Agent returned empty string")]
    Empty,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Remove a markdown code fence wrapping JSON, if any.
fn strip_markdown_fences(text: &str) -> &str {
    match FENCE_RE.captures(text) {
        Some(caps) => caps.get(1).map_or(text, |m| m.as_str().trim()),
        None => text,
    }
}

/// Coerce one agent content into a validated review.
fn parse_response(content: &AgentContent) -> Result<Review, ParseFailure> {
    match content {
        AgentContent::Review(review) => Ok((**review).clone()),
        AgentContent::Map(map) => {
            Ok(Review::from_value(serde_json::Value::Object(map.clone()))?)
        }
        AgentContent::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(ParseFailure::Empty);
            }
            let text = strip_markdown_fences(text);
            let value: serde_json::Value = serde_json::from_str(text)?;
            Ok(Review::from_value(value)?)
        }
        AgentContent::Nil => Err(ParseFailure::Nil),
    }
}

/// Diagnostic rendering of the raw content, truncated.
fn raw_preview(content: &AgentContent) -> String {
    let raw = match content {
        AgentContent::Review(_) => "<Review>".to_string(),
        AgentContent::Map(map) => serde_json::Value::Object(map.clone()).to_string(),
        AgentContent::Text(text) => text.clone(),
        AgentContent::Nil => "<None>".to_string(),
    };
    raw.chars().take(LAST_RAW_CHARS).collect()
}

/// Run a review with structured-output validation and retry.
///
/// `max_retries` counts retries **after** the initial attempt, so 0 means
/// one attempt and no feedback message. Transport failures from the agent
/// propagate immediately; parse/validation failures are fed back to the
/// model and retried.
pub async fn run_review<A: Agent>(
    agent: &mut A,
    message: &str,
    max_retries: u32,
) -> Result<Review, RetryError> {
    run_review_with(agent, message, max_retries, |_, _| {}).await
}

/// Like [`run_review`], with a callback fired on each validation failure
/// as `(attempt_no, failure)`.
pub async fn run_review_with<A, F>(
    agent: &mut A,
    message: &str,
    max_retries: u32,
    mut on_validation_error: F,
) -> Result<Review, RetryError>
where
    A: Agent,
    F: FnMut(u32, &ParseFailure),
{
    let mut errors: Vec<String> = Vec::new();
    let mut last_raw = String::new();
    let mut current_message = message.to_string();

    for attempt in 1..=(max_retries + 1) {
        let response = agent.run(&current_message).await?;
        last_raw = raw_preview(&response.content);

        match parse_response(&response.content) {
            Ok(review) => {
                debug!(attempt, "review parsed and validated");
                return Ok(review);
            }
            Err(failure) => {
                let error_str = failure.to_string();
                warn!(attempt, error = %error_str, "review output failed validation");
                errors.push(format!("Attempt {attempt}: {error_str}"));
                on_validation_error(attempt, &failure);

                if attempt <= max_retries {
                    current_message = format!(
                        "Your previous output failed validation. Error: {error_str}\n\n\
                         Please fix the errors and output a valid JSON object matching \
                         the review schema. Output ONLY the JSON."
                    );
                }
            }
        }
    }

    Err(ReviewParseError {
        attempts: max_retries + 1,
        last_raw,
        errors,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AgentError, AgentResponse};
    use serde_json::json;

    /// Scripted fake agent: replays a fixed sequence of contents.
    struct ScriptedAgent {
        script: Vec<AgentContent>,
        calls: usize,
        messages_seen: Vec<String>,
    }

    impl ScriptedAgent {
        fn new(script: Vec<AgentContent>) -> Self {
            Self {
                script,
                calls: 0,
                messages_seen: Vec::new(),
            }
        }
    }

    impl Agent for ScriptedAgent {
        async fn run(&mut self, message: &str) -> Result<AgentResponse, AgentError> {
            self.messages_seen.push(message.to_string());
            let content = self
                .script
                .get(self.calls)
                .cloned()
                .unwrap_or(AgentContent::Nil);
            self.calls += 1;
            Ok(AgentResponse { content })
        }
    }

    fn valid_review_json() -> String {
        json!({
            "audit_type": "pr_review",
            "timestamp": "2026-02-01T12:00:00Z",
            "model": "m",
            "pr": { "title": "t", "author": "a", "branch": "x → y", "complexity_tier": "TRIVIAL" },
            "scope": {
                "files_in_diff": 0, "files_reviewed": 0, "coverage_percentage": 0.0,
                "governance_rules_applied": [], "modes_active": []
            },
            "findings": [],
            "escalations": [],
            "score": {
                "overall": 100,
                "breakdown": { "security": 100, "logic": 100, "governance": 100, "reliability": 100, "observability": 100 },
                "deductions": { "critical_count": 0, "high_count": 0, "medium_count": 0, "low_count": 0, "total_deduction": 0 }
            },
            "verdict": { "status": "PASS", "threshold_applied": 70, "merge_blocking": false, "summary": "clean" },
            "personality": {
                "tone_register": "professional", "opening_catchphrase": "hm", "closing_line": "bye",
                "ascii_art_key": "all_clear"
            },
            "meta": {
                "review_duration_ms": 1, "tokens_used": 1, "context_files_loaded": 0,
                "confidence_filter_suppressed": 0, "duplicate_filter_suppressed": 0
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn first_valid_response_is_returned_as_is() {
        let mut agent = ScriptedAgent::new(vec![AgentContent::Text(valid_review_json())]);
        let review = run_review(&mut agent, "review this", 3).await.unwrap();
        assert_eq!(review.verdict.summary, "clean");
        assert_eq!(agent.calls, 1);
    }

    #[tokio::test]
    async fn fenced_json_is_accepted() {
        let fenced = format!("```json\n{}\n```", valid_review_json());
        let mut agent = ScriptedAgent::new(vec![AgentContent::Text(fenced)]);
        let review = run_review(&mut agent, "go", 0).await.unwrap();
        assert_eq!(review.score.overall, 100);
    }

    #[tokio::test]
    async fn garbage_then_success_fires_callback_twice() {
        let mut agent = ScriptedAgent::new(vec![
            AgentContent::Text("not json at all".into()),
            AgentContent::Text(String::new()),
            AgentContent::Text(valid_review_json()),
        ]);

        let mut failures = 0;
        let review = run_review_with(&mut agent, "go", 3, |_, _| failures += 1)
            .await
            .unwrap();
        assert_eq!(review.verdict.summary, "clean");
        assert_eq!(failures, 2);
        assert_eq!(agent.calls, 3);

        // Retry messages carry the validation-feedback preamble.
        assert!(agent.messages_seen[1].starts_with("Your previous output failed validation."));
        assert!(agent.messages_seen[1].contains("Output ONLY the JSON."));
    }

    #[tokio::test]
    async fn all_failures_exhaust_exactly_max_retries_plus_one() {
        let mut agent = ScriptedAgent::new(vec![
            AgentContent::Nil,
            AgentContent::Text("still broken".into()),
            AgentContent::Text("{\"not\": \"a review\"}".into()),
        ]);

        let err = run_review(&mut agent, "go", 2).await.unwrap_err();
        let RetryError::Parse(parse_err) = err else {
            panic!("expected parse error");
        };
        assert_eq!(parse_err.attempts, 3);
        assert_eq!(agent.calls, 3);
        assert_eq!(parse_err.errors.len(), 3);
        assert!(parse_err.errors[0].starts_with("Attempt 1:"));
        // Most recent raw output wins the preview slot.
        assert!(parse_err.last_raw.contains("not"));
    }

    #[tokio::test]
    async fn zero_retries_means_one_attempt() {
        let mut agent = ScriptedAgent::new(vec![AgentContent::Text("nope".into())]);
        let err = run_review(&mut agent, "go", 0).await.unwrap_err();
        assert!(matches!(err, RetryError::Parse(ref p) if p.attempts == 1));
        assert_eq!(agent.calls, 1);
        // No retry message was built for the sole attempt.
        assert_eq!(agent.messages_seen, vec!["go".to_string()]);
    }

    #[tokio::test]
    async fn map_and_review_contents_short_circuit() {
        let value: serde_json::Value = serde_json::from_str(&valid_review_json()).unwrap();
        let serde_json::Value::Object(map) = value.clone() else {
            unreachable!()
        };
        let mut agent = ScriptedAgent::new(vec![AgentContent::Map(map)]);
        let review = run_review(&mut agent, "go", 0).await.unwrap();

        let mut agent = ScriptedAgent::new(vec![AgentContent::Review(Box::new(review))]);
        let again = run_review(&mut agent, "go", 0).await.unwrap();
        assert_eq!(again.verdict.summary, "clean");
    }

    #[test]
    fn fence_stripping_handles_plain_and_tagged_fences() {
        assert_eq!(strip_markdown_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_markdown_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_markdown_fences("{\"a\":1}"), "{\"a\":1}");
    }
}
