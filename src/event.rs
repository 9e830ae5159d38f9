//! PR event payload parsing.

use std::path::Path;

use serde_json::Value;

use crate::pipeline::PipelineError;

/// What the pipeline needs out of a `pull_request` event.
#[derive(Debug, Clone, PartialEq)]
pub struct PrEvent {
    pub pr_number: u64,
    pub repo: String,
    pub title: String,
    pub author: String,
    pub head_ref: String,
    pub head_sha: String,
    pub base_ref: String,
    /// Null body reads as "".
    pub description: String,
}

impl PrEvent {
    /// PR-scoped session identifier used for finding lifecycle.
    pub fn session_id(&self) -> String {
        format!("pr-{}", self.pr_number)
    }

    /// "source → target" branch descriptor.
    pub fn branch(&self) -> String {
        format!("{} \u{2192} {}", self.head_ref, self.base_ref)
    }
}

/// Parse the event file. Missing required paths are config errors.
pub fn load_pr_event(path: &Path) -> Result<PrEvent, PipelineError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::Config(format!("event file {}: {e}", path.display())))?;
    let data: Value = serde_json::from_str(&raw)
        .map_err(|e| PipelineError::Config(format!("event JSON: {e}")))?;

    let pr = data
        .get("pull_request")
        .ok_or_else(|| PipelineError::Config("event has no pull_request".into()))?;

    let str_at = |value: &Value, pointer: &str| -> Result<String, PipelineError> {
        value
            .pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::Config(format!("event missing pull_request{pointer}")))
    };

    Ok(PrEvent {
        pr_number: pr
            .get("number")
            .and_then(Value::as_u64)
            .ok_or_else(|| PipelineError::Config("event missing pull_request.number".into()))?,
        repo: data
            .pointer("/repository/full_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::Config("event missing repository.full_name".into()))?,
        title: str_at(pr, "/title")?,
        author: str_at(pr, "/user/login")?,
        head_ref: str_at(pr, "/head/ref")?,
        head_sha: str_at(pr, "/head/sha")?,
        base_ref: str_at(pr, "/base/ref")?,
        description: pr
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_event(value: &serde_json::Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{value}").unwrap();
        file
    }

    fn sample() -> serde_json::Value {
        json!({
            "pull_request": {
                "number": 42,
                "title": "Add throttle",
                "body": null,
                "user": { "login": "octocat" },
                "head": { "ref": "feature", "sha": "deadbeef" },
                "base": { "ref": "main" }
            },
            "repository": { "full_name": "owner/repo" }
        })
    }

    #[test]
    fn event_parses_with_null_body() {
        let file = write_event(&sample());
        let event = load_pr_event(file.path()).unwrap();
        assert_eq!(event.pr_number, 42);
        assert_eq!(event.repo, "owner/repo");
        assert_eq!(event.description, "");
        assert_eq!(event.session_id(), "pr-42");
        assert_eq!(event.branch(), "feature \u{2192} main");
    }

    #[test]
    fn missing_required_path_is_a_config_error() {
        let mut broken = sample();
        broken["pull_request"]
            .as_object_mut()
            .unwrap()
            .remove("head");
        let file = write_event(&broken);
        assert!(matches!(
            load_pr_event(file.path()),
            Err(PipelineError::Config(msg)) if msg.contains("head")
        ));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        assert!(matches!(
            load_pr_event(Path::new("/definitely/not/here.json")),
            Err(PipelineError::Config(_))
        ));
    }
}
