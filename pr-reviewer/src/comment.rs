//! Inline review comment rendering.

use review_model::{Finding, Severity};

use crate::github::ReviewComment;

/// Severity → emoji used across inline comments and the summary.
pub fn severity_emoji(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "\u{1f534}",
        Severity::High => "\u{1f7e0}",
        Severity::Medium => "\u{1f7e1}",
        Severity::Low => "\u{1f535}",
    }
}

/// Hidden HTML marker embedded in each inline comment so later rounds can
/// locate the thread for this finding.
pub fn finding_marker(fingerprint: &str) -> String {
    format!("<!-- grippy-finding-{fingerprint} -->")
}

/// Build the review comment for one inline-eligible finding.
///
/// Body: severity header, confidence, description, suggestion, persona
/// note, and the hidden fingerprint marker. Comments always target the
/// RIGHT side of the diff.
pub fn build_review_comment(finding: &Finding) -> ReviewComment {
    let emoji = severity_emoji(finding.severity);
    let body = [
        format!("#### {emoji} {}: {}", finding.severity.as_str(), finding.title),
        format!("Confidence: {}%", finding.confidence),
        String::new(),
        finding.description.clone(),
        String::new(),
        format!("**Suggestion:** {}", finding.suggestion),
        String::new(),
        format!("*\u{2014} {}*", finding.grippy_note),
        String::new(),
        finding_marker(finding.fingerprint()),
    ]
    .join("\n");

    ReviewComment {
        path: finding.file.clone(),
        body,
        line: finding.line_start,
        side: "RIGHT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn comment_carries_marker_side_and_severity() {
        let finding: Finding = serde_json::from_value(json!({
            "id": "F-001", "severity": "CRITICAL", "confidence": 95, "category": "security",
            "file": "src/auth.py", "line_start": 12, "line_end": 14, "title": "SQL injection",
            "description": "String-formatted query.", "suggestion": "Bind parameters.",
            "evidence": "query = f\"...\"", "grippy_note": "Again?"
        }))
        .unwrap();

        let comment = build_review_comment(&finding);
        assert_eq!(comment.path, "src/auth.py");
        assert_eq!(comment.line, 12);
        assert_eq!(comment.side, "RIGHT");
        assert!(comment.body.starts_with("#### \u{1f534} CRITICAL: SQL injection"));
        assert!(comment.body.contains("Confidence: 95%"));
        assert!(comment.body.contains("**Suggestion:** Bind parameters."));
        assert!(comment
            .body
            .ends_with(&format!("<!-- grippy-finding-{} -->", finding.fingerprint())));
    }
}
