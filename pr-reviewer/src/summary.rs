//! Summary dashboard comment.
//!
//! One issue comment per PR, upserted by a hidden marker: status header,
//! score, delta line, a collapsible off-diff section and a commit footer.

use review_model::Finding;

use crate::comment::severity_emoji;

/// Hidden marker that identifies this PR's summary comment across rounds.
pub fn summary_marker(pr_number: u64) -> String {
    format!("<!-- grippy-summary-{pr_number} -->")
}

/// Inputs for the summary dashboard.
#[derive(Debug)]
pub struct SummaryInput<'a> {
    pub score: u8,
    pub verdict: &'a str,
    pub finding_count: usize,
    pub new_count: usize,
    pub persists_count: usize,
    pub resolved_count: usize,
    pub off_diff_findings: &'a [Finding],
    pub head_sha: &'a str,
    pub pr_number: u64,
}

/// Format the compact summary dashboard as an issue comment body.
pub fn format_summary_comment(input: &SummaryInput<'_>) -> String {
    let status_emoji = match input.verdict {
        "PASS" => "\u{2705}",
        "FAIL" => "\u{274c}",
        "PROVISIONAL" => "\u{26a0}\u{fe0f}",
        _ => "\u{1f50d}",
    };

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("## {status_emoji} Grippy Review \u{2014} {}", input.verdict));
    lines.push(String::new());
    lines.push(format!(
        "**Score: {}/100** | **Findings: {}**",
        input.score, input.finding_count
    ));
    lines.push(String::new());

    if input.new_count > 0 || input.persists_count > 0 || input.resolved_count > 0 {
        let mut parts = Vec::new();
        if input.new_count > 0 {
            parts.push(format!("{} new", input.new_count));
        }
        if input.persists_count > 0 {
            parts.push(format!("{} persists", input.persists_count));
        }
        if input.resolved_count > 0 {
            parts.push(format!("\u{2705} {} resolved", input.resolved_count));
        }
        lines.push(format!("**Delta:** {}", parts.join(" \u{b7} ")));
        lines.push(String::new());
    }

    if !input.off_diff_findings.is_empty() {
        lines.push("<details>".to_string());
        lines.push(format!(
            "<summary>Off-diff findings ({})</summary>",
            input.off_diff_findings.len()
        ));
        lines.push(String::new());
        for f in input.off_diff_findings {
            lines.push(format!(
                "#### {} {}: {}",
                severity_emoji(f.severity),
                f.severity.as_str(),
                f.title
            ));
            lines.push(format!("\u{1f4c1} `{}:{}`", f.file, f.line_start));
            lines.push(String::new());
            lines.push(f.description.clone());
            lines.push(String::new());
            lines.push(format!("**Suggestion:** {}", f.suggestion));
            lines.push(String::new());
        }
        lines.push("</details>".to_string());
        lines.push(String::new());
    }

    lines.push("---".to_string());
    let sha7: String = input.head_sha.chars().take(7).collect();
    lines.push(format!("<sub>Commit: {sha7}</sub>"));
    lines.push(String::new());
    lines.push(summary_marker(input.pr_number));

    lines.join("\n")
}
