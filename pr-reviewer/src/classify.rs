//! Splits findings into inline-eligible and off-diff.

use std::collections::{BTreeMap, BTreeSet};

use review_model::Finding;

/// A finding is inline-eligible iff its file appears in the diff **and**
/// its `line_start` is an addressable hunk line. A file present in the
/// diff with the finding's line outside every hunk routes off-diff.
pub fn classify_findings(
    findings: &[Finding],
    diff_lines: &BTreeMap<String, BTreeSet<u32>>,
) -> (Vec<Finding>, Vec<Finding>) {
    let mut inline = Vec::new();
    let mut off_diff = Vec::new();

    for finding in findings {
        let eligible = diff_lines
            .get(&finding.file)
            .is_some_and(|lines| lines.contains(&finding.line_start));
        if eligible {
            inline.push(finding.clone());
        } else {
            off_diff.push(finding.clone());
        }
    }
    (inline, off_diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::parse_diff_lines;
    use serde_json::json;

    fn finding(file: &str, line: u32) -> Finding {
        serde_json::from_value(json!({
            "id": "F-001", "severity": "HIGH", "confidence": 80, "category": "logic",
            "file": file, "line_start": line, "line_end": line, "title": format!("t-{line}"),
            "description": "d", "suggestion": "s", "evidence": "e", "grippy_note": "n"
        }))
        .unwrap()
    }

    #[test]
    fn inside_hunk_is_inline_outside_is_off_diff() {
        let map = parse_diff_lines("diff --git a/a.py b/a.py\n@@ -10,2 +10,3 @@\n ctx\n+new\n ctx2\n");
        let findings = vec![finding("a.py", 11), finding("a.py", 99), finding("other.py", 11)];

        let (inline, off_diff) = classify_findings(&findings, &map);
        assert_eq!(inline.len(), 1);
        assert_eq!(inline[0].line_start, 11);
        assert_eq!(off_diff.len(), 2);
    }
}
