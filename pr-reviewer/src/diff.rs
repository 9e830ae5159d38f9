//! Unified-diff line addressability and size capping.
//!
//! The PR review API only accepts inline comments on lines that appear in
//! a diff hunk, addressed by their right-side (new file) line numbers.
//! `parse_diff_lines` computes exactly that set per file.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

/// Diff cap applied before the agent sees the diff.
pub const MAX_DIFF_CHARS: usize = 200_000;

/// Parse a unified diff into `file → set of addressable right-side lines`.
///
/// Per line:
/// - `diff --git a/X b/Y` starts file `Y` with an empty set.
/// - `@@ -L1,C1 +L2,C2 @@` resets the right-line counter to `L2`.
/// - `+` and ` ` lines enter the set and advance the counter.
/// - `-` lines and metadata do not advance it; `\`-marker lines
///   ("No newline at end of file") never enter the set.
pub fn parse_diff_lines(diff_text: &str) -> BTreeMap<String, BTreeSet<u32>> {
    let mut result: BTreeMap<String, BTreeSet<u32>> = BTreeMap::new();
    if diff_text.trim().is_empty() {
        return result;
    }

    let mut current_file: Option<String> = None;
    let mut right_line: u32 = 0;

    for line in diff_text.lines() {
        if let Some(name) = parse_file_header(line) {
            result.entry(name.to_string()).or_default();
            current_file = Some(name.to_string());
            right_line = 0;
            continue;
        }

        if let Some(start) = parse_hunk_header(line) {
            right_line = start;
            continue;
        }

        let Some(file) = &current_file else { continue };

        // Metadata rows between the file header and the first hunk.
        if line.starts_with("---")
            || line.starts_with("+++")
            || line.starts_with("new file")
            || line.starts_with("index ")
        {
            continue;
        }

        // Marker rows are not diff content and never advance the counter.
        if line.starts_with('\\') {
            continue;
        }

        if line.starts_with('-') {
            continue;
        }
        if line.starts_with('+') || line.starts_with(' ') {
            result
                .get_mut(file)
                .expect("file entry created at header")
                .insert(right_line);
            right_line += 1;
            continue;
        }
        // Anything else (binary markers etc.) is ignored.
    }

    debug!(files = result.len(), "diff addressability parsed");
    result
}

/// `diff --git a/X b/Y` → `Y`.
fn parse_file_header(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("diff --git a/")?;
    let idx = rest.find(" b/")?;
    let name = &rest[idx + 3..];
    (!name.is_empty()).then_some(name)
}

/// `@@ -L1[,C1] +L2[,C2] @@ …` → `L2`.
fn parse_hunk_header(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("@@ -")?;
    let plus = rest.find('+')?;
    let right = &rest[plus + 1..];
    let end = right.find([',', ' '])?;
    right[..end].parse().ok()
}

/// Cap a diff at file-block boundaries.
///
/// Keeps whole `diff --git` blocks up to `max_chars` and appends a
/// truncation notice naming how many file blocks were dropped. A diff
/// within budget is returned unchanged.
pub fn truncate_diff(diff: &str, max_chars: usize) -> (String, usize) {
    if diff.len() <= max_chars {
        return (diff.to_string(), 0);
    }

    let mut kept = String::new();
    let mut dropped = 0usize;
    let mut first = true;

    // File blocks start at each `diff --git` offset.
    let mut starts: Vec<usize> = diff
        .match_indices("diff --git ")
        .map(|(i, _)| i)
        .collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }
    starts.push(diff.len());

    for window in starts.windows(2) {
        let block = &diff[window[0]..window[1]];
        if first || kept.len() + block.len() <= max_chars {
            kept.push_str(block);
            first = false;
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        kept.push_str(&format!("\n... {dropped} file(s) truncated\n"));
    }
    (kept, dropped)
}
