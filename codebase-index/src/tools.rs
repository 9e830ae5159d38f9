//! Search/read tools the review agent exposes to the LLM.
//!
//! Four capabilities: `search_code` (semantic), `grep_code` (regex via the
//! platform grep with a hard timeout), `read_file` and `list_files` (both
//! behind a canonical-path traversal check). Tool output is plain text —
//! failures are reported as readable strings, never as errors, so a bad
//! tool call can't abort the review.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::process::Command;
use tracing::debug;

use ai_llm_service::ToolSpec;

use crate::index::CodebaseIndex;

/// Output budget per tool result.
const MAX_RESULT_CHARS: usize = 12_000;

/// Wall-clock budget for the grep subprocess.
const GREP_TIMEOUT: Duration = Duration::from_secs(10);

/// Match cap for grep output.
const GREP_MAX_COUNT: &str = "--max-count=50";

/// Toolkit bound to one repository and its index.
pub struct CodebaseToolkit {
    index: CodebaseIndex,
    repo_root: PathBuf,
}

impl CodebaseToolkit {
    pub fn new(index: CodebaseIndex) -> Self {
        let repo_root = index.repo_root().to_path_buf();
        Self { index, repo_root }
    }

    /// OpenAI function specs for the four tools.
    pub fn specs(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::function(
                "search_code",
                "Search the codebase by semantic similarity. Use this to find \
                 definitions, patterns, or implementations across the full \
                 codebase — not just the diff.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "natural language description of what to find" },
                        "k": { "type": "integer", "description": "number of results to return", "default": 5 }
                    },
                    "required": ["query"]
                }),
            ),
            ToolSpec::function(
                "grep_code",
                "Regex search across the codebase with context lines. Use this \
                 to find exact definitions, type names, or string patterns.",
                json!({
                    "type": "object",
                    "properties": {
                        "pattern": { "type": "string", "description": "regex pattern to search for" },
                        "glob": { "type": "string", "description": "file glob to filter", "default": "*" },
                        "context_lines": { "type": "integer", "description": "lines of context before/after each match", "default": 2 }
                    },
                    "required": ["pattern"]
                }),
            ),
            ToolSpec::function(
                "read_file",
                "Read a file or line range from the codebase with line numbers.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "relative file path from the repo root" },
                        "start_line": { "type": "integer", "description": "first line to read (1-based, 0 = from start)", "default": 0 },
                        "end_line": { "type": "integer", "description": "last line to read (1-based, 0 = to end)", "default": 0 }
                    },
                    "required": ["path"]
                }),
            ),
            ToolSpec::function(
                "list_files",
                "List files in a directory, optionally filtered by glob.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "relative directory path from the repo root", "default": "." },
                        "glob_pattern": { "type": "string", "description": "glob pattern to filter entries", "default": "*" }
                    }
                }),
            ),
        ]
    }

    /// Executes one tool call. Unknown tools and bad arguments come back as
    /// readable text for the model to react to.
    pub async fn dispatch(&self, name: &str, arguments_json: &str) -> String {
        let args: Value = match serde_json::from_str(arguments_json) {
            Ok(v) => v,
            Err(e) => return format!("Invalid tool arguments: {e}"),
        };
        debug!(tool = name, "dispatching tool call");

        match name {
            "search_code" => {
                let query = args["query"].as_str().unwrap_or_default();
                let k = args["k"].as_u64().unwrap_or(5) as usize;
                self.search_code(query, k).await
            }
            "grep_code" => {
                let pattern = args["pattern"].as_str().unwrap_or_default();
                let glob = args["glob"].as_str().unwrap_or("*");
                let context = args["context_lines"].as_u64().unwrap_or(2);
                self.grep_code(pattern, glob, context).await
            }
            "read_file" => {
                let path = args["path"].as_str().unwrap_or_default();
                let start = args["start_line"].as_u64().unwrap_or(0) as usize;
                let end = args["end_line"].as_u64().unwrap_or(0) as usize;
                self.read_file(path, start, end)
            }
            "list_files" => {
                let path = args["path"].as_str().unwrap_or(".");
                let glob = args["glob_pattern"].as_str().unwrap_or("*");
                self.list_files(path, glob)
            }
            other => format!("Unknown tool: {other}"),
        }
    }

    async fn search_code(&self, query: &str, k: usize) -> String {
        if !self.index.is_indexed() {
            return "Codebase not indexed — proceed with diff-only analysis.".to_string();
        }
        let hits = match self.index.search(query, k).await {
            Ok(hits) => hits,
            Err(e) => return format!("Search failed: {e}"),
        };
        if hits.is_empty() {
            return "No results found.".to_string();
        }

        let mut lines = Vec::new();
        for hit in hits {
            let file = hit.record.extra["file_path"].as_str().unwrap_or("?");
            let start = hit.record.extra["start_line"].as_u64().unwrap_or(0);
            let end = hit.record.extra["end_line"].as_u64().unwrap_or(0);
            lines.push(format!("--- {file} (lines {start}-{end}) ---"));
            lines.push(hit.record.text.clone());
            lines.push(String::new());
        }
        limit_result(lines.join("\n"))
    }

    async fn grep_code(&self, pattern: &str, glob: &str, context_lines: u64) -> String {
        let mut cmd = Command::new("grep");
        cmd.arg("-rn")
            .arg(GREP_MAX_COUNT)
            .arg(format!("--include={glob}"))
            .arg(format!("-C{context_lines}"))
            .arg("-E")
            .arg(pattern)
            .arg(&self.repo_root)
            .kill_on_drop(true);

        let output = match tokio::time::timeout(GREP_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return "grep not available on this system.".to_string();
            }
            Ok(Err(e)) => return format!("Search failed: {e}"),
            Err(_) => return "Search timed out — try a more specific pattern.".to_string(),
        };

        match output.status.code() {
            Some(0) => limit_result(String::from_utf8_lossy(&output.stdout).into_owned()),
            Some(1) => "No matches found.".to_string(),
            _ => format!(
                "Search failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }

    fn read_file(&self, path: &str, start_line: usize, end_line: usize) -> String {
        let target = match self.resolve_under_root(path) {
            Ok(t) => t,
            Err(msg) => return msg,
        };
        if !target.is_file() {
            return format!("File not found: {path}");
        }

        let text = match std::fs::read_to_string(&target) {
            Ok(text) => text,
            Err(e) => return format!("Error reading file: {e}"),
        };
        let lines: Vec<&str> = text.lines().collect();

        let start_idx = if start_line > 0 { start_line - 1 } else { 0 };
        let end_idx = if end_line > 0 {
            end_line.min(lines.len())
        } else {
            lines.len()
        };
        if start_idx >= lines.len() {
            return format!("File {path} has only {} lines.", lines.len());
        }

        let selected = &lines[start_idx..end_idx];
        let mut out = format!(
            "# {path} (lines {}-{})\n",
            start_idx + 1,
            start_idx + selected.len()
        );
        for (i, line) in selected.iter().enumerate() {
            out.push_str(&format!("{:4} | {line}\n", start_idx + i + 1));
        }
        limit_result(out)
    }

    fn list_files(&self, path: &str, glob_pattern: &str) -> String {
        let target = match self.resolve_under_root(path) {
            Ok(t) => t,
            Err(msg) => return msg,
        };
        if !target.is_dir() {
            return format!("Directory not found: {path}");
        }

        let entries = match std::fs::read_dir(&target) {
            Ok(rd) => rd,
            Err(e) => return format!("Error listing files: {e}"),
        };

        let mut lines: Vec<String> = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !wildcard_match(glob_pattern, &name) {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.repo_root)
                .map(|p| p.display().to_string())
                .unwrap_or(name);
            let suffix = if entry.path().is_dir() { "/" } else { "" };
            lines.push(format!("{rel}{suffix}"));
        }
        lines.sort();

        if lines.is_empty() {
            return format!("No files matching '{glob_pattern}' in {path}/");
        }
        limit_result(lines.join("\n"))
    }

    /// Canonicalize and confine a user-supplied path to the repo root.
    fn resolve_under_root(&self, path: &str) -> Result<PathBuf, String> {
        let joined = self.repo_root.join(path);
        let canonical_root = self
            .repo_root
            .canonicalize()
            .map_err(|_| "Error: invalid path.".to_string())?;
        let target = joined
            .canonicalize()
            .map_err(|_| format!("File not found: {path}"))?;
        if !target.starts_with(&canonical_root) {
            return Err("Error: path traversal not allowed.".to_string());
        }
        Ok(target)
    }
}

/// Truncate tool output to budget, appending narrowing guidance.
fn limit_result(text: String) -> String {
    if text.chars().count() <= MAX_RESULT_CHARS {
        return text;
    }
    let head: String = text.chars().take(MAX_RESULT_CHARS).collect();
    format!(
        "{head}\n\n... (truncated — narrow your query with a more specific \
         pattern or smaller line range to see full results)"
    )
}

/// Minimal `*`/`?` wildcard matcher for single path components.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    fn rec(p: &[char], n: &[char]) -> bool {
        match (p.first(), n.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                rec(&p[1..], n) || (!n.is_empty() && rec(p, &n[1..]))
            }
            (Some('?'), Some(_)) => rec(&p[1..], &n[1..]),
            (Some(pc), Some(nc)) if pc == nc => rec(&p[1..], &n[1..]),
            _ => false,
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    rec(&p, &n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_store::Embedder;
    use std::fs;
    use std::path::Path;

    async fn toolkit(repo: &Path, vectors: &Path) -> CodebaseToolkit {
        fs::create_dir_all(repo.join("src")).unwrap();
        fs::write(repo.join("src/auth.rs"), "fn verify(token: &str) -> bool { token == \"x\" }\n").unwrap();
        fs::write(repo.join("README.md"), "# demo\n").unwrap();
        let index = CodebaseIndex::open(repo, vectors, Embedder::Noop { dim: 16 }).unwrap();
        index.build().await.unwrap();
        CodebaseToolkit::new(index)
    }

    #[tokio::test]
    async fn read_file_is_line_numbered_and_range_limited() {
        let repo = tempfile::tempdir().unwrap();
        let vectors = tempfile::tempdir().unwrap();
        let tk = toolkit(repo.path(), vectors.path()).await;

        let out = tk
            .dispatch("read_file", "{\"path\":\"src/auth.rs\",\"start_line\":1,\"end_line\":1}")
            .await;
        assert!(out.contains("# src/auth.rs (lines 1-1)"));
        assert!(out.contains("   1 | fn verify"));
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let repo = tempfile::tempdir().unwrap();
        let vectors = tempfile::tempdir().unwrap();
        let tk = toolkit(repo.path(), vectors.path()).await;

        let out = tk
            .dispatch("read_file", "{\"path\":\"../../etc/passwd\"}")
            .await;
        assert!(
            out.contains("path traversal not allowed") || out.contains("File not found"),
            "unexpected: {out}"
        );

        let out = tk.dispatch("list_files", "{\"path\":\"../..\"}").await;
        assert!(out.contains("path traversal not allowed"), "unexpected: {out}");
    }

    #[tokio::test]
    async fn list_files_marks_directories() {
        let repo = tempfile::tempdir().unwrap();
        let vectors = tempfile::tempdir().unwrap();
        let tk = toolkit(repo.path(), vectors.path()).await;

        let out = tk.dispatch("list_files", "{}").await;
        assert!(out.contains("src/"));
        assert!(out.contains("README.md"));

        let out = tk
            .dispatch("list_files", "{\"glob_pattern\":\"*.md\"}")
            .await;
        assert!(out.contains("README.md"));
        assert!(!out.contains("src/"));
    }

    #[tokio::test]
    async fn search_code_formats_hits_with_location() {
        let repo = tempfile::tempdir().unwrap();
        let vectors = tempfile::tempdir().unwrap();
        let tk = toolkit(repo.path(), vectors.path()).await;

        let out = tk
            .dispatch(
                "search_code",
                "{\"query\":\"fn verify(token: &str) -> bool { token == \\\"x\\\" }\\n\",\"k\":1}",
            )
            .await;
        assert!(out.contains("--- src/auth.rs (lines 1-1) ---"), "unexpected: {out}");
    }

    #[tokio::test]
    async fn unknown_tool_reports_itself() {
        let repo = tempfile::tempdir().unwrap();
        let vectors = tempfile::tempdir().unwrap();
        let tk = toolkit(repo.path(), vectors.path()).await;
        assert_eq!(tk.dispatch("nope", "{}").await, "Unknown tool: nope");
    }

    #[test]
    fn wildcard_matcher_covers_star_and_question() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("*.md", "README.md"));
        assert!(!wildcard_match("*.md", "lib.rs"));
        assert!(wildcard_match("a?c", "abc"));
        assert!(!wildcard_match("a?c", "ac"));
    }

    #[test]
    fn limit_result_appends_guidance() {
        let out = limit_result("x".repeat(MAX_RESULT_CHARS + 10));
        assert!(out.contains("truncated"));
        assert!(limit_result("short".into()) == "short");
    }
}
