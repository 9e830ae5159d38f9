//! Source-file discovery for indexing.
//!
//! Prefers the VCS's own listing (`git ls-files --cached --others
//! --exclude-standard`), which respects ignore rules for free, and falls
//! back to a filesystem walk filtered by an ignore set when git is absent
//! or the root is not a repository.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;
use walkdir::WalkDir;

/// Extensions indexed by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &["rs", "py", "md", "toml", "yaml", "yml"];

/// Directory names skipped by the fallback walk.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    "target",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    "dist",
    "build",
];

/// Walks `root` for indexable source files, sorted for determinism.
pub fn walk_source_files(root: &Path, extensions: &[&str], ignore_dirs: &[&str]) -> Vec<PathBuf> {
    if let Some(paths) = git_listing(root, extensions) {
        debug!(files = paths.len(), "discovery via git ls-files");
        return paths;
    }

    let mut out = BTreeSet::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        !(entry.file_type().is_dir() && ignore_dirs.iter().any(|d| *d == name))
    });
    for entry in walker.flatten() {
        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            out.insert(entry.into_path());
        }
    }
    debug!(files = out.len(), "discovery via filesystem walk");
    out.into_iter().collect()
}

/// Tracked + untracked (non-ignored) files per git, or `None` when git is
/// unavailable or `root` is not a work tree.
fn git_listing(root: &Path, extensions: &[&str]) -> Option<Vec<PathBuf>> {
    let output = Command::new("git")
        .args(["ls-files", "--cached", "--others", "--exclude-standard"])
        .current_dir(root)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut paths: Vec<PathBuf> = stdout
        .lines()
        .map(|line| root.join(line))
        .filter(|p| has_extension(p, extensions) && p.is_file())
        .collect();
    paths.sort();
    Some(paths)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| *want == ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn fallback_walk_filters_extensions_and_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "pub fn a() {}").unwrap();
        fs::write(dir.path().join("src/notes.txt"), "not indexed").unwrap();
        fs::write(dir.path().join("target/debug/gen.rs"), "ignored").unwrap();

        let files = walk_source_files(dir.path(), DEFAULT_EXTENSIONS, DEFAULT_IGNORE_DIRS);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["src/lib.rs".to_string()]);
    }

    #[test]
    fn results_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.rs"), "b").unwrap();
        fs::write(dir.path().join("a.rs"), "a").unwrap();
        let files = walk_source_files(dir.path(), DEFAULT_EXTENSIONS, DEFAULT_IGNORE_DIRS);
        assert!(files.windows(2).all(|w| w[0] < w[1]));
    }
}
