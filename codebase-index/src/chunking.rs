//! File chunking for embedding.
//!
//! Small files become a single chunk. Larger files are split into sliding
//! character windows with tail overlap; each chunk records 1-based
//! start/end lines derived from the preceding newline count.

use std::path::Path;

use tracing::warn;

/// Default window size in characters.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 4000;
/// Default tail carryover between consecutive windows.
pub const DEFAULT_OVERLAP: usize = 200;

/// One embeddable slice of a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Path relative to the repo root when `relative_to` was supplied.
    pub file_path: String,
    pub chunk_index: usize,
    /// 1-based, inclusive.
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

/// Splits one file into chunks. Unreadable or blank files yield no chunks.
///
/// `overlap >= max_chunk_chars` is clamped to `max_chunk_chars - 1`, which
/// keeps the window loop advancing.
pub fn chunk_file(
    path: &Path,
    max_chunk_chars: usize,
    overlap: usize,
    relative_to: Option<&Path>,
) -> Vec<Chunk> {
    let overlap = if overlap >= max_chunk_chars {
        max_chunk_chars.saturating_sub(1)
    } else {
        overlap
    };

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unreadable file skipped");
            return Vec::new();
        }
    };
    if text.trim().is_empty() {
        return Vec::new();
    }

    let rel_path = match relative_to {
        Some(root) => path
            .strip_prefix(root)
            .unwrap_or(path)
            .display()
            .to_string(),
        None => path.display().to_string(),
    };

    let chars: Vec<char> = text.chars().collect();
    let total_lines = text.lines().count().max(1);

    if chars.len() <= max_chunk_chars {
        return vec![Chunk {
            file_path: rel_path,
            chunk_index: 0,
            start_line: 1,
            end_line: total_lines,
            text,
        }];
    }

    let mut chunks = Vec::new();
    let mut char_pos = 0usize;
    let mut chunk_idx = 0usize;

    while char_pos < chars.len() {
        let end_pos = (char_pos + max_chunk_chars).min(chars.len());
        let chunk_text: String = chars[char_pos..end_pos].iter().collect();

        let start_line = chars[..char_pos].iter().filter(|c| **c == '\n').count() + 1;
        let end_line = start_line + chunk_text.matches('\n').count();

        chunks.push(Chunk {
            file_path: rel_path.clone(),
            chunk_index: chunk_idx,
            start_line,
            end_line,
            text: chunk_text,
        });
        chunk_idx += 1;

        char_pos = if end_pos < chars.len() {
            end_pos - overlap
        } else {
            end_pos
        };
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn small_file_is_a_single_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.rs");
        fs::write(&path, "line one\nline two\n").unwrap();

        let chunks = chunk_file(&path, 4000, 200, Some(dir.path()));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].file_path, "small.rs");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
    }

    #[test]
    fn large_file_is_windowed_with_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.rs");
        let line = "0123456789\n";
        fs::write(&path, line.repeat(100)).unwrap();

        let chunks = chunk_file(&path, 300, 50, Some(dir.path()));
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].start_line, 1);
        // Consecutive chunks share the overlap region.
        for pair in chunks.windows(2) {
            assert!(pair[1].start_line <= pair[0].end_line);
            assert_eq!(pair[1].chunk_index, pair[0].chunk_index + 1);
        }
    }

    #[test]
    fn pathological_overlap_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loopy.rs");
        fs::write(&path, "x".repeat(500)).unwrap();

        // overlap >= window would never advance without the clamp.
        let chunks = chunk_file(&path, 100, 100, None);
        assert!(!chunks.is_empty());
        assert!(chunks.len() < 600);
    }

    #[test]
    fn blank_and_missing_files_yield_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let blank = dir.path().join("blank.rs");
        fs::write(&blank, "  \n\t\n").unwrap();
        assert!(chunk_file(&blank, 4000, 200, None).is_empty());
        assert!(chunk_file(&dir.path().join("missing.rs"), 4000, 200, None).is_empty());
    }
}
