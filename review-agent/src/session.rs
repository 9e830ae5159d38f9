//! Session transcript — lightweight JSONL run history per PR session.
//!
//! One line per completed run: `{session_id, created_at, summary}`. The
//! last N summaries for the active session are folded into the agent's
//! context so later rounds on the same PR see what earlier rounds said.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::AgentError;

/// Head of each run's output kept in the transcript.
const SUMMARY_CHARS: usize = 400;

#[derive(Debug, Serialize, Deserialize)]
struct TranscriptEntry {
    session_id: String,
    created_at: String,
    summary: String,
}

/// Append-only run log scoped to one session id.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
    session_id: String,
    num_history_runs: usize,
}

impl SessionLog {
    /// Binds the transcript file under `dir` (created if absent).
    pub fn open(dir: &Path, session_id: &str, num_history_runs: usize) -> Result<Self, AgentError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| AgentError::Session(format!("create {}: {e}", dir.display())))?;
        Ok(Self {
            path: dir.join("sessions.jsonl"),
            session_id: session_id.to_string(),
            num_history_runs,
        })
    }

    /// Context block with the last N run summaries, or `None` when the
    /// session has no history yet.
    pub fn history_context(&self) -> Option<String> {
        if !self.path.is_file() || self.num_history_runs == 0 {
            return None;
        }
        let file = File::open(&self.path).ok()?;
        let reader = BufReader::new(file);

        let mut entries: Vec<TranscriptEntry> = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TranscriptEntry>(&line) {
                Ok(entry) if entry.session_id == self.session_id => entries.push(entry),
                Ok(_) => {}
                Err(e) => warn!(line = i + 1, error = %e, "skipping malformed transcript line"),
            }
        }
        if entries.is_empty() {
            return None;
        }

        let tail = entries.split_off(entries.len().saturating_sub(self.num_history_runs));
        let mut block = String::from("<prior_runs>\n");
        for entry in &tail {
            block.push_str(&format!("[{}] {}\n", entry.created_at, entry.summary));
        }
        block.push_str("</prior_runs>");
        debug!(session_id = %self.session_id, runs = tail.len(), "history context loaded");
        Some(block)
    }

    /// Records one completed run.
    pub fn append(&self, output: &str) -> Result<(), AgentError> {
        let entry = TranscriptEntry {
            session_id: self.session_id.clone(),
            created_at: chrono::Utc::now()
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            summary: output.chars().take(SUMMARY_CHARS).collect(),
        };
        let line = serde_json::to_string(&entry)
            .map_err(|e| AgentError::Session(format!("encode entry: {e}")))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AgentError::Session(format!("open {}: {e}", self.path.display())))?;
        writeln!(file, "{line}")
            .map_err(|e| AgentError::Session(format!("write transcript: {e}")))?;
        Ok(())
    }
}
