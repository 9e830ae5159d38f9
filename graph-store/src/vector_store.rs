//! JSONL vector tables with in-process cosine top-k.
//!
//! One table is one file under the `vectors/` directory: one JSON record per
//! line carrying `id`, `text`, `embedding` and any extra metadata fields.
//! Tables are created lazily on first write. The first record fixes the
//! table's dimension; later writes must match it.
//!
//! Two access patterns:
//! - `append` with id-dedup against the current table (the `nodes` table),
//! - `overwrite` replacing the whole table (the `codebase_chunks` table).

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::StoreError;

/// Single record stored in a vector table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Stable external id; the dedup key on append.
    pub id: String,
    /// Text the embedding was computed from.
    pub text: String,
    /// Dense embedding; same dimension across the whole table.
    pub embedding: Vec<f32>,
    /// Extra metadata; unknown fields are preserved.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A search hit: similarity score plus the matching record.
#[derive(Clone, Debug)]
pub struct VectorHit {
    pub score: f32,
    pub record: VectorRecord,
}

/// One JSONL-backed vector table.
#[derive(Clone, Debug)]
pub struct VectorTable {
    path: PathBuf,
    name: String,
}

impl VectorTable {
    /// Binds a table under `dir` (created if absent). The file itself is
    /// created lazily by the first write.
    pub fn open(dir: &Path, name: &str) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(format!("{name}.jsonl")),
            name: name.to_string(),
        })
    }

    /// Whether the table has been written at least once.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the full table. Missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<VectorRecord>, StoreError> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut out = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let rec: VectorRecord = serde_json::from_str(&line)
                .map_err(|e| StoreError::Parse(format!("{}: line {} parse error: {}", self.name, i + 1, e)))?;
            out.push(rec);
        }

        debug!(table = %self.name, records = out.len(), "vector table loaded");
        Ok(out)
    }

    /// Current id set (empty for an unwritten table).
    pub fn ids(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.read_all()?.into_iter().map(|r| r.id).collect())
    }

    /// Replaces the whole table with `records`.
    pub fn overwrite(&self, records: &[VectorRecord]) -> Result<(), StoreError> {
        check_dimensions(records, None)?;
        let mut writer = BufWriter::new(File::create(&self.path)?);
        for rec in records {
            serde_json::to_writer(&mut writer, rec)
                .map_err(|e| StoreError::Parse(format!("{}: encode error: {}", self.name, e)))?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        info!(table = %self.name, records = records.len(), "vector table overwritten");
        Ok(())
    }

    /// Appends `records`, skipping ids already present in the table.
    ///
    /// Returns the number of records actually written.
    pub fn append(&self, records: &[VectorRecord]) -> Result<usize, StoreError> {
        let existing = self.read_all()?;
        let want_dim = existing.first().map(|r| r.embedding.len());
        check_dimensions(records, want_dim)?;

        let seen: HashSet<&str> = existing.iter().map(|r| r.id.as_str()).collect();
        let fresh: Vec<&VectorRecord> = records.iter().filter(|r| !seen.contains(r.id.as_str())).collect();
        if fresh.is_empty() {
            debug!(table = %self.name, "append: nothing new");
            return Ok(0);
        }

        let mut writer = BufWriter::new(fs::OpenOptions::new().create(true).append(true).open(&self.path)?);
        for rec in &fresh {
            serde_json::to_writer(&mut writer, rec)
                .map_err(|e| StoreError::Parse(format!("{}: encode error: {}", self.name, e)))?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        info!(table = %self.name, appended = fresh.len(), skipped = records.len() - fresh.len(), "vector table appended");
        Ok(fresh.len())
    }

    /// Cosine top-k over the whole table.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>, StoreError> {
        let records = self.read_all()?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<VectorHit> = records
            .into_iter()
            .map(|record| VectorHit {
                score: cosine(query, &record.embedding),
                record,
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }
}

fn check_dimensions(records: &[VectorRecord], want: Option<usize>) -> Result<(), StoreError> {
    let mut want = want;
    for rec in records {
        match want {
            Some(dim) if rec.embedding.len() != dim => {
                return Err(StoreError::VectorSizeMismatch {
                    got: rec.embedding.len(),
                    want: dim,
                });
            }
            Some(_) => {}
            None => want = Some(rec.embedding.len()),
        }
    }
    Ok(())
}

/// Cosine similarity; zero-norm vectors score 0.
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        warn!(got = b.len(), want = a.len(), "cosine over mismatched dimensions");
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(id: &str, v: &[f32]) -> VectorRecord {
        VectorRecord {
            id: id.into(),
            text: format!("text for {id}"),
            embedding: v.to_vec(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn append_dedups_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let table = VectorTable::open(dir.path(), "nodes").unwrap();
        assert!(!table.exists());

        let wrote = table.append(&[rec("a", &[1.0, 0.0]), rec("b", &[0.0, 1.0])]).unwrap();
        assert_eq!(wrote, 2);

        let wrote = table.append(&[rec("a", &[1.0, 0.0]), rec("c", &[1.0, 1.0])]).unwrap();
        assert_eq!(wrote, 1);
        assert_eq!(table.read_all().unwrap().len(), 3);
    }

    #[test]
    fn overwrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let table = VectorTable::open(dir.path(), "codebase_chunks").unwrap();
        table.overwrite(&[rec("a", &[1.0, 0.0])]).unwrap();
        table.overwrite(&[rec("b", &[0.0, 1.0]), rec("c", &[1.0, 1.0])]).unwrap();
        let ids = table.ids().unwrap();
        assert!(!ids.contains("a"));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let table = VectorTable::open(dir.path(), "nodes").unwrap();
        table.append(&[rec("a", &[1.0, 0.0])]).unwrap();
        let err = table.append(&[rec("b", &[1.0, 0.0, 0.0])]).unwrap_err();
        assert!(matches!(err, StoreError::VectorSizeMismatch { got: 3, want: 2 }));
    }

    #[test]
    fn search_ranks_by_cosine() {
        let dir = tempfile::tempdir().unwrap();
        let table = VectorTable::open(dir.path(), "nodes").unwrap();
        table
            .append(&[rec("x", &[1.0, 0.0]), rec("y", &[0.0, 1.0]), rec("xy", &[1.0, 1.0])])
            .unwrap();

        let hits = table.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.id, "x");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn extra_fields_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let table = VectorTable::open(dir.path(), "chunks").unwrap();
        let mut record = rec("a", &[0.5, 0.5]);
        record.extra.insert("file_path".into(), json!("src/lib.rs"));
        record.extra.insert("start_line".into(), json!(10));
        table.overwrite(&[record]).unwrap();

        let back = table.read_all().unwrap();
        assert_eq!(back[0].extra["file_path"], json!("src/lib.rs"));
        assert_eq!(back[0].extra["start_line"], json!(10));
    }
}
