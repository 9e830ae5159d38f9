//! Builds and queries the `codebase_chunks` vector table.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::{info, warn};

use graph_store::{Embedder, VectorHit, VectorRecord, VectorTable};

use crate::chunking::{DEFAULT_MAX_CHUNK_CHARS, DEFAULT_OVERLAP, chunk_file};
use crate::discovery::{DEFAULT_EXTENSIONS, DEFAULT_IGNORE_DIRS, walk_source_files};
use crate::errors::IndexError;

const CODEBASE_TABLE: &str = "codebase_chunks";

/// Hard cap on files per index build.
const MAX_INDEX_FILES: usize = 5_000;

/// Embedding batch size per round trip.
const EMBED_BATCH: usize = 64;

/// Indexes source files into the shared vector directory.
pub struct CodebaseIndex {
    repo_root: PathBuf,
    table: VectorTable,
    embedder: Embedder,
    extensions: Vec<&'static str>,
    ignore_dirs: Vec<&'static str>,
}

impl CodebaseIndex {
    /// Binds the index to `repo_root` and the `codebase_chunks` table under
    /// `vectors_dir`.
    pub fn open(
        repo_root: &Path,
        vectors_dir: &Path,
        embedder: Embedder,
    ) -> Result<Self, IndexError> {
        Ok(Self {
            repo_root: repo_root.to_path_buf(),
            table: VectorTable::open(vectors_dir, CODEBASE_TABLE)?,
            embedder,
            extensions: DEFAULT_EXTENSIONS.to_vec(),
            ignore_dirs: DEFAULT_IGNORE_DIRS.to_vec(),
        })
    }

    /// Whether a previous build left a populated table behind.
    pub fn is_indexed(&self) -> bool {
        self.table.exists()
    }

    /// Walk, chunk, embed and store source files. Returns the chunk count.
    ///
    /// The table is overwritten wholesale on every build, so a rebuild never
    /// leaves stale chunks from deleted files behind.
    pub async fn build(&self) -> Result<usize, IndexError> {
        let mut files = walk_source_files(&self.repo_root, &self.extensions, &self.ignore_dirs);
        if files.len() > MAX_INDEX_FILES {
            warn!(
                found = files.len(),
                cap = MAX_INDEX_FILES,
                "capping codebase indexing"
            );
            files.truncate(MAX_INDEX_FILES);
        }

        let mut chunks = Vec::new();
        for file in &files {
            chunks.extend(chunk_file(
                file,
                DEFAULT_MAX_CHUNK_CHARS,
                DEFAULT_OVERLAP,
                Some(&self.repo_root),
            ));
        }

        if chunks.is_empty() {
            warn!(root = %self.repo_root.display(), "no files found to index");
            return Err(IndexError::EmptyIndex(self.repo_root.display().to_string()));
        }

        let bar = ProgressBar::new(chunks.len() as u64).with_style(
            ProgressStyle::with_template("indexing {pos}/{len} chunks")
                .expect("static progress template"),
        );

        let mut records = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            for (chunk, embedding) in batch.iter().zip(vectors) {
                let mut extra = std::collections::BTreeMap::new();
                extra.insert("file_path".to_string(), json!(chunk.file_path));
                extra.insert("chunk_index".to_string(), json!(chunk.chunk_index));
                extra.insert("start_line".to_string(), json!(chunk.start_line));
                extra.insert("end_line".to_string(), json!(chunk.end_line));
                records.push(VectorRecord {
                    id: format!("{}#{}", chunk.file_path, chunk.chunk_index),
                    text: chunk.text.clone(),
                    embedding,
                    extra,
                });
            }
            bar.inc(batch.len() as u64);
        }
        bar.finish_and_clear();

        self.table.overwrite(&records)?;
        info!(
            files = files.len(),
            chunks = records.len(),
            "codebase indexed"
        );
        Ok(records.len())
    }

    /// Vector similarity search over indexed chunks.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<VectorHit>, IndexError> {
        if !self.is_indexed() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query).await?;
        Ok(self.table.search(&query_vec, k)?)
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    async fn built_index(dir: &Path, vectors: &Path) -> CodebaseIndex {
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(
            dir.join("src/auth.rs"),
            "fn check_password(p: &str) -> bool { p == \"hunter2\" }\n",
        )
        .unwrap();
        fs::write(dir.join("src/db.rs"), "fn connect() {}\n").unwrap();

        let index = CodebaseIndex::open(dir, vectors, Embedder::Noop { dim: 16 }).unwrap();
        index.build().await.unwrap();
        index
    }

    #[tokio::test]
    async fn build_then_search_round_trips() {
        let repo = tempfile::tempdir().unwrap();
        let vectors = tempfile::tempdir().unwrap();
        let index = built_index(repo.path(), vectors.path()).await;

        assert!(index.is_indexed());
        let hits = index
            .search("fn check_password(p: &str) -> bool { p == \"hunter2\" }\n", 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.extra["file_path"], json!("src/auth.rs"));
    }

    #[tokio::test]
    async fn rebuild_overwrites_stale_chunks() {
        let repo = tempfile::tempdir().unwrap();
        let vectors = tempfile::tempdir().unwrap();
        let index = built_index(repo.path(), vectors.path()).await;

        fs::remove_file(repo.path().join("src/db.rs")).unwrap();
        let count = index.build().await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn empty_root_is_an_error() {
        let repo = tempfile::tempdir().unwrap();
        let vectors = tempfile::tempdir().unwrap();
        let index =
            CodebaseIndex::open(repo.path(), vectors.path(), Embedder::Noop { dim: 8 }).unwrap();
        assert!(matches!(index.build().await, Err(IndexError::EmptyIndex(_))));
        assert!(!index.is_indexed());
    }
}
