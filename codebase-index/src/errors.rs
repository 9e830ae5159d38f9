//! Error types for codebase indexing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] graph_store::StoreError),

    #[error("nothing to index under {0}")]
    EmptyIndex(String),
}
