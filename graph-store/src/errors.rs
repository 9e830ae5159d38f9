//! Error types used across the persistence library.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("embedding provider error: {0}")]
    Provider(#[from] ai_llm_service::AiLlmError),

    #[error("vector size mismatch: got={got}, want={want}")]
    VectorSizeMismatch { got: usize, want: usize },

    #[error("unknown node: {0}")]
    UnknownNode(String),
}
