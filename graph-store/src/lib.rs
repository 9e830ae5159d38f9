//! Graph-aware persistence — SQLite for edges, JSONL vector tables for
//! semantic search.
//!
//! Both backends are embedded and file-based; no servers. Layout under the
//! configured data directory:
//!
//! ```text
//! <data_dir>/graph.db          edges + node_meta (rusqlite)
//! <data_dir>/vectors/          one JSONL file per vector table
//! ```
//!
//! The [`store::GraphStore`] facade owns both backends plus an
//! [`embed::Embedder`] and implements the write path (one transaction per
//! review, embed-then-append) and every read path the pipeline needs.

pub mod edge_store;
pub mod embed;
pub mod errors;
pub mod store;
pub mod vector_store;

pub use edge_store::{EdgeRow, EdgeStore, NodeMetaRow};
pub use embed::Embedder;
pub use errors::StoreError;
pub use store::GraphStore;
pub use vector_store::{VectorHit, VectorRecord, VectorTable};
