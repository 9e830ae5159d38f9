//! Codebase indexing and search tools for reviews.
//!
//! Indexes source files into the `codebase_chunks` vector table and exposes
//! four tools the review agent can call to look beyond the diff:
//! semantic search, regex grep, file read and directory listing.

pub mod chunking;
pub mod discovery;
pub mod errors;
pub mod index;
pub mod tools;

pub use chunking::{Chunk, chunk_file};
pub use discovery::walk_source_files;
pub use errors::IndexError;
pub use index::CodebaseIndex;
pub use tools::CodebaseToolkit;
