//! Typed review records and the review graph.
//!
//! Two layers:
//! - `schema`: the validated, immutable review record produced by the LLM,
//!   including per-finding fingerprints for cross-round matching.
//! - `graph`: a deterministic transform of a flat review into typed nodes
//!   and directed edges, ready for the dual-store persistence layer.

pub mod errors;
pub mod graph;
pub mod schema;

pub use errors::SchemaError;
pub use graph::{
    Edge, EdgeType, FindingStatus, Node, NodeType, PriorFinding, ReviewGraph, node_id,
    review_to_graph,
};
pub use schema::{
    AuditType, ComplexityTier, Escalation, Finding, FindingCategory, Personality, PrMetadata,
    Review, ReviewMeta, ReviewScope, Score, Severity, Verdict, VerdictStatus,
};
