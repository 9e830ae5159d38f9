//! The dual-store facade.
//!
//! Owns the SQLite edge store, the `nodes` vector table and an embedder.
//! Write path for one review: a single edge-store transaction, then node
//! text records embedded batch-first and appended (id-deduplicated) to the
//! vector table. Read paths serve the resolver and the review agent's
//! memory queries.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use review_model::{EdgeType, FindingStatus, Node, NodeType, PriorFinding, ReviewGraph};

use crate::edge_store::{EdgeRow, EdgeStore, NodeMetaRow};
use crate::embed::Embedder;
use crate::errors::StoreError;
use crate::vector_store::{VectorHit, VectorRecord, VectorTable};

const NODES_TABLE: &str = "nodes";

/// Graph-aware persistence — SQLite for edges, JSONL vectors for search.
pub struct GraphStore {
    edges: EdgeStore,
    nodes_table: VectorTable,
    embedder: Embedder,
    vectors_dir: PathBuf,
}

impl GraphStore {
    /// Opens both backends under `data_dir` (`graph.db` + `vectors/`).
    pub fn open(data_dir: &Path, embedder: Embedder) -> Result<Self, StoreError> {
        let edges = EdgeStore::open(&data_dir.join("graph.db"))?;
        let vectors_dir = data_dir.join("vectors");
        let nodes_table = VectorTable::open(&vectors_dir, NODES_TABLE)?;
        Ok(Self {
            edges,
            nodes_table,
            embedder,
            vectors_dir,
        })
    }

    /// Directory hosting the vector tables (shared with the codebase index).
    pub fn vectors_dir(&self) -> &Path {
        &self.vectors_dir
    }

    /// Persists a review graph — edges to SQLite, nodes to the vector table.
    pub async fn store_review(
        &mut self,
        graph: &ReviewGraph,
        session_id: &str,
    ) -> Result<(), StoreError> {
        self.edges.insert_graph(graph, session_id)?;

        let texts: Vec<String> = graph.nodes.iter().map(node_text).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let records: Vec<VectorRecord> = graph
            .nodes
            .iter()
            .zip(texts.into_iter())
            .zip(vectors.into_iter())
            .map(|((node, text), embedding)| {
                let mut extra = std::collections::BTreeMap::new();
                extra.insert("node_type".to_string(), json!(node.node_type.as_str()));
                extra.insert("label".to_string(), json!(node.label));
                extra.insert(
                    "review_id".to_string(),
                    json!(node.source_review_id.clone().unwrap_or_default()),
                );
                VectorRecord {
                    id: node.id.clone(),
                    text,
                    embedding,
                    extra,
                }
            })
            .collect();

        let appended = self.nodes_table.append(&records)?;
        info!(
            review_id = %graph.review_id,
            session_id,
            nodes = graph.nodes.len(),
            appended,
            "review stored"
        );
        Ok(())
    }

    /* --- Edge queries --- */

    pub fn edges_by_source(&self, source_id: &str) -> Result<Vec<EdgeRow>, StoreError> {
        self.edges.edges_by_source(source_id)
    }

    pub fn edges_by_target(&self, target_id: &str) -> Result<Vec<EdgeRow>, StoreError> {
        self.edges.edges_by_target(target_id)
    }

    pub fn edges_by_type(&self, edge_type: EdgeType) -> Result<Vec<EdgeRow>, StoreError> {
        self.edges.edges_by_type(edge_type)
    }

    pub fn edge_count(&self) -> Result<u64, StoreError> {
        self.edges.edge_count()
    }

    /* --- High-level queries --- */

    /// Finding patterns associated with an author.
    ///
    /// Walks AUTHOR node → (via review_id) → FINDING nodes in those reviews
    /// and returns finding properties with `title` injected.
    pub fn get_author_tendencies(&self, author: &str) -> Result<Vec<Map<String, Value>>, StoreError> {
        let author_rows = self.edges.nodes_by_type_and_label(NodeType::Author, author)?;
        if author_rows.is_empty() {
            return Ok(Vec::new());
        }

        let review_ids: Vec<String> = author_rows
            .iter()
            .filter_map(|row| row.review_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if review_ids.is_empty() {
            return Ok(Vec::new());
        }

        let findings = self
            .edges
            .nodes_by_type_in_reviews(NodeType::Finding, &review_ids)?;
        findings.iter().map(props_with_title).collect()
    }

    /// Findings associated with a file.
    ///
    /// Walks FILE node ← FOUND_IN ← FINDING nodes.
    pub fn get_patterns_for_file(&self, file_path: &str) -> Result<Vec<Map<String, Value>>, StoreError> {
        let file_rows = self.edges.nodes_by_type_and_label(NodeType::File, file_path)?;
        let Some(file_row) = file_rows.first() else {
            return Ok(Vec::new());
        };

        let incoming = self.edges.edges_by_target(&file_row.node_id)?;
        let finding_ids: Vec<String> = incoming
            .into_iter()
            .filter(|e| e.edge_type == EdgeType::FoundIn.as_str())
            .map(|e| e.source_id)
            .collect();
        if finding_ids.is_empty() {
            return Ok(Vec::new());
        }

        let findings = self.edges.nodes_by_ids(&finding_ids)?;
        findings.iter().map(props_with_title).collect()
    }

    /// Open findings for a PR session — call **before** `store_review` so
    /// only prior-round findings are returned.
    pub fn get_prior_findings(&self, session_id: &str) -> Result<Vec<PriorFinding>, StoreError> {
        let rows = self
            .edges
            .nodes_by_type_and_session(NodeType::Finding, session_id)?;

        let mut out = Vec::new();
        for row in rows {
            let props = parse_props(&row)?;
            if props.get("status").and_then(Value::as_str) != Some(FindingStatus::Open.as_str()) {
                continue;
            }
            let fingerprint = props
                .get("fingerprint")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if fingerprint.is_empty() {
                warn!(node_id = %row.node_id, "prior finding without fingerprint; skipped");
                continue;
            }
            out.push(PriorFinding {
                node_id: row.node_id,
                fingerprint,
                title: row.label,
                properties: props,
            });
        }
        debug!(session_id, prior = out.len(), "prior findings loaded");
        Ok(out)
    }

    /// Rewrites a finding's `status` in its properties blob.
    pub fn update_finding_status(
        &mut self,
        node_id: &str,
        status: FindingStatus,
    ) -> Result<(), StoreError> {
        let Some(row) = self.edges.node_meta(node_id)? else {
            return Err(StoreError::UnknownNode(node_id.to_string()));
        };
        let mut props = parse_props(&row)?;
        props.insert("status".to_string(), json!(status.as_str()));
        let encoded = serde_json::to_string(&props)
            .map_err(|e| StoreError::Parse(format!("properties encode: {e}")))?;
        self.edges.update_node_properties(node_id, &encoded)
    }

    /* --- Vector search --- */

    /// Semantic search over stored nodes.
    pub async fn search_nodes(&self, query: &str, k: usize) -> Result<Vec<VectorHit>, StoreError> {
        if !self.nodes_table.exists() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query).await?;
        self.nodes_table.search(&query_vec, k)
    }
}

/// Text rendering of a node for embedding: `"{TYPE}: {label} k1=v1 …"`.
fn node_text(node: &Node) -> String {
    let mut text = format!("{}: {}", node.node_type.as_str(), node.label);
    for (key, value) in &node.properties {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        text.push(' ');
        text.push_str(key);
        text.push('=');
        text.push_str(&rendered);
    }
    text
}

fn parse_props(row: &NodeMetaRow) -> Result<Map<String, Value>, StoreError> {
    serde_json::from_str(&row.properties)
        .map_err(|e| StoreError::Parse(format!("{}: properties decode: {e}", row.node_id)))
}

fn props_with_title(row: &NodeMetaRow) -> Result<Map<String, Value>, StoreError> {
    let mut props = parse_props(row)?;
    props.insert("title".to_string(), json!(row.label));
    Ok(props)
}
