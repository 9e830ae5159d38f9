//! SQLite edge store — the relational half of the dual store.
//!
//! Tables:
//! - `edges(source_id, edge_type, target_id, metadata)` unique on the
//!   triple, indexed on all three lookup columns.
//! - `node_meta(node_id PRIMARY KEY, node_type, label, properties,
//!   review_id, session_id, created_at)`.
//!
//! Schema migrations are a versioned, append-only list applied at open.
//! "duplicate column" / "already exists" are expected successes; anything
//! else propagates. No destructive statements, ever.

use std::path::Path;

use rusqlite::{Connection, params, params_from_iter};
use tracing::{debug, info, warn};

use review_model::{EdgeType, NodeType, ReviewGraph};

use crate::errors::StoreError;

const EDGE_TABLE_SQL: &str = "
CREATE TABLE IF NOT EXISTS edges (
    source_id TEXT NOT NULL,
    edge_type TEXT NOT NULL,
    target_id TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    UNIQUE(source_id, edge_type, target_id)
)";

const EDGE_INDEXES_SQL: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id)",
    "CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id)",
    "CREATE INDEX IF NOT EXISTS idx_edges_type ON edges(edge_type)",
];

const NODE_META_TABLE_SQL: &str = "
CREATE TABLE IF NOT EXISTS node_meta (
    node_id TEXT PRIMARY KEY,
    node_type TEXT NOT NULL,
    label TEXT NOT NULL,
    properties TEXT NOT NULL DEFAULT '{}',
    review_id TEXT,
    session_id TEXT,
    created_at TEXT NOT NULL
)";

/// v1.1: session_id for PR-scoped finding lifecycle. Kept even though the
/// base DDL now carries the column, so databases created by older builds
/// upgrade in place.
const MIGRATIONS: [&str; 1] = ["ALTER TABLE node_meta ADD COLUMN session_id TEXT"];

/// One row of the `edges` table.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRow {
    pub source_id: String,
    pub edge_type: String,
    pub target_id: String,
    pub metadata: String,
}

/// One row of the `node_meta` table.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMetaRow {
    pub node_id: String,
    pub node_type: String,
    pub label: String,
    pub properties: String,
    pub review_id: Option<String>,
    pub session_id: Option<String>,
    pub created_at: String,
}

/// Owner of the SQLite connection. All writes for one review happen in a
/// single transaction.
pub struct EdgeStore {
    conn: Connection,
}

impl EdgeStore {
    /// Opens (or creates) the store at `path`, applying migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;
        info!(path = %path.display(), "edge store opened");
        Ok(store)
    }

    /// In-memory store, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), StoreError> {
        self.conn.execute(EDGE_TABLE_SQL, [])?;
        for idx_sql in EDGE_INDEXES_SQL {
            self.conn.execute(idx_sql, [])?;
        }
        self.conn.execute(NODE_META_TABLE_SQL, [])?;

        for migration in MIGRATIONS {
            match self.conn.execute(migration, []) {
                Ok(_) => debug!(migration, "migration applied"),
                Err(err) => {
                    let msg = err.to_string().to_lowercase();
                    if msg.contains("duplicate column") || msg.contains("already exists") {
                        debug!(migration, "migration already applied");
                    } else {
                        return Err(err.into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Persists a review graph: node metadata + edges, ignore-on-conflict,
    /// one transaction.
    pub fn insert_graph(&mut self, graph: &ReviewGraph, session_id: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut node_stmt = tx.prepare(
                "INSERT OR IGNORE INTO node_meta \
                 (node_id, node_type, label, properties, review_id, session_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            let mut edge_stmt = tx.prepare(
                "INSERT OR IGNORE INTO edges (source_id, edge_type, target_id, metadata) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            for node in &graph.nodes {
                let properties = serde_json::to_string(&node.properties)
                    .map_err(|e| StoreError::Parse(format!("node properties encode: {e}")))?;
                node_stmt.execute(params![
                    node.id,
                    node.node_type.as_str(),
                    node.label,
                    properties,
                    node.source_review_id,
                    session_id,
                    node.created_at,
                ])?;

                for edge in &node.edges {
                    let metadata = serde_json::to_string(&edge.metadata)
                        .map_err(|e| StoreError::Parse(format!("edge metadata encode: {e}")))?;
                    edge_stmt.execute(params![
                        node.id,
                        edge.edge_type.as_str(),
                        edge.target_id,
                        metadata,
                    ])?;
                }
            }
        }
        tx.commit()?;
        debug!(review_id = %graph.review_id, nodes = graph.nodes.len(), "graph stored");
        Ok(())
    }

    /// Total number of edge rows.
    pub fn edge_count(&self) -> Result<u64, StoreError> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All edges originating from `source_id`.
    pub fn edges_by_source(&self, source_id: &str) -> Result<Vec<EdgeRow>, StoreError> {
        self.query_edges(
            "SELECT source_id, edge_type, target_id, metadata FROM edges WHERE source_id = ?1",
            source_id,
        )
    }

    /// All edges pointing at `target_id`.
    pub fn edges_by_target(&self, target_id: &str) -> Result<Vec<EdgeRow>, StoreError> {
        self.query_edges(
            "SELECT source_id, edge_type, target_id, metadata FROM edges WHERE target_id = ?1",
            target_id,
        )
    }

    /// All edges of a given type.
    pub fn edges_by_type(&self, edge_type: EdgeType) -> Result<Vec<EdgeRow>, StoreError> {
        self.query_edges(
            "SELECT source_id, edge_type, target_id, metadata FROM edges WHERE edge_type = ?1",
            edge_type.as_str(),
        )
    }

    fn query_edges(&self, sql: &str, param: &str) -> Result<Vec<EdgeRow>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![param], |row| {
            Ok(EdgeRow {
                source_id: row.get(0)?,
                edge_type: row.get(1)?,
                target_id: row.get(2)?,
                metadata: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Fetches one node-meta row.
    pub fn node_meta(&self, node_id: &str) -> Result<Option<NodeMetaRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT node_id, node_type, label, properties, review_id, session_id, created_at \
             FROM node_meta WHERE node_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![node_id], map_node_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Node-meta rows of a type with an exact label.
    pub fn nodes_by_type_and_label(
        &self,
        node_type: NodeType,
        label: &str,
    ) -> Result<Vec<NodeMetaRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT node_id, node_type, label, properties, review_id, session_id, created_at \
             FROM node_meta WHERE node_type = ?1 AND label = ?2",
        )?;
        let rows = stmt.query_map(params![node_type.as_str(), label], map_node_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Node-meta rows of a type within a session.
    pub fn nodes_by_type_and_session(
        &self,
        node_type: NodeType,
        session_id: &str,
    ) -> Result<Vec<NodeMetaRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT node_id, node_type, label, properties, review_id, session_id, created_at \
             FROM node_meta WHERE node_type = ?1 AND session_id = ?2",
        )?;
        let rows = stmt.query_map(params![node_type.as_str(), session_id], map_node_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Node-meta rows of a type whose review_id is in `review_ids`.
    pub fn nodes_by_type_in_reviews(
        &self,
        node_type: NodeType,
        review_ids: &[String],
    ) -> Result<Vec<NodeMetaRow>, StoreError> {
        if review_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = placeholders(review_ids.len(), 2);
        let sql = format!(
            "SELECT node_id, node_type, label, properties, review_id, session_id, created_at \
             FROM node_meta WHERE node_type = ?1 AND review_id IN ({placeholders})"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let params_iter =
            std::iter::once(node_type.as_str().to_string()).chain(review_ids.iter().cloned());
        let rows = stmt.query_map(params_from_iter(params_iter), map_node_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Node-meta rows by id list.
    pub fn nodes_by_ids(&self, node_ids: &[String]) -> Result<Vec<NodeMetaRow>, StoreError> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = placeholders(node_ids.len(), 1);
        let sql = format!(
            "SELECT node_id, node_type, label, properties, review_id, session_id, created_at \
             FROM node_meta WHERE node_id IN ({placeholders})"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(node_ids.iter().cloned()), map_node_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Rewrites the JSON properties blob of one node.
    pub fn update_node_properties(
        &mut self,
        node_id: &str,
        properties_json: &str,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE node_meta SET properties = ?1 WHERE node_id = ?2",
            params![properties_json, node_id],
        )?;
        if changed == 0 {
            warn!(node_id, "update_node_properties: no such node");
            return Err(StoreError::UnknownNode(node_id.to_string()));
        }
        Ok(())
    }
}

fn map_node_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NodeMetaRow> {
    Ok(NodeMetaRow {
        node_id: row.get(0)?,
        node_type: row.get(1)?,
        label: row.get(2)?,
        properties: row.get(3)?,
        review_id: row.get(4)?,
        session_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// `?N,?N+1,…` placeholder list starting at index `start`.
fn placeholders(count: usize, start: usize) -> String {
    (0..count)
        .map(|i| format!("?{}", start + i))
        .collect::<Vec<_>>()
        .join(",")
}
