//! Review graph — typed nodes and directed edges for one review.
//!
//! `review_to_graph` is a pure function: the same review always yields the
//! same node identifiers in the same order, which is what makes persistence
//! idempotent and tests deterministic.

use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::schema::Review;

/// Directed edge kinds between graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeType {
    Violates,
    FoundIn,
    FixedBy,
    IsA,
    PrerequisiteFor,
    ExtractedFrom,
    Tendency,
    ReviewedBy,
    Resolves,
    PersistsAs,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Violates => "VIOLATES",
            EdgeType::FoundIn => "FOUND_IN",
            EdgeType::FixedBy => "FIXED_BY",
            EdgeType::IsA => "IS_A",
            EdgeType::PrerequisiteFor => "PREREQUISITE_FOR",
            EdgeType::ExtractedFrom => "EXTRACTED_FROM",
            EdgeType::Tendency => "TENDENCY",
            EdgeType::ReviewedBy => "REVIEWED_BY",
            EdgeType::Resolves => "RESOLVES",
            EdgeType::PersistsAs => "PERSISTS_AS",
        }
    }
}

/// Node kinds in the review graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Review,
    Finding,
    Rule,
    Pattern,
    Author,
    File,
    Suggestion,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Review => "REVIEW",
            NodeType::Finding => "FINDING",
            NodeType::Rule => "RULE",
            NodeType::Pattern => "PATTERN",
            NodeType::Author => "AUTHOR",
            NodeType::File => "FILE",
            NodeType::Suggestion => "SUGGESTION",
        }
    }
}

/// Lifecycle status carried in FINDING node properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingStatus {
    Open,
    Resolved,
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingStatus::Open => "open",
            FindingStatus::Resolved => "resolved",
        }
    }
}

/// Outgoing edge attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub edge_type: EdgeType,
    pub target_id: String,
    pub target_type: NodeType,
    pub metadata: Map<String, Value>,
}

impl Edge {
    fn to(edge_type: EdgeType, target_id: impl Into<String>, target_type: NodeType) -> Self {
        Self {
            edge_type,
            target_id: target_id.into(),
            target_type,
            metadata: Map::new(),
        }
    }
}

/// A graph node with its outgoing edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub node_type: NodeType,
    pub label: String,
    pub properties: Map<String, Value>,
    pub edges: Vec<Edge>,
    pub created_at: String,
    /// Review that produced this node; `None` only for the REVIEW node itself.
    pub source_review_id: Option<String>,
}

/// Graph representation of a single review.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewGraph {
    pub review_id: String,
    pub nodes: Vec<Node>,
    pub timestamp: String,
}

/// A prior-round finding as read back from the store, in the shape the
/// resolver consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorFinding {
    pub node_id: String,
    pub fingerprint: String,
    pub title: String,
    pub properties: Map<String, Value>,
}

/// Deterministic node id from type + content parts.
///
/// Format: `{TYPE}:{sha256_hex[:12]}` over `type:part1:part2:…`, so
/// identical content in two runs produces the same node.
pub fn node_id(node_type: NodeType, parts: &[&str]) -> String {
    let mut raw = String::from(node_type.as_str());
    for part in parts {
        raw.push(':');
        raw.push_str(part);
    }
    let digest = format!("{:x}", Sha256::digest(raw.as_bytes()));
    format!("{}:{}", node_type.as_str(), &digest[..12])
}

/// Transform a flat review into a graph of typed nodes and directed edges.
///
/// Nodes are deduplicated by id within the review, insertion order is
/// preserved, and every non-REVIEW node carries the review id as its source.
pub fn review_to_graph(review: &Review) -> ReviewGraph {
    let mut nodes: Vec<Node> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    let mut add = |nodes: &mut Vec<Node>, node: Node| {
        if seen.insert(node.id.clone()) {
            nodes.push(node);
        }
    };

    let review_nid = node_id(NodeType::Review, &[&review.timestamp, &review.pr.title]);

    let mut review_props = Map::new();
    review_props.insert("audit_type".into(), json!(review.audit_type.as_str()));
    review_props.insert("overall_score".into(), json!(review.score.overall));
    review_props.insert("verdict".into(), json!(review.verdict.status.as_str()));
    review_props.insert("model".into(), json!(review.model));

    add(
        &mut nodes,
        Node {
            id: review_nid.clone(),
            node_type: NodeType::Review,
            label: format!("Review: {}", review.pr.title),
            properties: review_props,
            edges: vec![Edge::to(
                EdgeType::ReviewedBy,
                node_id(NodeType::Author, &["agent", &review.model]),
                NodeType::Author,
            )],
            created_at: review.timestamp.clone(),
            source_review_id: None,
        },
    );

    let mut author_props = Map::new();
    author_props.insert("branch".into(), json!(review.pr.branch));
    add(
        &mut nodes,
        Node {
            id: node_id(NodeType::Author, &[&review.pr.author]),
            node_type: NodeType::Author,
            label: review.pr.author.clone(),
            properties: author_props,
            edges: Vec::new(),
            created_at: review.timestamp.clone(),
            source_review_id: Some(review_nid.clone()),
        },
    );

    for finding in &review.findings {
        let file_nid = node_id(NodeType::File, &[&finding.file]);
        add(
            &mut nodes,
            Node {
                id: file_nid.clone(),
                node_type: NodeType::File,
                label: finding.file.clone(),
                properties: Map::new(),
                edges: Vec::new(),
                created_at: review.timestamp.clone(),
                source_review_id: Some(review_nid.clone()),
            },
        );

        let line_start = finding.line_start.to_string();
        let suggestion_nid = node_id(
            NodeType::Suggestion,
            &[&finding.file, &line_start, &finding.suggestion],
        );
        add(
            &mut nodes,
            Node {
                id: suggestion_nid.clone(),
                node_type: NodeType::Suggestion,
                label: finding.suggestion.clone(),
                properties: Map::new(),
                edges: Vec::new(),
                created_at: review.timestamp.clone(),
                source_review_id: Some(review_nid.clone()),
            },
        );

        let mut finding_edges = vec![
            Edge::to(EdgeType::FoundIn, file_nid, NodeType::File),
            Edge::to(EdgeType::FixedBy, suggestion_nid, NodeType::Suggestion),
        ];

        if let Some(rule_id) = &finding.governance_rule_id {
            let rule_nid = node_id(NodeType::Rule, &[rule_id]);
            add(
                &mut nodes,
                Node {
                    id: rule_nid.clone(),
                    node_type: NodeType::Rule,
                    label: rule_id.clone(),
                    properties: Map::new(),
                    edges: Vec::new(),
                    created_at: review.timestamp.clone(),
                    source_review_id: Some(review_nid.clone()),
                },
            );
            finding_edges.push(Edge::to(EdgeType::Violates, rule_nid, NodeType::Rule));
        }

        let mut props = Map::new();
        props.insert("severity".into(), json!(finding.severity.as_str()));
        props.insert("confidence".into(), json!(finding.confidence));
        props.insert("category".into(), json!(finding.category.as_str()));
        props.insert("file".into(), json!(finding.file));
        props.insert("line_start".into(), json!(finding.line_start));
        props.insert("line_end".into(), json!(finding.line_end));
        props.insert("description".into(), json!(finding.description));
        props.insert("suggestion".into(), json!(finding.suggestion));
        props.insert("evidence".into(), json!(finding.evidence));
        props.insert("grippy_note".into(), json!(finding.grippy_note));
        if let Some(rule_id) = &finding.governance_rule_id {
            props.insert("governance_rule_id".into(), json!(rule_id));
        }
        props.insert("fingerprint".into(), json!(finding.fingerprint()));
        props.insert("status".into(), json!(FindingStatus::Open.as_str()));

        add(
            &mut nodes,
            Node {
                id: node_id(
                    NodeType::Finding,
                    &[&finding.file, &line_start, &finding.title],
                ),
                node_type: NodeType::Finding,
                label: finding.title.clone(),
                properties: props,
                edges: finding_edges,
                created_at: review.timestamp.clone(),
                source_review_id: Some(review_nid.clone()),
            },
        );
    }

    ReviewGraph {
        review_id: review_nid,
        nodes,
        timestamp: review.timestamp.clone(),
    }
}
