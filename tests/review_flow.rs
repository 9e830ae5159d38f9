//! Cross-round review lifecycle: transform → persist → prior query →
//! resolve → status update, over a real on-disk store.

use serde_json::{Value, json};

use graph_store::{Embedder, GraphStore};
use pr_reviewer::resolve_findings_against_prior;
use review_model::{FindingStatus, Review, review_to_graph};

fn finding(id: &str, file: &str, category: &str, title: &str, line: u32) -> Value {
    json!({
        "id": id, "severity": "HIGH", "confidence": 85, "category": category,
        "file": file, "line_start": line, "line_end": line + 2, "title": title,
        "description": "something is off", "suggestion": "fix it",
        "evidence": "let x = y;", "grippy_note": "hm"
    })
}

fn review(timestamp: &str, title: &str, findings: Vec<Value>) -> Review {
    Review::from_value(json!({
        "audit_type": "pr_review",
        "timestamp": timestamp,
        "model": "local-model",
        "pr": { "title": title, "author": "octocat", "branch": "feature \u{2192} main", "complexity_tier": "STANDARD" },
        "scope": {
            "files_in_diff": 2, "files_reviewed": 2, "coverage_percentage": 100.0,
            "governance_rules_applied": [], "modes_active": ["pr_review"]
        },
        "findings": findings,
        "escalations": [],
        "score": {
            "overall": 70,
            "breakdown": { "security": 60, "logic": 70, "governance": 80, "reliability": 70, "observability": 70 },
            "deductions": { "critical_count": 0, "high_count": 2, "medium_count": 0, "low_count": 0, "total_deduction": 30 }
        },
        "verdict": { "status": "PROVISIONAL", "threshold_applied": 70, "merge_blocking": false, "summary": "needs work" },
        "personality": {
            "tone_register": "grumpy", "opening_catchphrase": "again", "closing_line": "done",
            "ascii_art_key": "warning"
        },
        "meta": {
            "review_duration_ms": 10, "tokens_used": 100, "context_files_loaded": 0,
            "confidence_filter_suppressed": 0, "duplicate_filter_suppressed": 0
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn two_rounds_resolve_against_each_other() {
    let data_dir = tempfile::tempdir().unwrap();
    let mut store = GraphStore::open(data_dir.path(), Embedder::Noop { dim: 16 }).unwrap();
    let session = "pr-7";

    // Round 1: two findings.
    let round1 = review(
        "2026-02-01T10:00:00Z",
        "Add login throttle",
        vec![
            finding("F-001", "src/auth.py", "security", "SQL injection", 12),
            finding("F-002", "src/db.py", "reliability", "No retry on connect", 40),
        ],
    );
    let prior = store.get_prior_findings(session).unwrap();
    assert!(prior.is_empty());
    store
        .store_review(&review_to_graph(&round1), session)
        .await
        .unwrap();

    // Round 2: the SQL injection persists (shifted + reworded), the retry
    // finding is gone, and a new one appears.
    let mut shifted = finding("F-001", "src/auth.py", "security", "  SQL INJECTION ", 42);
    shifted["severity"] = json!("MEDIUM");
    shifted["description"] = json!("rewritten entirely");
    let round2 = review(
        "2026-02-01T11:00:00Z",
        "Add login throttle",
        vec![
            shifted,
            finding("F-002", "src/api.py", "logic", "Off-by-one in paging", 9),
        ],
    );

    let prior = store.get_prior_findings(session).unwrap();
    assert_eq!(prior.len(), 2);

    let resolution = resolve_findings_against_prior(&round2.findings, &prior);
    assert_eq!(resolution.persisting.len(), 1);
    assert_eq!(resolution.persisting[0].finding.title.trim(), "SQL INJECTION");
    assert_eq!(resolution.new.len(), 1);
    assert_eq!(resolution.new[0].title, "Off-by-one in paging");
    assert_eq!(resolution.resolved.len(), 1);
    assert_eq!(resolution.resolved[0].title, "No retry on connect");

    // Persist round 2, then mark the resolved prior finding.
    store
        .store_review(&review_to_graph(&round2), session)
        .await
        .unwrap();
    store
        .update_finding_status(&resolution.resolved[0].node_id, FindingStatus::Resolved)
        .unwrap();

    // Open set now: persisted round-1 finding + both round-2 findings,
    // minus the resolved one.
    let open = store.get_prior_findings(session).unwrap();
    assert!(open.iter().all(|p| p.title != "No retry on connect"));
    assert!(open.iter().any(|p| p.title.trim() == "SQL INJECTION" || p.title == "SQL injection"));
    assert!(open.iter().any(|p| p.title == "Off-by-one in paging"));
}

#[tokio::test]
async fn reopened_store_sees_previous_rounds() {
    let data_dir = tempfile::tempdir().unwrap();
    let session = "pr-9";

    {
        let mut store = GraphStore::open(data_dir.path(), Embedder::Noop { dim: 16 }).unwrap();
        let round1 = review(
            "2026-03-01T10:00:00Z",
            "Refactor cache",
            vec![finding("F-001", "src/cache.py", "logic", "Stale eviction", 5)],
        );
        store
            .store_review(&review_to_graph(&round1), session)
            .await
            .unwrap();
    }

    // Fresh process, same data dir: migrations re-run, prior survives.
    let store = GraphStore::open(data_dir.path(), Embedder::Noop { dim: 16 }).unwrap();
    let prior = store.get_prior_findings(session).unwrap();
    assert_eq!(prior.len(), 1);
    assert_eq!(prior[0].title, "Stale eviction");
    assert_eq!(prior[0].fingerprint.len(), 12);
}
