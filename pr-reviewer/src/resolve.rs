//! Fingerprint-based cross-round finding resolution.
//!
//! Resolution rules:
//! - exact fingerprint match          → PERSISTS
//! - prior fingerprint not in current → RESOLVED
//! - current fingerprint not in prior → NEW
//!
//! When two current findings share a fingerprint, the first occurrence
//! drives the classification; duplicates collapse downstream onto the same
//! node identifier.

use std::collections::{HashMap, HashSet};

use review_model::{Finding, PriorFinding};

/// A finding that persists from a prior round, with the node it maps to.
#[derive(Debug, Clone)]
pub struct PersistingFinding {
    pub finding: Finding,
    pub prior_node_id: String,
}

/// Result of resolving current findings against the prior round.
#[derive(Debug, Clone, Default)]
pub struct ResolutionResult {
    pub new: Vec<Finding>,
    pub persisting: Vec<PersistingFinding>,
    pub resolved: Vec<PriorFinding>,
}

/// Match current findings against the prior round using fingerprints.
pub fn resolve_findings_against_prior(
    current: &[Finding],
    prior: &[PriorFinding],
) -> ResolutionResult {
    let mut result = ResolutionResult::default();
    let prior_by_fp: HashMap<&str, &PriorFinding> =
        prior.iter().map(|p| (p.fingerprint.as_str(), p)).collect();
    let mut matched: HashSet<&str> = HashSet::new();

    for finding in current {
        let fp = finding.fingerprint();
        if let Some(prior_entry) = prior_by_fp.get(fp) {
            result.persisting.push(PersistingFinding {
                finding: finding.clone(),
                prior_node_id: prior_entry.node_id.clone(),
            });
            matched.insert(prior_entry.fingerprint.as_str());
        } else {
            result.new.push(finding.clone());
        }
    }

    for prior_entry in prior {
        if !matched.contains(prior_entry.fingerprint.as_str()) {
            result.resolved.push(prior_entry.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn finding(file: &str, category: &str, title: &str, line: u32) -> Finding {
        serde_json::from_value(json!({
            "id": "F-001", "severity": "HIGH", "confidence": 80, "category": category,
            "file": file, "line_start": line, "line_end": line, "title": title,
            "description": "d", "suggestion": "s", "evidence": "e", "grippy_note": "n"
        }))
        .unwrap()
    }

    fn prior_of(finding: &Finding, node_id: &str) -> PriorFinding {
        PriorFinding {
            node_id: node_id.to_string(),
            fingerprint: finding.fingerprint().to_string(),
            title: finding.title.clone(),
            properties: Map::new(),
        }
    }

    #[test]
    fn persisting_survives_line_shift_and_rewording() {
        let round1 = finding("src/auth.py", "security", "SQL injection", 12);
        let prior = vec![prior_of(&round1, "FINDING:aaa")];

        // Same tuple at a different line with rewritten metadata.
        let mut round2_json = json!({
            "id": "F-007", "severity": "LOW", "confidence": 10, "category": "security",
            "file": "src/auth.py", "line_start": 42, "line_end": 44, "title": "SQL INJECTION",
            "description": "rewritten", "suggestion": "other", "evidence": "x", "grippy_note": "n"
        });
        round2_json["title"] = json!("  SQL injection ");
        let round2: Finding = serde_json::from_value(round2_json).unwrap();

        let result = resolve_findings_against_prior(&[round2], &prior);
        assert_eq!(result.persisting.len(), 1);
        assert_eq!(result.persisting[0].prior_node_id, "FINDING:aaa");
        assert!(result.new.is_empty());
        assert!(result.resolved.is_empty());
    }

    #[test]
    fn trichotomy_is_disjoint_and_covering() {
        let keeps = finding("a.py", "security", "stays", 1);
        let goes = finding("a.py", "logic", "goes away", 2);
        let fresh = finding("b.py", "logic", "brand new", 3);

        let prior = vec![prior_of(&keeps, "FINDING:keep"), prior_of(&goes, "FINDING:gone")];
        let result = resolve_findings_against_prior(&[keeps.clone(), fresh.clone()], &prior);

        assert_eq!(result.new.len(), 1);
        assert_eq!(result.new[0].title, "brand new");
        assert_eq!(result.persisting.len(), 1);
        assert_eq!(result.resolved.len(), 1);
        assert_eq!(result.resolved[0].node_id, "FINDING:gone");

        // Disjoint fingerprint sets covering current ∪ prior.
        let mut seen: HashSet<String> = HashSet::new();
        for f in &result.new {
            assert!(seen.insert(f.fingerprint().to_string()));
        }
        for p in &result.persisting {
            assert!(seen.insert(p.finding.fingerprint().to_string()));
        }
        for r in &result.resolved {
            assert!(seen.insert(r.fingerprint.clone()));
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn duplicate_current_fingerprints_both_classify_the_same_way() {
        let a = finding("a.py", "security", "dup", 1);
        let b = finding("a.py", "security", "dup", 50);
        let result = resolve_findings_against_prior(&[a, b], &[]);
        assert_eq!(result.new.len(), 2);
        assert_eq!(result.new[0].fingerprint(), result.new[1].fingerprint());
    }
}
