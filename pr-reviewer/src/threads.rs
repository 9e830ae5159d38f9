//! Review-thread auto-resolution.
//!
//! After the resolver marks findings resolved, the threads that carry
//! their fingerprint markers are closed. One failing id logs and moves on;
//! the caller gets the count actually resolved.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::comment::finding_marker;
use crate::errors::PrResult;
use crate::github::GitHubClient;

/// Resolve the given thread ids, continuing past per-id failures.
///
/// Returns the number of threads successfully resolved.
pub async fn resolve_threads(client: &GitHubClient, thread_ids: &[String]) -> usize {
    let mut resolved = 0usize;
    for thread_id in thread_ids {
        match client.resolve_review_thread(thread_id).await {
            Ok(true) => resolved += 1,
            Ok(false) => warn!(thread_id, "thread did not resolve"),
            Err(err) => warn!(thread_id, error = %err, "failed to resolve thread"),
        }
    }
    info!(requested = thread_ids.len(), resolved, "thread resolution done");
    resolved
}

/// Find the unresolved threads whose comments carry a marker for one of
/// the given fingerprints.
pub async fn threads_for_fingerprints(
    client: &GitHubClient,
    repo: &str,
    pr_number: u64,
    fingerprints: &[String],
) -> PrResult<Vec<String>> {
    if fingerprints.is_empty() {
        return Ok(Vec::new());
    }
    let markers: HashSet<String> = fingerprints.iter().map(|fp| finding_marker(fp)).collect();

    let threads = client.list_review_threads(repo, pr_number).await?;
    let ids = threads
        .into_iter()
        .filter(|t| !t.is_resolved)
        .filter(|t| {
            t.comment_bodies
                .iter()
                .any(|body| markers.iter().any(|marker| body.contains(marker)))
        })
        .map(|t| t.id)
        .collect();
    Ok(ids)
}
