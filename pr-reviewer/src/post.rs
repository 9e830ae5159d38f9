//! Post a review round: inline batches, 422 fallback, summary upsert.

use tracing::{info, warn};

use review_model::{Finding, PriorFinding};

use crate::classify::classify_findings;
use crate::comment::build_review_comment;
use crate::diff::parse_diff_lines;
use crate::errors::PrResult;
use crate::github::GitHubClient;
use crate::resolve::{ResolutionResult, resolve_findings_against_prior};
use crate::summary::{SummaryInput, format_summary_comment, summary_marker};

/// Max inline comments per submitted review; [`post_review`] submits at
/// this API limit.
pub const REVIEW_BATCH_SIZE: usize = 25;

/// Inputs for one posting round.
#[derive(Debug)]
pub struct PostParams<'a> {
    pub repo: &'a str,
    pub pr_number: u64,
    pub findings: &'a [Finding],
    pub prior_findings: &'a [PriorFinding],
    pub head_sha: &'a str,
    pub diff: &'a str,
    pub score: u8,
    pub verdict: &'a str,
}

/// What a posting round produced, for the caller's status updates.
#[derive(Debug)]
pub struct PostedReview {
    pub resolution: ResolutionResult,
    pub inline_posted: usize,
    pub off_diff: Vec<Finding>,
    pub summary_edited: bool,
}

/// Post the review as inline comments plus the summary dashboard.
///
/// Fork PRs route every finding off-diff, since the CI token is typically
/// read-only for the inline review API. A 422 on one batch moves that
/// batch off-diff and continues; any other HTTP failure propagates.
pub async fn post_review(
    client: &GitHubClient,
    params: PostParams<'_>,
) -> PrResult<PostedReview> {
    post_review_batched(client, params, REVIEW_BATCH_SIZE).await
}

/// Same flow as [`post_review`] with an explicit inline batch size.
pub async fn post_review_batched(
    client: &GitHubClient,
    params: PostParams<'_>,
    batch_size: usize,
) -> PrResult<PostedReview> {
    let batch_size = batch_size.max(1);
    let resolution = resolve_findings_against_prior(params.findings, params.prior_findings);

    let meta = client.get_pull_meta(params.repo, params.pr_number).await?;
    let is_fork = meta.is_fork();

    let diff_lines = parse_diff_lines(params.diff);
    let (mut inline, mut off_diff) = classify_findings(params.findings, &diff_lines);

    if is_fork {
        info!(repo = params.repo, pr = params.pr_number, "fork PR — routing all findings off-diff");
        off_diff = params.findings.to_vec();
        inline = Vec::new();
    }

    let mut inline_posted = 0usize;
    if !inline.is_empty() {
        let comments: Vec<_> = inline.iter().map(build_review_comment).collect();
        for (batch_no, batch) in comments.chunks(batch_size).enumerate() {
            match client
                .create_review(params.repo, params.pr_number, batch)
                .await
            {
                Ok(()) => inline_posted += batch.len(),
                Err(err) if err.is_unprocessable() => {
                    warn!(batch = batch_no, size = batch.len(), "422 on review batch — moving off-diff");
                    let start = batch_no * batch_size;
                    off_diff.extend(inline[start..(start + batch.len())].iter().cloned());
                }
                Err(err) => return Err(err),
            }
        }
    }

    let summary = format_summary_comment(&SummaryInput {
        score: params.score,
        verdict: params.verdict,
        finding_count: params.findings.len(),
        new_count: resolution.new.len(),
        persists_count: resolution.persisting.len(),
        resolved_count: resolution.resolved.len(),
        off_diff_findings: &off_diff,
        head_sha: params.head_sha,
        pr_number: params.pr_number,
    });

    // Upsert: edit the marked comment if one exists, else create it.
    let marker = summary_marker(params.pr_number);
    let mut summary_edited = false;
    for comment in client
        .list_issue_comments(params.repo, params.pr_number)
        .await?
    {
        if comment.body.contains(&marker) {
            client
                .edit_issue_comment(params.repo, comment.id, &summary)
                .await?;
            summary_edited = true;
            break;
        }
    }
    if !summary_edited {
        client
            .create_issue_comment(params.repo, params.pr_number, &summary)
            .await?;
    }

    info!(
        inline_posted,
        off_diff = off_diff.len(),
        new = resolution.new.len(),
        persists = resolution.persisting.len(),
        resolved = resolution.resolved.len(),
        summary_edited,
        "review posted"
    );

    Ok(PostedReview {
        resolution,
        inline_posted,
        off_diff,
        summary_edited,
    })
}
