//! PR review delivery: diff addressability, finding lifecycle and posting.
//!
//! The flow for one round:
//! 1. `diff::parse_diff_lines` turns the unified diff into the set of
//!    right-side lines the VCS will accept inline comments on.
//! 2. `classify` splits findings into inline-eligible and off-diff.
//! 3. `resolve` matches current findings against the prior round by
//!    fingerprint (new / persisting / resolved).
//! 4. `post` submits inline review batches (with 422 fallback), upserts
//!    the summary dashboard, and `threads` auto-resolves stale threads.

pub mod classify;
pub mod comment;
pub mod diff;
pub mod errors;
pub mod github;
pub mod post;
pub mod resolve;
pub mod summary;
pub mod threads;

pub use classify::classify_findings;
pub use comment::{build_review_comment, finding_marker};
pub use diff::{MAX_DIFF_CHARS, parse_diff_lines, truncate_diff};
pub use errors::{Error, PrResult, ProviderError};
pub use github::{GitHubClient, IssueComment, PullMeta, ReviewComment, ReviewThread};
pub use post::{PostParams, PostedReview, REVIEW_BATCH_SIZE, post_review, post_review_batched};
pub use resolve::{PersistingFinding, ResolutionResult, resolve_findings_against_prior};
pub use summary::{SummaryInput, format_summary_comment, summary_marker};
pub use threads::{resolve_threads, threads_for_fingerprints};
