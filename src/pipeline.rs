//! The staged review pipeline.
//!
//! Stage order for one CI invocation: event → transport → (index) → agent
//! → diff fetch → diff cap → agent run under deadline → model override →
//! prior query + persist → post → status updates → CI outputs → exit.
//!
//! Partial-failure policy: only config, diff-fetch, parse and timeout
//! failures (and a merge-blocking verdict) exit nonzero. Persistence,
//! posting, status updates and indexing are best-effort — they warn and
//! the run continues, so an infrastructure hiccup cannot silence a review
//! that otherwise succeeded.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use ai_llm_service::{LlmModelConfig, LlmProvider, LlmServiceProfiles};
use codebase_index::{CodebaseIndex, CodebaseToolkit};
use graph_store::{Embedder, GraphStore};
use pr_reviewer::{
    GitHubClient, MAX_DIFF_CHARS, PostParams, post_review, resolve_threads,
    threads_for_fingerprints, truncate_diff,
};
use review_agent::{
    Agent, ReviewAgent, ReviewAgentOptions, ReviewMode, RetryError, SessionLog,
    format_pr_context, resolve_transport, run_review,
};
use review_model::{FindingStatus, Review, VerdictStatus, review_to_graph};

use crate::ci_output::write_ci_outputs;
use crate::config::PipelineConfig;
use crate::error_comment::error_comment_body;
use crate::event::{PrEvent, load_pr_event};

/// Retry budget for the structured-output engine.
const MAX_RETRIES: u32 = 3;

/// Tool-call budget per agent run.
const TOOL_CALL_LIMIT: u32 = 25;

/// Fatal pipeline failures. Everything else warns and continues.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("diff fetch failed: {0}")]
    DiffFetch(#[source] pr_reviewer::Error),

    #[error(transparent)]
    Parse(#[from] review_agent::ReviewParseError),

    #[error("review timed out after {0}s")]
    Timeout(i64),

    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    fn from_retry(err: RetryError) -> Self {
        match err {
            RetryError::Parse(parse) => PipelineError::Parse(parse),
            RetryError::Agent(agent) => PipelineError::Other(agent.to_string()),
        }
    }
}

/// Terminal state of a successful run.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub score: u8,
    pub verdict: VerdictStatus,
    pub findings_count: usize,
    pub merge_blocking: bool,
}

impl PipelineOutcome {
    pub fn exit_code(&self) -> i32 {
        if self.merge_blocking {
            println!(
                "::warning::Review verdict: {} (merge-blocking)",
                self.verdict.as_str()
            );
            1
        } else {
            0
        }
    }
}

/// Run the whole pipeline; returns the process exit code.
pub async fn run() -> i32 {
    let cfg = match PipelineConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(%err, "configuration failed before event parse");
            println!("::error::{err}");
            return 1;
        }
    };

    let event = match load_pr_event(&cfg.event_path) {
        Ok(event) => event,
        Err(err) => {
            error!(%err, "event parse failed");
            println!("::error::{err}");
            return 1;
        }
    };

    let client = match GitHubClient::new(&cfg.api_base, &cfg.token) {
        Ok(client) => client,
        Err(err) => {
            error!(%err, "GitHub client construction failed");
            return 1;
        }
    };

    info!(
        pr = event.pr_number,
        repo = %event.repo,
        title = %event.title,
        branch = %event.branch(),
        "review run starting"
    );

    match run_stages(&cfg, &event, &client).await {
        Ok(outcome) => {
            info!(
                score = outcome.score,
                verdict = outcome.verdict.as_str(),
                findings = outcome.findings_count,
                merge_blocking = outcome.merge_blocking,
                "review run finished"
            );
            outcome.exit_code()
        }
        Err(err) => {
            error!(%err, "pipeline failed");
            let body = error_comment_body(&err);
            if let Err(post_err) = client
                .create_issue_comment(&event.repo, event.pr_number, &body)
                .await
            {
                warn!(error = %post_err, "could not post error comment");
            }
            1
        }
    }
}

async fn run_stages(
    cfg: &PipelineConfig,
    event: &PrEvent,
    client: &GitHubClient,
) -> Result<PipelineOutcome, PipelineError> {
    // Stage 2: transport resolution (param > env > inference > default).
    let (provider, source) =
        resolve_transport(cfg.transport.as_deref()).map_err(|e| PipelineError::Config(e.to_string()))?;
    println!(
        "::notice::transport={provider} model={} (source: {source})",
        cfg.model_id
    );

    let (review_cfg, embedding_cfg) = build_model_configs(cfg, provider)?;
    let llm = Arc::new(
        LlmServiceProfiles::new(review_cfg, embedding_cfg, Some(5))
            .map_err(|e| PipelineError::Config(e.to_string()))?,
    );
    let embedder = Embedder::Llm(llm.clone());

    // Stage 3: codebase index (best-effort).
    let vectors_dir = cfg.data_dir.join("vectors");
    let toolkit = match &cfg.workspace {
        Some(root) => match build_toolkit(root, &vectors_dir, embedder.clone()).await {
            Ok(toolkit) => Some(toolkit),
            Err(err) => {
                warn!(error = %err, "codebase indexing failed; reviewing without code search");
                None
            }
        },
        None => None,
    };

    // Stage 4: agent construction, with a warn-only health probe.
    for status in llm.health_all().await {
        if !status.ok {
            warn!(endpoint = %status.endpoint, message = %status.message, "LLM endpoint unhealthy");
        }
    }
    let mode =
        ReviewMode::parse(&cfg.mode).map_err(|e| PipelineError::Config(e.to_string()))?;
    let session = match SessionLog::open(&cfg.data_dir, &event.session_id(), 3) {
        Ok(log) => Some(log),
        Err(err) => {
            warn!(error = %err, "session transcript unavailable");
            None
        }
    };
    let mut agent = ReviewAgent::create(
        llm.clone(),
        &cfg.prompts_dir,
        mode,
        ReviewAgentOptions {
            toolkit,
            tool_call_limit: Some(TOOL_CALL_LIMIT),
            session,
            additional_context: None,
        },
    )
    .map_err(|e| PipelineError::Config(e.to_string()))?;

    // Stage 5: diff fetch.
    let raw_diff = match client.fetch_diff(&event.repo, event.pr_number).await {
        Ok(diff) => diff,
        Err(err) => {
            if err.is_forbidden() {
                println!(
                    "::error::Diff fetch returned 403. For fork PRs the default token \
                     is read-only; use pull_request_target or a token with repo scope."
                );
            }
            return Err(PipelineError::DiffFetch(err));
        }
    };
    info!(
        files = raw_diff.matches("diff --git").count(),
        chars = raw_diff.len(),
        "diff fetched"
    );

    // Stage 6: diff cap at file-block boundaries.
    let (diff, truncated_files) = truncate_diff(&raw_diff, MAX_DIFF_CHARS);
    if truncated_files > 0 {
        warn!(truncated_files, cap = MAX_DIFF_CHARS, "diff capped");
    }

    // Stage 7: agent invocation under a single wall-clock deadline.
    let message = format_pr_context(
        &event.title,
        &event.author,
        &event.branch(),
        &event.description,
        &diff,
        "",
        "",
        "",
        "",
    );
    let review = run_agent_with_deadline(&mut agent, &message, cfg.timeout_secs).await?;
    info!(
        score = review.score.overall,
        verdict = review.verdict.status.as_str(),
        findings = review.findings.len(),
        "review produced"
    );

    // Stage 8: the model's self-reported name is unreliable; pin the
    // configured id.
    debug!(reported = %review.model, configured = %cfg.model_id, "overriding review.model");
    let review = review.with_model(cfg.model_id.clone());

    // Stage 9: graph transform, prior query BEFORE persist (best-effort).
    let graph = review_to_graph(&review);
    let session_id = event.session_id();
    let mut store = match GraphStore::open(&cfg.data_dir, embedder) {
        Ok(store) => Some(store),
        Err(err) => {
            warn!(error = %err, "graph store unavailable; skipping persistence");
            None
        }
    };
    let mut prior = Vec::new();
    if let Some(store) = &store {
        match store.get_prior_findings(&session_id) {
            Ok(found) => prior = found,
            Err(err) => warn!(error = %err, "prior-findings query failed"),
        }
    }
    if let Some(store) = &mut store {
        if let Err(err) = store.store_review(&graph, &session_id).await {
            warn!(error = %err, "review persistence failed");
        }
    }

    // Stage 10: post review (best-effort, with a rescue comment).
    let posted = match post_review(
        client,
        PostParams {
            repo: &event.repo,
            pr_number: event.pr_number,
            findings: &review.findings,
            prior_findings: &prior,
            head_sha: &event.head_sha,
            diff: &diff,
            score: review.score.overall,
            verdict: review.verdict.status.as_str(),
        },
    )
    .await
    {
        Ok(posted) => Some(posted),
        Err(err) => {
            warn!(error = %err, "posting failed; attempting rescue comment");
            let rescue = "\u{26a0}\u{fe0f} Review completed but failed to post inline \
                          comments. See the CI logs for the full review.";
            if let Err(rescue_err) = client
                .create_issue_comment(&event.repo, event.pr_number, rescue)
                .await
            {
                warn!(error = %rescue_err, "rescue comment also failed");
            }
            None
        }
    };

    // Stage 11: finding-status updates + thread auto-resolution (best-effort).
    if let Some(posted) = &posted {
        if let Some(store) = &mut store {
            for resolved in &posted.resolution.resolved {
                if let Err(err) = store.update_finding_status(&resolved.node_id, FindingStatus::Resolved)
                {
                    warn!(node_id = %resolved.node_id, error = %err, "status update failed");
                }
            }
        }

        let fingerprints: Vec<String> = posted
            .resolution
            .resolved
            .iter()
            .map(|r| r.fingerprint.clone())
            .collect();
        if !fingerprints.is_empty() {
            match threads_for_fingerprints(client, &event.repo, event.pr_number, &fingerprints).await
            {
                Ok(ids) if !ids.is_empty() => {
                    let resolved = resolve_threads(client, &ids).await;
                    info!(resolved, "threads auto-resolved");
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "thread listing failed"),
            }
        }
    }

    // Stage 12: CI outputs.
    if let Some(path) = &cfg.ci_output_path {
        write_ci_outputs(
            path,
            &[
                ("score", review.score.overall.to_string()),
                ("verdict", review.verdict.status.as_str().to_string()),
                ("findings-count", review.findings.len().to_string()),
                ("merge-blocking", review.verdict.merge_blocking.to_string()),
            ],
        );
    }

    Ok(PipelineOutcome {
        score: review.score.overall,
        verdict: review.verdict.status,
        findings_count: review.findings.len(),
        merge_blocking: review.verdict.merge_blocking,
    })
}

/// Model configs for the resolved transport.
fn build_model_configs(
    cfg: &PipelineConfig,
    provider: LlmProvider,
) -> Result<(LlmModelConfig, LlmModelConfig), PipelineError> {
    let request_timeout = (cfg.timeout_secs > 0).then_some(cfg.timeout_secs as u64);

    let (endpoint, api_key) = match provider {
        LlmProvider::OpenAi => {
            let key = cfg.openai_api_key.clone().ok_or_else(|| {
                PipelineError::Config("transport=openai but OPENAI_API_KEY not set".into())
            })?;
            ("https://api.openai.com/v1".to_string(), Some(key))
        }
        LlmProvider::Local => (cfg.base_url.clone(), None),
    };

    let review = LlmModelConfig {
        provider,
        model: cfg.model_id.clone(),
        endpoint: endpoint.clone(),
        api_key: api_key.clone(),
        max_tokens: None,
        temperature: None,
        top_p: None,
        timeout_secs: request_timeout,
    };
    let embedding = LlmModelConfig {
        provider,
        model: cfg.embedding_model_id.clone(),
        endpoint,
        api_key,
        max_tokens: None,
        temperature: None,
        top_p: None,
        timeout_secs: Some(60),
    };
    Ok((review, embedding))
}

/// Build (or reuse) the index and wrap it in a toolkit.
async fn build_toolkit(
    root: &std::path::Path,
    vectors_dir: &std::path::Path,
    embedder: Embedder,
) -> Result<CodebaseToolkit, codebase_index::IndexError> {
    let index = CodebaseIndex::open(root, vectors_dir, embedder)?;
    if index.is_indexed() {
        info!("reusing cached codebase index");
    } else {
        let chunks = index.build().await?;
        info!(chunks, "codebase index built");
    }
    Ok(CodebaseToolkit::new(index))
}

/// Invoke the retry engine, bounded by one wall-clock deadline.
///
/// `timeout_secs <= 0` disables the deadline. On expiry the in-flight
/// future is dropped — connections are released — and the caller gets
/// [`PipelineError::Timeout`], never a partial review.
async fn run_agent_with_deadline<A: Agent>(
    agent: &mut A,
    message: &str,
    timeout_secs: i64,
) -> Result<Review, PipelineError> {
    let fut = run_review(agent, message, MAX_RETRIES);
    if timeout_secs > 0 {
        match tokio::time::timeout(Duration::from_secs(timeout_secs as u64), fut).await {
            Ok(result) => result.map_err(PipelineError::from_retry),
            Err(_) => Err(PipelineError::Timeout(timeout_secs)),
        }
    } else {
        fut.await.map_err(PipelineError::from_retry)
    }
}
