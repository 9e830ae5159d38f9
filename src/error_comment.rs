//! Error comment bodies posted when a run dies.
//!
//! Every fatal pipeline failure leaves a visible trace on the PR with one
//! of the fixed headers: `CONFIG ERROR`, `DIFF FETCH ERROR`, `PARSE ERROR`,
//! `TIMEOUT`, `ERROR`.

use crate::pipeline::PipelineError;

/// Header + details for a fatal error, as a markdown comment body.
pub fn error_comment_body(err: &PipelineError) -> String {
    let (header, details) = match err {
        PipelineError::Config(msg) => ("CONFIG ERROR", msg.clone()),
        PipelineError::DiffFetch(inner) => {
            let mut details = format!("Could not fetch the PR diff: {inner}");
            if inner.is_forbidden() {
                details.push_str(
                    "\n\nFor fork PRs the default CI token is read-only; run the \
                     workflow with `pull_request_target` or supply a token with \
                     repo scope.",
                );
            }
            ("DIFF FETCH ERROR", details)
        }
        PipelineError::Parse(inner) => ("PARSE ERROR", inner.to_string()),
        PipelineError::Timeout(secs) => (
            "TIMEOUT",
            format!("The review did not finish within {secs}s."),
        ),
        PipelineError::Other(msg) => ("ERROR", msg.clone()),
    };

    format!(
        "## \u{274c} Grippy \u{2014} {header}\n\n{details}\n\n\
         <sub>The review did not complete; see the CI logs for details.</sub>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pr_reviewer::ProviderError;

    #[test]
    fn each_error_kind_gets_its_header() {
        let cases = [
            (PipelineError::Config("missing".into()), "CONFIG ERROR"),
            (
                PipelineError::DiffFetch(ProviderError::NotFound.into()),
                "DIFF FETCH ERROR",
            ),
            (PipelineError::Timeout(60), "TIMEOUT"),
            (PipelineError::Other("boom".into()), "ERROR"),
        ];
        for (err, header) in cases {
            assert!(error_comment_body(&err).contains(header));
        }
    }

    #[test]
    fn forbidden_diff_fetch_carries_fork_guidance() {
        let err = PipelineError::DiffFetch(ProviderError::Forbidden.into());
        let body = error_comment_body(&err);
        assert!(body.contains("DIFF FETCH ERROR"));
        assert!(body.contains("pull_request_target"));
    }

    #[test]
    fn timeout_names_the_budget() {
        let body = error_comment_body(&PipelineError::Timeout(120));
        assert!(body.contains("within 120s"));
    }
}
