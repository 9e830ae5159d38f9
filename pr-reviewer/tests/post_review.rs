//! The posting flow against a mock GitHub API: fork rerouting, the 422
//! batch fallback, and the marker-based summary upsert.

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pr_reviewer::{GitHubClient, PostParams, post_review, post_review_batched};
use review_model::Finding;

const REPO: &str = "owner/repo";
const PR: u64 = 5;

/// Three addressable right-side lines (1, 2, 3) in src/auth.py.
const DIFF: &str = "diff --git a/src/auth.py b/src/auth.py\n@@ -1,3 +1,3 @@\n a\n+b\n c\n";

fn finding(title: &str, line: u32) -> Finding {
    serde_json::from_value(json!({
        "id": "F-001", "severity": "HIGH", "confidence": 80, "category": "security",
        "file": "src/auth.py", "line_start": line, "line_end": line, "title": title,
        "description": "d", "suggestion": "s", "evidence": "e", "grippy_note": "n"
    }))
    .unwrap()
}

fn params<'a>(findings: &'a [Finding], diff: &'a str) -> PostParams<'a> {
    PostParams {
        repo: REPO,
        pr_number: PR,
        findings,
        prior_findings: &[],
        head_sha: "deadbeefcafe",
        diff,
        score: 70,
        verdict: "PROVISIONAL",
    }
}

async fn mount_pull_meta(server: &MockServer, head_repo: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/{REPO}/pulls/{PR}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Add throttle",
            "head": { "ref": "feature", "sha": "deadbeefcafe", "repo": { "full_name": head_repo } },
            "base": { "ref": "main", "sha": "0000000000", "repo": { "full_name": REPO } }
        })))
        .mount(server)
        .await;
}

async fn mount_empty_comment_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/{REPO}/issues/{PR}/comments")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fork_pr_routes_inline_eligible_findings_off_diff() {
    let server = MockServer::start().await;
    mount_pull_meta(&server, "forker/repo").await;
    mount_empty_comment_listing(&server).await;

    // No inline review may be submitted for a fork PR.
    Mock::given(method("POST"))
        .and(path(format!("/repos/{REPO}/pulls/{PR}/reviews")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/repos/{REPO}/issues/{PR}/comments")))
        .and(body_string_contains("Off-diff findings (2)"))
        .and(body_string_contains("grippy-summary-5"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GitHubClient::new(server.uri(), "token").unwrap();
    // Both findings sit on addressable diff lines; the fork policy still
    // sends them to the summary.
    let findings = vec![finding("SQL injection", 2), finding("XSS", 3)];

    let posted = post_review(&client, params(&findings, DIFF)).await.unwrap();

    assert_eq!(posted.inline_posted, 0);
    assert_eq!(posted.off_diff.len(), 2);
    assert!(!posted.summary_edited);
    assert_eq!(posted.resolution.new.len(), 2);
}

#[tokio::test]
async fn first_batch_422_falls_back_to_off_diff() {
    let server = MockServer::start().await;
    mount_pull_meta(&server, REPO).await;
    mount_empty_comment_listing(&server).await;

    // First batch is rejected as unprocessable, the second goes through.
    let reviews_path = format!("/repos/{REPO}/pulls/{PR}/reviews");
    Mock::given(method("POST"))
        .and(path(reviews_path.clone()))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({ "message": "Unprocessable Entity" })),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(reviews_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 2 })))
        .expect(1)
        .mount(&server)
        .await;

    // The failed batch's two findings surface in the summary's off-diff
    // section.
    Mock::given(method("POST"))
        .and(path(format!("/repos/{REPO}/issues/{PR}/comments")))
        .and(body_string_contains("Off-diff findings (2)"))
        .and(body_string_contains("grippy-summary-5"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 3 })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GitHubClient::new(server.uri(), "token").unwrap();
    let findings = vec![finding("one", 1), finding("two", 2), finding("three", 3)];

    // Three findings in batches of 2 + 1.
    let posted = post_review_batched(&client, params(&findings, DIFF), 2)
        .await
        .unwrap();

    assert_eq!(posted.inline_posted, 1);
    let off: Vec<&str> = posted.off_diff.iter().map(|f| f.title.as_str()).collect();
    assert_eq!(off, vec!["one", "two"]);
    assert_eq!(posted.resolution.new.len(), 3);
}

#[tokio::test]
async fn non_422_batch_failure_propagates() {
    let server = MockServer::start().await;
    mount_pull_meta(&server, REPO).await;

    Mock::given(method("POST"))
        .and(path(format!("/repos/{REPO}/pulls/{PR}/reviews")))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = GitHubClient::new(server.uri(), "token").unwrap();
    let findings = vec![finding("one", 1)];

    let err = post_review(&client, params(&findings, DIFF)).await.unwrap_err();
    assert!(!err.is_unprocessable());
}

#[tokio::test]
async fn existing_marked_summary_is_edited_in_place() {
    let server = MockServer::start().await;
    mount_pull_meta(&server, REPO).await;

    Mock::given(method("GET"))
        .and(path(format!("/repos/{REPO}/issues/{PR}/comments")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 11, "body": "unrelated discussion" },
            { "id": 10, "body": "old dashboard\n<!-- grippy-summary-5 -->" }
        ])))
        .mount(&server)
        .await;

    // The marked comment is edited; no new comment is created.
    Mock::given(method("PATCH"))
        .and(path(format!("/repos/{REPO}/issues/comments/10")))
        .and(body_string_contains("grippy-summary-5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 10 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/repos/{REPO}/issues/{PR}/comments")))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let client = GitHubClient::new(server.uri(), "token").unwrap();
    let posted = post_review(&client, params(&[], "")).await.unwrap();

    assert!(posted.summary_edited);
    assert_eq!(posted.inline_posted, 0);
}
