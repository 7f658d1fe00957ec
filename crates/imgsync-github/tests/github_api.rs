use imgsync_core::HostError;
use imgsync_github::{GitHubClient, RepoSlug};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn slug() -> RepoSlug {
    RepoSlug {
        owner: "canonical".to_string(),
        name: "kfp-operators".to_string(),
    }
}

/// Smallest pull request payload the GitHub models accept.
fn pull_request(number: u64, head: &str, base: &str) -> Value {
    let api = "https://api.github.com/repos/canonical/kfp-operators";
    json!({
        "url": format!("{api}/pulls/{number}"),
        "id": 1000 + number,
        "number": number,
        "html_url": format!("https://github.com/canonical/kfp-operators/pull/{number}"),
        "state": "open",
        "title": "chore: integrate image",
        "head": {"ref": head, "sha": "1111111", "label": format!("canonical:{head}")},
        "base": {"ref": base, "sha": "2222222", "label": format!("canonical:{base}")}
    })
}

#[tokio::test]
async fn finds_open_pull_request_for_branch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/canonical/kfp-operators/pulls"))
        .and(query_param("state", "open"))
        .and(query_param("head", "canonical:integrate-kfp-api-2.5.0"))
        .and(query_param("base", "main"))
        .and(header_exists("authorization"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([pull_request(42, "integrate-kfp-api-2.5.0", "main")])),
        )
        .mount(&server)
        .await;

    let client = GitHubClient::new(server.uri(), "t123").unwrap();
    let pr = client
        .find_open_pull_request(&slug(), "integrate-kfp-api-2.5.0", "main")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pr.number, 42);
    assert_eq!(pr.url, "https://github.com/canonical/kfp-operators/pull/42");
}

#[tokio::test]
async fn no_open_pull_request_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/canonical/kfp-operators/pulls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = GitHubClient::new(format!("{}/", server.uri()), "t123").unwrap();
    let found = client
        .find_open_pull_request(&slug(), "integrate-kfp-api-2.5.0", "main")
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn creates_pull_request_with_owner_qualified_head() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/canonical/kfp-operators/pulls"))
        .and(body_partial_json(json!({
            "title": "chore: integrate image kfp-api:2.5.0",
            "head": "canonical:integrate-kfp-api-2.5.0",
            "base": "track/2.5",
            "body": "body text",
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(pull_request(7, "integrate-kfp-api-2.5.0", "track/2.5")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = GitHubClient::new(server.uri(), "t123").unwrap();
    let pr = client
        .create_pull_request(
            &slug(),
            "integrate-kfp-api-2.5.0",
            "track/2.5",
            "chore: integrate image kfp-api:2.5.0",
            "body text",
        )
        .await
        .unwrap();
    assert_eq!(pr.number, 7);
    assert_eq!(pr.url, "https://github.com/canonical/kfp-operators/pull/7");
}

#[tokio::test]
async fn api_failure_carries_status_and_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/canonical/kfp-operators/pulls"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Validation Failed",
            "documentation_url": "https://docs.github.com/rest/pulls/pulls#create-a-pull-request"
        })))
        .mount(&server)
        .await;

    let client = GitHubClient::new(server.uri(), "t123").unwrap();
    let err = client
        .create_pull_request(&slug(), "b", "main", "t", "")
        .await
        .unwrap_err();
    match &err {
        HostError::Api { repository, reason } => {
            assert_eq!(repository, "canonical/kfp-operators");
            assert!(reason.contains("422"), "{reason}");
            assert!(reason.contains("Validation Failed"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn non_json_error_body_is_an_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/canonical/kfp-operators/pulls"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let client = GitHubClient::new(server.uri(), "t123").unwrap();
    let err = client
        .find_open_pull_request(&slug(), "b", "main")
        .await
        .unwrap_err();
    assert!(
        matches!(&err, HostError::Api { repository, .. } if repository == "canonical/kfp-operators"),
        "{err}"
    );
}

#[test]
fn invalid_api_url_is_rejected() {
    let err = GitHubClient::new("not a url", "t123").unwrap_err();
    assert!(err.to_string().contains("invalid API URL"), "{err}");
}
