//! Credential manager integration tests against a mock token endpoint.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use salesforce_connector::{ApiToken, SalesforceCredentials, SalesforceError};

use common::{init_test_logging, mock_token_endpoint, token_response, TOKEN_PATH};

fn api_token(server: &MockServer) -> ApiToken {
    init_test_logging();
    ApiToken::new(
        reqwest::Client::new(),
        format!("{}{TOKEN_PATH}", server.uri()),
        SalesforceCredentials {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string().into(),
        },
    )
}

#[tokio::test]
async fn refresh_stores_token() {
    let server = MockServer::start().await;
    mock_token_endpoint(&server, "token-1").await;

    let token = api_token(&server);
    assert!(token.current().await.is_none());

    token.refresh().await.unwrap();
    assert_eq!(token.current().await.as_deref(), Some("token-1"));
}

#[tokio::test]
async fn invalid_client_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "client identifier invalid"
        })))
        .mount(&server)
        .await;

    let token = api_token(&server);
    let error = token.refresh().await.unwrap_err();
    assert!(matches!(error, SalesforceError::InvalidCredentials(_)));
    assert!(!error.is_retryable());
    assert!(token.current().await.is_none());
}

#[tokio::test]
async fn other_token_failures_are_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
        )
        .mount(&server)
        .await;

    let token = api_token(&server);
    let error = token.refresh().await.unwrap_err();
    assert!(matches!(error, SalesforceError::CredentialFetchFailed(_)));
    assert!(error.is_retryable());
}

#[tokio::test]
async fn server_error_from_token_endpoint_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let token = api_token(&server);
    let error = token.refresh().await.unwrap_err();
    assert!(matches!(error, SalesforceError::CredentialFetchFailed(_)));
    assert!(error.is_retryable());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_refresh_has_one_winner() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_response("token-1"))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let token = Arc::new(api_token(&server));

    let first = tokio::spawn({
        let token = token.clone();
        async move { token.refresh().await }
    });
    let second = tokio::spawn({
        let token = token.clone();
        async move { token.refresh().await }
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let losers = results
        .iter()
        .filter(|r| matches!(r, Err(SalesforceError::RefreshInProgress)))
        .count();

    assert_eq!(winners, 1, "exactly one refresh should perform the exchange");
    assert_eq!(losers, 1, "the other caller should observe RefreshInProgress");
    assert_eq!(token.current().await.as_deref(), Some("token-1"));
}
