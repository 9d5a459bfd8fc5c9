//! Common test utilities for salesforce-connector integration tests.

#![allow(dead_code)]

use std::sync::Once;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use salesforce_connector::{SalesforceClient, SalesforceConfig};

static INIT: Once = Once::new();

/// Initialize logging for tests (once). Only active when `RUST_LOG` is
/// set.
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

pub const TOKEN_PATH: &str = "/services/oauth2/token";
pub const QUERY_PATH: &str = "/services/data/v58.0/query";
pub const DESCRIBE_PATH: &str = "/services/data/v58.0/sobjects";

/// All relevant sobjects, queryable, with every relevant field described.
pub const ALL_SOBJECTS: &[&str] = &["Account", "Contact", "Lead", "Opportunity", "User"];

/// Builds a client pointed at the mock server.
pub fn test_client(server: &MockServer) -> SalesforceClient {
    init_test_logging();
    let config = SalesforceConfig::new("acme", "client-id", "client-secret".to_string())
        .with_base_url(server.uri());
    SalesforceClient::new(config).expect("client should build")
}

/// Creates a successful token response body.
pub fn token_response(access_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "signature": "sig",
        "issued_at": "1700000000000"
    })
}

/// One page of a query response. `done` is false whenever a continuation
/// link is given.
pub fn query_page(records: Vec<Value>, next_records_url: Option<&str>) -> Value {
    let total_size = records.len();
    match next_records_url {
        Some(next) => json!({
            "records": records,
            "done": false,
            "nextRecordsUrl": next,
            "totalSize": total_size
        }),
        None => json!({
            "records": records,
            "done": true,
            "totalSize": total_size
        }),
    }
}

/// A Salesforce 4xx error body.
pub fn error_body(error_code: &str, message: &str) -> Value {
    json!([{"errorCode": error_code, "message": message}])
}

/// Mounts the OAuth token endpoint.
pub async fn mock_token_endpoint(server: &MockServer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(access_token)))
        .mount(server)
        .await;
}

/// Mounts the global describe endpoint with the given (name, queryable)
/// pairs.
pub async fn mock_describe_global(server: &MockServer, sobjects: &[(&str, bool)]) {
    let entries: Vec<Value> = sobjects
        .iter()
        .map(|(name, queryable)| json!({"name": name, "queryable": queryable}))
        .collect();
    Mock::given(method("GET"))
        .and(path(DESCRIBE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sobjects": entries})))
        .mount(server)
        .await;
}

/// Mounts a per-object describe endpoint listing the given field names.
pub async fn mock_describe_sobject(server: &MockServer, sobject: &str, fields: &[&str]) {
    let entries: Vec<Value> = fields.iter().map(|name| json!({"name": name})).collect();
    Mock::given(method("GET"))
        .and(path(format!("{DESCRIBE_PATH}/{sobject}/describe")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fields": entries})))
        .mount(server)
        .await;
}

/// Mounts describe endpoints where every relevant sobject is queryable
/// and exposes every relevant field.
pub async fn mock_full_schema(server: &MockServer) {
    mock_schema_with_queryable(server, ALL_SOBJECTS).await;
}

/// Mounts describe endpoints where only the listed sobjects are
/// queryable. Per-object describes are still served for all sobjects.
pub async fn mock_schema_with_queryable(server: &MockServer, queryable: &[&str]) {
    let entries: Vec<(&str, bool)> = ALL_SOBJECTS
        .iter()
        .map(|name| (*name, queryable.contains(name)))
        .collect();
    mock_describe_global(server, &entries).await;

    for sobject in ALL_SOBJECTS {
        mock_describe_sobject(server, sobject, salesforce_connector::RELEVANT_SOBJECT_FIELDS)
            .await;
    }
}
