//! Error types for the Salesforce connector.

use serde::Deserialize;
use thiserror::Error;

/// Result type alias using `SalesforceError`.
pub type SalesforceResult<T> = Result<T, SalesforceError>;

/// Salesforce error codes that indicate a malformed or disallowed query.
const INVALID_QUERY_CODES: &[&str] = &["INVALID_FIELD", "INVALID_TERM", "MALFORMED_QUERY"];

/// Errors that can occur when interacting with Salesforce.
#[derive(Debug, Error)]
pub enum SalesforceError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configured `client_id`/`client_secret` were rejected by the token
    /// endpoint. Never retried; the configuration must be corrected.
    #[error("Invalid client credentials: {0}")]
    InvalidCredentials(String),

    /// The token endpoint failed for a reason other than bad client
    /// credentials. Retryable.
    #[error("Could not fetch token from Salesforce: {0}")]
    CredentialFetchFailed(String),

    /// Another caller already holds the token refresh lock. Informational;
    /// the in-flight refresh owns the operation.
    #[error("Token refresh is already in progress")]
    RefreshInProgress,

    /// Salesforce is rate limiting this account (`REQUEST_LIMIT_EXCEEDED`).
    /// Propagated immediately so a higher layer can pace or defer.
    #[error("Salesforce is rate limiting this account: {details}")]
    RateLimited { details: String },

    /// The query referenced a disallowed field/object or was malformed.
    /// Retrying cannot help.
    #[error("The query was rejected by Salesforce: {details}")]
    InvalidQuery { details: String },

    /// Uncategorized 4xx response. Retried under the generic policy on the
    /// theory that it may be transient.
    #[error("The request to Salesforce failed with status {status}: {details}")]
    RequestRejected { status: u16, details: String },

    /// 5xx response from Salesforce. Retryable.
    #[error("Salesforce server error, status {status}")]
    Server { status: u16 },

    /// The bearer token was rejected (401) and has been refreshed; the
    /// request should be reissued. Retryable.
    #[error("Session token expired")]
    TokenExpired,

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The session was closed while a retry delay was pending.
    #[error("Operation cancelled by session shutdown")]
    Cancelled,

    /// The generic retry budget was exhausted.
    #[error("Maximum retries ({attempts}) exceeded: {message}")]
    MaxRetriesExceeded { attempts: u32, message: String },
}

impl SalesforceError {
    /// Whether the generic retry policy may reissue the failed operation.
    ///
    /// Rate limiting, invalid queries and bad client credentials are
    /// terminal for the current attempt chain: retrying cannot change the
    /// outcome, so they are raised immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SalesforceError::CredentialFetchFailed(_)
                | SalesforceError::RequestRejected { .. }
                | SalesforceError::Server { .. }
                | SalesforceError::TokenExpired
                | SalesforceError::Http(_)
        )
    }
}

/// One entry of a Salesforce 4xx error body.
///
/// The response format is an array of these; `errorCode` and `message` are
/// generally identical except for invalid queries, where `message` carries
/// the query diagnostics.
#[derive(Debug, Deserialize)]
pub struct ApiErrorEntry {
    #[serde(rename = "errorCode", default = "unknown_code")]
    pub error_code: String,
    #[serde(default)]
    pub message: String,
}

fn unknown_code() -> String {
    "unknown".to_string()
}

/// Classifies a non-401 client-error response body into an error kind.
///
/// The body is expected to be a JSON array of `{errorCode, message}`
/// entries; an absent or empty array is treated as a single `unknown` code.
/// Pure function over (status, body) so the cascade is testable without
/// network I/O.
#[must_use]
pub fn classify_client_error(status: u16, body: &serde_json::Value) -> SalesforceError {
    let entries: Vec<ApiErrorEntry> = match body.as_array() {
        Some(list) if !list.is_empty() => list
            .iter()
            .map(|v| {
                serde_json::from_value(v.clone()).unwrap_or_else(|_| ApiErrorEntry {
                    error_code: unknown_code(),
                    message: String::new(),
                })
            })
            .collect(),
        _ => vec![ApiErrorEntry {
            error_code: unknown_code(),
            message: String::new(),
        }],
    };

    let codes: Vec<&str> = entries.iter().map(|e| e.error_code.as_str()).collect();
    let details = codes.join(", ");

    if codes.contains(&"REQUEST_LIMIT_EXCEEDED") {
        return SalesforceError::RateLimited {
            details: format!("status: {status}, details: {details}"),
        };
    }

    if codes.iter().any(|c| INVALID_QUERY_CODES.contains(c)) {
        let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
        return SalesforceError::InvalidQuery {
            details: format!(
                "status: {status}, details: {details}, query: {}",
                messages.join(", ")
            ),
        };
    }

    SalesforceError::RequestRejected { status, details }
}
