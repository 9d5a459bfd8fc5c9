//! OAuth2 client-credentials authentication for the Salesforce REST API.

use secrecy::ExposeSecret;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

use crate::config::SalesforceCredentials;
use crate::error::{SalesforceError, SalesforceResult};

/// Successful token response from the Salesforce token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Error body returned by the token endpoint on 4xx.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Owns the single bearer token for a client session.
///
/// No other component holds or mutates the credential. Refresh attempts
/// are serialized through a non-blocking lock: a caller that loses the
/// race gets [`SalesforceError::RefreshInProgress`] immediately instead of
/// queuing, and must not itself retry the refresh.
#[derive(Debug)]
pub struct ApiToken {
    credentials: SalesforceCredentials,
    token_url: String,
    http_client: reqwest::Client,
    token: RwLock<Option<String>>,
    refresh_lock: Mutex<()>,
}

impl ApiToken {
    /// Creates a token manager for the given token endpoint.
    pub fn new(
        http_client: reqwest::Client,
        token_url: String,
        credentials: SalesforceCredentials,
    ) -> Self {
        Self {
            credentials,
            token_url,
            http_client,
            token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Returns the current token, or `None` before the first successful
    /// fetch. Never blocks on a refresh.
    pub async fn current(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Performs exactly one token exchange against the token endpoint.
    ///
    /// If another refresh is already in flight this fails immediately with
    /// [`SalesforceError::RefreshInProgress`]; the in-flight refresh owns
    /// the operation. A `invalid_client` rejection is fatal
    /// ([`SalesforceError::InvalidCredentials`]); any other failure is
    /// [`SalesforceError::CredentialFetchFailed`] and may be retried by
    /// the caller's outer policy.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> SalesforceResult<()> {
        let Ok(_guard) = self.refresh_lock.try_lock() else {
            return Err(SalesforceError::RefreshInProgress);
        };

        debug!("Fetching new access token");
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            (
                "client_secret",
                self.credentials.client_secret.expose_secret(),
            ),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| SalesforceError::CredentialFetchFailed(format!("request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let body: TokenResponse = response.json().await.map_err(|e| {
                SalesforceError::CredentialFetchFailed(format!("malformed token response: {e}"))
            })?;
            *self.token.write().await = Some(body.access_token);
            debug!("Acquired new access token");
            return Ok(());
        }

        if status.is_client_error() {
            // 400s carry a detailed error message in the body.
            let body: TokenErrorResponse = response.json().await.unwrap_or(TokenErrorResponse {
                error: None,
                error_description: None,
            });
            let error = body.error.unwrap_or_else(|| "unknown".to_string());
            let description = body.error_description.unwrap_or_default();

            if error == "invalid_client" {
                return Err(SalesforceError::InvalidCredentials(format!(
                    "the client_id and client_secret provided could not be used \
                     to generate a token. status: {status}, details: {error} {description}"
                )));
            }
            return Err(SalesforceError::CredentialFetchFailed(format!(
                "status: {status}, details: {error} {description}"
            )));
        }

        Err(SalesforceError::CredentialFetchFailed(format!(
            "unexpected status {status} from token endpoint"
        )))
    }

    /// Clears the token. Used when a downstream request reports the token
    /// as expired or rejected, and on session close.
    pub async fn invalidate(&self) {
        *self.token.write().await = None;
    }
}
