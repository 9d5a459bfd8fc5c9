//! Salesforce REST API client with retry, reactive token refresh and
//! query pagination.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::ApiToken;
use crate::config::SalesforceConfig;
use crate::error::{classify_client_error, SalesforceError, SalesforceResult};
use crate::mapper::DocMapper;
use crate::retry::RetryPolicy;

/// Response shape of the SOQL query endpoint.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    records: Vec<Value>,
    /// A missing flag is treated as completion, favoring termination over
    /// an infinite loop on a malformed response.
    #[serde(default = "default_done")]
    done: bool,
    #[serde(rename = "nextRecordsUrl")]
    next_records_url: Option<String>,
}

fn default_done() -> bool {
    true
}

/// Client for one Salesforce sync session.
///
/// Holds the session-scoped state: the bearer token, the memoized schema
/// descriptor and the reference-object cache. All of it is created on
/// first access and torn down with [`SalesforceClient::close`].
#[derive(Debug)]
pub struct SalesforceClient {
    pub(crate) config: SalesforceConfig,
    http_client: reqwest::Client,
    pub(crate) api_token: ApiToken,
    pub(crate) doc_mapper: DocMapper,
    retry: RetryPolicy,
    shutdown: CancellationToken,
    /// Lowercased names of queryable sobjects, fetched once per session.
    pub(crate) queryable_objects: RwLock<Option<HashSet<String>>>,
    /// Lowercased queryable field names per relevant sobject.
    pub(crate) queryable_fields: RwLock<Option<HashMap<String, HashSet<String>>>>,
    /// Reference records per sobject, keyed by record Id. Each table is
    /// built at most once per session, on first need.
    pub(crate) reference_cache: RwLock<HashMap<String, Arc<HashMap<String, Value>>>>,
}

impl SalesforceClient {
    /// Creates a client for the configured org.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: SalesforceConfig) -> SalesforceResult<Self> {
        Self::with_retry_policy(config, RetryPolicy::default())
    }

    /// Creates a client with a custom retry policy.
    pub fn with_retry_policy(
        config: SalesforceConfig,
        retry: RetryPolicy,
    ) -> SalesforceResult<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SalesforceError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_token = ApiToken::new(
            http_client.clone(),
            config.token_url(),
            config.credentials.clone(),
        );

        let doc_mapper = DocMapper::new(config.base_url());

        Ok(Self {
            config,
            http_client,
            api_token,
            doc_mapper,
            retry,
            shutdown: CancellationToken::new(),
            queryable_objects: RwLock::new(None),
            queryable_fields: RwLock::new(None),
            reference_cache: RwLock::new(HashMap::new()),
        })
    }

    /// Base URL of the org this client talks to.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.config.base_url()
    }

    /// Acquires a bearer token, retrying transient token-endpoint failures.
    ///
    /// A concurrent in-flight refresh is not an error: the other caller
    /// owns the exchange and this call returns without retrying it.
    /// `InvalidCredentials` is raised immediately; it cannot be retried
    /// into success.
    #[instrument(skip(self))]
    pub async fn get_token(&self) -> SalesforceResult<()> {
        self.retry
            .execute("get_token", &self.shutdown, || async {
                match self.api_token.refresh().await {
                    Err(SalesforceError::RefreshInProgress) => {
                        debug!("Token refresh is already in progress");
                        Ok(())
                    }
                    other => other,
                }
            })
            .await
    }

    /// Issues an authenticated GET and parses the response as JSON, under
    /// the generic retry policy.
    ///
    /// A 401 invalidates the credential, forces a refresh and retries the
    /// request with the fresh token. Rate limiting and invalid queries are
    /// raised immediately; uncategorized 4xx and all 5xx/transport
    /// failures consume the retry budget.
    pub async fn fetch_json(
        &self,
        url: &str,
        params: Option<&[(&str, &str)]>,
    ) -> SalesforceResult<Value> {
        self.retry
            .execute("fetch_json", &self.shutdown, || {
                self.fetch_json_once(url, params)
            })
            .await
    }

    async fn fetch_json_once(
        &self,
        url: &str,
        params: Option<&[(&str, &str)]>,
    ) -> SalesforceResult<Value> {
        debug!(url, "Sending request");
        let mut request = self.http_client.get(url);
        if let Some(params) = params {
            request = request.query(params);
        }
        if let Some(token) = self.api_token.current().await {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        // The body is read before the status check: Salesforce puts the
        // error detail in the body.
        let text = response.text().await?;
        let body = serde_json::from_str::<Value>(&text);

        if status.is_success() {
            return body.map_err(Into::into);
        }

        match status.as_u16() {
            401 => {
                warn!(status = 401, "Token expired, fetching a new one");
                // Token lifetime is administrator-configurable, so expiry is
                // detected reactively rather than predicted.
                self.api_token.invalidate().await;
                self.get_token().await?;
                Err(SalesforceError::TokenExpired)
            }
            status_code @ 400..=499 => Err(classify_client_error(
                status_code,
                &body.unwrap_or(Value::Null),
            )),
            status_code => Err(SalesforceError::Server {
                status: status_code,
            }),
        }
    }

    /// Starts a lazy, non-restartable page sequence for a SOQL query.
    #[must_use]
    pub fn query_pages(&self, soql: impl Into<String>) -> QueryPages<'_> {
        QueryPages {
            client: self,
            state: PageState::Start { soql: soql.into() },
        }
    }

    /// Health check against the org's base endpoint.
    pub async fn ping(&self) -> SalesforceResult<()> {
        self.http_client
            .head(self.config.base_url())
            .send()
            .await?;
        Ok(())
    }

    /// Closes the session: any pending retry delay aborts immediately and
    /// the credential is cleared so no residual token survives.
    pub async fn close(&self) {
        self.shutdown.cancel();
        self.api_token.invalidate().await;
    }

    /// Resolves a server-provided continuation link, which Salesforce
    /// returns as a path relative to the org host.
    fn absolute_url(&self, link: &str) -> SalesforceResult<String> {
        match Url::parse(link) {
            Ok(url) => Ok(url.to_string()),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = Url::parse(&self.config.base_url())?;
                Ok(base.join(link)?.to_string())
            }
            Err(e) => Err(e.into()),
        }
    }
}

enum PageState {
    Start { soql: String },
    Next { url: String },
    Done,
}

/// Lazy page sequence for one SOQL query.
///
/// The first fetch sends the query text; subsequent fetches follow the
/// server's continuation URL until the response reports `done`. The
/// sequence is finite and cannot be restarted.
pub struct QueryPages<'a> {
    client: &'a SalesforceClient,
    state: PageState,
}

impl QueryPages<'_> {
    /// Fetches the next batch of records, or `None` after the final page.
    pub async fn next_page(&mut self) -> SalesforceResult<Option<Vec<Value>>> {
        let response = match std::mem::replace(&mut self.state, PageState::Done) {
            PageState::Done => return Ok(None),
            PageState::Start { soql } => {
                let url = self.client.config.query_url();
                self.client
                    .fetch_json(&url, Some(&[("q", soql.as_str())]))
                    .await?
            }
            PageState::Next { url } => self.client.fetch_json(&url, None).await?,
        };

        let page: QueryResponse = serde_json::from_value(response)?;
        if !page.done {
            if let Some(next) = page.next_records_url {
                self.state = PageState::Next {
                    url: self.client.absolute_url(&next)?,
                };
            }
        }
        Ok(Some(page.records))
    }
}
