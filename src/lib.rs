//! Salesforce sync connector.
//!
//! A resilient client for the rate-limited Salesforce REST API: it
//! acquires and refreshes bearer credentials under concurrent demand,
//! issues paginated SOQL queries, classifies and recovers from transient
//! HTTP failures, caches cross-referenced reference sobjects, and maps
//! heterogeneous remote records into a uniform document shape for
//! downstream indexing.
//!
//! # Example
//!
//! ```no_run
//! use salesforce_connector::{SalesforceClient, SalesforceConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SalesforceConfig::new("acme", "client-id", "client-secret".to_string());
//! let client = SalesforceClient::new(config)?;
//!
//! let mut docs = Vec::new();
//! client
//!     .get_docs(&mut |doc, _attachment| docs.push(doc))
//!     .await?;
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

mod auth;
mod cache;
mod client;
mod config;
mod error;
mod mapper;
mod retry;
mod schema;
mod soql;
mod sync;

// Re-exports
pub use auth::ApiToken;
pub use client::{QueryPages, SalesforceClient};
pub use config::{SalesforceConfig, SalesforceCredentials, API_VERSION};
pub use error::{classify_client_error, ApiErrorEntry, SalesforceError, SalesforceResult};
pub use mapper::{DocMapper, Document};
pub use retry::RetryPolicy;
pub use schema::{RELEVANT_SOBJECTS, RELEVANT_SOBJECT_FIELDS};
pub use soql::SoqlBuilder;
pub use sync::ContentHandle;
