//! Salesforce connector configuration.

use secrecy::SecretString;

use crate::error::{SalesforceError, SalesforceResult};

/// Salesforce REST API version used for all data endpoints.
pub const API_VERSION: &str = "v58.0";

/// `OAuth2` credentials for the client-credentials grant.
#[derive(Debug, Clone)]
pub struct SalesforceCredentials {
    /// Connected-app consumer key.
    pub client_id: String,
    /// Connected-app consumer secret.
    pub client_secret: SecretString,
}

/// Configuration for the Salesforce connector.
///
/// Only `{domain, client_id, client_secret}` affect this client; the base
/// endpoint and token payload are derived from them.
#[derive(Debug, Clone)]
pub struct SalesforceConfig {
    /// My Domain name, i.e. the `<domain>` in
    /// `https://<domain>.my.salesforce.com`.
    pub domain: String,
    /// OAuth2 client credentials.
    pub credentials: SalesforceCredentials,
    /// Overrides the derived base URL. Intended for tests against mock
    /// endpoints.
    base_url_override: Option<String>,
}

impl SalesforceConfig {
    /// Creates a new configuration.
    pub fn new(
        domain: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<SecretString>,
    ) -> Self {
        Self {
            domain: domain.into(),
            credentials: SalesforceCredentials {
                client_id: client_id.into(),
                client_secret: client_secret.into(),
            },
            base_url_override: None,
        }
    }

    /// Points the client at an explicit base URL instead of the derived
    /// `https://{domain}.my.salesforce.com`. For tests with mock servers.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    /// Validates required fields.
    pub fn validate(&self) -> SalesforceResult<()> {
        if self.domain.is_empty() && self.base_url_override.is_none() {
            return Err(SalesforceError::Config("domain is required".to_string()));
        }
        if self.credentials.client_id.is_empty() {
            return Err(SalesforceError::Config("client_id is required".to_string()));
        }
        Ok(())
    }

    /// Base URL of the Salesforce org.
    #[must_use]
    pub fn base_url(&self) -> String {
        match &self.base_url_override {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.my.salesforce.com", self.domain),
        }
    }

    /// `OAuth2` token endpoint.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/services/oauth2/token", self.base_url())
    }

    /// SOQL query endpoint.
    #[must_use]
    pub fn query_url(&self) -> String {
        format!("{}/services/data/{API_VERSION}/query", self.base_url())
    }

    /// Global describe endpoint listing all sobjects.
    #[must_use]
    pub fn describe_url(&self) -> String {
        format!("{}/services/data/{API_VERSION}/sobjects", self.base_url())
    }

    /// Per-object describe endpoint.
    #[must_use]
    pub fn describe_sobject_url(&self, sobject: &str) -> String {
        format!(
            "{}/services/data/{API_VERSION}/sobjects/{sobject}/describe",
            self.base_url()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SalesforceConfig {
        SalesforceConfig::new("acme", "client-id", "client-secret".to_string())
    }

    #[test]
    fn test_base_url_derived_from_domain() {
        assert_eq!(config().base_url(), "https://acme.my.salesforce.com");
    }

    #[test]
    fn test_base_url_override() {
        let config = config().with_base_url("http://127.0.0.1:9999/");
        assert_eq!(config.base_url(), "http://127.0.0.1:9999");
        assert_eq!(config.token_url(), "http://127.0.0.1:9999/services/oauth2/token");
    }

    #[test]
    fn test_endpoint_urls() {
        let config = config();
        assert_eq!(
            config.query_url(),
            "https://acme.my.salesforce.com/services/data/v58.0/query"
        );
        assert_eq!(
            config.describe_sobject_url("Account"),
            "https://acme.my.salesforce.com/services/data/v58.0/sobjects/Account/describe"
        );
    }

    #[test]
    fn test_validation() {
        assert!(config().validate().is_ok());

        let missing_domain = SalesforceConfig::new("", "id", "secret".to_string());
        assert!(missing_domain.validate().is_err());

        let missing_client_id = SalesforceConfig::new("acme", "", "secret".to_string());
        assert!(missing_client_id.validate().is_err());
    }
}
