//! Schema introspection: which sobjects and fields the current credentials
//! may query.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use tracing::debug;

use crate::client::SalesforceClient;
use crate::error::SalesforceResult;

/// Sobjects this connector ingests or caches.
pub const RELEVANT_SOBJECTS: &[&str] = &["Account", "Contact", "Lead", "Opportunity", "User"];

/// Fields the connector is interested in across all relevant sobjects.
/// Per-tenant field-level security can remove any of these, so queries are
/// always filtered through the describe data first.
pub const RELEVANT_SOBJECT_FIELDS: &[&str] = &[
    "AccountId",
    "BillingAddress",
    "Company",
    "ConvertedAccountId",
    "ConvertedContactId",
    "ConvertedDate",
    "ConvertedOpportunityId",
    "Department",
    "Description",
    "Email",
    "LeadSource",
    "Name",
    "OwnerId",
    "Phone",
    "PhotoUrl",
    "Rating",
    "StageName",
    "Status",
    "Title",
    "Type",
    "Website",
];

/// Entry of the global describe response.
#[derive(Debug, Deserialize)]
struct SobjectDescriptor {
    name: String,
    #[serde(default)]
    queryable: bool,
}

#[derive(Debug, Deserialize)]
struct GlobalDescribeResponse {
    #[serde(default)]
    sobjects: Vec<SobjectDescriptor>,
}

/// Entry of a per-object describe response.
#[derive(Debug, Deserialize)]
struct FieldDescriptor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SobjectDescribeResponse {
    #[serde(default)]
    fields: Vec<FieldDescriptor>,
}

impl SalesforceClient {
    /// Returns the lowercased names of queryable relevant sobjects.
    ///
    /// Fetched from the global describe endpoint once per session and
    /// memoized.
    pub async fn queryable_objects(&self) -> SalesforceResult<HashSet<String>> {
        if let Some(objects) = self.queryable_objects.read().await.as_ref() {
            return Ok(objects.clone());
        }

        let response = self.fetch_json(&self.config.describe_url(), None).await?;
        let describe: GlobalDescribeResponse = serde_json::from_value(response)?;

        let objects: HashSet<String> = describe
            .sobjects
            .into_iter()
            .filter(|s| s.queryable && RELEVANT_SOBJECTS.contains(&s.name.as_str()))
            .map(|s| s.name.to_lowercase())
            .collect();

        *self.queryable_objects.write().await = Some(objects.clone());
        Ok(objects)
    }

    /// Whether the current credentials may query the given sobject.
    ///
    /// Org settings can make sobjects non-queryable; querying those raises
    /// errors, so they are filtered out in advance.
    pub async fn is_queryable(&self, sobject: &str) -> SalesforceResult<bool> {
        Ok(self
            .queryable_objects()
            .await?
            .contains(&sobject.to_lowercase()))
    }

    /// Returns the subset of `candidates` that the current credentials may
    /// query on `sobject`, dropping disallowed names silently.
    ///
    /// The per-object describe data is fetched once per session for every
    /// relevant sobject and memoized.
    pub async fn select_queryable_fields(
        &self,
        sobject: &str,
        candidates: &[&str],
    ) -> SalesforceResult<Vec<String>> {
        let fields_by_object = self.queryable_sobject_fields().await?;
        let allowed = fields_by_object.get(sobject);

        Ok(candidates
            .iter()
            .filter(|f| allowed.is_some_and(|set| set.contains(&f.to_lowercase())))
            .map(|f| (*f).to_string())
            .collect())
    }

    async fn queryable_sobject_fields(
        &self,
    ) -> SalesforceResult<HashMap<String, HashSet<String>>> {
        if let Some(fields) = self.queryable_fields.read().await.as_ref() {
            return Ok(fields.clone());
        }

        let mut fields_by_object = HashMap::new();
        for sobject in RELEVANT_SOBJECTS {
            let url = self.config.describe_sobject_url(sobject);
            let response = self.fetch_json(&url, None).await?;
            let describe: SobjectDescribeResponse = serde_json::from_value(response)?;

            let fields: HashSet<String> = describe
                .fields
                .into_iter()
                .filter(|f| RELEVANT_SOBJECT_FIELDS.contains(&f.name.as_str()))
                .map(|f| f.name.to_lowercase())
                .collect();
            debug!(sobject, field_count = fields.len(), "Described sobject");
            fields_by_object.insert((*sobject).to_string(), fields);
        }

        *self.queryable_fields.write().await = Some(fields_by_object.clone());
        Ok(fields_by_object)
    }
}
