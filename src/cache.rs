//! Session-scoped cache of reference sobjects.
//!
//! Many records carry foreign-key style fields (`OwnerId`, `AccountId`,
//! ...) whose referenced records are taxing on the rate limiter to fetch
//! per record. Each reference table is fetched once per session instead
//! and resolved from memory.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::client::SalesforceClient;
use crate::error::SalesforceResult;
use crate::soql::SoqlBuilder;

/// Sobjects that carry an `Email` worth caching alongside the name.
const IDENTITY_SOBJECTS: &[&str] = &["User", "Contact", "Lead"];

impl SalesforceClient {
    /// Returns the cached reference table for `sobject`, keyed by record
    /// Id, building it on first use.
    ///
    /// A non-queryable sobject yields an empty table rather than an error
    /// so a missing reference type never fails the sync. Tables are
    /// independent: a failure building one leaves the others untouched and
    /// propagates only to the caller that needed it.
    pub async fn reference_records(
        &self,
        sobject: &str,
    ) -> SalesforceResult<Arc<HashMap<String, Value>>> {
        if let Some(table) = self.reference_cache.read().await.get(sobject) {
            return Ok(table.clone());
        }

        let table = Arc::new(self.build_reference_table(sobject).await?);
        self.reference_cache
            .write()
            .await
            .insert(sobject.to_string(), table.clone());
        Ok(table)
    }

    async fn build_reference_table(
        &self,
        sobject: &str,
    ) -> SalesforceResult<HashMap<String, Value>> {
        if !self.is_queryable(sobject).await? {
            info!(sobject, "Sobject is not queryable, so it won't be cached");
            return Ok(HashMap::new());
        }

        let mut fields = vec!["Name"];
        if IDENTITY_SOBJECTS.contains(&sobject) {
            fields.push("Email");
        }

        let mut builder = SoqlBuilder::new(sobject);
        builder.with_id().with_fields(fields);
        let query = builder.build();

        let mut table = HashMap::new();
        let mut pages = self.query_pages(query);
        while let Some(records) = pages.next_page().await? {
            for record in records {
                if let Some(id) = record.get("Id").and_then(Value::as_str) {
                    table.insert(id.to_string(), record);
                }
            }
        }
        Ok(table)
    }
}
