//! Sync orchestration: drives queries per sobject and yields canonical
//! documents.

use serde_json::Value;
use tracing::{info, instrument};

use crate::client::SalesforceClient;
use crate::error::SalesforceResult;
use crate::mapper::Document;
use crate::soql::SoqlBuilder;

/// Handle to downloadable attachment content.
///
/// Content extraction is not implemented for this connector, so documents
/// are always emitted with an absent handle. The type exists to keep the
/// consumer-facing pair shape stable.
#[derive(Debug, Clone)]
pub struct ContentHandle {
    /// Id of the attachment record.
    pub id: String,
}

impl SalesforceClient {
    /// Streams all documents for one sync run, in fixed sobject order:
    /// accounts, opportunities, contacts, leads.
    ///
    /// The bearer token is acquired once up front; later refreshes happen
    /// reactively on 401 responses. A remote failure while streaming one
    /// sobject terminates the run (fail-fast per sobject, no suppression).
    #[instrument(skip(self, emit))]
    pub async fn get_docs<F>(&self, emit: &mut F) -> SalesforceResult<()>
    where
        F: FnMut(Document, Option<ContentHandle>),
    {
        self.get_token().await?;

        self.get_accounts(emit).await?;
        self.get_opportunities(emit).await?;
        self.get_contacts(emit).await?;
        self.get_leads(emit).await?;
        Ok(())
    }

    /// Streams Account documents. Skipped with an info log when the
    /// sobject is not queryable for the current credentials.
    pub async fn get_accounts<F>(&self, emit: &mut F) -> SalesforceResult<()>
    where
        F: FnMut(Document, Option<ContentHandle>),
    {
        if !self.is_queryable("Account").await? {
            info!("Object Account is not queryable, so it won't be ingested");
            return Ok(());
        }

        let query = self.accounts_query().await?;
        let mut pages = self.query_pages(query);
        while let Some(records) = pages.next_page().await? {
            for record in records {
                emit(self.doc_mapper.map_account(&record), None);
            }
        }
        Ok(())
    }

    /// Streams Opportunity documents.
    pub async fn get_opportunities<F>(&self, emit: &mut F) -> SalesforceResult<()>
    where
        F: FnMut(Document, Option<ContentHandle>),
    {
        if !self.is_queryable("Opportunity").await? {
            info!("Object Opportunity is not queryable, so it won't be ingested");
            return Ok(());
        }

        let query = self.opportunities_query().await?;
        let mut pages = self.query_pages(query);
        while let Some(records) = pages.next_page().await? {
            for record in records {
                emit(self.doc_mapper.map_opportunity(&record), None);
            }
        }
        Ok(())
    }

    /// Streams Contact documents, resolving `AccountId`/`OwnerId` against
    /// the session's reference cache.
    pub async fn get_contacts<F>(&self, emit: &mut F) -> SalesforceResult<()>
    where
        F: FnMut(Document, Option<ContentHandle>),
    {
        if !self.is_queryable("Contact").await? {
            info!("Object Contact is not queryable, so it won't be ingested");
            return Ok(());
        }

        let query = self.contacts_query().await?;
        let accounts = self.reference_records("Account").await?;
        let users = self.reference_records("User").await?;

        let mut pages = self.query_pages(query);
        while let Some(records) = pages.next_page().await? {
            for mut record in records {
                attach_reference(&mut record, "Account", "AccountId", &accounts);
                attach_reference(&mut record, "Owner", "OwnerId", &users);
                emit(self.doc_mapper.map_contact(&record), None);
            }
        }
        Ok(())
    }

    /// Streams Lead documents, resolving the owner and the converted
    /// account/contact/opportunity references.
    pub async fn get_leads<F>(&self, emit: &mut F) -> SalesforceResult<()>
    where
        F: FnMut(Document, Option<ContentHandle>),
    {
        if !self.is_queryable("Lead").await? {
            info!("Object Lead is not queryable, so it won't be ingested");
            return Ok(());
        }

        let query = self.leads_query().await?;
        let users = self.reference_records("User").await?;
        let accounts = self.reference_records("Account").await?;
        let contacts = self.reference_records("Contact").await?;
        let opportunities = self.reference_records("Opportunity").await?;

        let mut pages = self.query_pages(query);
        while let Some(records) = pages.next_page().await? {
            for mut record in records {
                attach_reference(&mut record, "Owner", "OwnerId", &users);
                attach_reference(&mut record, "ConvertedAccount", "ConvertedAccountId", &accounts);
                attach_reference(&mut record, "ConvertedContact", "ConvertedContactId", &contacts);
                attach_reference(
                    &mut record,
                    "ConvertedOpportunity",
                    "ConvertedOpportunityId",
                    &opportunities,
                );
                emit(self.doc_mapper.map_lead(&record), None);
            }
        }
        Ok(())
    }

    async fn accounts_query(&self) -> SalesforceResult<String> {
        let queryable_fields = self
            .select_queryable_fields(
                "Account",
                &[
                    "Name",
                    "Description",
                    "BillingAddress",
                    "Type",
                    "Website",
                    "Rating",
                    "Department",
                ],
            )
            .await?;

        let mut builder = SoqlBuilder::new("Account");
        builder
            .with_id()
            .with_default_metafields()
            .with_fields(queryable_fields)
            .with_fields(["Owner.Id", "Owner.Name", "Owner.Email"])
            .with_fields(["Parent.Id", "Parent.Name"]);

        if self.is_queryable("Opportunity").await? {
            let join_fields = self
                .select_queryable_fields("Opportunity", &["Name", "StageName"])
                .await?;
            let mut join = SoqlBuilder::new("Opportunities");
            join.with_id()
                .with_fields(join_fields)
                .with_order_by("CreatedDate DESC")
                .with_limit(1);
            builder.with_join(join.build());
        }

        Ok(builder.build())
    }

    async fn opportunities_query(&self) -> SalesforceResult<String> {
        let queryable_fields = self
            .select_queryable_fields("Opportunity", &["Name", "Description", "StageName"])
            .await?;

        let mut builder = SoqlBuilder::new("Opportunity");
        builder
            .with_id()
            .with_default_metafields()
            .with_fields(queryable_fields)
            .with_fields(["Owner.Id", "Owner.Name", "Owner.Email"]);
        Ok(builder.build())
    }

    async fn contacts_query(&self) -> SalesforceResult<String> {
        let queryable_fields = self
            .select_queryable_fields(
                "Contact",
                &[
                    "Name",
                    "Description",
                    "Email",
                    "Phone",
                    "Title",
                    "PhotoUrl",
                    "LeadSource",
                    "AccountId",
                    "OwnerId",
                ],
            )
            .await?;

        let mut builder = SoqlBuilder::new("Contact");
        builder
            .with_id()
            .with_default_metafields()
            .with_fields(queryable_fields);
        Ok(builder.build())
    }

    async fn leads_query(&self) -> SalesforceResult<String> {
        let queryable_fields = self
            .select_queryable_fields(
                "Lead",
                &[
                    "Company",
                    "ConvertedAccountId",
                    "ConvertedContactId",
                    "ConvertedDate",
                    "ConvertedOpportunityId",
                    "Description",
                    "Email",
                    "LeadSource",
                    "Name",
                    "OwnerId",
                    "Phone",
                    "PhotoUrl",
                    "Rating",
                    "Status",
                    "Title",
                ],
            )
            .await?;

        let mut builder = SoqlBuilder::new("Lead");
        builder
            .with_id()
            .with_default_metafields()
            .with_fields(queryable_fields);
        Ok(builder.build())
    }
}

/// Embeds the resolved reference record under `key` when the record's
/// `id_key` points at a cached entry.
fn attach_reference(
    record: &mut Value,
    key: &str,
    id_key: &str,
    table: &std::collections::HashMap<String, Value>,
) {
    let resolved = record
        .get(id_key)
        .and_then(Value::as_str)
        .and_then(|id| table.get(id))
        .cloned();
    if let (Some(reference), Some(map)) = (resolved, record.as_object_mut()) {
        map.insert(key.to_string(), reference);
    }
}
