//! Mapping of raw Salesforce records into the canonical document schema.
//!
//! The mappers are pure: records already enriched with resolved reference
//! sub-records (under `Owner`, `Account`, `Converted*` keys) go in, a
//! canonical document comes out. Missing optional fields become stable
//! defaults and never raise.

use serde_json::{json, Value};

/// Canonical output record. Always carries `_id`, `type`, a `source`
/// provenance tag and a `url` back-link to the originating record.
pub type Document = Value;

static NULL: Value = Value::Null;

/// Transforms raw Salesforce records into canonical documents.
#[derive(Debug, Clone)]
pub struct DocMapper {
    base_url: String,
}

impl DocMapper {
    /// Creates a mapper producing URLs under the given org base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Maps an Account record, including its embedded latest opportunity.
    #[must_use]
    pub fn map_account(&self, account: &Value) -> Document {
        let owner = sub_record(account, "Owner");

        let opportunity = account
            .get("Opportunities")
            .and_then(|o| o.get("records"))
            .and_then(Value::as_array)
            .and_then(|records| records.first())
            .cloned()
            .unwrap_or(Value::Null);
        let opportunity_url = self.record_url_or_empty(&opportunity);

        json!({
            "_id": field(account, "Id"),
            "account_type": field(account, "Type"),
            "address": format_address(account.get("BillingAddress")),
            "body": field(account, "Description"),
            "content_source_id": field(account, "Id"),
            "created_at": field(account, "CreatedDate"),
            "last_updated": field(account, "LastModifiedDate"),
            // Activity enrichment is not implemented; the keys stay in
            // the field set as empty placeholders.
            "open_activities": "",
            "open_activities_urls": "",
            "opportunity_name": field(&opportunity, "Name"),
            "opportunity_status": text_or_empty(&opportunity, "StageName"),
            "opportunity_url": opportunity_url,
            "owner": field(owner, "Name"),
            "owner_email": field(owner, "Email"),
            "rating": field(account, "Rating"),
            "source": "salesforce",
            "tags": [field(account, "Type")],
            "title": field(account, "Name"),
            "type": "account",
            "url": self.record_url(account),
            "website_url": field(account, "Website"),
        })
    }

    /// Maps an Opportunity record.
    #[must_use]
    pub fn map_opportunity(&self, opportunity: &Value) -> Document {
        let owner = sub_record(opportunity, "Owner");

        json!({
            "_id": field(opportunity, "Id"),
            "body": field(opportunity, "Description"),
            "content_source_id": field(opportunity, "Id"),
            "created_at": field(opportunity, "CreatedDate"),
            "last_updated": field(opportunity, "LastModifiedDate"),
            "next_step": field(opportunity, "NextStep"),
            "owner": field(owner, "Name"),
            "owner_email": field(owner, "Email"),
            "source": "salesforce",
            "status": text_or_empty(opportunity, "StageName"),
            "title": field(opportunity, "Name"),
            "type": "opportunity",
            "url": self.record_url(opportunity),
        })
    }

    /// Maps a Contact record enriched with its `Account` and `Owner`
    /// reference records.
    #[must_use]
    pub fn map_contact(&self, contact: &Value) -> Document {
        let account = sub_record(contact, "Account");
        let owner = sub_record(contact, "Owner");

        let account_url = self.id_url_or_empty(contact, "AccountId");
        let owner_url = self.id_url_or_empty(contact, "OwnerId");
        let thumbnail = self.thumbnail_or_empty(contact);

        json!({
            "_id": field(contact, "Id"),
            "account": field(account, "Name"),
            "account_url": account_url,
            "body": field(contact, "Description"),
            "email": field(contact, "Email"),
            "job_title": field(contact, "Title"),
            "last_updated": field(contact, "LastModifiedDate"),
            "lead_source": field(contact, "LeadSource"),
            "owner": field(owner, "Name"),
            "owner_url": owner_url,
            "phone": field(contact, "Phone"),
            "source": "salesforce",
            "thumbnail": thumbnail,
            "title": field(contact, "Name"),
            "type": "contact",
            "url": self.record_url(contact),
        })
    }

    /// Maps a Lead record enriched with its `Owner` and converted
    /// reference records. Converted sub-fields are only populated when the
    /// corresponding record carries an identifier.
    #[must_use]
    pub fn map_lead(&self, lead: &Value) -> Document {
        let owner = sub_record(lead, "Owner");
        let converted_account = sub_record(lead, "ConvertedAccount");
        let converted_contact = sub_record(lead, "ConvertedContact");
        let converted_opportunity = sub_record(lead, "ConvertedOpportunity");

        let owner_url = self.id_url_or_empty(lead, "OwnerId");
        let thumbnail = match lead.get("PhotoUrl").and_then(Value::as_str) {
            Some(photo_url) => json!(format!("{}{photo_url}", self.base_url)),
            None => Value::Null,
        };

        json!({
            "_id": field(lead, "Id"),
            "body": field(lead, "Description"),
            "company": field(lead, "Company"),
            "converted_account": field(converted_account, "Name"),
            "converted_account_url": self.record_url_or_null(converted_account),
            "converted_at": field(lead, "ConvertedDate"),
            "converted_contact": field(converted_contact, "Name"),
            "converted_contact_url": self.record_url_or_null(converted_contact),
            "converted_opportunity": field(converted_opportunity, "Name"),
            "converted_opportunity_url": self.record_url_or_null(converted_opportunity),
            "email": field(lead, "Email"),
            "job_title": field(lead, "Title"),
            "last_updated": field(lead, "LastModifiedDate"),
            "lead_source": field(lead, "LeadSource"),
            "owner": field(owner, "Name"),
            "owner_url": owner_url,
            "phone": field(lead, "Phone"),
            "rating": field(lead, "Rating"),
            "source": "salesforce",
            "status": field(lead, "Status"),
            "title": field(lead, "Name"),
            "thumbnail": thumbnail,
            "type": "lead",
            "url": self.record_url(lead),
        })
    }

    fn record_url(&self, record: &Value) -> Value {
        match record.get("Id").and_then(Value::as_str) {
            Some(id) => json!(format!("{}/{id}", self.base_url)),
            None => Value::Null,
        }
    }

    fn record_url_or_empty(&self, record: &Value) -> Value {
        match record.get("Id").and_then(Value::as_str) {
            Some(id) => json!(format!("{}/{id}", self.base_url)),
            None => json!(""),
        }
    }

    fn record_url_or_null(&self, record: &Value) -> Value {
        self.record_url(record)
    }

    fn id_url_or_empty(&self, record: &Value, id_key: &str) -> Value {
        match record.get(id_key).and_then(Value::as_str) {
            Some(id) if !id.is_empty() => json!(format!("{}/{id}", self.base_url)),
            _ => json!(""),
        }
    }

    fn thumbnail_or_empty(&self, record: &Value) -> Value {
        match record.get("PhotoUrl").and_then(Value::as_str) {
            Some(photo_url) => json!(format!("{}{photo_url}", self.base_url)),
            None => json!(""),
        }
    }
}

fn field(record: &Value, key: &str) -> Value {
    record.get(key).cloned().unwrap_or(Value::Null)
}

fn text_or_empty(record: &Value, key: &str) -> Value {
    record.get(key).cloned().unwrap_or_else(|| json!(""))
}

fn sub_record<'a>(record: &'a Value, key: &str) -> &'a Value {
    record.get(key).unwrap_or(&NULL)
}

/// Folds a Salesforce `BillingAddress` compound field into one
/// comma-joined string. Absent parts are skipped.
fn format_address(address: Option<&Value>) -> String {
    let Some(address) = address else {
        return String::new();
    };

    let parts = ["street", "city", "state", "postalCode", "country"];
    parts
        .iter()
        .filter_map(|part| {
            address.get(part).and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        })
        .collect::<Vec<_>>()
        .join(", ")
}
