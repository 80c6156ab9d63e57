//! Record Store Client
//!
//! Find-by-field and partial update against the external registration
//! table (an Airtable-style tabular store over HTTP).

use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ClientError, Result};

pub const AIRTABLE_BASE_URL: &str = "https://api.airtable.com/v0";

/// One row of a table: the store-assigned record id plus its fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Tag labels on the record. A missing or non-array field reads as
    /// empty, matching how the store omits empty multi-selects.
    pub fn tags(&self, field: &str) -> Vec<String> {
        self.fields
            .get(field)
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    records: Vec<Record>,
}

/// Record store capability.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// First record whose `field` equals `value`, or `None` on zero
    /// matches. Transport failures and non-success responses are errors,
    /// never `None`.
    async fn find_by_field(&self, table: &str, field: &str, value: &str)
    -> Result<Option<Record>>;

    /// Partial update: only the keys present in `fields` change.
    async fn update(
        &self,
        table: &str,
        record_id: &str,
        fields: Map<String, Value>,
    ) -> Result<Record>;
}

/// HTTP record store client.
pub struct AirtableStore {
    client: reqwest::Client,
    base_url: String,
    base_id: String,
    api_key: String,
}

impl AirtableStore {
    pub fn new(base_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_base_url(AIRTABLE_BASE_URL, base_id, api_key)
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(
        base_url: impl Into<String>,
        base_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            base_id: base_id.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl RecordStore for AirtableStore {
    async fn find_by_field(
        &self,
        table: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>> {
        // The value is interpolated unescaped; registration ids are short
        // alphanumeric tokens and never contain quotes.
        let formula = format!("{{{field}}} = \"{value}\"");
        let url = format!("{}/{}/{}", self.base_url, self.base_id, table);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("filterByFormula", formula.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Store(response.text().await.unwrap_or_default()));
        }

        let result: FindResponse = response.json().await?;
        Ok(result.records.into_iter().next())
    }

    async fn update(
        &self,
        table: &str,
        record_id: &str,
        fields: Map<String, Value>,
    ) -> Result<Record> {
        let url = format!("{}/{}/{}/{}", self.base_url, self.base_id, table, record_id);

        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "fields": fields }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Store(response.text().await.unwrap_or_default()));
        }

        Ok(response.json().await?)
    }
}

/// In-memory record store (tests and development). Updates are logged so
/// tests can assert how many writes a flow performed.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<Record>>,
    updates: RwLock<Vec<(String, Map<String, Value>)>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: Record) {
        self.records.write().unwrap().push(record);
    }

    pub fn get(&self, record_id: &str) -> Option<Record> {
        self.records
            .read()
            .unwrap()
            .iter()
            .find(|record| record.id == record_id)
            .cloned()
    }

    /// Every `(record_id, patch)` applied so far, in order.
    pub fn updates(&self) -> Vec<(String, Map<String, Value>)> {
        self.updates.read().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_by_field(
        &self,
        _table: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>> {
        let records = self.records.read().unwrap();
        Ok(records
            .iter()
            .find(|record| record.field_str(field) == Some(value))
            .cloned())
    }

    async fn update(
        &self,
        _table: &str,
        record_id: &str,
        fields: Map<String, Value>,
    ) -> Result<Record> {
        let mut records = self.records.write().unwrap();
        let record = records
            .iter_mut()
            .find(|record| record.id == record_id)
            .ok_or_else(|| ClientError::Store(format!("record {record_id} not found")))?;

        for (key, value) in &fields {
            record.fields.insert(key.clone(), value.clone());
        }
        let updated = record.clone();
        drop(records);

        self.updates
            .write()
            .unwrap()
            .push((record_id.to_owned(), fields));
        Ok(updated)
    }
}
