//! Remote API payload types

use crate::types::Record;
use serde::{Deserialize, Serialize};

/// Describe-call result for one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSchema {
    /// Object API name
    pub name: String,
    /// Field descriptors in describe order
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

/// One field of an object schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Field API name
    pub name: String,
    /// Describe type, e.g. `datetime`, `string`, `address`
    #[serde(rename = "type")]
    pub field_type: String,
    /// Parent compound field this field is a component of
    #[serde(default)]
    pub compound_field_name: Option<String>,
}

impl FieldDescriptor {
    /// Create a plain field
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            compound_field_name: None,
        }
    }

    /// Mark the field as a component of a compound field
    #[must_use]
    pub fn within(mut self, compound: impl Into<String>) -> Self {
        self.compound_field_name = Some(compound.into());
        self
    }
}

/// One page of a standard query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    /// No further pages remain
    pub done: bool,
    /// Records in server order
    #[serde(default)]
    pub records: Vec<Record>,
    /// Relative URL of the next page
    #[serde(default)]
    pub next_records_url: Option<String>,
    /// Total rows the query matches
    #[serde(default)]
    pub total_size: Option<u64>,
}

// ============================================================================
// Bulk Job Payloads
// ============================================================================

/// Bulk job or batch state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchState {
    /// Waiting to start
    Queued,
    /// Running
    InProgress,
    /// Finished, results available
    Completed,
    /// Failed
    Failed,
    /// Will never be processed (e.g. the parent job was aborted)
    NotProcessed,
    /// Anything the API adds later
    Unknown(String),
}

impl BatchState {
    /// Parse the API's state name
    pub fn parse(state: &str) -> Self {
        match state {
            "Queued" => Self::Queued,
            "InProgress" => Self::InProgress,
            "Completed" => Self::Completed,
            "Failed" => Self::Failed,
            "NotProcessed" => Self::NotProcessed,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Check if the batch will not change state again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::NotProcessed)
    }

    /// Check if results can be fetched
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Job creation response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JobInfo {
    pub(crate) id: String,
}

/// Batch creation and status response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchInfo {
    pub(crate) id: String,
    pub(crate) state: String,
    #[serde(default)]
    pub(crate) state_message: Option<String>,
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_describe_deserialize() {
        let schema: ObjectSchema = serde_json::from_str(
            r#"{
                "name": "Account",
                "custom": false,
                "fields": [
                    {"name": "Id", "type": "id", "compoundFieldName": null},
                    {"name": "BillingCity", "type": "string", "compoundFieldName": "BillingAddress"},
                    {"name": "SystemModstamp", "type": "datetime"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(schema.fields.len(), 3);
        assert_eq!(
            schema.fields[1],
            FieldDescriptor::new("BillingCity", "string").within("BillingAddress")
        );
        assert_eq!(schema.fields[2].compound_field_name, None);
    }

    #[test]
    fn test_query_page_deserialize() {
        let page: QueryPage = serde_json::from_str(
            r#"{
                "totalSize": 3,
                "done": false,
                "nextRecordsUrl": "/services/data/v59.0/query/01g-2000",
                "records": [{"attributes": {"type": "Lead"}, "Id": "00Q1"}]
            }"#,
        )
        .unwrap();
        assert!(!page.done);
        assert_eq!(page.records.len(), 1);
        assert_eq!(
            page.next_records_url.as_deref(),
            Some("/services/data/v59.0/query/01g-2000")
        );
    }

    #[test]
    fn test_batch_state() {
        assert!(BatchState::parse("Completed").is_completed());
        assert!(BatchState::parse("NotProcessed").is_terminal());
        assert!(!BatchState::parse("InProgress").is_terminal());
        assert_eq!(
            BatchState::parse("Paused"),
            BatchState::Unknown("Paused".to_string())
        );
    }
}
