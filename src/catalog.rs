//! Resource catalog
//!
//! Declarative table of the streams a run can extract. Each entry names a
//! remote object, how the sink writes it, and for merge streams the field
//! used as the incremental cursor. Nothing downstream branches on the
//! specific object names, so extending the catalog is a matter of adding
//! entries.

use crate::error::{Error, Result};
use crate::types::WriteMode;
use serde::{Deserialize, Serialize};

/// One stream definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSpec {
    /// Stream (destination table) name
    pub name: String,
    /// Remote object name
    pub object: String,
    /// How the sink applies the records
    #[serde(default)]
    pub write_mode: WriteMode,
    /// Cursor field, required for merge streams
    #[serde(default)]
    pub cursor_field: Option<String>,
}

impl StreamSpec {
    /// A full-extraction stream
    pub fn replace(name: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object: object.into(),
            write_mode: WriteMode::Replace,
            cursor_field: None,
        }
    }

    /// An incremental stream keyed on `cursor_field`
    pub fn merge(
        name: impl Into<String>,
        object: impl Into<String>,
        cursor_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            object: object.into(),
            write_mode: WriteMode::Merge,
            cursor_field: Some(cursor_field.into()),
        }
    }

    /// Check that the write mode and cursor agree
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.object.is_empty() {
            return Err(Error::invalid_value(
                "stream",
                "stream definitions need a name and an object",
            ));
        }
        let has_cursor = self.cursor_field.as_deref().is_some_and(|f| !f.is_empty());
        match (self.write_mode, has_cursor) {
            (WriteMode::Merge, false) => Err(Error::invalid_value(
                format!("streams.{}.cursor_field", self.name),
                "merge streams need a cursor field",
            )),
            (WriteMode::Replace, true) => Err(Error::invalid_value(
                format!("streams.{}.cursor_field", self.name),
                "replace streams are extracted in full and take no cursor field",
            )),
            _ => Ok(()),
        }
    }

    /// Whether this stream extracts incrementally
    pub fn is_incremental(&self) -> bool {
        self.write_mode == WriteMode::Merge && self.cursor_field.is_some()
    }
}

/// Ordered set of stream definitions
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    streams: Vec<StreamSpec>,
}

impl Catalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard CRM object set
    pub fn salesforce() -> Self {
        let streams = vec![
            StreamSpec::replace("sf_user", "User"),
            StreamSpec::replace("user_role", "UserRole"),
            StreamSpec::merge("opportunity", "Opportunity", "SystemModstamp"),
            StreamSpec::merge(
                "opportunity_line_item",
                "OpportunityLineItem",
                "SystemModstamp",
            ),
            StreamSpec::merge(
                "opportunity_contact_role",
                "OpportunityContactRole",
                "SystemModstamp",
            ),
            StreamSpec::merge("account", "Account", "LastModifiedDate"),
            StreamSpec::replace("contact", "Contact"),
            StreamSpec::replace("lead", "Lead"),
            StreamSpec::replace("campaign", "Campaign"),
            StreamSpec::merge("campaign_member", "CampaignMember", "SystemModstamp"),
            StreamSpec::replace("product_2", "Product2"),
            StreamSpec::replace("pricebook_2", "Pricebook2"),
            StreamSpec::replace("pricebook_entry", "PricebookEntry"),
            StreamSpec::merge("task", "Task", "SystemModstamp"),
            StreamSpec::merge("event", "Event", "SystemModstamp"),
        ];
        Self { streams }
    }

    /// Add or replace a stream definition
    pub fn with_stream(mut self, spec: StreamSpec) -> Result<Self> {
        spec.validate()?;
        match self.streams.iter_mut().find(|s| s.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.streams.push(spec),
        }
        Ok(self)
    }

    /// Look up a stream by name
    pub fn get(&self, name: &str) -> Option<&StreamSpec> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Resolve a selection; an empty selection means every stream
    pub fn select(&self, names: &[String]) -> Result<Vec<&StreamSpec>> {
        if names.is_empty() {
            return Ok(self.streams.iter().collect());
        }
        names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| Error::StreamNotFound {
                    stream: name.clone(),
                })
            })
            .collect()
    }

    /// All stream definitions in catalog order
    pub fn streams(&self) -> &[StreamSpec] {
        &self.streams
    }

    /// Number of streams
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether the catalog has no streams
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
