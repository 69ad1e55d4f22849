//! Field selection
//!
//! Picks the queryable fields from an object schema. Compound fields
//! (addresses, geolocations) are skipped because their components are
//! already present as scalar fields; `Name` is the exception, being both a
//! compound parent and a queryable scalar.

use crate::client::ObjectSchema;
use std::collections::HashSet;

/// Compound parent that stays queryable
const QUERYABLE_COMPOUND: &str = "Name";

/// Describe type whose values are normalized
const DATETIME_TYPE: &str = "datetime";

/// Fields to query and which of them hold datetimes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
    /// Field names in schema order
    pub fields: Vec<String>,
    /// Subset of `fields` with datetime values
    pub datetime_fields: HashSet<String>,
}

impl FieldSelection {
    /// Comma-separated field list for a select clause
    pub fn select_list(&self) -> String {
        self.fields.join(", ")
    }

    /// Whether the field needs datetime normalization
    pub fn is_datetime(&self, field: &str) -> bool {
        self.datetime_fields.contains(field)
    }
}

/// Select queryable fields and the datetime subset from a schema
pub fn select_fields(schema: &ObjectSchema) -> FieldSelection {
    let compound: HashSet<&str> = schema
        .fields
        .iter()
        .filter_map(|f| f.compound_field_name.as_deref())
        .filter(|name| *name != QUERYABLE_COMPOUND)
        .collect();

    let mut selection = FieldSelection::default();
    for field in &schema.fields {
        if compound.contains(field.name.as_str()) {
            continue;
        }
        if field.field_type == DATETIME_TYPE {
            selection.datetime_fields.insert(field.name.clone());
        }
        selection.fields.push(field.name.clone());
    }
    selection
}
