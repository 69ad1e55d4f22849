//! Common types used throughout sf-ingest
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type (insertion ordered)
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// One remote entity instance, keys in the order the API returned them
pub type Record = JsonObject;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// Write Mode
// ============================================================================

/// How the downstream sink applies a stream's records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Fully overwrite the destination every run
    #[default]
    Replace,
    /// Upsert by the natural key
    Merge,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Replace => f.write_str("replace"),
            WriteMode::Merge => f.write_str("merge"),
        }
    }
}

// ============================================================================
// Query Path
// ============================================================================

/// Which execution path produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPath {
    /// Asynchronous bulk job; datetimes arrive as epoch milliseconds
    Bulk,
    /// Synchronous paginated query; datetimes arrive as API date-time text
    Standard,
}

impl fmt::Display for QueryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryPath::Bulk => f.write_str("bulk"),
            QueryPath::Standard => f.write_str("standard"),
        }
    }
}

// ============================================================================
// Result Cap
// ============================================================================

/// Hard cap on the number of rows a query may return
///
/// Deserializes from `null`/absent (no cap) or a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<u32>", into = "Option<u32>")]
pub enum ResultCap {
    /// No `LIMIT` clause
    #[default]
    Unlimited,
    /// Append `LIMIT n`
    Limit(u32),
}

impl From<Option<u32>> for ResultCap {
    fn from(value: Option<u32>) -> Self {
        match value {
            Some(n) => ResultCap::Limit(n),
            None => ResultCap::Unlimited,
        }
    }
}

impl From<ResultCap> for Option<u32> {
    fn from(cap: ResultCap) -> Self {
        match cap {
            ResultCap::Unlimited => None,
            ResultCap::Limit(n) => Some(n),
        }
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}
