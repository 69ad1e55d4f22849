//! Persisted cursor types
//!
//! Serialized to JSON between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cursor state for every stream of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream cursors keyed by stream name
    #[serde(default)]
    pub streams: BTreeMap<String, StreamCursor>,
}

impl State {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor entry for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamCursor> {
        self.streams.get(stream)
    }

    /// High-water mark for a stream
    pub fn get_cursor(&self, stream: &str) -> Option<&str> {
        self.streams.get(stream).map(|s| s.value.as_str())
    }

    /// Record a completed high-water mark
    pub fn set_cursor(&mut self, stream: &str, cursor_field: &str, value: String) {
        self.streams.insert(
            stream.to_string(),
            StreamCursor {
                cursor_field: cursor_field.to_string(),
                value,
                updated_at: Utc::now(),
            },
        );
    }
}

/// Last committed high-water mark of one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCursor {
    /// Field the value was taken from
    pub cursor_field: String,
    /// Canonical datetime text
    pub value: String,
    /// When the value was committed
    pub updated_at: DateTime<Utc>,
}
