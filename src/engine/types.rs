//! Engine types
//!
//! Progress and statistics for a single stream extraction.

use crate::types::{QueryPath, Record};
use serde::Serialize;

/// Page of normalized records tagged with the path that produced it
#[derive(Debug, Clone)]
pub(crate) struct Page {
    pub path: QueryPath,
    pub records: Vec<Record>,
}

/// Lifecycle of an extraction stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Still yielding records
    Running,
    /// Drained to the end without error
    Completed,
    /// Terminated by an error
    Failed,
}

/// Statistics for one extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Records yielded to the consumer
    pub records: usize,
    /// Pages received from the API
    pub pages: usize,
    /// Query path that produced the records, once known
    pub path: Option<QueryPath>,
}

impl ExtractionStats {
    /// Create empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a received page
    pub fn add_page(&mut self, path: QueryPath) {
        self.pages += 1;
        self.path = Some(path);
    }

    /// Count a yielded record
    pub fn add_record(&mut self) {
        self.records += 1;
    }
}

#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn test_stats_accumulate() {
        let mut stats = ExtractionStats::new();
        assert_eq!(stats.path, None);

        stats.add_page(QueryPath::Standard);
        stats.add_record();
        stats.add_record();

        assert_eq!(stats.pages, 1);
        assert_eq!(stats.records, 2);
        assert_eq!(stats.path, Some(QueryPath::Standard));
    }
}
