//! Output module
//!
//! Loads extracted records into a destination.
//!
//! # Overview
//!
//! - [`LoadSink`] - Consumes an [`Extraction`] according to the stream's write mode
//! - [`JsonlSink`] - One JSON-Lines file per stream under a dataset directory
//!
//! A sink must either apply a stream completely or leave the destination as
//! it was; the caller commits the stream's cursor only after a successful load.

mod jsonl;

pub use jsonl::JsonlSink;

use crate::catalog::StreamSpec;
use crate::engine::Extraction;
use crate::error::Result;
use crate::types::WriteMode;
use async_trait::async_trait;
use serde::Serialize;

/// Result of loading one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    /// Stream name
    pub stream: String,
    /// How the records were applied
    pub write_mode: WriteMode,
    /// Records received from the extraction
    pub records_loaded: usize,
    /// Records in the destination after the load
    pub records_total: usize,
}

/// Destination for extracted streams
#[async_trait]
pub trait LoadSink: Send + Sync {
    /// Drain the extraction into the destination
    ///
    /// Returns the extraction's error, untouched, if it fails mid-stream.
    async fn load(&self, spec: &StreamSpec, extraction: &mut Extraction<'_>)
        -> Result<LoadOutcome>;
}
