//! Sequential stream execution
//!
//! Streams run one after another. A failing stream is reported and skipped;
//! the remaining streams still run. A stream's cursor is committed only
//! after the sink accepted its complete extraction.

use crate::catalog::StreamSpec;
use crate::client::SalesforceApi;
use crate::engine::{ExtractionEngine, ExtractionStats};
use crate::error::Result;
use crate::output::{LoadOutcome, LoadSink};
use crate::state::StateManager;
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info};

/// How one stream ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    /// Extracted and loaded in full
    Succeeded {
        /// Sink result
        outcome: LoadOutcome,
        /// Extraction statistics
        stats: ExtractionStats,
        /// Cursor committed for the next run
        cursor: Option<String>,
    },
    /// Stopped by an error; nothing was committed
    Failed {
        /// Error description
        message: String,
    },
}

/// Result of one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    /// Stream name
    pub stream: String,
    /// Remote object
    pub object: String,
    /// Outcome
    #[serde(flatten)]
    pub status: StreamStatus,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

impl StreamReport {
    /// Whether the stream succeeded
    pub fn is_success(&self) -> bool {
        matches!(self.status, StreamStatus::Succeeded { .. })
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Per-stream results in execution order
    pub streams: Vec<StreamReport>,
}

impl RunReport {
    /// Number of failed streams
    pub fn failed(&self) -> usize {
        self.streams.iter().filter(|s| !s.is_success()).count()
    }

    /// Whether every stream succeeded
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Report for a stream
    pub fn get(&self, stream: &str) -> Option<&StreamReport> {
        self.streams.iter().find(|s| s.stream == stream)
    }
}

/// Extract and load each stream in order
pub async fn run_streams<A: SalesforceApi>(
    engine: &ExtractionEngine<A>,
    specs: &[&StreamSpec],
    state: &StateManager,
    sink: &dyn LoadSink,
) -> RunReport {
    let mut report = RunReport::default();

    for spec in specs {
        let started = Instant::now();
        let status = match run_stream(engine, spec, state, sink).await {
            Ok(status) => status,
            Err(e) => {
                error!(stream = %spec.name, error = %e, "Stream failed");
                StreamStatus::Failed {
                    message: e.to_string(),
                }
            }
        };
        report.streams.push(StreamReport {
            stream: spec.name.clone(),
            object: spec.object.clone(),
            status,
            duration_ms: started.elapsed().as_millis() as u64,
        });
    }

    info!(
        streams = report.streams.len(),
        failed = report.failed(),
        "Run finished"
    );
    report
}

async fn run_stream<A: SalesforceApi>(
    engine: &ExtractionEngine<A>,
    spec: &StreamSpec,
    state: &StateManager,
    sink: &dyn LoadSink,
) -> Result<StreamStatus> {
    let last_value = match spec.cursor_field {
        Some(_) => state.get_cursor(&spec.name).await,
        None => None,
    };
    info!(
        stream = %spec.name,
        object = %spec.object,
        cursor = last_value.as_deref().unwrap_or("-"),
        "Running stream"
    );

    let mut extraction = engine.extract(spec, last_value.as_deref());
    let outcome = sink.load(spec, &mut extraction).await?;

    let cursor = match (spec.cursor_field.as_deref(), extraction.completed_cursor()) {
        (Some(field), Some(value)) => {
            state.commit_cursor(&spec.name, field, value).await?;
            Some(value.to_string())
        }
        _ => None,
    };

    Ok(StreamStatus::Succeeded {
        outcome,
        stats: extraction.stats().clone(),
        cursor,
    })
}
