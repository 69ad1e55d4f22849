//! Asynchronous bulk query jobs
//!
//! create job → add batch → close job → poll batch → list results →
//! fetch one result set per page. Result sets are fetched one at a time
//! as the consumer pulls, so memory is bounded by the largest page.

use super::api::{unavailable, ApiClient, PageStream};
use super::types::{BatchInfo, BatchState, JobInfo};
use crate::error::{Error, Result};
use crate::http::RequestConfig;
use crate::types::Record;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info};

/// Error text the API uses when the org has no bulk access
const UNSUPPORTED_SIGNATURES: [&str; 2] = ["FeatureNotEnabled", "Async API not enabled"];

/// Submitted job and batch
#[derive(Debug, Clone)]
struct BulkBatch {
    job_id: String,
    batch_id: String,
}

/// Where the page stream is
enum Cursor {
    Pending { object: String, soql: String },
    Fetching { batch: BulkBatch, remaining: VecDeque<String> },
}

impl ApiClient {
    /// Page stream for one bulk query
    pub(super) fn bulk_pages(&self, object: String, soql: String) -> PageStream<'_> {
        stream::try_unfold(Cursor::Pending { object, soql }, move |cursor| {
            self.next_page(cursor)
        })
        .boxed()
    }

    async fn next_page(&self, cursor: Cursor) -> Result<Option<(Vec<Record>, Cursor)>> {
        let (batch, mut remaining) = match cursor {
            Cursor::Pending { object, soql } => {
                let batch = self.submit(&object, &soql).await?;
                self.wait_for_batch(&batch).await?;
                let ids = self.result_ids(&batch).await?;
                info!(
                    job_id = %batch.job_id,
                    result_sets = ids.len(),
                    "Bulk job completed"
                );
                (batch, VecDeque::from(ids))
            }
            Cursor::Fetching { batch, remaining } => (batch, remaining),
        };

        let Some(result_id) = remaining.pop_front() else {
            return Ok(None);
        };
        let page = self.result_page(&batch, &result_id).await?;
        Ok(Some((page, Cursor::Fetching { batch, remaining })))
    }

    fn bulk_request(&self) -> RequestConfig {
        RequestConfig::new().header("X-SFDC-Session", self.session.session_id())
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/job/{job_id}", self.session.async_url())
    }

    /// Create the job, add the query batch and close the job
    async fn submit(&self, object: &str, soql: &str) -> Result<BulkBatch> {
        let create = self.bulk_request().json(json!({
            "operation": "queryAll",
            "object": object,
            "contentType": "JSON",
        }));
        let job: JobInfo = self
            .http
            .post_json(&format!("{}/job", self.session.async_url()), create)
            .await
            .map_err(bulk_error)?;

        let batch: BatchInfo = self
            .http
            .post_json(
                &format!("{}/batch", self.job_url(&job.id)),
                self.bulk_request().text(soql, "application/json"),
            )
            .await
            .map_err(bulk_error)?;

        self.http
            .post(
                &self.job_url(&job.id),
                self.bulk_request().json(json!({ "state": "Closed" })),
            )
            .await
            .map_err(bulk_error)?;

        debug!(object, job_id = %job.id, batch_id = %batch.id, "Submitted bulk query");
        Ok(BulkBatch {
            job_id: job.id,
            batch_id: batch.id,
        })
    }

    /// Poll until the batch reaches a terminal state
    async fn wait_for_batch(&self, batch: &BulkBatch) -> Result<()> {
        let url = format!("{}/batch/{}", self.job_url(&batch.job_id), batch.batch_id);
        let started = Instant::now();

        loop {
            let info: BatchInfo = self
                .http
                .get_json(&url, self.bulk_request())
                .await
                .map_err(bulk_error)?;
            let state = BatchState::parse(&info.state);
            debug!(job_id = %batch.job_id, state = %info.state, "Polled bulk batch");

            if state.is_completed() {
                return Ok(());
            }
            if state.is_terminal() {
                let message = info.state_message.unwrap_or_default();
                if is_unsupported(&message) {
                    return Err(Error::BulkUnsupported { message });
                }
                return Err(Error::remote(
                    "bulk query",
                    format!("batch {} ended {}: {message}", info.id, info.state),
                ));
            }

            if let Some(limit) = self.poll_timeout {
                let waited = started.elapsed();
                if waited >= limit {
                    return Err(Error::BulkPollTimeout {
                        job_id: batch.job_id.clone(),
                        waited_secs: waited.as_secs(),
                    });
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn result_ids(&self, batch: &BulkBatch) -> Result<Vec<String>> {
        let url = format!(
            "{}/batch/{}/result",
            self.job_url(&batch.job_id),
            batch.batch_id
        );
        self.http
            .get_json(&url, self.bulk_request())
            .await
            .map_err(bulk_error)
    }

    async fn result_page(&self, batch: &BulkBatch, result_id: &str) -> Result<Vec<Record>> {
        let url = format!(
            "{}/batch/{}/result/{result_id}",
            self.job_url(&batch.job_id),
            batch.batch_id
        );
        let page: Vec<Record> = self
            .http
            .get_json(&url, self.bulk_request())
            .await
            .map_err(bulk_error)?;
        debug!(job_id = %batch.job_id, result_id, records = page.len(), "Fetched bulk result set");
        Ok(page)
    }
}

fn is_unsupported(text: &str) -> bool {
    UNSUPPORTED_SIGNATURES.iter().any(|sig| text.contains(sig))
}

/// Classify a bulk call failure
fn bulk_error(err: Error) -> Error {
    match err {
        Error::HttpStatus { ref body, .. } if is_unsupported(body) => Error::BulkUnsupported {
            message: body.clone(),
        },
        other => unavailable("bulk query", other),
    }
}
