//! Extraction engine module
//!
//! Runs one stream end to end: describe the object, select its fields,
//! build the query, then page through results and normalize each record.
//!
//! # Overview
//!
//! - [`ExtractionEngine`] - Opens an extraction for a [`StreamSpec`]
//! - [`Extraction`] - Lazy record stream that tracks the cursor high-water mark
//! - [`normalize_record`] - Canonical datetime rewriting shared by both query paths
//!
//! Bulk is always attempted first. When the org has no bulk access the
//! same query is re-run through the standard paginated endpoint; any other
//! bulk failure ends the stream.

mod normalize;
mod types;

pub use normalize::{canonical_cursor, format_canonical, normalize_record, CANONICAL_FORMAT};
pub use types::{ExtractionStats, Progress};

use crate::catalog::StreamSpec;
use crate::client::{PageStream, SalesforceApi};
use crate::config::ExtractionConfig;
use crate::error::{Error, Result, Stage};
use crate::query::build_query;
use crate::selector::{select_fields, FieldSelection};
use crate::types::{QueryPath, Record};
use futures::future;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tracing::{debug, info, warn};
use types::Page;

type TaggedPages<'a> = Pin<Box<dyn Stream<Item = Result<Page>> + Send + 'a>>;

/// Paging position of a standard query
enum StandardCursor {
    First(String),
    More(String),
    Done,
}

/// Opens extractions against a remote API
pub struct ExtractionEngine<A> {
    api: A,
    config: ExtractionConfig,
}

impl<A: SalesforceApi> ExtractionEngine<A> {
    /// Create an engine with default settings
    pub fn new(api: A) -> Self {
        Self {
            api,
            config: ExtractionConfig::default(),
        }
    }

    /// Set extraction configuration
    #[must_use]
    pub fn with_config(mut self, config: ExtractionConfig) -> Self {
        self.config = config;
        self
    }

    /// The underlying API
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Current configuration
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Start extracting a stream
    ///
    /// No request is made until the returned stream is first polled.
    /// `last_value` is the previous high-water mark and is ignored for
    /// streams without a cursor field.
    pub fn extract(&self, spec: &StreamSpec, last_value: Option<&str>) -> Extraction<'_> {
        let cursor_field = spec.cursor_field.clone().filter(|f| !f.is_empty());
        let last_value = cursor_field
            .as_ref()
            .and(last_value)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let high_water = last_value.as_deref().map(canonical_cursor);
        let opened = self.open(spec.object.clone(), cursor_field.clone(), last_value);
        let pages = stream::once(opened).try_flatten().boxed();

        Extraction {
            stream: spec.name.clone(),
            object: spec.object.clone(),
            cursor_field,
            pages,
            current: Vec::new().into_iter(),
            high_water,
            stats: ExtractionStats::new(),
            progress: Progress::Running,
        }
    }

    async fn open(
        &self,
        object: String,
        cursor_field: Option<String>,
        last_value: Option<String>,
    ) -> Result<TaggedPages<'_>> {
        let schema = self
            .api
            .describe_object(&object)
            .await
            .map_err(|e| Error::stream_failed(&object, Stage::Describe, e))?;
        let selection = Arc::new(select_fields(&schema));
        let soql = build_query(
            &selection.fields,
            &object,
            cursor_field.as_deref(),
            last_value.as_deref(),
            self.config.result_cap,
        );
        info!(object = %object, fields = selection.fields.len(), "Starting extraction");
        debug!(query = %soql, "Built query");

        let mut bulk = self.api.bulk_query(&object, &soql);
        match bulk.next().await {
            None => Ok(stream::empty().boxed()),
            Some(Ok(first)) => {
                let pages = stream::once(future::ready(Ok(first))).chain(bulk).boxed();
                Ok(normalized(pages, QueryPath::Bulk, object, selection))
            }
            Some(Err(e)) if e.is_bulk_unsupported() => {
                warn!(
                    object = %object,
                    error = %e,
                    "Bulk API unavailable, falling back to standard query"
                );
                let pages = self.standard_pages(soql);
                Ok(normalized(pages, QueryPath::Standard, object, selection))
            }
            Some(Err(e)) => Err(Error::stream_failed(&object, Stage::Bulk, e)),
        }
    }

    fn standard_pages(&self, soql: String) -> PageStream<'_> {
        stream::try_unfold(StandardCursor::First(soql), move |cursor| {
            self.next_standard_page(cursor)
        })
        .boxed()
    }

    async fn next_standard_page(
        &self,
        cursor: StandardCursor,
    ) -> Result<Option<(Vec<Record>, StandardCursor)>> {
        let page = match cursor {
            StandardCursor::First(soql) => self.api.query(&soql).await?,
            StandardCursor::More(url) => self.api.query_more(&url).await?,
            StandardCursor::Done => return Ok(None),
        };

        let next = match page.next_records_url {
            Some(url) if !page.done => StandardCursor::More(url),
            None if !page.done => {
                return Err(Error::remote(
                    "query more",
                    "page not done but no nextRecordsUrl",
                ))
            }
            _ => StandardCursor::Done,
        };
        Ok(Some((page.records, next)))
    }
}

/// Normalize every record of every page, attributing failures to a stage
fn normalized(
    pages: PageStream<'_>,
    path: QueryPath,
    object: String,
    selection: Arc<FieldSelection>,
) -> TaggedPages<'_> {
    let stage = match path {
        QueryPath::Bulk => Stage::Bulk,
        QueryPath::Standard => Stage::Standard,
    };
    pages
        .map(move |page| -> Result<Page> {
            let mut records = page.map_err(|e| Error::stream_failed(&object, stage, e))?;
            for record in &mut records {
                normalize_record(record, &selection.datetime_fields, path)
                    .map_err(|e| Error::stream_failed(&object, Stage::Normalize, e))?;
            }
            Ok(Page { path, records })
        })
        .boxed()
}

// ============================================================================
// Extraction
// ============================================================================

/// Lazy, ordered stream of normalized records for one stream
///
/// Yields records one at a time while fetching at most one page ahead.
/// After the first error the stream ends. The cursor high-water mark is
/// only reported once the stream has been drained without error.
pub struct Extraction<'a> {
    stream: String,
    object: String,
    cursor_field: Option<String>,
    pages: TaggedPages<'a>,
    current: std::vec::IntoIter<Record>,
    high_water: Option<String>,
    stats: ExtractionStats,
    progress: Progress,
}

impl Extraction<'_> {
    /// Stream name
    pub fn stream_name(&self) -> &str {
        &self.stream
    }

    /// Object being extracted
    pub fn object(&self) -> &str {
        &self.object
    }

    /// Cursor field, for incremental streams
    pub fn cursor_field(&self) -> Option<&str> {
        self.cursor_field.as_deref()
    }

    /// Lifecycle state
    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Records yielded so far
    pub fn records_emitted(&self) -> usize {
        self.stats.records
    }

    /// Running statistics
    pub fn stats(&self) -> &ExtractionStats {
        &self.stats
    }

    /// Cursor value to persist, available only after a complete drain
    ///
    /// Falls back to the previous value when no newer record was seen.
    pub fn completed_cursor(&self) -> Option<&str> {
        match self.progress {
            Progress::Completed => self.high_water.as_deref(),
            Progress::Running | Progress::Failed => None,
        }
    }

    fn observe(&mut self, record: &Record) {
        self.stats.add_record();
        let Some(field) = self.cursor_field.as_deref() else {
            return;
        };
        let value = match record.get(field) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return,
        };
        if self.high_water.as_ref().map_or(true, |hw| value > *hw) {
            self.high_water = Some(value);
        }
    }
}

impl Stream for Extraction<'_> {
    type Item = Result<Record>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(record) = this.current.next() {
                this.observe(&record);
                return Poll::Ready(Some(Ok(record)));
            }
            if this.progress != Progress::Running {
                return Poll::Ready(None);
            }

            match ready!(this.pages.as_mut().poll_next(cx)) {
                Some(Ok(page)) => {
                    debug!(
                        stream = %this.stream,
                        path = %page.path,
                        records = page.records.len(),
                        "Received page"
                    );
                    this.stats.add_page(page.path);
                    this.current = page.records.into_iter();
                }
                Some(Err(e)) => {
                    this.progress = Progress::Failed;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.progress = Progress::Completed;
                    info!(
                        stream = %this.stream,
                        records = this.stats.records,
                        pages = this.stats.pages,
                        "Extraction complete"
                    );
                    return Poll::Ready(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
