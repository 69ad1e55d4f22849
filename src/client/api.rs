//! API client over an authenticated session

use super::types::{ObjectSchema, QueryPage};
use crate::auth::Session;
use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::types::Record;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

/// Lazy sequence of bulk result pages
pub type PageStream<'a> = Pin<Box<dyn Stream<Item = Result<Vec<Record>>> + Send + 'a>>;

/// Remote operations the extraction engine needs
#[async_trait]
pub trait SalesforceApi: Send + Sync {
    /// Fetch an object's field metadata
    async fn describe_object(&self, object: &str) -> Result<ObjectSchema>;

    /// Run a query as an asynchronous bulk job
    ///
    /// Nothing is sent until the stream is first polled. An org without
    /// bulk access yields [`Error::BulkUnsupported`] as the first item.
    fn bulk_query<'a>(&'a self, object: &str, soql: &str) -> PageStream<'a>;

    /// First page of a synchronous query
    async fn query(&self, soql: &str) -> Result<QueryPage>;

    /// Follow-up page of a synchronous query
    async fn query_more(&self, next_records_url: &str) -> Result<QueryPage>;
}

/// REST and bulk client bound to one session
#[derive(Debug, Clone)]
pub struct ApiClient {
    pub(super) http: HttpClient,
    pub(super) session: Session,
    pub(super) poll_interval: Duration,
    pub(super) poll_timeout: Option<Duration>,
}

impl ApiClient {
    /// Create a client for the session
    pub fn new(http: HttpClient, session: Session) -> Self {
        let defaults = ExtractionConfig::default();
        Self {
            http,
            session,
            poll_interval: defaults.poll_interval,
            poll_timeout: defaults.poll_timeout,
        }
    }

    /// Apply bulk polling settings
    #[must_use]
    pub fn with_config(mut self, config: &ExtractionConfig) -> Self {
        self.poll_interval = config.poll_interval;
        self.poll_timeout = config.poll_timeout;
        self
    }

    /// The session this client uses
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn rest_request(&self) -> RequestConfig {
        RequestConfig::new().bearer(self.session.session_id())
    }
}

#[async_trait]
impl SalesforceApi for ApiClient {
    async fn describe_object(&self, object: &str) -> Result<ObjectSchema> {
        let url = format!("{}/sobjects/{object}/describe", self.session.data_url());
        debug!(object, "Describing object");

        match self.http.get_json(&url, self.rest_request()).await {
            Ok(schema) => Ok(schema),
            Err(Error::HttpStatus { status: 404, .. }) => Err(Error::ObjectNotFound {
                object: object.to_string(),
            }),
            Err(e) => Err(unavailable("describe", e)),
        }
    }

    fn bulk_query<'a>(&'a self, object: &str, soql: &str) -> PageStream<'a> {
        self.bulk_pages(object.to_string(), soql.to_string())
    }

    async fn query(&self, soql: &str) -> Result<QueryPage> {
        let url = format!("{}/query", self.session.data_url());
        self.http
            .get_json(&url, self.rest_request().query("q", soql))
            .await
            .map_err(|e| unavailable("query", e))
    }

    async fn query_more(&self, next_records_url: &str) -> Result<QueryPage> {
        let url = format!("{}{next_records_url}", self.session.instance_url());
        self.http
            .get_json(&url, self.rest_request())
            .await
            .map_err(|e| unavailable("query more", e))
    }
}

/// Map transport and status failures to `RemoteUnavailable`
pub(super) fn unavailable(operation: &str, err: Error) -> Error {
    match err {
        Error::HttpStatus { status, body } => {
            Error::remote(operation, format!("HTTP {status}: {body}"))
        }
        Error::Http(e) => Error::remote(operation, e.to_string()),
        other => other,
    }
}
