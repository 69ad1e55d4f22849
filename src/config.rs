//! Configuration types
//!
//! This module contains the client settings used for one extraction run and
//! the pipeline document a run is started from. Documents are plain YAML or
//! JSON; fetching them from remote storage is the caller's business.

use crate::auth::CredentialKind;
use crate::catalog::StreamSpec;
use crate::error::{Error, Result};
use crate::types::{JsonValue, ResultCap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default API version
pub const DEFAULT_API_VERSION: &str = "59.0";

/// Default login domain (`login` for production, `test` for sandboxes)
pub const DEFAULT_DOMAIN: &str = "login";

// ============================================================================
// Client Config
// ============================================================================

/// Connection settings for one extraction run
///
/// | field          | effect if present                                         |
/// |----------------|-----------------------------------------------------------|
/// | `domain`       | login host becomes `https://{domain}.salesforce.com`      |
/// | `version`      | API version used in every endpoint path                   |
/// | `proxies`      | scheme (`http`/`https`) → proxy URL for all requests      |
/// | `client_id`    | sent as `CallOptions/client` on SOAP logins               |
/// | `result_cap`   | every generated query ends in `LIMIT n`                   |
/// | `login_url`    | replaces the domain-derived login host entirely           |
/// | `timeout_secs` | transport timeout per request                             |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Login domain prefix
    #[serde(default = "default_domain")]
    pub domain: String,

    /// API version
    #[serde(default = "default_api_version")]
    pub version: String,

    /// Proxy URLs keyed by scheme
    #[serde(default)]
    pub proxies: Option<HashMap<String, String>>,

    /// Client identifier for SOAP logins
    #[serde(default)]
    pub client_id: Option<String>,

    /// Row cap for low-volume environments
    #[serde(default)]
    pub result_cap: ResultCap,

    /// Explicit login host override
    #[serde(default)]
    pub login_url: Option<String>,

    /// Transport timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            version: default_api_version(),
            proxies: None,
            client_id: None,
            result_cap: ResultCap::Unlimited,
            login_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the login domain
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Set the API version
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the client identifier
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set a proxy for a scheme
    #[must_use]
    pub fn with_proxy(mut self, scheme: impl Into<String>, url: impl Into<String>) -> Self {
        self.proxies
            .get_or_insert_with(HashMap::new)
            .insert(scheme.into(), url.into());
        self
    }

    /// Set the result cap
    #[must_use]
    pub fn with_result_cap(mut self, cap: ResultCap) -> Self {
        self.result_cap = cap;
        self
    }

    /// Override the login host
    #[must_use]
    pub fn with_login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = Some(url.into());
        self
    }

    /// Login host for session negotiation, no trailing slash
    pub fn login_url(&self) -> String {
        match &self.login_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.salesforce.com", self.domain),
        }
    }

    /// Transport timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============================================================================
// Pipeline Document
// ============================================================================

/// Top-level pipeline document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name, also the default dataset name
    pub pipeline_name: String,

    /// Tenant the pipeline belongs to
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// Source definition
    pub source: SourceConfig,

    /// Destination definition (opaque to extraction)
    #[serde(default)]
    pub destination: DestinationConfig,
}

/// Source section of a pipeline document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source type; only `salesforce` is handled here
    #[serde(rename = "type")]
    pub source_type: String,

    /// Credential variant name (see [`CredentialKind`])
    #[serde(default)]
    pub auth: Option<String>,

    /// Secret reference holding the credential fields
    #[serde(default)]
    pub credentials_ref: Option<String>,

    /// Streams to run; empty runs the whole catalog
    #[serde(default)]
    pub streams: Vec<String>,

    /// Client connection settings
    #[serde(default)]
    pub client: ClientConfig,

    /// Additional stream definitions appended to the catalog
    #[serde(default)]
    pub extra_streams: Vec<StreamSpec>,

    /// Bulk job polling settings
    #[serde(default)]
    pub bulk: BulkSettings,
}

impl SourceConfig {
    /// The configured credential variant
    pub fn credential_kind(&self) -> Result<CredentialKind> {
        match self.auth.as_deref() {
            Some(name) => name.parse(),
            None => Err(Error::invalid_credential(
                "no valid credential set provided: source.auth is not set",
            )),
        }
    }

    /// The configured secret reference
    pub fn credentials_ref(&self) -> Result<&str> {
        self.credentials_ref
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| Error::missing_field("source.credentials_ref"))
    }
}

/// Bulk job polling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSettings {
    /// Seconds between batch status polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Give up after this many seconds; `null` polls indefinitely
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: Option<u64>,
}

fn default_poll_interval_secs() -> u64 {
    5
}

#[allow(clippy::unnecessary_wraps)]
fn default_poll_timeout_secs() -> Option<u64> {
    Some(600)
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

// ============================================================================
// Extraction Config
// ============================================================================

/// Runtime settings for one stream's extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionConfig {
    /// Delay between bulk batch status polls
    pub poll_interval: Duration,
    /// Give up on a bulk batch after this long; `None` polls indefinitely
    pub poll_timeout: Option<Duration>,
    /// Row cap appended to every query
    pub result_cap: ResultCap,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            poll_timeout: Some(Duration::from_secs(600)),
            result_cap: ResultCap::Unlimited,
        }
    }
}

impl ExtractionConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for a source section
    pub fn from_source(source: &SourceConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(source.bulk.poll_interval_secs),
            poll_timeout: source.bulk.poll_timeout_secs.map(Duration::from_secs),
            result_cap: source.client.result_cap,
        }
    }

    /// Set the poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the poll timeout
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the result cap
    #[must_use]
    pub fn with_result_cap(mut self, cap: ResultCap) -> Self {
        self.result_cap = cap;
        self
    }
}

/// Destination section of a pipeline document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Destination type
    #[serde(rename = "type", default)]
    pub destination_type: Option<String>,

    /// Dataset name; the pipeline name is used when absent
    #[serde(default)]
    pub dataset_name: Option<String>,

    /// Local output directory for file sinks
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Everything else, passed through untouched
    #[serde(flatten)]
    pub settings: HashMap<String, JsonValue>,
}

impl PipelineConfig {
    /// Parse a YAML document
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check document-level invariants
    pub fn validate(&self) -> Result<()> {
        if self.pipeline_name.trim().is_empty() {
            return Err(Error::missing_field("pipeline_name"));
        }
        if self.source.source_type != "salesforce" {
            return Err(Error::config(format!(
                "Unknown source type: {}",
                self.source.source_type
            )));
        }
        for spec in &self.source.extra_streams {
            spec.validate()?;
        }
        Ok(())
    }

    /// Dataset name for the destination
    pub fn dataset_name(&self) -> &str {
        self.destination
            .dataset_name
            .as_deref()
            .unwrap_or(&self.pipeline_name)
    }
}

// ============================================================================
// Config Provider
// ============================================================================

/// Supplies the pipeline document for a run
pub trait ConfigProvider: Send + Sync {
    /// Load and validate the document
    fn load(&self) -> Result<PipelineConfig>;
}

/// Reads the document from a local YAML or JSON file
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    /// Create a provider for the given file
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ConfigProvider for FileConfigProvider {
    fn load(&self) -> Result<PipelineConfig> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::config(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        let is_json = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            PipelineConfig::from_json(&text)
        } else {
            PipelineConfig::from_yaml(&text)
        }
    }
}
