//! Error types for sf-ingest
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use std::fmt;
use thiserror::Error;

/// The main error type for sf-ingest
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    /// Pipeline or client configuration is unusable
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong
        message: String,
    },

    /// A required configuration field is absent
    #[error("Missing required config field: {field}")]
    MissingConfigField {
        /// Dotted path of the field
        field: String,
    },

    /// A configuration field holds an unacceptable value
    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue {
        /// Dotted path of the field
        field: String,
        /// Why the value was rejected
        message: String,
    },

    /// YAML document could not be parsed
    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON document could not be parsed
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Credential & Secret Errors
    // ============================================================================
    /// Credential fields cannot produce a session; raised before any request
    #[error("Invalid credential: {message}")]
    InvalidCredential {
        /// Names the missing or conflicting field
        message: String,
    },

    /// Secret provider has nothing under the reference
    #[error("Secret not found: {reference}")]
    SecretNotFound {
        /// Secret reference as configured
        reference: String,
    },

    /// Secret exists but is not a flat field map
    #[error("Secret '{reference}' is malformed: {message}")]
    SecretMalformed {
        /// Secret reference as configured
        reference: String,
        /// What is wrong with its content
        message: String,
    },

    /// Remote rejected session negotiation
    #[error("Authentication failed: {message}")]
    Auth {
        /// Rejection reason reported by the login endpoint
        message: String,
    },

    /// JWT bearer assertion could not be signed
    #[error("JWT generation failed: {message}")]
    JwtGeneration {
        /// Signing failure
        message: String,
    },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    /// Transport failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Response status code
        status: u16,
        /// Response body text
        body: String,
    },

    /// URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Remote API Errors
    // ============================================================================
    /// Describe found no such object
    #[error("Object '{object}' not found")]
    ObjectNotFound {
        /// API name of the object
        object: String,
    },

    /// Remote call failed; terminal for the stream
    #[error("Remote API unavailable ({operation}): {message}")]
    RemoteUnavailable {
        /// Remote operation that failed
        operation: String,
        /// Underlying failure
        message: String,
    },

    /// Org has no bulk access; the engine falls back to the standard query
    #[error("Bulk API not available for this org: {message}")]
    BulkUnsupported {
        /// Remote error text carrying the signature
        message: String,
    },

    /// Bulk batch did not finish within the configured poll timeout
    #[error("Bulk job {job_id} still running after {waited_secs}s")]
    BulkPollTimeout {
        /// Bulk job id
        job_id: String,
        /// Seconds spent polling
        waited_secs: u64,
    },

    // ============================================================================
    // Extraction Errors
    // ============================================================================
    /// A datetime field could not be reparsed
    #[error("Failed to normalize field '{field}' value '{value}': {message}")]
    Normalization {
        /// Field name
        field: String,
        /// Raw value as received
        value: String,
        /// Parse failure
        message: String,
    },

    /// Terminal failure of one stream
    #[error("Stream for '{object}' failed during {stage}: {source}")]
    StreamFailed {
        /// API name of the object
        object: String,
        /// Where the stream stopped
        stage: Stage,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// Catalog has no stream by that name
    #[error("Stream '{stream}' not found in catalog")]
    StreamNotFound {
        /// Requested stream name
        stream: String,
    },

    // ============================================================================
    // State Errors
    // ============================================================================
    /// Cursor state could not be read or written
    #[error("State error: {message}")]
    State {
        /// What failed
        message: String,
    },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Load sink failure
    #[error("Output error: {message}")]
    Output {
        /// What failed
        message: String,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    /// Anything else
    #[error("{0}")]
    Other(String),
}

/// Stage of a stream's execution at which it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Object metadata describe call
    Describe,
    /// Bulk (asynchronous job) query path
    Bulk,
    /// Standard (synchronous, paginated) query path
    Standard,
    /// Per-record normalization
    Normalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Describe => "describe",
            Stage::Bulk => "bulk query",
            Stage::Standard => "standard query",
            Stage::Normalize => "normalization",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invalid credential error
    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::InvalidCredential {
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a secret malformed error
    pub fn secret_malformed(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SecretMalformed {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a remote unavailable error
    pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Wrap an error as the terminal failure of one object's stream
    pub fn stream_failed(object: impl Into<String>, stage: Stage, source: Error) -> Self {
        Self::StreamFailed {
            object: object.into(),
            stage,
            source: Box::new(source),
        }
    }

    /// The underlying cause, looking through `StreamFailed` wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::StreamFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error is the bulk fallback signal
    pub fn is_bulk_unsupported(&self) -> bool {
        matches!(self.root(), Error::BulkUnsupported { .. })
    }

    /// Check if this error was raised before any network call
    pub fn is_pre_network(&self) -> bool {
        matches!(
            self.root(),
            Error::InvalidCredential { .. }
                | Error::SecretNotFound { .. }
                | Error::SecretMalformed { .. }
                | Error::Config { .. }
                | Error::MissingConfigField { .. }
                | Error::InvalidConfigValue { .. }
        )
    }
}

/// Result type alias for sf-ingest
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::invalid_credential("no valid credential set provided");
        assert_eq!(
            err.to_string(),
            "Invalid credential: no valid credential set provided"
        );

        let err = Error::http_status(404, "Not found");
        assert_eq!(err.to_string(), "HTTP 404: Not found");
    }

    #[test]
    fn test_stream_failed_carries_context() {
        let err = Error::stream_failed(
            "Account",
            Stage::Standard,
            Error::remote("query", "HTTP 503"),
        );
        let text = err.to_string();
        assert!(text.contains("Account"));
        assert!(text.contains("standard query"));
        assert!(text.contains("HTTP 503"));
        assert!(matches!(err.root(), Error::RemoteUnavailable { .. }));
    }

    #[test]
    fn test_bulk_unsupported_detection() {
        let err = Error::BulkUnsupported {
            message: "FeatureNotEnabled".to_string(),
        };
        assert!(err.is_bulk_unsupported());
        assert!(Error::stream_failed("Lead", Stage::Bulk, err).is_bulk_unsupported());
        assert!(!Error::remote("bulk", "boom").is_bulk_unsupported());
    }

    #[test]
    fn test_pre_network_classification() {
        assert!(Error::invalid_credential("x").is_pre_network());
        assert!(Error::SecretNotFound {
            reference: "acme/sf".to_string()
        }
        .is_pre_network());
        assert!(!Error::remote("describe", "down").is_pre_network());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
