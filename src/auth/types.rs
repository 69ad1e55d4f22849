//! Credential and session types
//!
//! A [`Credential`] is a closed set of variants, each carrying only the
//! fields its login flow sends. Variants with alternative inputs are
//! validated when they are constructed, never at first use.

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue, OptionStringExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Name of a credential variant as written in pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Username, password and security token (SOAP login)
    SecurityToken,
    /// Username, password and organization id (SOAP login, trusted IP ranges)
    OrganizationId,
    /// Username, password and connected app key/secret (OAuth2 password grant)
    ConsumerKeySecret,
    /// Connected app key and signed assertion (OAuth2 JWT bearer grant)
    JwtBearer,
    /// Already established session id
    DirectSession,
    /// Connected app key/secret against a My Domain (OAuth2 client credentials)
    ClientCredentials,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CredentialKind::SecurityToken => "security_token",
            CredentialKind::OrganizationId => "organization_id",
            CredentialKind::ConsumerKeySecret => "consumer_key_secret",
            CredentialKind::JwtBearer => "jwt_bearer",
            CredentialKind::DirectSession => "direct_session",
            CredentialKind::ClientCredentials => "client_credentials",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for CredentialKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_value(JsonValue::String(s.to_string())).map_err(|_| {
            Error::invalid_credential(format!(
                "no valid credential set provided: unknown auth variant '{s}'"
            ))
        })
    }
}

/// Private key used to sign a JWT bearer assertion
#[derive(Clone, PartialEq, Eq)]
pub enum PrivateKey {
    /// PEM text
    Pem(String),
    /// Path to a PEM file, read when the session is negotiated
    File(PathBuf),
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivateKey::Pem(_) => f.write_str("Pem(<redacted>)"),
            PrivateKey::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// Where an existing session lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instance {
    /// Bare host name, e.g. `na1.salesforce.com`
    Host(String),
    /// Full URL, e.g. `https://acme.my.salesforce.com`
    Url(String),
}

impl Instance {
    /// The instance base URL without a trailing slash
    pub fn base_url(&self) -> String {
        match self {
            Instance::Host(host) => format!("https://{}", host.trim_end_matches('/')),
            Instance::Url(url) => url.trim_end_matches('/').to_string(),
        }
    }
}

/// Credential set for exactly one login flow
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// OAuth 2.0 username-password flow with a security token (SOAP login)
    SecurityToken {
        /// Login user name
        username: String,
        /// Account password
        password: String,
        /// Appended to the password at login
        security_token: String,
    },

    /// Username-password login scoped to an organization (trusted IP ranges)
    OrganizationId {
        /// Login user name
        username: String,
        /// Account password
        password: String,
        /// Sent in the login scope header
        organization_id: String,
    },

    /// OAuth 2.0 username-password flow through a connected app
    ConsumerKeySecret {
        /// Login user name
        username: String,
        /// Account password
        password: String,
        /// Connected app client id
        consumer_key: String,
        /// Connected app client secret
        consumer_secret: String,
    },

    /// OAuth 2.0 JWT bearer flow
    JwtBearer {
        /// Assertion subject
        username: String,
        /// Assertion issuer
        consumer_key: String,
        /// RS256 signing key
        private_key: PrivateKey,
        /// Token endpoint host; the login domain is used when absent
        instance_url: Option<String>,
    },

    /// Existing session, no negotiation
    DirectSession {
        /// Session id used as the bearer token
        session_id: String,
        /// Where the session lives
        instance: Instance,
    },

    /// OAuth 2.0 client credentials flow against a My Domain
    ClientCredentials {
        /// Connected app client id
        consumer_key: String,
        /// Connected app client secret
        consumer_secret: String,
        /// My Domain prefix, e.g. `acme.my`
        domain: String,
    },
}

impl Credential {
    /// Username + password + security token
    pub fn security_token(
        username: impl Into<String>,
        password: impl Into<String>,
        security_token: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self::SecurityToken {
            username: required(CredentialKind::SecurityToken, "user_name", username.into())?,
            password: required(CredentialKind::SecurityToken, "password", password.into())?,
            security_token: required(
                CredentialKind::SecurityToken,
                "security_token",
                security_token.into(),
            )?,
        })
    }

    /// Username + password + organization id
    pub fn organization_id(
        username: impl Into<String>,
        password: impl Into<String>,
        organization_id: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self::OrganizationId {
            username: required(CredentialKind::OrganizationId, "user_name", username.into())?,
            password: required(CredentialKind::OrganizationId, "password", password.into())?,
            organization_id: required(
                CredentialKind::OrganizationId,
                "organization_id",
                organization_id.into(),
            )?,
        })
    }

    /// Username + password + connected app key and secret
    pub fn consumer_key_secret(
        username: impl Into<String>,
        password: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Result<Self> {
        let kind = CredentialKind::ConsumerKeySecret;
        Ok(Self::ConsumerKeySecret {
            username: required(kind, "user_name", username.into())?,
            password: required(kind, "password", password.into())?,
            consumer_key: required(kind, "consumer_key", consumer_key.into())?,
            consumer_secret: required(kind, "consumer_secret", consumer_secret.into())?,
        })
    }

    /// JWT bearer; needs either PEM text or a PEM file path
    pub fn jwt_bearer(
        username: impl Into<String>,
        consumer_key: impl Into<String>,
        privatekey: Option<String>,
        privatekey_file: Option<String>,
        instance_url: Option<String>,
    ) -> Result<Self> {
        let kind = CredentialKind::JwtBearer;
        let private_key = match (privatekey.none_if_empty(), privatekey_file.none_if_empty()) {
            (Some(pem), _) => PrivateKey::Pem(pem),
            (None, Some(path)) => PrivateKey::File(PathBuf::from(path)),
            (None, None) => {
                return Err(Error::invalid_credential(
                    "jwt_bearer requires either 'privatekey_file' or 'privatekey'",
                ))
            }
        };
        Ok(Self::JwtBearer {
            username: required(kind, "user_name", username.into())?,
            consumer_key: required(kind, "consumer_key", consumer_key.into())?,
            private_key,
            instance_url: instance_url.none_if_empty(),
        })
    }

    /// Direct session; needs either an instance host or an instance URL
    pub fn direct_session(
        session_id: impl Into<String>,
        instance: Option<String>,
        instance_url: Option<String>,
    ) -> Result<Self> {
        let instance = match (instance_url.none_if_empty(), instance.none_if_empty()) {
            (Some(url), _) => Instance::Url(url),
            (None, Some(host)) => Instance::Host(host),
            (None, None) => {
                return Err(Error::invalid_credential(
                    "direct_session requires either 'instance' or 'instance_url'",
                ))
            }
        };
        Ok(Self::DirectSession {
            session_id: required(CredentialKind::DirectSession, "session_id", session_id.into())?,
            instance,
        })
    }

    /// Client credentials against a My Domain
    pub fn client_credentials(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        domain: impl Into<String>,
    ) -> Result<Self> {
        let kind = CredentialKind::ClientCredentials;
        Ok(Self::ClientCredentials {
            consumer_key: required(kind, "consumer_key", consumer_key.into())?,
            consumer_secret: required(kind, "consumer_secret", consumer_secret.into())?,
            domain: required(kind, "domain", domain.into())?,
        })
    }

    /// Build a credential of the given kind from a secret's raw fields
    ///
    /// Non-string values count as absent.
    pub fn from_fields(kind: CredentialKind, fields: &JsonObject) -> Result<Self> {
        let get = |name: &str| -> Option<String> {
            match fields.get(name) {
                Some(JsonValue::String(s)) => Some(s.clone()),
                _ => None,
            }
        };
        let must = |name: &str| -> Result<String> {
            get(name).none_if_empty().ok_or_else(|| {
                Error::invalid_credential(format!("{kind} requires '{name}'"))
            })
        };

        match kind {
            CredentialKind::SecurityToken => Self::security_token(
                must("user_name")?,
                must("password")?,
                must("security_token")?,
            ),
            CredentialKind::OrganizationId => Self::organization_id(
                must("user_name")?,
                must("password")?,
                must("organization_id")?,
            ),
            CredentialKind::ConsumerKeySecret => Self::consumer_key_secret(
                must("user_name")?,
                must("password")?,
                must("consumer_key")?,
                must("consumer_secret")?,
            ),
            CredentialKind::JwtBearer => Self::jwt_bearer(
                must("user_name")?,
                must("consumer_key")?,
                get("privatekey"),
                get("privatekey_file"),
                get("instance_url"),
            ),
            CredentialKind::DirectSession => Self::direct_session(
                must("session_id")?,
                get("instance"),
                get("instance_url"),
            ),
            CredentialKind::ClientCredentials => Self::client_credentials(
                must("consumer_key")?,
                must("consumer_secret")?,
                must("domain")?,
            ),
        }
    }

    /// The variant's configuration name
    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::SecurityToken { .. } => CredentialKind::SecurityToken,
            Credential::OrganizationId { .. } => CredentialKind::OrganizationId,
            Credential::ConsumerKeySecret { .. } => CredentialKind::ConsumerKeySecret,
            Credential::JwtBearer { .. } => CredentialKind::JwtBearer,
            Credential::DirectSession { .. } => CredentialKind::DirectSession,
            Credential::ClientCredentials { .. } => CredentialKind::ClientCredentials,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Credential");
        out.field("kind", &self.kind());
        match self {
            Credential::SecurityToken { username, .. }
            | Credential::OrganizationId { username, .. }
            | Credential::ConsumerKeySecret { username, .. } => {
                out.field("username", username);
            }
            Credential::JwtBearer {
                username,
                private_key,
                instance_url,
                ..
            } => {
                out.field("username", username)
                    .field("private_key", private_key)
                    .field("instance_url", instance_url);
            }
            Credential::DirectSession { instance, .. } => {
                out.field("instance", instance);
            }
            Credential::ClientCredentials { domain, .. } => {
                out.field("domain", domain);
            }
        }
        out.finish_non_exhaustive()
    }
}

fn required(kind: CredentialKind, field: &str, value: String) -> Result<String> {
    value
        .none_if_empty()
        .ok_or_else(|| Error::invalid_credential(format!("{kind} requires '{field}'")))
}

/// Authenticated connection to one org
///
/// Owned by one extraction run; holds the session id and the instance it
/// is valid for.
#[derive(Clone)]
pub struct Session {
    session_id: String,
    instance_url: String,
    version: String,
}

impl Session {
    /// Create a session
    pub fn new(
        session_id: impl Into<String>,
        instance_url: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
            version: version.into(),
        }
    }

    /// The raw session id (bearer token)
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Instance base URL, no trailing slash
    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    /// API version, e.g. `59.0`
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Base URL of the REST data API
    pub fn data_url(&self) -> String {
        format!("{}/services/data/v{}", self.instance_url, self.version)
    }

    /// Base URL of the asynchronous (bulk) job API
    pub fn async_url(&self) -> String {
        format!("{}/services/async/{}", self.instance_url, self.version)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("instance_url", &self.instance_url)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_instance_base_url() {
        assert_eq!(
            Instance::Host("na1.salesforce.com".to_string()).base_url(),
            "https://na1.salesforce.com"
        );
        assert_eq!(
            Instance::Url("https://acme.my.salesforce.com/".to_string()).base_url(),
            "https://acme.my.salesforce.com"
        );
    }

    #[test]
    fn test_session_urls() {
        let session = Session::new("00D!abc", "https://acme.my.salesforce.com/", "59.0");
        assert_eq!(
            session.data_url(),
            "https://acme.my.salesforce.com/services/data/v59.0"
        );
        assert_eq!(
            session.async_url(),
            "https://acme.my.salesforce.com/services/async/59.0"
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cred = Credential::security_token("me@acme.com", "hunter2", "tok123").unwrap();
        let text = format!("{cred:?}");
        assert!(text.contains("me@acme.com"));
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("tok123"));

        let session = Session::new("00D!secret", "https://x.salesforce.com", "59.0");
        assert!(!format!("{session:?}").contains("00D!secret"));
    }

    #[test]
    fn test_kind_serde() {
        let kind: CredentialKind = serde_json::from_str("\"jwt_bearer\"").unwrap();
        assert_eq!(kind, CredentialKind::JwtBearer);
        assert_eq!(kind.to_string(), "jwt_bearer");
    }

    #[test]
    fn test_kind_from_str_unknown() {
        let err = "kerberos".parse::<CredentialKind>().unwrap_err();
        assert!(err
            .to_string()
            .contains("no valid credential set provided"));
        assert_eq!(
            "direct_session".parse::<CredentialKind>().unwrap(),
            CredentialKind::DirectSession
        );
    }
}
