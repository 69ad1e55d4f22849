//! Secret resolution
//!
//! A pipeline names its credentials by reference; a [`SecretProvider`] turns
//! that reference into the flat field map the credential variant expects.

use crate::auth::{Credential, CredentialKind};
use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Source of credential field maps
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Fetch the fields stored under a reference
    ///
    /// Every value must be a string or null.
    async fn resolve(&self, reference: &str) -> Result<JsonObject>;
}

/// Resolve a reference and build the credential it describes
pub async fn resolve_credential(
    provider: &dyn SecretProvider,
    kind: CredentialKind,
    reference: &str,
) -> Result<Credential> {
    let fields = provider.resolve(reference).await?;
    Credential::from_fields(kind, &fields)
}

/// Check that a secret body is a map of string (or null) fields
fn validate_fields(reference: &str, value: JsonValue) -> Result<JsonObject> {
    let JsonValue::Object(fields) = value else {
        return Err(Error::secret_malformed(reference, "expected a JSON object"));
    };
    for (name, value) in &fields {
        if !matches!(value, JsonValue::String(_) | JsonValue::Null) {
            return Err(Error::secret_malformed(
                reference,
                format!("field '{name}' is not a string"),
            ));
        }
    }
    Ok(fields)
}

// ============================================================================
// File Provider
// ============================================================================

/// Secrets stored as `{root}/{reference}.json`
#[derive(Debug, Clone)]
pub struct FileSecretProvider {
    root: PathBuf,
}

impl FileSecretProvider {
    /// Create a provider rooted at a directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// File backing a reference; rejects references escaping the root
    fn path_for(&self, reference: &str) -> Result<PathBuf> {
        let relative = Path::new(reference);
        let escapes = reference.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(Error::secret_malformed(
                reference,
                "reference must be a relative path inside the secrets directory",
            ));
        }
        Ok(self.root.join(format!("{reference}.json")))
    }
}

#[async_trait]
impl SecretProvider for FileSecretProvider {
    async fn resolve(&self, reference: &str) -> Result<JsonObject> {
        let path = self.path_for(reference)?;
        debug!(reference, path = %path.display(), "Reading secret");

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::SecretNotFound {
                    reference: reference.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let value: JsonValue = serde_json::from_str(&text)
            .map_err(|e| Error::secret_malformed(reference, e.to_string()))?;
        validate_fields(reference, value)
    }
}

// ============================================================================
// Static Provider
// ============================================================================

/// In-memory secrets
#[derive(Debug, Clone, Default)]
pub struct StaticSecretProvider {
    secrets: HashMap<String, JsonValue>,
}

impl StaticSecretProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret body under a reference
    #[must_use]
    pub fn with_secret(mut self, reference: impl Into<String>, value: JsonValue) -> Self {
        self.secrets.insert(reference.into(), value);
        self
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn resolve(&self, reference: &str) -> Result<JsonObject> {
        let value = self
            .secrets
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::SecretNotFound {
                reference: reference.to_string(),
            })?;
        validate_fields(reference, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_file_provider_reads_nested_reference() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("acme")).unwrap();
        std::fs::write(
            dir.path().join("acme/salesforce.json"),
            r#"{"user_name": "ops@acme.com", "password": "pw", "security_token": "tok"}"#,
        )
        .unwrap();

        let provider = FileSecretProvider::new(dir.path());
        let fields = provider.resolve("acme/salesforce").await.unwrap();
        assert_eq!(fields["user_name"], "ops@acme.com");

        let credential =
            resolve_credential(&provider, CredentialKind::SecurityToken, "acme/salesforce")
                .await
                .unwrap();
        assert_eq!(credential.kind(), CredentialKind::SecurityToken);
    }

    #[tokio::test]
    async fn test_file_provider_missing_secret() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSecretProvider::new(dir.path())
            .resolve("absent")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SecretNotFound { ref reference } if reference == "absent"));
    }

    #[tokio::test]
    async fn test_file_provider_rejects_escaping_reference() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileSecretProvider::new(dir.path());
        for reference in ["../etc/passwd", "/abs/path", ""] {
            let err = provider.resolve(reference).await.unwrap_err();
            assert!(matches!(err, Error::SecretMalformed { .. }), "{reference}");
        }
    }

    #[tokio::test]
    async fn test_file_provider_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let err = FileSecretProvider::new(dir.path())
            .resolve("broken")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SecretMalformed { .. }));
    }

    #[tokio::test]
    async fn test_static_provider_rejects_non_object() {
        let provider = StaticSecretProvider::new().with_secret("list", json!(["a", "b"]));
        let err = provider.resolve("list").await.unwrap_err();
        assert!(matches!(err, Error::SecretMalformed { .. }));
    }

    #[tokio::test]
    async fn test_static_provider_rejects_non_string_field() {
        let provider =
            StaticSecretProvider::new().with_secret("numbers", json!({"user_name": 42}));
        let err = provider.resolve("numbers").await.unwrap_err();
        assert!(err.to_string().contains("user_name"));
    }

    #[tokio::test]
    async fn test_resolve_credential_validates_fields() {
        let provider = StaticSecretProvider::new()
            .with_secret("partial", json!({"user_name": "a@b.c", "password": null}));
        let err = resolve_credential(&provider, CredentialKind::SecurityToken, "partial")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredential { .. }));
    }

    #[tokio::test]
    async fn test_static_provider_missing() {
        let err = StaticSecretProvider::new().resolve("nope").await.unwrap_err();
        assert!(matches!(err, Error::SecretNotFound { .. }));
    }
}
