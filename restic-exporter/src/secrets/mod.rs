//! Secret lookup used while loading repository configuration.

pub mod vault;

use crate::utils::SecretError;
use async_trait::async_trait;
use std::collections::HashMap;

pub use vault::VaultClient;

/// Flat string fields of a stored secret, e.g. `{"key": "..."}` or
/// `{"id": "...", "key": "..."}`.
pub type SecretFields = HashMap<String, String>;

#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Read the secret stored at `path`.
    async fn secret(&self, path: &str) -> Result<SecretFields, SecretError>;
}

/// Fetch a single required field from the secret at `path`.
pub async fn secret_field(
    resolver: &dyn SecretResolver,
    path: &str,
    field: &str,
) -> Result<String, SecretError> {
    let mut fields = resolver.secret(path).await?;
    fields
        .remove(field)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SecretError::MissingField {
            path: path.to_string(),
            field: field.to_string(),
        })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// In-memory resolver for tests.
    #[derive(Default)]
    pub struct StaticSecrets {
        pub entries: HashMap<String, SecretFields>,
    }

    impl StaticSecrets {
        pub fn with(mut self, path: &str, fields: &[(&str, &str)]) -> Self {
            self.entries.insert(
                path.to_string(),
                fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
            self
        }
    }

    #[async_trait]
    impl SecretResolver for StaticSecrets {
        async fn secret(&self, path: &str) -> Result<SecretFields, SecretError> {
            self.entries
                .get(path)
                .cloned()
                .ok_or_else(|| SecretError::NotFound(path.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StaticSecrets;
    use super::*;

    #[tokio::test]
    async fn test_secret_field_present() {
        let secrets = StaticSecrets::default().with("kv/backup/a", &[("key", "hunter2")]);
        let value = secret_field(&secrets, "kv/backup/a", "key").await.unwrap();
        assert_eq!(value, "hunter2");
    }

    #[tokio::test]
    async fn test_secret_field_missing_or_empty() {
        let secrets = StaticSecrets::default().with("kv/backup/a", &[("key", "")]);
        let err = secret_field(&secrets, "kv/backup/a", "key").await.unwrap_err();
        assert!(matches!(err, SecretError::MissingField { .. }));

        let err = secret_field(&secrets, "kv/backup/b", "key").await.unwrap_err();
        assert!(matches!(err, SecretError::NotFound(_)));
    }
}
