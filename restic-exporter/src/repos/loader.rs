//! Loading of the JSON repository list.

use super::{BackendConfig, RepositoryConfig};
use crate::secrets::{secret_field, SecretResolver};
use crate::utils::ConfigError;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// One entry of the configuration file, as written on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigEntry {
    #[serde(default)]
    pub disabled: bool,
    pub repo: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub vault_material: String,
    #[serde(default)]
    pub b2_vault_material: String,
    #[serde(default)]
    pub b2_account_id: String,
    #[serde(default)]
    pub b2_key: String,
}

impl ConfigEntry {
    fn backend(&self) -> BackendConfig {
        if !self.b2_account_id.is_empty() || !self.b2_key.is_empty() {
            BackendConfig::B2 {
                account_id: self.b2_account_id.clone(),
                key: self.b2_key.clone(),
            }
        } else {
            BackendConfig::Default
        }
    }

    /// Fill empty credential fields from the secret store.
    async fn resolve(&mut self, resolver: &dyn SecretResolver) -> Result<(), ConfigError> {
        let wrap = |repo: &str| {
            let repo = repo.to_string();
            move |source| ConfigError::Secret { repo, source }
        };

        if self.password.is_empty() && !self.vault_material.is_empty() {
            self.password = secret_field(resolver, &self.vault_material, "key")
                .await
                .map_err(wrap(&self.repo))?;
        }

        if self.b2_key.is_empty() && !self.b2_vault_material.is_empty() {
            let mut fields = resolver
                .secret(&self.b2_vault_material)
                .await
                .map_err(wrap(&self.repo))?;
            self.b2_account_id = fields.remove("id").unwrap_or_default();
            self.b2_key = fields.remove("key").unwrap_or_default();
        }

        Ok(())
    }

    fn into_config(self) -> Result<RepositoryConfig, ConfigError> {
        if !self.disabled && self.password.is_empty() {
            return Err(ConfigError::MissingCredential(self.repo));
        }
        Ok(RepositoryConfig {
            backend: self.backend(),
            url: self.repo,
            password: self.password,
            disabled: self.disabled,
        })
    }
}

/// Parse raw entries and check the invariants that do not need secrets.
pub fn parse_entries(raw: &str) -> Result<Vec<ConfigEntry>, ConfigError> {
    let entries: Vec<ConfigEntry> = serde_json::from_str(raw)?;

    let mut seen = HashSet::new();
    for entry in &entries {
        if entry.repo.trim().is_empty() {
            return Err(ConfigError::Invalid("entry with empty repo".into()));
        }
        if !seen.insert(entry.repo.as_str()) {
            return Err(ConfigError::Invalid(format!("duplicate repo {}", entry.repo)));
        }
    }

    Ok(entries)
}

/// Read, parse and resolve the repository list at `path`.
///
/// Any failed secret lookup fails the whole load.
pub async fn load_file(
    path: &Path,
    resolver: Option<&dyn SecretResolver>,
) -> Result<Vec<RepositoryConfig>, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let mut entries = parse_entries(&raw)?;

    if let Some(resolver) = resolver {
        for entry in entries.iter_mut() {
            entry.resolve(resolver).await?;
        }
    }

    let configs = entries
        .into_iter()
        .map(ConfigEntry::into_config)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        path = %path.display(),
        repositories = configs.len(),
        enabled = configs.iter().filter(|c| !c.disabled).count(),
        "Repository configuration loaded"
    );

    Ok(configs)
}
