//! HashiCorp Vault client for credential lookups.
//!
//! Enabled by `VAULT_ADDR`. Authenticates with `VAULT_TOKEN`, or with an
//! AppRole login when `VAULT_ROLE_ID` and `VAULT_SECRET_ID` are set.

use super::{SecretFields, SecretResolver};
use crate::utils::SecretError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How to obtain a Vault token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultAuth {
    Token(String),
    AppRole { role_id: String, secret_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSettings {
    pub addr: String,
    pub auth: VaultAuth,
}

impl VaultSettings {
    /// Read settings from the process environment.
    ///
    /// Returns `Ok(None)` when `VAULT_ADDR` is unset, which disables secret
    /// resolution entirely.
    pub fn from_env() -> Result<Option<Self>, SecretError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, SecretError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let Some(addr) = get("VAULT_ADDR") else {
            return Ok(None);
        };

        let auth = if let Some(token) = get("VAULT_TOKEN") {
            VaultAuth::Token(token)
        } else {
            match (get("VAULT_ROLE_ID"), get("VAULT_SECRET_ID")) {
                (Some(role_id), Some(secret_id)) => VaultAuth::AppRole { role_id, secret_id },
                _ => {
                    return Err(SecretError::Env(
                        "VAULT_ADDR is set but neither VAULT_TOKEN nor VAULT_ROLE_ID/VAULT_SECRET_ID are".into(),
                    ))
                }
            }
        };

        Ok(Some(Self {
            addr: addr.trim_end_matches('/').to_string(),
            auth,
        }))
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: LoginAuth,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
}

#[derive(Deserialize)]
struct SecretResponse {
    data: Value,
}

pub struct VaultClient {
    http: reqwest::Client,
    addr: String,
    token: String,
}

impl VaultClient {
    /// Build a client and authenticate against Vault.
    pub async fn connect(settings: VaultSettings) -> Result<Self, SecretError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let token = match settings.auth {
            VaultAuth::Token(token) => token,
            VaultAuth::AppRole { role_id, secret_id } => {
                let url = format!("{}/v1/auth/approle/login", settings.addr);
                let resp: LoginResponse = http
                    .post(&url)
                    .json(&serde_json::json!({ "role_id": role_id, "secret_id": secret_id }))
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                tracing::info!("Authenticated to Vault with AppRole");
                resp.auth.client_token
            }
        };

        Ok(Self {
            http,
            addr: settings.addr,
            token,
        })
    }
}

#[async_trait]
impl SecretResolver for VaultClient {
    async fn secret(&self, path: &str) -> Result<SecretFields, SecretError> {
        let url = format!("{}/v1/{}", self.addr, path.trim_start_matches('/'));
        let resp = self
            .http
            .get(&url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SecretError::NotFound(path.to_string()));
        }

        let body: SecretResponse = resp.error_for_status()?.json().await?;
        Ok(flatten_secret(body.data))
    }
}

/// KV v2 nests the secret under `data.data`, next to a `data.metadata`
/// object that always carries the secret `version`.
fn is_kv_v2(obj: &serde_json::Map<String, Value>) -> bool {
    let versioned = obj
        .get("metadata")
        .and_then(Value::as_object)
        .is_some_and(|meta| meta.contains_key("version"));
    versioned && obj.get("data").is_some_and(Value::is_object)
}

/// Extract string fields from a KV v1 or KV v2 payload.
fn flatten_secret(data: Value) -> SecretFields {
    let data = match data {
        Value::Object(mut obj) if is_kv_v2(&obj) => obj.remove("data").unwrap_or(Value::Null),
        other => other,
    };

    let Value::Object(obj) = data else {
        return SecretFields::new();
    };

    obj.into_iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k, s)),
            Value::Number(n) => Some((k, n.to_string())),
            Value::Bool(b) => Some((k, b.to_string())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_settings_disabled_without_addr() {
        let settings = VaultSettings::from_lookup(lookup(&[("VAULT_TOKEN", "t")])).unwrap();
        assert!(settings.is_none());
    }

    #[test]
    fn test_settings_token_preferred() {
        let settings = VaultSettings::from_lookup(lookup(&[
            ("VAULT_ADDR", "https://vault.example.com/"),
            ("VAULT_TOKEN", "s.abc"),
            ("VAULT_ROLE_ID", "role"),
            ("VAULT_SECRET_ID", "secret"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(settings.addr, "https://vault.example.com");
        assert_eq!(settings.auth, VaultAuth::Token("s.abc".into()));
    }

    #[test]
    fn test_settings_approle() {
        let settings = VaultSettings::from_lookup(lookup(&[
            ("VAULT_ADDR", "https://vault.example.com"),
            ("VAULT_ROLE_ID", "role"),
            ("VAULT_SECRET_ID", "secret"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(
            settings.auth,
            VaultAuth::AppRole {
                role_id: "role".into(),
                secret_id: "secret".into()
            }
        );
    }

    #[test]
    fn test_settings_missing_credentials() {
        let result = VaultSettings::from_lookup(lookup(&[
            ("VAULT_ADDR", "https://vault.example.com"),
            ("VAULT_ROLE_ID", "role"),
        ]));
        assert!(matches!(result, Err(SecretError::Env(_))));
    }

    #[test]
    fn test_flatten_kv_v1() {
        let fields = flatten_secret(json!({ "id": "0012ab", "key": "K001" }));
        assert_eq!(fields.get("id").map(String::as_str), Some("0012ab"));
        assert_eq!(fields.get("key").map(String::as_str), Some("K001"));
    }

    #[test]
    fn test_flatten_kv_v2() {
        let fields = flatten_secret(json!({
            "data": { "key": "pw" },
            "metadata": { "version": 3 }
        }));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("key").map(String::as_str), Some("pw"));
    }

    #[test]
    fn test_flatten_kv_v1_with_data_and_metadata_fields() {
        let fields = flatten_secret(json!({
            "data": "payload",
            "metadata": "owner=ops",
            "key": "pw"
        }));
        assert_eq!(fields.len(), 3);
        assert_eq!(fields.get("metadata").map(String::as_str), Some("owner=ops"));
        assert_eq!(fields.get("key").map(String::as_str), Some("pw"));
    }

    #[test]
    fn test_flatten_requires_versioned_metadata() {
        let fields = flatten_secret(json!({
            "data": { "key": "inner" },
            "metadata": { "owner": "ops" },
            "key": "outer"
        }));
        assert_eq!(fields.get("key").map(String::as_str), Some("outer"));
    }
}
