use std::time::Duration;

use serde_json::Value;
use tracing::debug;

const VAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_VAULT_KEY: &str = "value";

/// Parsed form of an opaque secret reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretRef {
    None,
    Env(String),
    Vault { path: String, key: String },
    Literal(String),
}

impl SecretRef {
    /// Grammar: empty → none, `env:NAME`, `vault:PATH[#KEY]`, anything else
    /// is the literal secret itself.
    #[must_use]
    pub fn parse(reference: &str) -> Self {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Self::None;
        }
        if let Some(name) = trimmed.strip_prefix("env:") {
            return Self::Env(name.to_owned());
        }
        if let Some(rest) = trimmed.strip_prefix("vault:") {
            let (path, key) = match rest.split_once('#') {
                Some((path, key)) if !key.is_empty() => (path, key),
                Some((path, _)) => (path, DEFAULT_VAULT_KEY),
                None => (rest, DEFAULT_VAULT_KEY),
            };
            return Self::Vault {
                path: path.to_owned(),
                key: key.to_owned(),
            };
        }
        Self::Literal(trimmed.to_owned())
    }
}

/// Resolves secret references to plaintext on demand. Callers must treat the
/// returned plaintext as ephemeral; nothing is cached.
#[derive(Debug, Clone)]
pub struct SecretResolver {
    http: reqwest::Client,
}

impl SecretResolver {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn resolve(&self, reference: &str) -> Option<String> {
        match SecretRef::parse(reference) {
            SecretRef::None => None,
            SecretRef::Env(name) => std::env::var(&name).ok(),
            SecretRef::Vault { path, key } => self.resolve_vault(&path, &key).await,
            SecretRef::Literal(value) => Some(value),
        }
    }

    /// Single-attempt KV lookup against `${VAULT_ADDR}/v1/${path}`. Any
    /// transport or shape failure resolves to none.
    async fn resolve_vault(&self, path: &str, key: &str) -> Option<String> {
        let addr = std::env::var("VAULT_ADDR").ok()?;
        let token = std::env::var("VAULT_TOKEN").ok()?;
        let url = format!("{}/v1/{path}", addr.trim_end_matches('/'));

        let response = self
            .http
            .get(&url)
            .header("X-Vault-Token", token)
            .timeout(VAULT_TIMEOUT)
            .send()
            .await
            .map_err(|error| debug!("vault lookup failed path={path}: {error}"))
            .ok()?;

        if !response.status().is_success() {
            debug!("vault lookup returned {} path={path}", response.status());
            return None;
        }

        let body = response.json::<Value>().await.ok()?;
        extract_vault_value(&body, key)
    }
}

/// KV v2 responses nest the payload under `data.data`; KV v1 puts it directly
/// under `data`.
fn extract_vault_value(body: &Value, key: &str) -> Option<String> {
    let data = body.get("data")?;
    let fields = match data.get("data") {
        Some(inner) if inner.is_object() => inner,
        _ => data,
    };
    fields.get(key)?.as_str().map(str::to_owned)
}
