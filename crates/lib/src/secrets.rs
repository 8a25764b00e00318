//! Secret lookup by logical name (e.g. the bot token `BOT_TOKEN`).
//!
//! Secrets are read once at startup. Values are wrapped in [`Secret`] so they never show up in
//! `Debug` output or logs.

use async_trait::async_trait;
use secrecy::Secret;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret {0} not found")]
    NotFound(String),
    #[error("secret {0} is empty")]
    Empty(String),
    #[error("secret {name} is not valid UTF-8")]
    InvalidUtf8 { name: String },
    #[error("reading secret {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Source of secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Secret<String>, SecretError>;
}

fn non_empty(name: &str, value: &str) -> Result<Secret<String>, SecretError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(SecretError::Empty(name.to_string()));
    }
    Ok(Secret::new(v.to_string()))
}

/// Reads the secret from the environment variable of the same name.
#[derive(Debug, Default, Clone)]
pub struct EnvSecretStore;

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get(&self, name: &str) -> Result<Secret<String>, SecretError> {
        match std::env::var(name) {
            Ok(v) => non_empty(name, &v),
            Err(std::env::VarError::NotPresent) => Err(SecretError::NotFound(name.to_string())),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::InvalidUtf8 {
                name: name.to_string(),
            }),
        }
    }
}

/// Reads `{dir}/{name}`, e.g. a mounted secret volume. Surrounding whitespace is trimmed.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, name: &str) -> Result<Secret<String>, SecretError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(SecretError::NotFound(name.to_string()));
        }
        let path = self.dir.join(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SecretError::NotFound(name.to_string()))
            }
            Err(source) => {
                return Err(SecretError::Io {
                    name: name.to_string(),
                    source,
                })
            }
        };
        let value = String::from_utf8(bytes).map_err(|_| SecretError::InvalidUtf8 {
            name: name.to_string(),
        })?;
        non_empty(name, &value)
    }
}

/// Tries each store in order; the first store that has the secret wins.
/// Errors other than `NotFound` stop the search.
pub struct ChainSecretStore {
    stores: Vec<Box<dyn SecretStore>>,
}

impl ChainSecretStore {
    pub fn new(stores: Vec<Box<dyn SecretStore>>) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl SecretStore for ChainSecretStore {
    async fn get(&self, name: &str) -> Result<Secret<String>, SecretError> {
        for store in &self.stores {
            match store.get(name).await {
                Err(SecretError::NotFound(_)) => continue,
                other => return other,
            }
        }
        Err(SecretError::NotFound(name.to_string()))
    }
}
