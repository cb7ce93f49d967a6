//! Environment-driven configuration.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `HTTP_PORT` | `8080` |
//! | `HTTP_TIMEOUT` (milliseconds) | `2000` |
//! | `USE_PERSISTENT_STORES` | `false` |
//! | `POSTGRES_HOST` | `localhost` |
//! | `POSTGRES_PORT` | `5432` |
//! | `POSTGRES_DATABASE` | `warehouse` |
//! | `POSTGRES_CREDENTIALS_FILE` | `creds.json` |
//! | `POSTGRES_MAX_CONNECTIONS` | `10` |

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read credentials file {path}: {source}")]
    CredentialsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed credentials file {path}: {source}")]
    CredentialsFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub port: u16,
    /// Per-request deadline.
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub credentials_file: PathBuf,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    pub http: HttpConfig,
    pub use_persistent_stores: bool,
    pub postgres: PostgresConfig,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                port: 8080,
                timeout: Duration::from_millis(2000),
            },
            use_persistent_stores: false,
            postgres: PostgresConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "warehouse".to_string(),
                credentials_file: PathBuf::from("creds.json"),
                max_connections: 10,
            },
        }
    }
}

impl WarehouseConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`; unset variables take their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let timeout_ms: u64 = parse_or(&lookup, "HTTP_TIMEOUT", 2000)?;

        Ok(Self {
            http: HttpConfig {
                port: parse_or(&lookup, "HTTP_PORT", defaults.http.port)?,
                timeout: Duration::from_millis(timeout_ms),
            },
            use_persistent_stores: parse_or(
                &lookup,
                "USE_PERSISTENT_STORES",
                defaults.use_persistent_stores,
            )?,
            postgres: PostgresConfig {
                host: lookup("POSTGRES_HOST").unwrap_or(defaults.postgres.host),
                port: parse_or(&lookup, "POSTGRES_PORT", defaults.postgres.port)?,
                database: lookup("POSTGRES_DATABASE").unwrap_or(defaults.postgres.database),
                credentials_file: lookup("POSTGRES_CREDENTIALS_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.postgres.credentials_file),
                max_connections: parse_or(
                    &lookup,
                    "POSTGRES_MAX_CONNECTIONS",
                    defaults.postgres.max_connections,
                )?,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

/// Database login read from the credentials file.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(rename = "USERNAME")]
    pub username: String,
    #[serde(rename = "PASSWORD")]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::CredentialsIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::CredentialsFormat {
            path: path.to_path_buf(),
            source,
        })
    }
}
