use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use docket_core::CacheSettings;
use docket_store::backend::{DEFAULT_BUCKET, DEFAULT_ROOT};
use docket_store::StoreBackend;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Process configuration.
///
/// Resolved in three layers: built-in defaults, an optional TOML file, then
/// environment variables (see [`ServerConfig::apply_env`]).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    pub store: StoreBackend,
    pub cache: CacheSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9009)),
            max_body_bytes: 50 * 1024 * 1024,
            store: StoreBackend::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Read a TOML configuration file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would disable or break a subsystem.
    pub fn validate(&self) -> ServerResult<()> {
        if self.cache.sweep_interval_ms == 0 {
            return Err(ServerError::Config(
                "sweep_interval_ms (EVICTION_INTERVAL_MS) must be greater than zero".into(),
            ));
        }
        if self.cache.idle_threshold_ms == 0 {
            return Err(ServerError::Config(
                "idle_threshold_ms (EVICTION_IDLE_MS) must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Override settings from the process environment.
    pub fn apply_env(&mut self) -> ServerResult<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Override settings from `lookup`, which maps a variable name to its
    /// value.
    ///
    /// Recognised variables: `BIND_ADDR`, `PORT`, `MAX_BODY_BYTES`,
    /// `STORE_BACKEND` (`memory` | `fs`), `STORE_ROOT`, `STORE_BUCKET`
    /// (falling back to `S3_BUCKET`), `SEARCH_TIMEOUT_MS`,
    /// `EVICTION_INTERVAL_MS`, `EVICTION_IDLE_MS`.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ServerResult<()> {
        if let Some(addr) = lookup("BIND_ADDR") {
            self.bind_addr = parse_var("BIND_ADDR", &addr)?;
        }
        if let Some(port) = lookup("PORT") {
            self.bind_addr.set_port(parse_var("PORT", &port)?);
        }
        if let Some(max) = lookup("MAX_BODY_BYTES") {
            self.max_body_bytes = parse_var("MAX_BODY_BYTES", &max)?;
        }
        if let Some(ms) = lookup("SEARCH_TIMEOUT_MS") {
            self.cache.search_timeout_ms = parse_var("SEARCH_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = lookup("EVICTION_INTERVAL_MS") {
            self.cache.sweep_interval_ms = parse_var("EVICTION_INTERVAL_MS", &ms)?;
        }
        if let Some(ms) = lookup("EVICTION_IDLE_MS") {
            self.cache.idle_threshold_ms = parse_var("EVICTION_IDLE_MS", &ms)?;
        }

        let backend = lookup("STORE_BACKEND");
        let root = lookup("STORE_ROOT");
        let bucket = lookup("STORE_BUCKET").or_else(|| lookup("S3_BUCKET"));
        if backend.is_none() && root.is_none() && bucket.is_none() {
            return self.validate();
        }

        let (current_root, current_bucket) = match &self.store {
            StoreBackend::Fs { root, bucket } => (root.clone(), bucket.clone()),
            StoreBackend::Memory => (PathBuf::from(DEFAULT_ROOT), DEFAULT_BUCKET.to_string()),
        };
        let kind = match backend.as_deref() {
            Some(kind) => kind.to_ascii_lowercase(),
            None if matches!(self.store, StoreBackend::Memory) => "memory".to_string(),
            None => "fs".to_string(),
        };
        self.store = match kind.as_str() {
            "memory" => StoreBackend::Memory,
            "fs" => StoreBackend::Fs {
                root: root.map(PathBuf::from).unwrap_or(current_root),
                bucket: bucket.unwrap_or(current_bucket),
            },
            other => {
                return Err(ServerError::Config(format!(
                    "STORE_BACKEND must be \"memory\" or \"fs\", got {other:?}"
                )))
            }
        };
        self.validate()
    }
}

fn parse_var<T>(name: &str, raw: &str) -> ServerResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ServerError::Config(format!("invalid {name}={raw:?}: {e}")))
}
