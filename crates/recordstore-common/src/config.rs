//! Store configuration.
//!
//! [`StoreConfig`] is deserialized from TOML. Every section defaults, so an
//! empty file yields a usable file-backed configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for a store handle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database: DatabaseConfig,
    pub pool: PoolConfig,
    pub logging: LoggingConfig,
}

impl StoreConfig {
    /// Deserialize a `StoreConfig` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Config(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.pool.max_open == 0 {
            warnings.push("pool.max_open is 0; the pool will use a single connection".into());
        }
        if self.pool.max_idle > self.pool.max_open {
            warnings.push(format!(
                "pool.max_idle ({}) exceeds pool.max_open ({}); it will be capped",
                self.pool.max_idle, self.pool.max_open
            ));
        }
        if self.pool.idle_timeout_secs > self.pool.max_lifetime_secs {
            warnings.push(
                "pool.idle_timeout_secs is longer than pool.max_lifetime_secs".into(),
            );
        }

        let valid = ["wal", "delete", "truncate", "memory", "off"];
        let mode = self.database.journal_mode.to_ascii_lowercase();
        if !valid.contains(&mode.as_str()) {
            warnings.push(format!(
                "database.journal_mode '{}' is not a recognized mode (valid: {})",
                self.database.journal_mode,
                valid.join(", ")
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Where the data lives and how each connection is prepared.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub journal_mode: String,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("recordstore.db"),
            journal_mode: "wal".into(),
            busy_timeout_ms: 5_000,
        }
    }
}

/// Connection pool bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_open: u32,
    pub max_idle: u32,
    pub max_lifetime_secs: u64,
    pub idle_timeout_secs: u64,
    pub connection_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: 100,
            max_idle: 10,
            max_lifetime_secs: 30 * 60,
            idle_timeout_secs: 5 * 60,
            connection_timeout_secs: 30,
        }
    }
}

impl PoolConfig {
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

/// Log verbosity used by the CLI when `RUST_LOG` is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log each executed statement (`recordstore::sql` at debug).
    pub log_sql: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            log_sql: false,
        }
    }
}
