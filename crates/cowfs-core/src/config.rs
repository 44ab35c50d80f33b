// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Configuration types for CoWFS Core
//!
//! Configuration is read from TOML:
//!
//! ```toml
//! [store]
//! mode = "sqlite"
//! path = "/var/lib/cowfs/ids.db"
//!
//! [ids]
//! counter-key = "cowfs/id_counter"
//! default-batch = 64
//!
//! [logging]
//! log-level = "debug"
//! ```
//!
//! Every section is optional; missing keys fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// Key under which the allocation counter is persisted unless configured otherwise
pub const DEFAULT_COUNTER_KEY: &str = "cowfs/id_counter";

/// Backing store selection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum StoreConfig {
    /// Process-local store, lost on exit
    InMemory,
    /// SQLite database file shared by every process pointing at it
    Sqlite { path: PathBuf },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::InMemory
    }
}

/// Identity manager settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IdConfig {
    /// Store key holding the allocation counter
    pub counter_key: String,
    /// Batch size used by callers that reserve identifiers without an explicit count
    pub default_batch: u64,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            counter_key: DEFAULT_COUNTER_KEY.to_string(),
            default_batch: 64,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Logging verbosity level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Complete configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CoreConfig {
    pub store: StoreConfig,
    pub ids: IdConfig,
    pub logging: LoggingConfig,
}

impl CoreConfig {
    pub fn from_toml_str(s: &str) -> CoreResult<Self> {
        let config: CoreConfig =
            toml::from_str(s).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> CoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.ids.counter_key.is_empty() {
            return Err(CoreError::Config("ids.counter-key must not be empty".into()));
        }
        if self.ids.default_batch == 0 {
            return Err(CoreError::Config("ids.default-batch must be positive".into()));
        }
        Ok(())
    }
}
