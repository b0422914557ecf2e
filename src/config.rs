//! Configuration for snapshot locations, staging conventions and store settings
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file)
//! yields a working configuration rooted at `~/.fx-features/data`.
//!
//! ```toml
//! data_dir = "/srv/quant/data"
//!
//! [snapshots]
//! fx_carry = "features/fx/daily/fx_carry.parquet"
//!
//! [staging]
//! invert_currencies = ["EUR", "GBP", "AUD", "NZD"]
//!
//! [store]
//! streaming = true
//! compression = "zstd"
//! ```

use crate::error::{FeatureStoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Parquet compression codec for snapshot files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotCompression {
    #[default]
    Snappy,
    Zstd,
    Uncompressed,
}

/// Settings consumed by [`crate::store::SnapshotStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Run the merge on the polars streaming engine where the plan allows it
    #[serde(default = "default_streaming")]
    pub streaming: bool,
    #[serde(default)]
    pub compression: SnapshotCompression,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            streaming: default_streaming(),
            compression: SnapshotCompression::default(),
        }
    }
}

/// Snapshot paths, relative ones resolved against `data_dir`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPaths {
    #[serde(default = "default_exchange_rates")]
    pub exchange_rates: PathBuf,
    #[serde(default = "default_fx_carry")]
    pub fx_carry: PathBuf,
    #[serde(default = "default_fx_returns")]
    pub fx_returns: PathBuf,
}

impl Default for SnapshotPaths {
    fn default() -> Self {
        Self {
            exchange_rates: default_exchange_rates(),
            fx_carry: default_fx_carry(),
            fx_returns: default_fx_returns(),
        }
    }
}

/// Conventions applied when staging vendor CSVs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingSettings {
    /// Currencies quoted as USD per unit, inverted to get units per USD
    #[serde(default = "default_invert_currencies")]
    pub invert_currencies: Vec<String>,
    /// chrono formats tried in order for the CSV date column
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self {
            invert_currencies: default_invert_currencies(),
            date_formats: default_date_formats(),
        }
    }
}

/// Top-level configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureStoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub snapshots: SnapshotPaths,
    #[serde(default)]
    pub staging: StagingSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fx-features")
        .join("data")
}

fn default_exchange_rates() -> PathBuf {
    PathBuf::from("raw/fx/daily/exchange_rate.parquet")
}

fn default_fx_carry() -> PathBuf {
    PathBuf::from("features/fx/daily/fx_carry.parquet")
}

fn default_fx_returns() -> PathBuf {
    PathBuf::from("asset_returns/daily/fx_return.parquet")
}

fn default_invert_currencies() -> Vec<String> {
    ["EUR", "GBP", "AUD", "NZD"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_date_formats() -> Vec<String> {
    vec!["%Y-%m-%d".to_string(), "%m/%d/%Y".to_string()]
}

fn default_streaming() -> bool {
    true
}

impl Default for FeatureStoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            snapshots: SnapshotPaths::default(),
            staging: StagingSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl FeatureStoreConfig {
    /// Default config file location: `~/.fx-features/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".fx-features").join("config.toml"))
    }

    /// Load from an explicit file, else the default location if present, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(config_path) = path {
            return Self::from_file(config_path);
        }

        match Self::default_path() {
            Some(default_path) if default_path.is_file() => {
                log::debug!("Loading config from {}", default_path.display());
                Self::from_file(&default_path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            FeatureStoreError::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents).map_err(|e| {
            FeatureStoreError::ConfigError(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn exchange_rates_path(&self) -> PathBuf {
        self.resolve(&self.snapshots.exchange_rates)
    }

    pub fn fx_carry_path(&self) -> PathBuf {
        self.resolve(&self.snapshots.fx_carry)
    }

    pub fn fx_returns_path(&self) -> PathBuf {
        self.resolve(&self.snapshots.fx_returns)
    }
}
