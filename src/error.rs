//! Error types for the FX feature store

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for the feature store and its pipelines
#[derive(Error, Debug)]
pub enum FeatureStoreError {
    /// Structurally invalid call, e.g. an empty key list
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Columns required by the call are absent or carry incompatible types
    #[error("Schema mismatch: {detail}: {columns:?}")]
    SchemaMismatch {
        detail: String,
        columns: Vec<String>,
    },

    /// Reading or writing a snapshot failed
    #[error("Storage error at {}: {reason}", path.display())]
    StorageError { path: PathBuf, reason: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Frame error: {0}")]
    PolarsError(#[from] polars::prelude::PolarsError),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl FeatureStoreError {
    /// Build a `SchemaMismatch` naming the offending columns
    pub fn schema_mismatch<S: Into<String>>(detail: S, columns: Vec<String>) -> Self {
        FeatureStoreError::SchemaMismatch {
            detail: detail.into(),
            columns,
        }
    }

    /// Wrap any displayable failure as a `StorageError` for `path`
    pub fn storage<E: std::fmt::Display>(path: &Path, err: E) -> Self {
        FeatureStoreError::StorageError {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, FeatureStoreError::StorageError { .. })
    }
}

/// Result type alias for feature store operations
pub type Result<T> = std::result::Result<T, FeatureStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_names_columns() {
        let err = FeatureStoreError::schema_mismatch(
            "key columns missing from batch",
            vec!["asof_dt".to_string(), "currency".to_string()],
        );
        let msg = err.to_string();
        assert!(msg.contains("key columns missing"));
        assert!(msg.contains("asof_dt"));
        assert!(msg.contains("currency"));
    }

    #[test]
    fn test_storage_error_carries_path() {
        let err = FeatureStoreError::storage(Path::new("/tmp/fx.parquet"), "disk full");
        assert!(err.is_storage());
        let msg = err.to_string();
        assert!(msg.contains("/tmp/fx.parquet"));
        assert!(msg.contains("disk full"));
    }
}
