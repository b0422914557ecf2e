//! Parquet-backed snapshots and the keyed upsert
//!
//! A snapshot is one logical table stored in a single Parquet file. The only
//! mutation is [`SnapshotStore::upsert`], which replaces the file with a full
//! image of `(existing rows whose key is absent from the batch) ∪ batch`.
//!
//! # Merge policy
//!
//! - The batch is deduplicated on the key first; the last occurrence in batch
//!   order wins.
//! - Columns present on only one side are null-filled on the other. Column
//!   order is the existing snapshot's order followed by new batch columns.
//! - A column present on both sides must carry the same dtype, otherwise the
//!   call fails with `SchemaMismatch` and nothing is written.
//! - Null key values in the batch are rejected: they never compare equal, so
//!   they could not supersede anything.
//! - An empty batch is a no-op and does not create a snapshot.
//!
//! Existing rows are kept by filtering the snapshot scan against the batch's
//! key set. With `streaming` enabled the merged image is sunk straight into
//! Parquet, so memory is bounded by the batch and its keys rather than by the
//! snapshot size.
//!
//! The new image is written to a temporary file in the target directory,
//! synced, then renamed over the target. A failure at any point leaves the
//! previous file untouched.

use super::batch::RowBatch;
use crate::config::{SnapshotCompression, StoreSettings};
use crate::error::{FeatureStoreError, Result};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;

/// Outcome of a single upsert call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertSummary {
    /// The snapshot did not exist before this call
    pub created: bool,
    /// Rows in the new snapshot image
    pub rows_written: usize,
    /// Batch rows whose key was not present before
    pub rows_inserted: usize,
    /// Prior rows superseded by a batch row with the same key
    pub rows_replaced: usize,
    /// Prior rows carried over unchanged
    pub rows_retained: usize,
    /// Batch rows dropped by in-batch deduplication
    pub duplicates_dropped: usize,
}

impl UpsertSummary {
    /// True when the call left storage untouched
    pub fn is_noop(&self) -> bool {
        self.rows_written == 0 && !self.created
    }
}

/// Reads and upserts Parquet snapshots
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    settings: StoreSettings,
}

impl SnapshotStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Whether a snapshot exists at `location`
    pub fn exists(&self, location: &Path) -> bool {
        location.is_file()
    }

    /// Lazy scan of a snapshot, for predicate and projection pushdown
    pub fn scan(&self, location: &Path) -> Result<LazyFrame> {
        if !self.exists(location) {
            return Err(FeatureStoreError::storage(location, "snapshot does not exist"));
        }
        LazyFrame::scan_parquet(location, ScanArgsParquet::default())
            .map_err(|e| FeatureStoreError::storage(location, e))
    }

    /// Read a whole snapshot into memory
    pub fn read(&self, location: &Path) -> Result<RowBatch> {
        let frame = self
            .scan(location)?
            .collect()
            .map_err(|e| FeatureStoreError::storage(location, e))?;
        RowBatch::from_frame(frame)
    }

    /// Column names and dtypes of a snapshot, without reading its rows
    pub fn schema(&self, location: &Path) -> Result<SchemaRef> {
        self.scan(location)?
            .schema()
            .map_err(|e| FeatureStoreError::storage(location, e))
    }

    /// Row count from the Parquet footer
    pub fn row_count(&self, location: &Path) -> Result<usize> {
        let file = File::open(location).map_err(|e| FeatureStoreError::storage(location, e))?;
        ParquetReader::new(file)
            .num_rows()
            .map_err(|e| FeatureStoreError::storage(location, e))
    }

    /// Merge `batch` into the snapshot at `location`, replacing rows with matching keys
    pub fn upsert(
        &self,
        batch: &RowBatch,
        location: &Path,
        key_columns: &[String],
    ) -> Result<UpsertSummary> {
        validate_keys(batch, key_columns)?;

        if batch.is_empty() {
            log::debug!(
                "Empty batch for {}, leaving snapshot untouched",
                location.display()
            );
            return Ok(UpsertSummary::default());
        }

        let incoming = batch
            .frame()
            .clone()
            .lazy()
            .unique_stable(Some(key_columns.to_vec()), UniqueKeepStrategy::Last)
            .collect()?;
        let duplicates_dropped = batch.height() - incoming.height();
        if duplicates_dropped > 0 {
            log::debug!(
                "Dropped {} duplicate key rows from batch for {}",
                duplicates_dropped,
                location.display()
            );
        }

        if !self.exists(location) {
            let expected_rows = incoming.height();
            let rows_written = self.write_atomic(incoming.lazy(), expected_rows, location)?;
            log::info!(
                "Created snapshot {} with {} rows",
                location.display(),
                rows_written
            );
            return Ok(UpsertSummary {
                created: true,
                rows_written,
                rows_inserted: rows_written,
                duplicates_dropped,
                ..UpsertSummary::default()
            });
        }

        let existing_schema = self.schema(location)?;
        check_compatible(&existing_schema, &incoming.schema(), key_columns)?;
        let existing_rows = self.row_count(location)?;

        let batch_keys = incoming
            .clone()
            .lazy()
            .select([key_expr(key_columns)])
            .collect()?
            .column(KEY_COLUMN)?
            .clone();
        let retained = self
            .scan(location)?
            .filter(retain_predicate(key_columns, batch_keys));
        let rows_retained = count_rows(retained.clone(), location)?;
        let incoming_rows = incoming.height();

        let image = concat_lf_diagonal([retained, incoming.lazy()], UnionArgs::default())?;
        let rows_written = self.write_atomic(image, rows_retained + incoming_rows, location)?;

        let rows_replaced = existing_rows.saturating_sub(rows_retained);
        let summary = UpsertSummary {
            created: false,
            rows_written,
            rows_inserted: incoming_rows - rows_replaced.min(incoming_rows),
            rows_replaced,
            rows_retained,
            duplicates_dropped,
        };
        log::info!(
            "Upserted {} rows into {} ({} replaced, {} retained, {} total)",
            incoming_rows,
            location.display(),
            summary.rows_replaced,
            summary.rows_retained,
            summary.rows_written
        );

        Ok(summary)
    }

    /// Write `image` next to `location` and rename it into place
    ///
    /// Returns the row count recorded in the new file's footer.
    fn write_atomic(&self, image: LazyFrame, expected_rows: usize, location: &Path) -> Result<usize> {
        let dir = match location.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir().map_err(|e| FeatureStoreError::storage(location, e))?,
        };
        fs::create_dir_all(&dir).map_err(|e| FeatureStoreError::storage(location, e))?;

        let staged = tempfile::Builder::new()
            .prefix(".snapshot-")
            .suffix(".parquet.tmp")
            .tempfile_in(&dir)
            .map_err(|e| FeatureStoreError::storage(location, e))?;

        let rows = self.write_image(image, staged.path(), expected_rows)?;
        staged
            .as_file()
            .sync_all()
            .map_err(|e| FeatureStoreError::storage(location, e))?;

        staged
            .persist(location)
            .map_err(|e| FeatureStoreError::storage(location, e.error))?;
        Ok(rows)
    }

    /// Write the merge plan to `path`
    ///
    /// With streaming enabled the plan is sunk straight into Parquet, so the
    /// existing snapshot is never held in memory at once; only the batch and
    /// its key set are. Plans the streaming engine cannot run, or a sink whose
    /// row count disagrees with `expected_rows`, are collected on the default
    /// engine instead, which holds the whole image in memory.
    fn write_image(&self, image: LazyFrame, path: &Path, expected_rows: usize) -> Result<usize> {
        if self.settings.streaming {
            match image.clone().sink_parquet(path.to_path_buf(), self.write_options()) {
                Ok(()) => {
                    let rows = self.row_count(path)?;
                    if rows == expected_rows {
                        return Ok(rows);
                    }
                    log::warn!(
                        "Streaming sink wrote {} rows to {}, expected {}; rewriting in memory",
                        rows,
                        path.display(),
                        expected_rows
                    );
                }
                Err(e) => log::debug!(
                    "Streaming sink unavailable for {}: {}; collecting in memory",
                    path.display(),
                    e
                ),
            }
        }

        let mut frame = image
            .with_streaming(false)
            .collect()
            .map_err(|e| FeatureStoreError::storage(path, e))?;
        let file = File::create(path).map_err(|e| FeatureStoreError::storage(path, e))?;
        ParquetWriter::new(file)
            .with_compression(self.settings.compression.to_parquet())
            .finish(&mut frame)
            .map_err(|e| FeatureStoreError::storage(path, e))?;
        self.row_count(path)
    }

    fn write_options(&self) -> ParquetWriteOptions {
        ParquetWriteOptions {
            compression: self.settings.compression.to_parquet(),
            maintain_order: true,
            ..ParquetWriteOptions::default()
        }
    }
}

/// Upsert with default store settings
pub fn upsert(batch: &RowBatch, location: &Path, key_columns: &[String]) -> Result<UpsertSummary> {
    SnapshotStore::default().upsert(batch, location, key_columns)
}

fn validate_keys(batch: &RowBatch, key_columns: &[String]) -> Result<()> {
    if key_columns.is_empty() {
        return Err(FeatureStoreError::InvalidArgument(
            "key_columns must be a non-empty list of column names".to_string(),
        ));
    }

    let missing = batch.missing_columns(key_columns);
    if !missing.is_empty() {
        return Err(FeatureStoreError::schema_mismatch(
            "key columns missing from batch",
            missing,
        ));
    }

    for key in key_columns {
        let nulls = batch.null_count(key)?;
        if nulls > 0 {
            return Err(FeatureStoreError::InvalidArgument(format!(
                "key column '{}' contains {} null values",
                key, nulls
            )));
        }
    }

    Ok(())
}

fn check_compatible(existing: &Schema, incoming: &Schema, key_columns: &[String]) -> Result<()> {
    let missing: Vec<String> = key_columns
        .iter()
        .filter(|k| existing.get(k.as_str()).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(FeatureStoreError::schema_mismatch(
            "key columns missing from existing snapshot",
            missing,
        ));
    }

    let conflicts: Vec<String> = incoming
        .iter()
        .filter_map(|(name, dtype)| match existing.get(name.as_str()) {
            Some(existing_dtype) if existing_dtype != dtype => Some(format!(
                "{} (snapshot {}, batch {})",
                name, existing_dtype, dtype
            )),
            _ => None,
        })
        .collect();
    if !conflicts.is_empty() {
        return Err(FeatureStoreError::schema_mismatch(
            "column types differ between snapshot and batch",
            conflicts,
        ));
    }

    Ok(())
}

/// Name of the composite key column used while merging
const KEY_COLUMN: &str = "__snapshot_key";

/// Separator between key parts; a control character that never appears in codes or dates
const KEY_SEPARATOR: &str = "\u{1f}";

/// All key columns rendered as one string, so the merge is a plain filter
fn key_expr(key_columns: &[String]) -> Expr {
    let parts: Vec<Expr> = key_columns
        .iter()
        .map(|k| col(k).cast(DataType::String))
        .collect();
    concat_str(parts, KEY_SEPARATOR, false).alias(KEY_COLUMN)
}

/// Rows of the existing snapshot whose key does not appear in the batch
///
/// Rows with a null key part can never match a batch key, so they are kept.
fn retain_predicate(key_columns: &[String], batch_keys: Series) -> Expr {
    let key = key_expr(key_columns);
    key.clone()
        .is_null()
        .or(key.is_in(lit(batch_keys)).not())
}

fn count_rows(frame: LazyFrame, location: &Path) -> Result<usize> {
    let counted = frame
        .select([len().cast(DataType::UInt64).alias("rows")])
        .with_streaming(false)
        .collect()
        .map_err(|e| FeatureStoreError::storage(location, e))?;
    let rows = counted.column("rows")?.u64()?.get(0).unwrap_or(0);
    Ok(rows as usize)
}

impl SnapshotCompression {
    fn to_parquet(self) -> ParquetCompression {
        match self {
            SnapshotCompression::Snappy => ParquetCompression::Snappy,
            SnapshotCompression::Zstd => ParquetCompression::Zstd(None),
            SnapshotCompression::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}
