//! Row batches - schema-uniform collections of records backed by a polars `DataFrame`
//!
//! A [`RowBatch`] can be wrapped around an existing frame or built from loosely
//! typed [`Record`]s. Records are checked against an explicit [`BatchSchema`]
//! when the batch is built, so type disagreements surface at ingestion instead
//! of being coerced silently during a merge.

use crate::error::{FeatureStoreError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::fmt;

/// Declared type of a batch column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Float64,
    Int64,
    Utf8,
    Date,
    /// Naive timestamp with microsecond precision
    Datetime,
}

impl ColumnType {
    /// Physical polars dtype used when the column is materialised
    pub fn dtype(&self) -> DataType {
        match self {
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Utf8 => DataType::String,
            ColumnType::Date => DataType::Date,
            ColumnType::Datetime => DataType::Datetime(TimeUnit::Microseconds, None),
        }
    }

    /// Map a polars dtype back to a declared type, if it is one we support
    pub fn from_dtype(dtype: &DataType) -> Option<Self> {
        match dtype {
            DataType::Float64 | DataType::Float32 => Some(ColumnType::Float64),
            DataType::Int64 | DataType::Int32 | DataType::UInt32 => Some(ColumnType::Int64),
            DataType::String => Some(ColumnType::Utf8),
            DataType::Date => Some(ColumnType::Date),
            DataType::Datetime(_, _) => Some(ColumnType::Datetime),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ColumnType::Float64 => "float64",
            ColumnType::Int64 => "int64",
            ColumnType::Utf8 => "utf8",
            ColumnType::Date => "date",
            ColumnType::Datetime => "datetime",
        };
        write!(f, "{}", name)
    }
}

/// Scalar cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Float(f64),
    Int(i64),
    Str(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Declared type this value satisfies; `None` for nulls, which fit any column
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Float(_) => Some(ColumnType::Float64),
            Value::Int(_) => Some(ColumnType::Int64),
            Value::Str(_) => Some(ColumnType::Utf8),
            Value::Date(_) => Some(ColumnType::Date),
            Value::Timestamp(_) => Some(ColumnType::Datetime),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Explicit, ordered column declaration for a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSchema {
    fields: Vec<(String, ColumnType)>,
}

impl BatchSchema {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a column declaration (builder style)
    pub fn with_column(mut self, name: &str, column_type: ColumnType) -> Self {
        self.push(name, column_type);
        self
    }

    /// Append a column declaration, replacing an earlier one with the same name
    pub fn push(&mut self, name: &str, column_type: ColumnType) {
        if let Some(field) = self.fields.iter_mut().find(|(n, _)| n == name) {
            field.1 = column_type;
        } else {
            self.fields.push((name.to_string(), column_type));
        }
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column_type(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn fields(&self) -> &[(String, ColumnType)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Derive a schema from a polars schema, failing on unsupported dtypes
    pub fn from_polars(schema: &Schema) -> Result<Self> {
        let mut out = BatchSchema::new();
        let mut unsupported = Vec::new();
        for (name, dtype) in schema.iter() {
            match ColumnType::from_dtype(dtype) {
                Some(t) => out.push(name.as_str(), t),
                None => unsupported.push(format!("{} ({})", name, dtype)),
            }
        }
        if !unsupported.is_empty() {
            return Err(FeatureStoreError::schema_mismatch(
                "unsupported column types",
                unsupported,
            ));
        }
        Ok(out)
    }
}

/// A single row: ordered `(column, value)` pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Set a column value (builder style); a repeated column overwrites the earlier value
    pub fn with<V: Into<Value>>(mut self, column: &str, value: V) -> Self {
        self.set(column, value);
        self
    }

    pub fn set<V: Into<Value>>(&mut self, column: &str, value: V) {
        let value = value.into();
        if let Some(slot) = self.values.iter_mut().find(|(c, _)| c == column) {
            slot.1 = value;
        } else {
            self.values.push((column.to_string(), value));
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// In-memory, schema-uniform batch of rows
#[derive(Debug, Clone)]
pub struct RowBatch {
    frame: DataFrame,
}

impl RowBatch {
    /// Wrap an existing frame; every column must have a supported type
    pub fn from_frame(frame: DataFrame) -> Result<Self> {
        BatchSchema::from_polars(&frame.schema())?;
        Ok(Self { frame })
    }

    /// Empty batch carrying the given schema
    pub fn empty(schema: &BatchSchema) -> Result<Self> {
        Self::from_records(schema, Vec::new())
    }

    /// Build a batch from records, validating each one against `schema`
    pub fn from_records(schema: &BatchSchema, records: Vec<Record>) -> Result<Self> {
        if schema.is_empty() {
            return Err(FeatureStoreError::InvalidArgument(
                "batch schema must declare at least one column".to_string(),
            ));
        }

        for (idx, record) in records.iter().enumerate() {
            validate_record(schema, record, idx)?;
        }

        let columns = schema
            .fields()
            .iter()
            .map(|(name, column_type)| build_series(name, *column_type, &records))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            frame: DataFrame::new(columns)?,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_names().contains(&name)
    }

    pub fn schema(&self) -> Result<BatchSchema> {
        BatchSchema::from_polars(&self.frame.schema())
    }

    /// Names from `columns` that this batch does not carry, in the order given
    pub fn missing_columns(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .filter(|c| !self.has_column(c))
            .cloned()
            .collect()
    }

    fn column(&self, name: &str) -> Result<&Series> {
        self.frame.column(name).map_err(|_| {
            FeatureStoreError::schema_mismatch("column not in batch", vec![name.to_string()])
        })
    }

    /// Number of nulls in a column
    pub fn null_count(&self, name: &str) -> Result<usize> {
        Ok(self.column(name)?.null_count())
    }

    /// Cell value at `(row, column)`
    pub fn value(&self, row: usize, column: &str) -> Result<Value> {
        let series = self.column(column)?;
        if row >= series.len() {
            return Err(FeatureStoreError::InvalidArgument(format!(
                "row {} out of bounds for batch of {} rows",
                row,
                series.len()
            )));
        }
        value_from_any(series.get(row)?)
    }

    /// Materialise every row as a record, in batch order
    pub fn records(&self) -> Result<Vec<Record>> {
        let names = self.column_names();
        (0..self.height())
            .map(|row| {
                let mut record = Record::new();
                for name in &names {
                    record.set(name, self.value(row, name)?);
                }
                Ok(record)
            })
            .collect()
    }

    pub fn f64_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self.column(name)?.cast(&DataType::Float64)?;
        let values = series.f64()?.into_iter().collect();
        Ok(values)
    }

    pub fn i64_values(&self, name: &str) -> Result<Vec<Option<i64>>> {
        let series = self.column(name)?.cast(&DataType::Int64)?;
        let values = series.i64()?.into_iter().collect();
        Ok(values)
    }

    pub fn str_values(&self, name: &str) -> Result<Vec<Option<String>>> {
        let series = self.column(name)?;
        if series.dtype() != &DataType::String {
            return Err(FeatureStoreError::schema_mismatch(
                format!("expected utf8 column, found {}", series.dtype()),
                vec![name.to_string()],
            ));
        }
        let values = series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();
        Ok(values)
    }

    pub fn date_values(&self, name: &str) -> Result<Vec<Option<NaiveDate>>> {
        let series = self.column(name)?;
        if series.dtype() != &DataType::Date {
            return Err(FeatureStoreError::schema_mismatch(
                format!("expected date column, found {}", series.dtype()),
                vec![name.to_string()],
            ));
        }
        let days = series.cast(&DataType::Int32)?;
        let values = days
            .i32()?
            .into_iter()
            .map(|d| d.map(date_from_days).transpose())
            .collect::<Result<Vec<_>>>()?;
        Ok(values)
    }
}

fn validate_record(schema: &BatchSchema, record: &Record, idx: usize) -> Result<()> {
    let unknown: Vec<String> = record
        .columns()
        .filter(|c| !schema.contains(c))
        .map(str::to_string)
        .collect();
    if !unknown.is_empty() {
        return Err(FeatureStoreError::schema_mismatch(
            format!("record {} has columns not declared in the schema", idx),
            unknown,
        ));
    }

    let missing: Vec<String> = schema
        .names()
        .into_iter()
        .filter(|c| record.get(c).is_none())
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(FeatureStoreError::schema_mismatch(
            format!("record {} is missing declared columns", idx),
            missing,
        ));
    }

    for (name, declared) in schema.fields() {
        if let Some(actual) = record.get(name).and_then(Value::column_type) {
            if actual != *declared {
                return Err(FeatureStoreError::schema_mismatch(
                    format!(
                        "record {} holds a {} value in a {} column",
                        idx, actual, declared
                    ),
                    vec![name.clone()],
                ));
            }
        }
    }

    Ok(())
}

fn build_series(name: &str, column_type: ColumnType, records: &[Record]) -> Result<Series> {
    let cells = records.iter().map(|r| r.get(name).unwrap_or(&Value::Null));

    let series = match column_type {
        ColumnType::Float64 => {
            let values: Vec<Option<f64>> = cells.map(Value::as_f64).collect();
            Series::new(name, values)
        }
        ColumnType::Int64 => {
            let values: Vec<Option<i64>> = cells.map(Value::as_i64).collect();
            Series::new(name, values)
        }
        ColumnType::Utf8 => {
            let values: Vec<Option<&str>> = cells.map(Value::as_str).collect();
            Series::new(name, values)
        }
        ColumnType::Date => {
            let values: Vec<Option<i32>> = cells
                .map(|v| v.as_date().map(days_from_date))
                .collect();
            Series::new(name, values).cast(&DataType::Date)?
        }
        ColumnType::Datetime => {
            let values: Vec<Option<i64>> = cells
                .map(|v| match v {
                    Value::Timestamp(ts) => Some(ts.and_utc().timestamp_micros()),
                    _ => None,
                })
                .collect();
            Series::new(name, values).cast(&column_type.dtype())?
        }
    };

    Ok(series)
}

fn unix_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Days since 1970-01-01, the physical representation of a polars `Date`
pub fn days_from_date(date: NaiveDate) -> i32 {
    (date - unix_epoch()).num_days() as i32
}

/// Inverse of [`days_from_date`]
pub fn date_from_days(days: i32) -> Result<NaiveDate> {
    unix_epoch()
        .checked_add_signed(Duration::days(days as i64))
        .ok_or_else(|| FeatureStoreError::DataError(format!("date out of range: {} days", days)))
}

fn datetime_from(value: i64, unit: TimeUnit) -> Result<NaiveDateTime> {
    let micros = match unit {
        TimeUnit::Nanoseconds => value.div_euclid(1_000),
        TimeUnit::Microseconds => value,
        TimeUnit::Milliseconds => value.saturating_mul(1_000),
    };
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| FeatureStoreError::DataError(format!("timestamp out of range: {}", value)))
}

fn value_from_any(value: AnyValue) -> Result<Value> {
    let out = match value {
        AnyValue::Null => Value::Null,
        AnyValue::Float64(v) => Value::Float(v),
        AnyValue::Float32(v) => Value::Float(v as f64),
        AnyValue::Int64(v) => Value::Int(v),
        AnyValue::Int32(v) => Value::Int(v as i64),
        AnyValue::UInt32(v) => Value::Int(v as i64),
        AnyValue::String(v) => Value::Str(v.to_string()),
        AnyValue::StringOwned(v) => Value::Str(v.to_string()),
        AnyValue::Date(days) => Value::Date(date_from_days(days)?),
        AnyValue::Datetime(v, unit, _) => Value::Timestamp(datetime_from(v, unit)?),
        other => {
            return Err(FeatureStoreError::DataError(format!(
                "unsupported cell value: {:?}",
                other
            )))
        }
    };
    Ok(out)
}
