//! Storage hand-off (Arrow/Parquet)
//!
//! The runner never touches disk. Callers convert a finished
//! [`ResultsTable`] to an Arrow [`RecordBatch`] and persist it explicitly.
//!
//! **Append-only**: a [`StudyArchive`] collects batches from several studies
//! with the same column layout. There is no row update; re-run the study
//! and append a new batch instead.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use tracing::debug;

use crate::factor::{FactorKind, FactorValue};
use crate::study::{ResultsTable, TRIAL_COLUMN};
use crate::{Error, Result};

/// Schema metadata key holding the study seed.
pub const SEED_METADATA_KEY: &str = "trueno_study.seed";

/// Schema metadata key holding the requested trial count.
pub const TRIALS_METADATA_KEY: &str = "trueno_study.trials_requested";

impl ResultsTable {
    /// Convert the table to a single Arrow batch.
    ///
    /// Columns: `trial` (`UInt64`), then factors in name order (`Int64`,
    /// `Float64` or `Utf8`), then statistic columns (`Float64`). The seed and
    /// requested trial count are stored as schema metadata.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Arrow`] if the batch cannot be assembled.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = self.schema();
        let records = self.records();

        let mut fields = vec![Field::new(TRIAL_COLUMN, DataType::UInt64, false)];
        let mut columns: Vec<ArrayRef> = vec![Arc::new(UInt64Array::from_iter_values(
            records.iter().map(crate::study::ResultRecord::trial),
        ))];

        for (name, kind) in schema.factors() {
            let values = records.iter().map(|r| r.factors().get(name));
            let (data_type, array): (DataType, ArrayRef) = match kind {
                FactorKind::Int => (
                    DataType::Int64,
                    Arc::new(Int64Array::from_iter(values.map(|v| match v {
                        Some(FactorValue::Int(i)) => Some(*i),
                        _ => None,
                    }))),
                ),
                FactorKind::Float => (
                    DataType::Float64,
                    Arc::new(Float64Array::from_iter(values.map(|v| match v {
                        Some(FactorValue::Float(f)) => Some(*f),
                        _ => None,
                    }))),
                ),
                FactorKind::Category => (
                    DataType::Utf8,
                    Arc::new(StringArray::from_iter(values.map(|v| match v {
                        Some(FactorValue::Category(s)) => Some(s.as_str()),
                        _ => None,
                    }))),
                ),
            };
            fields.push(Field::new(name, data_type, false));
            columns.push(array);
        }

        for (idx, name) in schema.statistics().iter().enumerate() {
            fields.push(Field::new(name, DataType::Float64, false));
            columns.push(Arc::new(Float64Array::from_iter_values(
                records.iter().map(|r| r.values()[idx]),
            )));
        }

        let metadata = self.metadata();
        let schema = Schema::new(fields).with_metadata(HashMap::from([
            (SEED_METADATA_KEY.to_string(), metadata.seed.to_string()),
            (
                TRIALS_METADATA_KEY.to_string(),
                metadata.trials_requested.to_string(),
            ),
        ]));

        Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
    }

    /// Write the table to a Parquet file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageError`] if the file cannot be created or
    /// written.
    pub fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_parquet(path, &[self.to_record_batch()?])
    }
}

/// Write batches sharing one schema to a Parquet file.
///
/// # Errors
///
/// Returns [`Error::StorageError`] if `batches` is empty or the file cannot
/// be created or written.
pub fn write_parquet<P: AsRef<Path>>(path: P, batches: &[RecordBatch]) -> Result<()> {
    let first = batches
        .first()
        .ok_or_else(|| Error::StorageError("No record batches to write".to_string()))?;

    let file = File::create(path.as_ref())
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet file: {e}")))?;
    let mut writer = ArrowWriter::try_new(file, first.schema(), None)
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet writer: {e}")))?;

    for batch in batches {
        writer.write(batch).map_err(|e| {
            Error::StorageError(format!("Failed to write record batch: {e}"))
        })?;
    }
    writer
        .close()
        .map_err(|e| Error::StorageError(format!("Failed to finalize Parquet file: {e}")))?;

    debug!(path = %path.as_ref().display(), batches = batches.len(), "wrote parquet");
    Ok(())
}

/// Load every record batch from a Parquet file.
///
/// # Errors
///
/// Returns [`Error::StorageError`] if the file cannot be read or parsed.
pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Vec<RecordBatch>> {
    let file = File::open(path.as_ref())
        .map_err(|e| Error::StorageError(format!("Failed to open Parquet file: {e}")))?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::StorageError(format!("Failed to parse Parquet file: {e}")))?;

    let reader = builder
        .build()
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet reader: {e}")))?;

    reader
        .map(|batch| {
            batch.map_err(|e| Error::StorageError(format!("Failed to read record batch: {e}")))
        })
        .collect()
}

/// Append-only collection of result batches with one column layout.
#[derive(Debug, Default)]
pub struct StudyArchive {
    batches: Vec<RecordBatch>,
}

impl StudyArchive {
    /// Create an archive from existing batches.
    #[must_use]
    pub const fn new(batches: Vec<RecordBatch>) -> Self {
        Self { batches }
    }

    /// Load an archive from a Parquet file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageError`] if the file cannot be read.
    pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(load_parquet(path)?))
    }

    /// Stored batches, in append order.
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total rows across all batches.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Append a finished study.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageError`] if the table's columns differ from
    /// the archive's.
    pub fn append_table(&mut self, table: &ResultsTable) -> Result<()> {
        self.append_batch(table.to_record_batch()?)
    }

    /// Append a batch.
    ///
    /// Columns must match the first batch; schema metadata (seed, trial
    /// count) may differ between studies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageError`] on a column mismatch.
    pub fn append_batch(&mut self, batch: RecordBatch) -> Result<()> {
        if let Some(first) = self.batches.first() {
            let existing = first.schema();
            if batch.schema().fields() != existing.fields() {
                return Err(Error::StorageError(format!(
                    "Schema mismatch: expected {:?}, got {:?}",
                    existing.fields(),
                    batch.schema().fields()
                )));
            }
        }

        self.batches.push(batch);
        Ok(())
    }

    /// Write every batch to one Parquet file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageError`] if the archive is empty or the file
    /// cannot be written.
    pub fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_parquet(path, &self.batches)
    }
}
