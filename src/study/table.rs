//! Results table - one record per completed trial

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Execution, FailurePolicy};
use crate::factor::{FactorKind, Factors};
use crate::stats::{fit_line, ColumnSummary, LineFit};
use crate::{Error, Result};

/// Name of the trial-index column.
pub const TRIAL_COLUMN: &str = "trial";

/// Upper bound on rows reserved before any trial has run.
const PREALLOCATED_ROWS: usize = 4096;

/// Output of one trial: factor values in, statistic values out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    trial: u64,
    factors: Factors,
    values: Vec<f64>,
}

impl ResultRecord {
    /// Create a record.
    #[must_use]
    pub const fn new(trial: u64, factors: Factors, values: Vec<f64>) -> Self {
        Self {
            trial,
            factors,
            values,
        }
    }

    /// Zero-based trial index.
    #[must_use]
    pub const fn trial(&self) -> u64 {
        self.trial
    }

    /// Factor values drawn for the trial.
    #[must_use]
    pub const fn factors(&self) -> &Factors {
        &self.factors
    }

    /// Statistic outputs, in [`TableSchema::statistics`] order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// A trial dropped under [`FailurePolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTrial {
    /// Zero-based trial index
    pub trial: u64,
    /// Factor values the trial ran with
    pub factors: Factors,
    /// Rendered failure
    pub reason: String,
}

/// Column layout shared by every row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    factors: Vec<(String, FactorKind)>,
    statistics: Vec<String>,
}

impl TableSchema {
    /// Factor columns in name order.
    #[must_use]
    pub fn factors(&self) -> &[(String, FactorKind)] {
        &self.factors
    }

    /// Statistic output columns in declaration order.
    #[must_use]
    pub fn statistics(&self) -> &[String] {
        &self.statistics
    }

    /// All column names: `trial`, factors, statistics.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        std::iter::once(TRIAL_COLUMN.to_string())
            .chain(self.factors.iter().map(|(name, _)| name.clone()))
            .chain(self.statistics.iter().cloned())
            .collect()
    }

    /// Kind of a factor column.
    #[must_use]
    pub fn factor_kind(&self, name: &str) -> Option<FactorKind> {
        self.factors
            .iter()
            .find(|(factor, _)| factor == name)
            .map(|(_, kind)| *kind)
    }

    /// Position of a statistic column.
    #[must_use]
    pub fn statistic_index(&self, name: &str) -> Option<usize> {
        self.statistics.iter().position(|s| s == name)
    }
}

/// How and when the table was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyMetadata {
    /// Root seed of the per-trial streams
    pub seed: u64,
    /// Trials requested
    pub trials_requested: usize,
    /// Failure policy in effect
    pub on_failure: FailurePolicy,
    /// Scheduling mode used
    pub execution: Execution,
    /// When the first trial started
    pub started_at: DateTime<Utc>,
    /// When the last record was appended
    pub finished_at: DateTime<Utc>,
}

/// Accumulated records of a study, in trial order.
///
/// Owned by the runner while trials run, handed to the caller by value
/// afterwards. Never mutated once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    schema: TableSchema,
    records: Vec<ResultRecord>,
    skipped: Vec<SkippedTrial>,
    metadata: StudyMetadata,
}

impl ResultsTable {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no trial was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Column layout.
    #[must_use]
    pub const fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Rows in trial order.
    #[must_use]
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// Trials dropped under the skip policy.
    #[must_use]
    pub fn skipped(&self) -> &[SkippedTrial] {
        &self.skipped
    }

    /// Study metadata.
    #[must_use]
    pub const fn metadata(&self) -> &StudyMetadata {
        &self.metadata
    }

    /// Numeric column by name.
    ///
    /// Works for `trial`, statistic columns, and integer/float factors.
    /// Returns `None` for unknown or categorical columns.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        if name == TRIAL_COLUMN {
            return Some(self.records.iter().map(|r| r.trial as f64).collect());
        }
        if let Some(idx) = self.schema.statistic_index(name) {
            return Some(self.records.iter().map(|r| r.values[idx]).collect());
        }
        match self.schema.factor_kind(name)? {
            FactorKind::Category => None,
            FactorKind::Int | FactorKind::Float => self
                .records
                .iter()
                .map(|r| r.factors.get(name).and_then(crate::factor::FactorValue::as_f64))
                .collect(),
        }
    }

    /// Categorical factor column by name.
    #[must_use]
    pub fn categories(&self, name: &str) -> Option<Vec<&str>> {
        if self.schema.factor_kind(name)? != FactorKind::Category {
            return None;
        }
        self.records
            .iter()
            .map(|r| r.factors.require_category(name).ok())
            .collect()
    }

    /// Descriptive summary of a numeric column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown or categorical columns and
    /// [`Error::DegenerateData`] when the table is empty.
    pub fn summarize(&self, name: &str) -> Result<ColumnSummary> {
        let values = self.numeric_column(name)?;
        ColumnSummary::from_values(&values)
    }

    /// Least-squares line through two numeric columns (meta-analysis of
    /// how a factor drives the statistic).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown or categorical columns and
    /// [`Error::DegenerateData`] if the fit is undefined.
    pub fn fit_columns(&self, x: &str, y: &str) -> Result<LineFit> {
        let xs = self.numeric_column(x)?;
        let ys = self.numeric_column(y)?;
        fit_line(&xs, &ys)
    }

    /// Serialize the whole table (schema, rows, skipped trials, metadata).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        self.column(name).ok_or_else(|| {
            Error::InvalidInput(format!("'{name}' is not a numeric column of this table"))
        })
    }
}

/// Grows a [`ResultsTable`] one record at a time, enforcing a fixed schema.
#[derive(Debug)]
pub(crate) struct TableBuilder {
    statistics: Vec<String>,
    factors: Option<Vec<(String, FactorKind)>>,
    records: Vec<ResultRecord>,
    skipped: Vec<SkippedTrial>,
}

impl TableBuilder {
    /// Start an empty table for a statistic with the given columns.
    pub(crate) fn new(statistics: &[String], capacity: usize) -> Result<Self> {
        if statistics.is_empty() {
            return Err(Error::InvalidConfig(
                "statistic must declare at least one output column".to_string(),
            ));
        }
        for (i, name) in statistics.iter().enumerate() {
            if name.is_empty() {
                return Err(Error::InvalidConfig(
                    "statistic column names must not be empty".to_string(),
                ));
            }
            if name == TRIAL_COLUMN {
                return Err(Error::InvalidConfig(format!(
                    "statistic column '{TRIAL_COLUMN}' is reserved"
                )));
            }
            if statistics[..i].contains(name) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate statistic column '{name}'"
                )));
            }
        }
        Ok(Self {
            statistics: statistics.to_vec(),
            factors: None,
            records: Vec::with_capacity(capacity.min(PREALLOCATED_ROWS)),
            skipped: Vec::new(),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Append a record. The first record fixes the factor columns.
    pub(crate) fn push(&mut self, record: ResultRecord) -> Result<()> {
        if record.values.len() != self.statistics.len() {
            return Err(Error::SchemaMismatch(format!(
                "trial {} produced {} values for {} statistic columns",
                record.trial,
                record.values.len(),
                self.statistics.len()
            )));
        }

        let kinds = record.factors.kinds();
        match &self.factors {
            Some(expected) if *expected != kinds => {
                return Err(Error::SchemaMismatch(format!(
                    "trial {} drew factors {:?}, expected {:?}",
                    record.trial, kinds, expected
                )));
            }
            Some(_) => {}
            None => {
                for (name, _) in &kinds {
                    if name == TRIAL_COLUMN || self.statistics.contains(name) {
                        return Err(Error::InvalidConfig(format!(
                            "factor '{name}' collides with a statistic or reserved column"
                        )));
                    }
                }
                self.factors = Some(kinds);
            }
        }

        self.records.push(record);
        Ok(())
    }

    pub(crate) fn skip(&mut self, skipped: SkippedTrial) {
        self.skipped.push(skipped);
    }

    pub(crate) fn finish(self, metadata: StudyMetadata) -> ResultsTable {
        ResultsTable {
            schema: TableSchema {
                factors: self.factors.unwrap_or_default(),
                statistics: self.statistics,
            },
            records: self.records,
            skipped: self.skipped,
            metadata,
        }
    }
}
