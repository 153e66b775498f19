//! Error types for trueno-study
//!
//! Toyota Way: Jidoka (stop the line). A failed trial halts the study and
//! carries enough context (trial index, factor values) to reproduce it.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// trueno-study error types
#[derive(Error, Debug)]
pub enum Error {
    /// Study configuration is invalid; the study never starts
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A factor value is missing, of the wrong kind, or out of its domain
    #[error("Invalid factor '{name}': {reason}")]
    InvalidFactor {
        /// Factor name
        name: String,
        /// What was wrong with the value
        reason: String,
    },

    /// Statistic is mathematically undefined for the dataset
    #[error("Degenerate data: {0}")]
    DegenerateData(String),

    /// Statistic produced NaN or an infinity
    #[error("Statistic column '{column}' produced non-finite value {value}")]
    NonFiniteResult {
        /// Output column that carried the value
        column: String,
        /// The offending value
        value: f64,
    },

    /// A trial produced records that do not fit the table schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A trial failed while synthesizing its dataset or computing its statistic
    #[error("Trial {trial} failed (factors: {factors}): {source}")]
    TrialFailed {
        /// Zero-based trial index
        trial: u64,
        /// Rendered factor values used by the trial
        factors: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Study time limit elapsed before all trials were started
    #[error("Study deadline exceeded after {completed} of {requested} trials")]
    DeadlineExceeded {
        /// Trials recorded before the deadline
        completed: usize,
        /// Trials requested
        requested: usize,
    },

    /// Invalid argument to a table or analysis helper
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Config file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(String),

    /// Storage error (Parquet/Arrow)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidFactor`].
    pub fn invalid_factor(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFactor {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Unwrap [`Error::TrialFailed`] to the failure that caused it.
    ///
    /// Returns `self` for every other variant.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::TrialFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether this error is a configuration problem that aborts a study
    /// regardless of the failure policy.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::InvalidFactor { .. }
                | Self::SchemaMismatch(_)
                | Self::ConfigParse(_)
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for Error {
    fn from(err: parquet::errors::ParquetError) -> Self {
        Self::StorageError(err.to_string())
    }
}
