//! Study configuration
//!
//! Configuration is plain data with compiled defaults. It can be built in
//! code (via [`crate::study::Study::builder`]) or loaded from TOML:
//!
//! ```toml
//! [study]
//! trials = 1000
//! seed = 7
//! on_failure = "skip"
//! execution = "parallel"
//!
//! [factors.n]
//! dist = "int_uniform"
//! low = 10
//! high = 200
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::factor::FactorSpec;
use crate::rng::{SeedStream, DEFAULT_SEED};
use crate::study::FactorSampler;
use crate::{Error, Result};

/// Trial count used when none is configured.
pub const DEFAULT_TRIALS: usize = 100;

/// What the runner does when a trial's synthesizer or statistic fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the study and return the failure (Jidoka)
    #[default]
    Abort,
    /// Log the failure, list the trial as skipped, keep going
    Skip,
}

/// How trials are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Execution {
    /// One trial after another on the calling thread
    #[default]
    Sequential,
    /// Trials spread over the rayon thread pool (requires the `rayon` feature)
    Parallel,
}

/// Parameters of one study run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    /// Number of trials to run (must be positive)
    pub trials: usize,
    /// Root seed for the per-trial random streams
    pub seed: u64,
    /// Failure handling for synthesizer/statistic errors
    pub on_failure: FailurePolicy,
    /// Scheduling mode
    pub execution: Execution,
    /// Optional wall-clock budget in milliseconds; unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit_ms: Option<u64>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            seed: DEFAULT_SEED,
            on_failure: FailurePolicy::Abort,
            execution: Execution::Sequential,
            time_limit_ms: None,
        }
    }
}

impl StudyConfig {
    /// Parse a bare study config from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] on malformed TOML and
    /// [`Error::InvalidConfig`] if validation fails.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration before a study starts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `trials` is zero, the time limit is
    /// zero, or parallel execution is requested without the `rayon` feature.
    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(Error::InvalidConfig(
                "trials must be greater than 0".to_string(),
            ));
        }
        if self.time_limit_ms == Some(0) {
            return Err(Error::InvalidConfig(
                "time_limit_ms must be greater than 0 when set".to_string(),
            ));
        }
        if self.execution == Execution::Parallel && !cfg!(feature = "rayon") {
            return Err(Error::InvalidConfig(
                "parallel execution requires the `rayon` feature".to_string(),
            ));
        }
        Ok(())
    }

    /// Random source for this study.
    #[must_use]
    pub const fn seed_stream(&self) -> SeedStream {
        SeedStream::new(self.seed)
    }

    /// Time limit as a [`Duration`].
    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }
}

/// A study config plus its factor spec, as stored in one TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyFile {
    /// Run parameters (`[study]` table)
    pub study: StudyConfig,
    /// Factor rules (`[factors.<name>]` tables)
    pub factors: FactorSpec,
}

impl StudyFile {
    /// Parse a study file from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] on malformed TOML and
    /// [`Error::InvalidConfig`] if the config or any factor rule is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let file: Self = toml::from_str(toml_str)?;
        file.study.validate()?;
        file.factors.validate()?;
        Ok(file)
    }

    /// Load a study file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise as
    /// [`StudyFile::from_toml`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&text)
    }
}
