//! Simulation study runner
//!
//! A study repeats one pipeline `trials` times:
//!
//! ```text
//! FactorSampler ──> Factors ──> DatasetSynthesizer ──> Dataset ──> Statistic ──> Vec<f64>
//!       ^                                ^                                          │
//!       └──────── TrialRng (seed, trial) ┘                                          v
//!                                                                  ResultsTable (one row per trial)
//! ```
//!
//! The three stages are traits, so any closure with the right shape plugs
//! in. Stock implementations live in [`crate::synth`].
//!
//! ## Usage
//!
//! ```rust
//! use trueno_study::study::{run_study, NoFactors};
//! use trueno_study::synth::{Correlation, UniformPairs};
//!
//! let table = run_study(100, &NoFactors, &UniformPairs::new(50), &Correlation::new())?;
//! assert_eq!(table.len(), 100);
//! # Ok::<(), trueno_study::Error>(())
//! ```

mod runner;
mod table;

pub use runner::{run_study, Study, StudyBuilder};
pub use table::{
    ResultRecord, ResultsTable, SkippedTrial, StudyMetadata, TableSchema, TRIAL_COLUMN,
};

use crate::factor::Factors;
use crate::rng::TrialRng;
use crate::Result;

/// Draws the factor values for one trial.
pub trait FactorSampler: Send + Sync {
    /// Draw one set of factor values from the trial's stream.
    ///
    /// # Errors
    ///
    /// Any error aborts the study regardless of failure policy.
    fn sample(&self, rng: &mut TrialRng) -> Result<Factors>;

    /// Check the sampler before the first trial runs.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] if the sampler cannot produce
    /// valid factors.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl<F> FactorSampler for F
where
    F: Fn(&mut TrialRng) -> Result<Factors> + Send + Sync,
{
    fn sample(&self, rng: &mut TrialRng) -> Result<Factors> {
        self(rng)
    }
}

/// Sampler for studies without input factors.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFactors;

impl FactorSampler for NoFactors {
    fn sample(&self, _rng: &mut TrialRng) -> Result<Factors> {
        Ok(Factors::new())
    }
}

/// Builds one trial's dataset from its factors.
pub trait DatasetSynthesizer: Send + Sync {
    /// Dataset handed to the statistic.
    type Dataset;

    /// Synthesize a dataset.
    ///
    /// # Errors
    ///
    /// A failure fails the trial (see [`crate::config::FailurePolicy`]).
    fn synthesize(&self, factors: &Factors, rng: &mut TrialRng) -> Result<Self::Dataset>;
}

impl<F, D> DatasetSynthesizer for F
where
    F: Fn(&Factors, &mut TrialRng) -> Result<D> + Send + Sync,
{
    type Dataset = D;

    fn synthesize(&self, factors: &Factors, rng: &mut TrialRng) -> Result<D> {
        self(factors, rng)
    }
}

/// Estimator under study.
///
/// Declares its output columns once; every call to
/// [`compute`](Statistic::compute) must return exactly that many values.
pub trait Statistic<D>: Send + Sync {
    /// Output column names.
    fn columns(&self) -> &[String];

    /// Compute the outputs for one dataset.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DegenerateData`] (or any other error) when the
    /// statistic is undefined for the dataset.
    fn compute(&self, dataset: &D) -> Result<Vec<f64>>;
}

/// A closure plus the names of the columns it produces.
pub struct StatisticFn<F> {
    columns: Vec<String>,
    f: F,
}

impl<F> StatisticFn<F> {
    /// Wrap a closure returning one value per column.
    pub fn new<I, S>(columns: I, f: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            f,
        }
    }
}

impl<F> std::fmt::Debug for StatisticFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticFn")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl<D, F> Statistic<D> for StatisticFn<F>
where
    F: Fn(&D) -> Result<Vec<f64>> + Send + Sync,
{
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn compute(&self, dataset: &D) -> Result<Vec<f64>> {
        (self.f)(dataset)
    }
}

/// Single-column statistic from a closure returning one value.
pub fn scalar_statistic<D, G>(
    column: impl Into<String>,
    g: G,
) -> StatisticFn<impl Fn(&D) -> Result<Vec<f64>> + Send + Sync>
where
    G: Fn(&D) -> Result<f64> + Send + Sync,
{
    StatisticFn::new([column.into()], move |dataset: &D| {
        g(dataset).map(|value| vec![value])
    })
}
