//! Study runner - the sample, synthesize, measure, append loop

use std::ops::Range;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, info_span, warn};

use super::table::{ResultRecord, ResultsTable, SkippedTrial, StudyMetadata, TableBuilder};
use super::{DatasetSynthesizer, FactorSampler, Statistic};
use crate::config::{Execution, FailurePolicy, StudyConfig};
use crate::factor::Factors;
use crate::rng::SeedStream;
use crate::{Error, Result};

/// Trials handed to the rayon pool at a time.
const PARALLEL_BATCH: usize = 4096;

/// A configured simulation study.
///
/// ## Example
///
/// ```rust
/// use trueno_study::config::FailurePolicy;
/// use trueno_study::study::{NoFactors, Study};
/// use trueno_study::synth::{Correlation, UniformPairs};
///
/// let study = Study::builder()
///     .trials(200)
///     .seed(7)
///     .on_failure(FailurePolicy::Abort)
///     .build()?;
///
/// let table = study.run(&NoFactors, &UniformPairs::new(50), &Correlation::new())?;
/// assert_eq!(table.len(), 200);
/// # Ok::<(), trueno_study::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Study {
    config: StudyConfig,
}

impl Study {
    /// Create a study builder with default configuration.
    #[must_use]
    pub fn builder() -> StudyBuilder {
        StudyBuilder::default()
    }

    /// Create a study from an existing configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: StudyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The study configuration.
    #[must_use]
    pub const fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// Run every trial and return the completed table.
    ///
    /// Trial `i` draws only from stream `i` of the configured seed, so the
    /// table is identical for sequential and parallel execution.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] / [`Error::InvalidFactor`] /
    ///   [`Error::SchemaMismatch`]: bad sampler, factors, or statistic shape;
    ///   always aborts
    /// - [`Error::TrialFailed`]: a synthesizer or statistic failed under
    ///   [`FailurePolicy::Abort`]
    /// - [`Error::DeadlineExceeded`]: the time limit elapsed
    #[allow(clippy::cast_possible_truncation)]
    pub fn run<P, S, T>(&self, sampler: &P, synthesizer: &S, statistic: &T) -> Result<ResultsTable>
    where
        P: FactorSampler,
        S: DatasetSynthesizer,
        T: Statistic<S::Dataset>,
    {
        let config = &self.config;
        let span = info_span!(
            "study",
            trials = config.trials,
            seed = config.seed,
            policy = ?config.on_failure,
            execution = ?config.execution
        );
        let _guard = span.enter();

        config.validate()?;
        sampler.validate()?;
        let mut table = TableBuilder::new(statistic.columns(), config.trials)?;

        let started_at = Utc::now();
        let clock = Instant::now();
        let pipeline = Pipeline {
            stream: config.seed_stream(),
            sampler,
            synthesizer,
            statistic,
            deadline: config.time_limit().map(|limit| clock + limit),
        };

        match config.execution {
            Execution::Sequential => {
                for trial in 0..config.trials as u64 {
                    let outcome = pipeline.run_trial(trial);
                    self.absorb(&mut table, trial, outcome)?;
                }
            }
            Execution::Parallel => {
                let abort = config.on_failure == FailurePolicy::Abort;
                let mut start = 0;
                while start < config.trials {
                    let end = start.saturating_add(PARALLEL_BATCH).min(config.trials);
                    let outcomes = pipeline.run_parallel(start..end, abort);
                    for (trial, outcome) in (start as u64..).zip(outcomes) {
                        self.absorb(&mut table, trial, outcome)?;
                    }
                    start = end;
                }
            }
        }

        let table = table.finish(StudyMetadata {
            seed: config.seed,
            trials_requested: config.trials,
            on_failure: config.on_failure,
            execution: config.execution,
            started_at,
            finished_at: Utc::now(),
        });

        info!(
            rows = table.len(),
            skipped = table.skipped().len(),
            elapsed_ms = clock.elapsed().as_millis() as u64,
            "study complete"
        );
        Ok(table)
    }

    /// Fold one trial outcome into the table, applying the failure policy.
    fn absorb(
        &self,
        table: &mut TableBuilder,
        trial: u64,
        outcome: std::result::Result<ResultRecord, TrialError>,
    ) -> Result<()> {
        match outcome {
            Ok(record) => {
                debug!(trial, factors = %record.factors(), "trial recorded");
                table.push(record)
            }
            Err(TrialError::Fatal(error)) => Err(error),
            Err(TrialError::Failed { factors, error }) => match self.config.on_failure {
                FailurePolicy::Abort => Err(Error::TrialFailed {
                    trial,
                    factors: factors.to_string(),
                    source: Box::new(error),
                }),
                FailurePolicy::Skip => {
                    warn!(trial, factors = %factors, error = %error, "skipping failed trial");
                    table.skip(SkippedTrial {
                        trial,
                        factors,
                        reason: error.to_string(),
                    });
                    Ok(())
                }
            },
            Err(TrialError::Deadline) => Err(Error::DeadlineExceeded {
                completed: table.len(),
                requested: self.config.trials,
            }),
            Err(TrialError::Cancelled) => Err(Error::Other(format!(
                "trial {trial} was cancelled without an earlier failure"
            ))),
        }
    }
}

/// Builder for [`Study`].
#[derive(Debug, Default)]
pub struct StudyBuilder {
    config: StudyConfig,
}

impl StudyBuilder {
    /// Number of trials (must be positive).
    #[must_use]
    pub const fn trials(mut self, trials: usize) -> Self {
        self.config.trials = trials;
        self
    }

    /// Root seed for the per-trial streams.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Inject a seed stream.
    #[must_use]
    pub const fn seed_stream(mut self, stream: SeedStream) -> Self {
        self.config.seed = stream.seed();
        self
    }

    /// Failure policy for synthesizer/statistic errors.
    #[must_use]
    pub const fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.config.on_failure = policy;
        self
    }

    /// Scheduling mode.
    #[must_use]
    pub const fn execution(mut self, execution: Execution) -> Self {
        self.config.execution = execution;
        self
    }

    /// Wall-clock budget (millisecond resolution, rounded up).
    #[must_use]
    pub fn time_limit(mut self, limit: Duration) -> Self {
        let millis = limit.as_millis();
        let millis = if millis == 0 && !limit.is_zero() { 1 } else { millis };
        self.config.time_limit_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    /// Build the study.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is invalid.
    pub fn build(self) -> Result<Study> {
        Study::new(self.config)
    }
}

/// Run a study with the default configuration.
///
/// Sequential, abort-on-first-failure, seeded with
/// [`crate::rng::DEFAULT_SEED`].
///
/// # Errors
///
/// See [`Study::run`]; `trial_count == 0` is an [`Error::InvalidConfig`].
pub fn run_study<P, S, T>(
    trial_count: usize,
    factor_sampler: &P,
    dataset_synthesizer: &S,
    statistic: &T,
) -> Result<ResultsTable>
where
    P: FactorSampler,
    S: DatasetSynthesizer,
    T: Statistic<S::Dataset>,
{
    Study::builder()
        .trials(trial_count)
        .build()?
        .run(factor_sampler, dataset_synthesizer, statistic)
}

/// Why a trial produced no record.
#[derive(Debug)]
enum TrialError {
    /// Configuration or schema problem; aborts under every policy
    Fatal(Error),
    /// Synthesizer or statistic failure; subject to the failure policy
    Failed { factors: Factors, error: Error },
    /// Time limit reached before the trial started
    Deadline,
    /// Not run because a lower-index trial already stopped the study
    Cancelled,
}

impl TrialError {
    const fn stops_study(&self, abort_on_failure: bool) -> bool {
        match self {
            Self::Fatal(_) | Self::Deadline => true,
            Self::Failed { .. } => abort_on_failure,
            Self::Cancelled => false,
        }
    }
}

/// Borrowed view of everything one trial needs.
struct Pipeline<'a, P, S, T> {
    stream: SeedStream,
    sampler: &'a P,
    synthesizer: &'a S,
    statistic: &'a T,
    deadline: Option<Instant>,
}

impl<P, S, T> Pipeline<'_, P, S, T>
where
    P: FactorSampler,
    S: DatasetSynthesizer,
    T: Statistic<S::Dataset>,
{
    fn run_trial(&self, trial: u64) -> std::result::Result<ResultRecord, TrialError> {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(TrialError::Deadline);
        }

        let mut rng = self.stream.trial_rng(trial);
        let factors = self.sampler.sample(&mut rng).map_err(TrialError::Fatal)?;
        factors.check_finite().map_err(TrialError::Fatal)?;

        let values = match self
            .synthesizer
            .synthesize(&factors, &mut rng)
            .and_then(|dataset| self.statistic.compute(&dataset))
        {
            Ok(values) => values,
            Err(error) if error.is_configuration() => return Err(TrialError::Fatal(error)),
            Err(error) => return Err(TrialError::Failed { factors, error }),
        };

        let columns = self.statistic.columns();
        if values.len() != columns.len() {
            return Err(TrialError::Fatal(Error::SchemaMismatch(format!(
                "trial {trial}: statistic returned {} values for columns {columns:?}",
                values.len()
            ))));
        }
        if let Some((column, &value)) = columns.iter().zip(&values).find(|(_, v)| !v.is_finite()) {
            return Err(TrialError::Failed {
                factors,
                error: Error::NonFiniteResult {
                    column: column.clone(),
                    value,
                },
            });
        }

        Ok(ResultRecord::new(trial, factors, values))
    }

    /// Run a batch of trials on the rayon pool; outcomes come back in trial order.
    ///
    /// Once a trial stops the study, trials with a higher index are not
    /// started. Lower-index trials still run, so the failure reported is the
    /// same one a sequential run reports.
    #[cfg(feature = "rayon")]
    #[allow(clippy::cast_possible_truncation)]
    fn run_parallel(
        &self,
        trials: Range<usize>,
        abort_on_failure: bool,
    ) -> Vec<std::result::Result<ResultRecord, TrialError>> {
        use rayon::prelude::*;
        use std::sync::atomic::{AtomicU64, Ordering};

        let first_stop = AtomicU64::new(u64::MAX);
        trials
            .into_par_iter()
            .map(|trial| {
                let trial = trial as u64;
                if trial > first_stop.load(Ordering::Relaxed) {
                    return Err(TrialError::Cancelled);
                }
                let outcome = self.run_trial(trial);
                if let Err(err) = &outcome {
                    if err.stops_study(abort_on_failure) {
                        first_stop.fetch_min(trial, Ordering::Relaxed);
                    }
                }
                outcome
            })
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    #[allow(clippy::cast_possible_truncation)]
    fn run_parallel(
        &self,
        trials: Range<usize>,
        _abort_on_failure: bool,
    ) -> Vec<std::result::Result<ResultRecord, TrialError>> {
        trials.map(|trial| self.run_trial(trial as u64)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::TrialRng;
    use crate::study::{NoFactors, StatisticFn};
    use rand::Rng;

    fn draw(_factors: &Factors, rng: &mut TrialRng) -> Result<f64> {
        Ok(rng.gen_range(0.0..1.0))
    }

    fn identity() -> StatisticFn<impl Fn(&f64) -> Result<Vec<f64>> + Send + Sync> {
        StatisticFn::new(["x"], |x: &f64| -> Result<Vec<f64>> { Ok(vec![*x]) })
    }

    #[test]
    fn test_row_count_matches_trials() {
        let table = run_study(17, &NoFactors, &draw, &identity()).unwrap();
        assert_eq!(table.len(), 17);
        let trials: Vec<u64> = table.records().iter().map(ResultRecord::trial).collect();
        assert_eq!(trials, (0..17).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_trials_is_config_error() {
        let err = run_study(0, &NoFactors, &draw, &identity()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_sampler_error_aborts_even_when_skipping() {
        let sampler = |_rng: &mut TrialRng| -> Result<Factors> {
            Err(Error::invalid_factor("rho", "outside [-1, 1]"))
        };
        let study = Study::builder()
            .trials(5)
            .on_failure(FailurePolicy::Skip)
            .build()
            .unwrap();
        let err = study.run(&sampler, &draw, &identity()).unwrap_err();
        assert!(matches!(err, Error::InvalidFactor { .. }));
    }

    #[test]
    fn test_synthesizer_config_error_aborts_even_when_skipping() {
        let synth = |_factors: &Factors, _rng: &mut TrialRng| -> Result<f64> {
            Err(Error::invalid_factor("rho", "outside [-1, 1]"))
        };
        let study = Study::builder()
            .trials(5)
            .on_failure(FailurePolicy::Skip)
            .build()
            .unwrap();
        let err = study.run(&NoFactors, &synth, &identity()).unwrap_err();
        assert!(matches!(err, Error::InvalidFactor { .. }));
    }

    #[test]
    fn test_parallel_rows_span_batches() {
        let trials = PARALLEL_BATCH + 3;
        let table = Study::builder()
            .trials(trials)
            .execution(Execution::Parallel)
            .build()
            .unwrap()
            .run(&NoFactors, &draw, &identity())
            .unwrap();
        let ids: Vec<u64> = table.records().iter().map(ResultRecord::trial).collect();
        assert_eq!(ids, (0..trials as u64).collect::<Vec<_>>());
    }

    #[test]
    fn test_non_finite_factor_aborts() {
        let sampler =
            |_rng: &mut TrialRng| -> Result<Factors> { Ok(Factors::new().with("x", f64::NAN)) };
        let err = run_study(3, &sampler, &draw, &identity()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_wrong_output_width_aborts() {
        let stat = StatisticFn::new(["a", "b"], |x: &f64| -> Result<Vec<f64>> { Ok(vec![*x]) });
        let study = Study::builder()
            .trials(3)
            .on_failure(FailurePolicy::Skip)
            .build()
            .unwrap();
        let err = study.run(&NoFactors, &draw, &stat).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }

    #[test]
    fn test_nan_statistic_is_a_trial_failure() {
        let stat = StatisticFn::new(["x"], |_: &f64| -> Result<Vec<f64>> { Ok(vec![f64::NAN]) });
        let err = run_study(3, &NoFactors, &draw, &stat).unwrap_err();
        match err {
            Error::TrialFailed { trial, source, .. } => {
                assert_eq!(trial, 0);
                assert!(matches!(*source, Error::NonFiniteResult { .. }));
            }
            other => panic!("expected TrialFailed, got {other}"),
        }
    }

    #[test]
    fn test_time_limit_builder_rounds_up() {
        let study = Study::builder()
            .time_limit(Duration::from_micros(10))
            .build()
            .unwrap();
        assert_eq!(study.config().time_limit_ms, Some(1));
    }

    #[test]
    fn test_seed_stream_injection() {
        let study = Study::builder()
            .seed_stream(SeedStream::new(99))
            .build()
            .unwrap();
        assert_eq!(study.config().seed, 99);
    }
}
