//! Stock datasets, synthesizers and statistics
//!
//! Ready-made pipeline stages for the most common study: how does an
//! estimator over paired samples behave as sample size and true
//! correlation vary?

use rand::distributions::Distribution;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Normal, Uniform};

use crate::factor::Factors;
use crate::rng::TrialRng;
use crate::stats::{fit_line, pearson};
use crate::study::{DatasetSynthesizer, Statistic};
use crate::{Error, Result};

/// Equal-length paired numeric samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairedSample {
    /// First variable
    pub x: Vec<f64>,
    /// Second variable
    pub y: Vec<f64>,
}

impl PairedSample {
    /// Pair two samples.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the lengths differ.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::InvalidInput(format!(
                "paired samples differ in length: {} vs {}",
                x.len(),
                y.len()
            )));
        }
        Ok(Self { x, y })
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// True when there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Upper bound on up-front allocation for a factor-sized dataset.
const PREALLOCATED_PAIRS: usize = 4096;

/// `n` independent pairs, each coordinate uniform on `[low, high]`.
///
/// Ignores factors; the true correlation is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformPairs {
    /// Pairs per dataset
    pub n: usize,
    /// Lower bound
    pub low: f64,
    /// Upper bound
    pub high: f64,
}

impl UniformPairs {
    /// `n` pairs on the unit square.
    #[must_use]
    pub const fn new(n: usize) -> Self {
        Self {
            n,
            low: 0.0,
            high: 1.0,
        }
    }

    /// Change the coordinate range.
    #[must_use]
    pub const fn with_range(mut self, low: f64, high: f64) -> Self {
        self.low = low;
        self.high = high;
        self
    }
}

impl DatasetSynthesizer for UniformPairs {
    type Dataset = PairedSample;

    fn synthesize(&self, _factors: &Factors, rng: &mut TrialRng) -> Result<PairedSample> {
        let (low, high) = (self.low, self.high);
        if !(low < high && (high - low).is_finite()) {
            return Err(Error::InvalidInput(format!(
                "uniform range [{low}, {high}] must be finite with low < high"
            )));
        }
        let dist = Uniform::new(low, high)
            .map_err(|e| Error::InvalidInput(format!("uniform range [{low}, {high}]: {e}")))?;
        let x = (0..self.n).map(|_| dist.sample(rng)).collect();
        let y = (0..self.n).map(|_| dist.sample(rng)).collect();
        Ok(PairedSample { x, y })
    }
}

/// Standard bivariate-normal pairs with correlation taken from the factors.
///
/// Reads an integer sample-size factor (default `n`, at least 2) and a
/// float correlation factor (default `rho`, within `[-1, 1]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatedNormalPairs {
    size_factor: String,
    correlation_factor: String,
}

impl CorrelatedNormalPairs {
    /// Read factors `n` and `rho`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_factors("n", "rho")
    }

    /// Read factors with custom names.
    pub fn with_factors(size_factor: impl Into<String>, correlation_factor: impl Into<String>) -> Self {
        Self {
            size_factor: size_factor.into(),
            correlation_factor: correlation_factor.into(),
        }
    }
}

impl Default for CorrelatedNormalPairs {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetSynthesizer for CorrelatedNormalPairs {
    type Dataset = PairedSample;

    fn synthesize(&self, factors: &Factors, rng: &mut TrialRng) -> Result<PairedSample> {
        let n = factors.require_i64(&self.size_factor)?;
        let n = usize::try_from(n)
            .ok()
            .filter(|n| *n >= 2)
            .ok_or_else(|| Error::invalid_factor(&self.size_factor, format!("sample size {n} < 2")))?;

        let rho = factors.require_f64(&self.correlation_factor)?;
        if !(-1.0..=1.0).contains(&rho) {
            return Err(Error::invalid_factor(
                &self.correlation_factor,
                format!("correlation {rho} outside [-1, 1]"),
            ));
        }

        let standard = Normal::new(0.0, 1.0).map_err(|e| Error::Other(e.to_string()))?;
        let residual = rho.mul_add(-rho, 1.0).sqrt();
        let mut x = Vec::with_capacity(n.min(PREALLOCATED_PAIRS));
        let mut y = Vec::with_capacity(n.min(PREALLOCATED_PAIRS));
        for _ in 0..n {
            let z1 = standard.sample(rng);
            let z2 = standard.sample(rng);
            x.push(z1);
            y.push(rho.mul_add(z1, residual * z2));
        }
        Ok(PairedSample { x, y })
    }
}

/// Pearson correlation of a paired sample, column `corr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    columns: Vec<String>,
}

impl Correlation {
    /// Column name used by [`Correlation`].
    pub const COLUMN: &'static str = "corr";

    /// Create the statistic.
    #[must_use]
    pub fn new() -> Self {
        Self {
            columns: vec![Self::COLUMN.to_string()],
        }
    }
}

impl Default for Correlation {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistic<PairedSample> for Correlation {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn compute(&self, dataset: &PairedSample) -> Result<Vec<f64>> {
        Ok(vec![pearson(&dataset.x, &dataset.y)?])
    }
}

/// Least-squares line of `y` on `x`, columns `intercept` and `slope`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFitStatistic {
    columns: Vec<String>,
}

impl LineFitStatistic {
    /// Create the statistic.
    #[must_use]
    pub fn new() -> Self {
        Self {
            columns: vec!["intercept".to_string(), "slope".to_string()],
        }
    }
}

impl Default for LineFitStatistic {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistic<PairedSample> for LineFitStatistic {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn compute(&self, dataset: &PairedSample) -> Result<Vec<f64>> {
        let fit = fit_line(&dataset.x, &dataset.y)?;
        Ok(vec![fit.intercept, fit.slope])
    }
}
