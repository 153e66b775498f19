//! Estimators and descriptive statistics
//!
//! Small, exact helpers used as statistics under study and for analysing
//! results tables. Degenerate inputs are errors, never NaN.

mod ols;

pub use ols::{fit_line, LineFit};

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::{Error, Result};

/// Pearson product-moment correlation of paired samples.
///
/// # Errors
///
/// Returns [`Error::DegenerateData`] if the samples differ in length, hold
/// fewer than two pairs, contain non-finite values, or either variable has
/// zero variance (the coefficient is undefined there).
///
/// # Example
///
/// ```rust
/// use trueno_study::stats::pearson;
///
/// let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0])?;
/// assert!((r - 1.0).abs() < 1e-12);
///
/// assert!(pearson(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]).is_err());
/// # Ok::<(), trueno_study::Error>(())
/// ```
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    let moments = Moments::of(x, y)?;
    if moments.sxx <= 0.0 {
        return Err(Error::DegenerateData(
            "correlation undefined: x has zero variance".to_string(),
        ));
    }
    if moments.syy <= 0.0 {
        return Err(Error::DegenerateData(
            "correlation undefined: y has zero variance".to_string(),
        ));
    }
    let r = moments.sxy / (moments.sxx * moments.syy).sqrt();
    if !r.is_finite() {
        return Err(Error::DegenerateData(format!(
            "correlation undefined: centered moments overflow (r = {r})"
        )));
    }
    Ok(r.clamp(-1.0, 1.0))
}

/// Centered second moments of paired samples.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Moments {
    pub n: usize,
    pub mean_x: f64,
    pub mean_y: f64,
    pub sxx: f64,
    pub syy: f64,
    pub sxy: f64,
}

impl Moments {
    pub(crate) fn of(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::DegenerateData(format!(
                "paired samples differ in length: {} vs {}",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(Error::DegenerateData(format!(
                "need at least 2 observations, got {}",
                x.len()
            )));
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(Error::DegenerateData(
                "samples contain non-finite values".to_string(),
            ));
        }

        let mean_x = x.mean();
        let mean_y = y.mean();
        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for (xi, yi) in x.iter().zip(y) {
            let dx = xi - mean_x;
            let dy = yi - mean_y;
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }

        Ok(Self {
            n: x.len(),
            mean_x,
            mean_y,
            sxx,
            syy,
            sxy,
        })
    }
}

/// Descriptive summary of one numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    /// Number of values
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation (n - 1); `None` for a single value
    pub std_dev: Option<f64>,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
}

impl ColumnSummary {
    /// Summarize a slice of values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DegenerateData`] for an empty slice.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::DegenerateData(
                "cannot summarize an empty column".to_string(),
            ));
        }
        let std_dev = (values.len() > 1).then(|| Statistics::std_dev(values));
        Ok(Self {
            count: values.len(),
            mean: Statistics::mean(values),
            std_dev,
            min: Statistics::min(values),
            max: Statistics::max(values),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pearson_known_values() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((pearson(&x, &[2.0, 4.0, 6.0, 8.0, 10.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &[5.0, 4.0, 3.0, 2.0, 1.0]).unwrap() + 1.0).abs() < 1e-12);

        // Hand-computed: r = 0.8
        let r = pearson(&x, &[1.0, 3.0, 2.0, 5.0, 4.0]).unwrap();
        assert!((r - 0.8).abs() < 1e-12, "r = {r}");
    }

    #[test]
    fn test_pearson_degenerate_inputs() {
        let cases: [(&[f64], &[f64]); 5] = [
            (&[1.0, 2.0], &[1.0]),
            (&[1.0], &[1.0]),
            (&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]),
            (&[1.0, 2.0, 3.0], &[7.0, 7.0, 7.0]),
            (&[1.0, f64::NAN], &[1.0, 2.0]),
        ];
        for (x, y) in cases {
            assert!(
                matches!(pearson(x, y), Err(Error::DegenerateData(_))),
                "expected degenerate for {x:?} / {y:?}"
            );
        }
    }

    #[test]
    fn test_pearson_moment_overflow_is_degenerate() {
        let x = [1e160, 2e160, 3e160, 4e160];
        let y = [2e160, 1e160, 4e160, 3e160];
        assert!(matches!(pearson(&x, &y), Err(Error::DegenerateData(_))));
    }

    #[test]
    fn test_column_summary() {
        let summary = ColumnSummary::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(summary.count, 8);
        assert!((summary.mean - 5.0).abs() < 1e-12);
        // Sample variance = 32 / 7
        assert!((summary.std_dev.unwrap() - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert!((summary.min - 2.0).abs() < f64::EPSILON);
        assert!((summary.max - 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_column_summary_single_and_empty() {
        let single = ColumnSummary::from_values(&[3.0]).unwrap();
        assert!(single.std_dev.is_none());
        assert!(ColumnSummary::from_values(&[]).is_err());
    }
}
