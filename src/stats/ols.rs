//! Ordinary least squares for a single predictor.

use serde::{Deserialize, Serialize};

use super::Moments;
use crate::{Error, Result};

/// Fitted line `y = intercept + slope * x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineFit {
    /// Estimated intercept
    pub intercept: f64,
    /// Estimated slope
    pub slope: f64,
    /// Fitted values, one per observation
    pub fitted: Vec<f64>,
    /// Residuals `y - fitted`, one per observation
    pub residuals: Vec<f64>,
    /// Residual standard error on n - 2 degrees of freedom; `None` when n = 2
    pub residual_std_error: Option<f64>,
    /// Coefficient of determination; `None` when y is constant
    pub r_squared: Option<f64>,
}

impl LineFit {
    /// Predicted response at `x`.
    #[must_use]
    pub fn predict(&self, x: f64) -> f64 {
        self.slope.mul_add(x, self.intercept)
    }

    /// Number of observations in the fit.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fitted.len()
    }

    /// Always false; a fit needs at least two observations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fitted.is_empty()
    }
}

/// Least-squares fit of `y` on `x`.
///
/// # Errors
///
/// Returns [`Error::DegenerateData`] if the samples differ in length, hold
/// fewer than two pairs, contain non-finite values, or `x` is constant.
///
/// # Example
///
/// ```rust
/// use trueno_study::stats::fit_line;
///
/// let fit = fit_line(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0])?;
/// assert!((fit.slope - 2.0).abs() < 1e-12);
/// assert!((fit.intercept - 1.0).abs() < 1e-12);
/// # Ok::<(), trueno_study::Error>(())
/// ```
pub fn fit_line(x: &[f64], y: &[f64]) -> Result<LineFit> {
    let m = Moments::of(x, y)?;
    if m.sxx <= 0.0 {
        return Err(Error::DegenerateData(
            "regression undefined: x has zero variance".to_string(),
        ));
    }

    let slope = m.sxy / m.sxx;
    let intercept = slope.mul_add(-m.mean_x, m.mean_y);
    if !slope.is_finite() || !intercept.is_finite() {
        return Err(Error::DegenerateData(format!(
            "regression undefined: centered moments overflow (slope = {slope})"
        )));
    }

    let fitted: Vec<f64> = x.iter().map(|xi| slope.mul_add(*xi, intercept)).collect();
    let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(yi, fi)| yi - fi).collect();
    let rss: f64 = residuals.iter().map(|r| r * r).sum();

    #[allow(clippy::cast_precision_loss)]
    let dof = (m.n - 2) as f64;
    let residual_std_error = (m.n > 2).then(|| (rss / dof).sqrt());
    let r_squared = (m.syy > 0.0).then(|| (1.0 - rss / m.syy).clamp(0.0, 1.0));

    Ok(LineFit {
        intercept,
        slope,
        fitted,
        residuals,
        residual_std_error,
        r_squared,
    })
}
