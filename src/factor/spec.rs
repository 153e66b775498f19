//! Declarative factor sampling rules

use std::collections::BTreeMap;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Normal, Uniform};

use super::{FactorValue, Factors};
use crate::rng::TrialRng;
use crate::study::FactorSampler;
use crate::{Error, Result};

/// How one factor is drawn for each trial.
///
/// Serialized with a `dist` tag so factor specs read naturally in TOML:
///
/// ```toml
/// [rho]
/// dist = "uniform"
/// low = -0.9
/// high = 0.9
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dist", rename_all = "snake_case")]
pub enum SamplingRule {
    /// Continuous uniform on `[low, high]`
    Uniform {
        /// Lower bound
        low: f64,
        /// Upper bound (must exceed `low`)
        high: f64,
    },
    /// Normal with the given mean and standard deviation
    Normal {
        /// Mean
        mean: f64,
        /// Standard deviation (must be positive)
        std_dev: f64,
    },
    /// Uniform integer on `[low, high]` (inclusive)
    IntUniform {
        /// Lower bound
        low: i64,
        /// Upper bound
        high: i64,
    },
    /// One of a fixed set of labels, optionally weighted
    Categorical {
        /// Levels to choose from
        choices: Vec<String>,
        /// Relative weights, one per choice; uniform when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weights: Option<Vec<f64>>,
    },
    /// Same value in every trial
    Fixed {
        /// The value
        value: FactorValue,
    },
}

impl SamplingRule {
    /// Check parameters before any trial runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the bad parameter.
    pub fn validate(&self, name: &str) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(format!("factor '{name}': {msg}")));
        match self {
            Self::Uniform { low, high } => {
                if !low.is_finite() || !high.is_finite() {
                    return invalid(format!("uniform bounds must be finite, got [{low}, {high}]"));
                }
                if low >= high {
                    return invalid(format!("uniform requires low < high, got [{low}, {high}]"));
                }
                if !(high - low).is_finite() {
                    return invalid(format!("uniform width overflows, got [{low}, {high}]"));
                }
            }
            Self::Normal { mean, std_dev } => {
                if !mean.is_finite() {
                    return invalid(format!("normal mean must be finite, got {mean}"));
                }
                if !std_dev.is_finite() || *std_dev <= 0.0 {
                    return invalid(format!("normal std_dev must be positive, got {std_dev}"));
                }
            }
            Self::IntUniform { low, high } => {
                if low > high {
                    return invalid(format!("int_uniform requires low <= high, got [{low}, {high}]"));
                }
            }
            Self::Categorical { choices, weights } => {
                if choices.is_empty() {
                    return invalid("categorical needs at least one choice".to_string());
                }
                if let Some(weights) = weights {
                    if weights.len() != choices.len() {
                        return invalid(format!(
                            "categorical has {} choices but {} weights",
                            choices.len(),
                            weights.len()
                        ));
                    }
                    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                        return invalid("categorical weights must be finite and >= 0".to_string());
                    }
                    if weights.iter().all(|w| *w == 0.0) {
                        return invalid("categorical weights are all zero".to_string());
                    }
                }
            }
            Self::Fixed { value } => {
                if let FactorValue::Float(v) = value {
                    if !v.is_finite() {
                        return invalid(format!("fixed value must be finite, got {v}"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Draw one value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the rule's parameters are invalid.
    pub fn sample(&self, name: &str, rng: &mut TrialRng) -> Result<FactorValue> {
        let config_err = |e: &dyn std::fmt::Display| {
            Error::InvalidConfig(format!("factor '{name}': {e}"))
        };
        let value = match self {
            Self::Uniform { low, high } => {
                if !(high - low).is_finite() {
                    return Err(config_err(&format!("uniform width overflows [{low}, {high}]")));
                }
                let dist = Uniform::new(*low, *high).map_err(|e| config_err(&e))?;
                FactorValue::Float(dist.sample(rng))
            }
            Self::Normal { mean, std_dev } => {
                let dist = Normal::new(*mean, *std_dev).map_err(|e| config_err(&e))?;
                FactorValue::Float(dist.sample(rng))
            }
            Self::IntUniform { low, high } => {
                if low > high {
                    return Err(config_err(&format!("empty integer range [{low}, {high}]")));
                }
                FactorValue::Int(rng.gen_range(*low..=*high))
            }
            Self::Categorical { choices, weights } => {
                if choices.is_empty() {
                    return Err(config_err(&"categorical needs at least one choice"));
                }
                let idx = match weights {
                    Some(weights) => WeightedIndex::new(weights)
                        .map_err(|e| config_err(&e))?
                        .sample(rng),
                    None => rng.gen_range(0..choices.len()),
                };
                FactorValue::Category(choices[idx].clone())
            }
            Self::Fixed { value } => value.clone(),
        };
        Ok(value)
    }
}

/// Factor specification: factor name to sampling rule.
///
/// Immutable once a study starts. Factors are drawn in name order, so a
/// spec always consumes its trial's random stream the same way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactorSpec {
    rules: BTreeMap<String, SamplingRule>,
}

impl FactorSpec {
    /// Empty spec (a study with no factors).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factor.
    #[must_use]
    pub fn factor(mut self, name: impl Into<String>, rule: SamplingRule) -> Self {
        self.rules.insert(name.into(), rule);
        self
    }

    /// Rule for a factor.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&SamplingRule> {
        self.rules.get(name)
    }

    /// Number of factors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when the spec declares no factors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Parse a spec from TOML (one table per factor).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] on malformed TOML and
    /// [`Error::InvalidConfig`] on invalid rules.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let spec: Self = toml::from_str(toml_str)?;
        FactorSampler::validate(&spec)?;
        Ok(spec)
    }
}

impl FactorSampler for FactorSpec {
    fn sample(&self, rng: &mut TrialRng) -> Result<Factors> {
        let mut factors = Factors::new();
        for (name, rule) in &self.rules {
            factors.insert(name.clone(), rule.sample(name, rng)?);
        }
        Ok(factors)
    }

    fn validate(&self) -> Result<()> {
        for (name, rule) in &self.rules {
            rule.validate(name)?;
        }
        Ok(())
    }
}
