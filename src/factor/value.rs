//! Factor values drawn for one trial

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single factor value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactorValue {
    /// Integer factor (sample sizes, counts)
    Int(i64),
    /// Real-valued factor
    Float(f64),
    /// Categorical level
    Category(String),
}

/// Column kind of a factor; fixed across all rows of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    /// See [`FactorValue::Int`]
    Int,
    /// See [`FactorValue::Float`]
    Float,
    /// See [`FactorValue::Category`]
    Category,
}

impl FactorValue {
    /// Kind of this value.
    #[must_use]
    pub const fn kind(&self) -> FactorKind {
        match self {
            Self::Int(_) => FactorKind::Int,
            Self::Float(_) => FactorKind::Float,
            Self::Category(_) => FactorKind::Category,
        }
    }

    /// Numeric view (integers widen to `f64`); `None` for categories.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Category(_) => None,
        }
    }
}

impl fmt::Display for FactorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Category(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for FactorValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for FactorValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for FactorValue {
    fn from(v: &str) -> Self {
        Self::Category(v.to_string())
    }
}

impl From<String> for FactorValue {
    fn from(v: String) -> Self {
        Self::Category(v)
    }
}

/// Factor values for one trial, keyed by factor name.
///
/// Iteration is ordered by name, which keeps table columns and rendered
/// error context stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Factors {
    values: BTreeMap<String, FactorValue>,
}

impl Factors {
    /// Empty factor set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FactorValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a factor value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FactorValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a factor.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FactorValue> {
        self.values.get(name)
    }

    /// Number of factors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no factors were drawn.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(name, value)` in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FactorValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `(name, kind)` pairs in name order.
    #[must_use]
    pub fn kinds(&self) -> Vec<(String, FactorKind)> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.kind()))
            .collect()
    }

    /// Numeric factor value; integers are widened.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFactor`] if the factor is missing or categorical.
    pub fn require_f64(&self, name: &str) -> Result<f64> {
        match self.values.get(name) {
            Some(value) => value
                .as_f64()
                .ok_or_else(|| Error::invalid_factor(name, "expected a numeric value")),
            None => Err(Error::invalid_factor(name, "missing")),
        }
    }

    /// Integer factor value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFactor`] if the factor is missing or not an integer.
    pub fn require_i64(&self, name: &str) -> Result<i64> {
        match self.values.get(name) {
            Some(FactorValue::Int(v)) => Ok(*v),
            Some(_) => Err(Error::invalid_factor(name, "expected an integer value")),
            None => Err(Error::invalid_factor(name, "missing")),
        }
    }

    /// Categorical factor value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFactor`] if the factor is missing or not a category.
    pub fn require_category(&self, name: &str) -> Result<&str> {
        match self.values.get(name) {
            Some(FactorValue::Category(v)) => Ok(v),
            Some(_) => Err(Error::invalid_factor(name, "expected a category")),
            None => Err(Error::invalid_factor(name, "missing")),
        }
    }

    /// Reject NaN and infinite float factors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFactor`] naming the first non-finite factor.
    pub fn check_finite(&self) -> Result<()> {
        for (name, value) in &self.values {
            if let FactorValue::Float(v) = value {
                if !v.is_finite() {
                    return Err(Error::invalid_factor(
                        name.clone(),
                        format!("non-finite value {v}"),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Factors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.values.is_empty() {
            return write!(f, "(none)");
        }
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<FactorValue>> FromIterator<(K, V)> for Factors {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut factors = Self::new();
        for (k, v) in iter {
            factors.insert(k, v);
        }
        factors
    }
}
