//! # Trueno-Study: Monte-Carlo Simulation Study Runner
//!
//! **Version**: 0.1.0
//!
//! Trueno-Study repeats a randomized experiment many times and collects one
//! results row per trial:
//!
//! 1. draw input factors (sample size, true correlation, ...)
//! 2. synthesize a dataset from those factors
//! 3. compute the statistic under study
//! 4. append factors + statistic values to a [`study::ResultsTable`]
//!
//! The table is then analysed as a dataset in its own right: the spread of
//! an estimator, or how its bias moves with a factor.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: A failing trial stops the study with its index and factor
//!   values; NaN rows never enter the table
//! - **Poka-Yoke**: The table schema is fixed by the first record; drift is
//!   rejected
//! - **Genchi Genbutsu**: Every trial has its own seeded stream, so any row
//!   can be reproduced in isolation
//!
//! ## Example Usage
//!
//! ```rust
//! use trueno_study::study::{run_study, NoFactors};
//! use trueno_study::synth::{Correlation, UniformPairs};
//!
//! // 100 datasets of 50 independent uniform pairs
//! let table = run_study(100, &NoFactors, &UniformPairs::new(50), &Correlation::new())?;
//!
//! let summary = table.summarize("corr")?;
//! assert_eq!(summary.count, 100);
//! assert!(summary.mean.abs() < 0.1);
//! # Ok::<(), trueno_study::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod factor;
pub mod rng;
pub mod stats;
pub mod storage;
pub mod study;
pub mod synth;

pub use config::{Execution, FailurePolicy, StudyConfig};
pub use error::{Error, Result};
pub use factor::{FactorSpec, FactorValue, Factors};
pub use rng::{SeedStream, TrialRng};
pub use study::{
    run_study, DatasetSynthesizer, FactorSampler, ResultsTable, Statistic, Study, StudyBuilder,
};
