//! Input factors of a simulation study
//!
//! A factor is a parameter of the data-generating process, drawn afresh for
//! every trial. [`FactorSpec`] is the declarative way to describe how each
//! factor is drawn; any closure returning [`Factors`] works too.
//!
//! ```rust
//! use trueno_study::factor::{FactorSpec, SamplingRule};
//! use trueno_study::rng::SeedStream;
//! use trueno_study::study::FactorSampler;
//!
//! let spec = FactorSpec::new()
//!     .factor("n", SamplingRule::IntUniform { low: 10, high: 100 })
//!     .factor("rho", SamplingRule::Uniform { low: -0.9, high: 0.9 });
//!
//! let factors = spec.sample(&mut SeedStream::new(7).trial_rng(0))?;
//! assert_eq!(factors.len(), 2);
//! # Ok::<(), trueno_study::Error>(())
//! ```

mod spec;
mod value;

pub use spec::{FactorSpec, SamplingRule};
pub use value::{FactorKind, FactorValue, Factors};
