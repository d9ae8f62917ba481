//! Fit orchestration.
//!
//! Responsibilities:
//!
//! - lay out the 19 fit parameters and their defaults (`parameters`)
//! - sum likelihood terms into one objective (`likelihood`)
//! - run the bounded minimizer and estimate the covariance (`minimizer`)
//! - enumerate polarization hypotheses (`hypothesis`)
//! - resample the optimum for error bands (`uncertainty`)
//! - drive all of the above per candidate (`engine`)

pub mod engine;
pub mod hypothesis;
pub mod likelihood;
pub mod minimizer;
pub mod parameters;
pub mod uncertainty;

pub use engine::*;
pub use hypothesis::*;
pub use likelihood::*;
pub use minimizer::*;
pub use parameters::*;
pub use uncertainty::*;
