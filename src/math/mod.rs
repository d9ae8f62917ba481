//! Numerical building blocks shared by the kinematics and fit layers.
//!
//! - `lorentz`: four-momenta, boosts, invariant masses
//! - `stats`: nearest-rank percentiles over resampled values

pub mod lorentz;
pub mod stats;

pub use lorentz::*;
pub use stats::*;
