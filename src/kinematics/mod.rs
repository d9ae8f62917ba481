//! Tau decay kinematics: constants and the parameter → four-momentum transform.

pub mod constants;
pub mod transform;

pub use transform::*;
