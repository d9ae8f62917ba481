//! `ditau-fit` library crate.
//!
//! Kinematic reconstruction of tau pairs: the visible decay products of both
//! taus are fixed, the missing degrees of freedom are fitted by minimizing a
//! sum of pluggable negative log-likelihood terms.
//!
//! The binary (`svfit`) is a thin wrapper around this library so that:
//!
//! - the engine is usable without spawning processes
//! - likelihood terms can be injected by callers through [`fit::LikelihoodTerm`]

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod kinematics;
pub mod likelihoods;
pub mod math;
pub mod report;
