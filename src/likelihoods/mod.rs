//! Reference likelihood terms.
//!
//! Every term returns a negative log-likelihood and declares which parameters
//! it depends on. Terms are built from named configuration records by
//! [`registry::build_terms`].
//!
//! - `DiTauBreitWigner`: resonance line shape on the di-tau mass
//! - `MassPenalty`: `factor * ln(m)` on the di-tau mass
//! - `MassWindow`: quadratic penalty outside a mass window
//! - `MissingEt`: neutrino transverse momentum against measured MET
//! - `LegPhaseSpace`: three-body phase space of one leg
//! - `TauToPiNuPolarization`: V-A matrix element for `tau -> pi nu`
//! - `TauDecayLength`: exponential decay length of one leg
//! - `PrimaryVertexGaussian`: production vertex against the refitted vertex

pub mod breit_wigner;
pub mod decay_length;
pub mod mass;
pub mod met;
pub mod phase_space;
pub mod polarization;
pub mod registry;
pub mod vertex;

pub use breit_wigner::*;
pub use decay_length::*;
pub use mass::*;
pub use met::*;
pub use phase_space::*;
pub use polarization::*;
pub use registry::*;
pub use vertex::*;

use crate::domain::Leg;
use crate::fit::parameters::{LegParameter, leg_parameter};

/// Value returned for physically impossible configurations.
pub const IMPOSSIBLE_NLL: f64 = f32::MAX as f64;

/// Whether `index` is one of `parameters` on one of `legs`.
pub(crate) fn depends_on_leg_parameters(index: usize, legs: &[Leg], parameters: &[LegParameter]) -> bool {
    matches!(leg_parameter(index), Some((leg, p)) if legs.contains(&leg) && parameters.contains(&p))
}

/// Whether `index` changes the tau four-momentum of one of `legs`.
pub(crate) fn depends_on_kinematics(index: usize, legs: &[Leg]) -> bool {
    matches!(leg_parameter(index), Some((leg, p)) if legs.contains(&leg) && p.is_kinematic())
}

/// `-ln(prob)`, or [`IMPOSSIBLE_NLL`] when `prob` is not positive.
pub(crate) fn nll(prob: f64) -> f64 {
    if prob > 0.0 { -prob.ln() } else { IMPOSSIBLE_NLL }
}
