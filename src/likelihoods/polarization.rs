//! Polarized `tau -> pi nu` matrix element.
//!
//! For a V-A decay of a tau with helicity `P = ±1` into a single pion the
//! visible energy fraction is distributed as `1 + P (2x - 1)`. Other hadronic
//! decay modes are scored as neutral.
//!
//! Two optional factors refine the density:
//!
//! - `sin theta*` weighting, turning the density in `cos theta*` into one in
//!   the decay angle itself
//! - an acceptance correction for a cut on the visible transverse momentum,
//!   dividing by the fraction of `x` above `x_cut = pt_cut / pt_tau`

use crate::domain::{DiTauCandidate, DiTauSolution, HadronicDecayMode, Leg, LegKind};
use crate::error::AppError;
use crate::fit::likelihood::LikelihoodTerm;
use crate::fit::parameters::LegParameter;
use crate::kinematics::constants::{CHARGED_PION_MASS, TAU_MASS, TAU_MASS2};

use super::{depends_on_leg_parameters, nll};

/// Strength of the penalty on `x` outside its kinematic range.
const X_RANGE_PENALTY: f64 = 1e6;

/// Keeps the acceptance correction finite as `x_cut` approaches one.
const ACCEPTANCE_REGULARIZATION: f64 = 1e-3;

#[derive(Debug, Clone)]
pub struct TauToPiNuPolarization {
    name: String,
    leg: Leg,
    sin_theta_factor: bool,
    vis_pt_cut: Option<f64>,
}

impl TauToPiNuPolarization {
    pub fn new(name: impl Into<String>, leg: Leg) -> Self {
        Self {
            name: name.into(),
            leg,
            sin_theta_factor: false,
            vis_pt_cut: None,
        }
    }

    /// Multiply the probability by `sin(theta*) / 2`.
    pub fn with_sin_theta_factor(mut self, apply: bool) -> Self {
        self.sin_theta_factor = apply;
        self
    }

    /// Correct for a cut on the visible transverse momentum at `threshold`.
    pub fn with_vis_pt_cut(mut self, threshold: f64) -> Self {
        self.vis_pt_cut = Some(threshold);
        self
    }

    /// Inverse of the fraction of the `x` density above `x_cut` for helicity
    /// sign `p`.
    fn acceptance_correction(x_cut: f64, p: f64) -> f64 {
        let eps = ACCEPTANCE_REGULARIZATION;
        let right = 1.0 - x_cut * x_cut + eps;
        let left = (1.0 - x_cut + eps).powi(2);
        1.0 / (0.5 * (1.0 + p) * right + 0.5 * (1.0 - p) * left)
    }

    fn is_pi_nu(candidate: &DiTauCandidate, leg: Leg) -> bool {
        let visible = candidate.leg(leg);
        visible.kind == LegKind::Hadron && visible.decay_mode == Some(HadronicDecayMode::OneProng0Pi0)
    }
}

impl LikelihoodTerm for TauToPiNuPolarization {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin_candidate(&mut self, candidate: &DiTauCandidate) -> Result<(), AppError> {
        if !Self::is_pi_nu(candidate, self.leg) {
            let visible = candidate.leg(self.leg);
            tracing::warn!(
                term = %self.name,
                leg = self.leg.label(),
                kind = visible.kind.label(),
                decay_mode = ?visible.decay_mode,
                "decay mode not supported, term is neutral"
            );
        }
        Ok(())
    }

    fn depends_on_parameter(&self, index: usize) -> bool {
        // The fitted tau pt moves with the azimuth as well.
        let params: &[LegParameter] = if self.vis_pt_cut.is_some() {
            &[LegParameter::ThetaRest, LegParameter::PhiLab, LegParameter::NuInvMass]
        } else {
            &[LegParameter::ThetaRest, LegParameter::NuInvMass]
        };
        depends_on_leg_parameters(index, &[self.leg], params)
    }

    fn supports_polarization(&self) -> bool {
        true
    }

    fn evaluate(&self, candidate: &DiTauCandidate, solution: &DiTauSolution) -> f64 {
        let leg = solution.leg(self.leg);
        let x = leg.x();
        let pi_nu = Self::is_pi_nu(candidate, self.leg);

        let mut prob = if pi_nu {
            1.0 + leg.polarization.sign() * (2.0 * x - 1.0)
        } else {
            1.0
        };

        let vis_mass = leg.p4_vis_rest.mass().clamp(CHARGED_PION_MASS, TAU_MASS);
        let x_min = vis_mass * vis_mass / TAU_MASS2;
        if x < x_min {
            prob /= 1.0 + X_RANGE_PENALTY * (x - x_min).powi(2);
        } else if x > 1.0 {
            prob /= 1.0 + X_RANGE_PENALTY * (x - 1.0).powi(2);
        }

        if self.sin_theta_factor {
            prob *= 0.5 * leg.decay_angle_rest_frame().sin();
        }

        if let Some(threshold) = self.vis_pt_cut.filter(|_| pi_nu) {
            let tau_pt = leg.p4().pt();
            if tau_pt > threshold {
                prob *= Self::acceptance_correction(threshold / tau_pt, leg.polarization.sign());
            }
        }
        nll(prob)
    }
}
