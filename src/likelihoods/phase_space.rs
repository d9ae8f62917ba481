use crate::domain::{DiTauCandidate, DiTauSolution, Leg};
use crate::fit::likelihood::LikelihoodTerm;
use crate::fit::parameters::LegParameter;
use crate::kinematics::constants::{TAU_MASS, TAU_MASS2};

use super::{IMPOSSIBLE_NLL, depends_on_leg_parameters};

/// Three-body phase space for one leg with a constant matrix element.
///
/// The decay angle enters as `sin θ*`; for leptonic legs the neutrino pair mass
/// adds `m_νν / 2 · λ^½ / (2 mτ)` (PDG three-body parametrisation).
#[derive(Debug, Clone)]
pub struct LegPhaseSpace {
    name: String,
    leg: Leg,
}

impl LegPhaseSpace {
    pub fn new(name: impl Into<String>, leg: Leg) -> Self {
        Self { name: name.into(), leg }
    }
}

impl LikelihoodTerm for LegPhaseSpace {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on_parameter(&self, index: usize) -> bool {
        depends_on_leg_parameters(
            index,
            &[self.leg],
            &[LegParameter::ThetaRest, LegParameter::NuInvMass],
        )
    }

    fn evaluate(&self, candidate: &DiTauCandidate, solution: &DiTauSolution) -> f64 {
        let leg = solution.leg(self.leg);
        let sin_theta = leg.decay_angle_rest_frame().sin();
        if !(sin_theta > 0.0) {
            return IMPOSSIBLE_NLL;
        }
        let mut log_likelihood = sin_theta.ln();

        let nu_mass = leg.p4_invis_rest.mass();
        if !candidate.leg(self.leg).kind.has_massless_invisible() && nu_mass > 0.0 {
            let vis_mass = leg.p4_vis_rest.mass().max(0.0);
            let lambda = (TAU_MASS2 - (nu_mass + vis_mass).powi(2)) * (TAU_MASS2 - (nu_mass - vis_mass).powi(2));
            if !(lambda > 0.0) {
                return IMPOSSIBLE_NLL;
            }
            log_likelihood += (nu_mass / 2.0).ln() + 0.5 * lambda.ln() - (2.0 * TAU_MASS).ln();
        }
        -log_likelihood
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Polarization;
    use crate::likelihoods::fixtures::{hadronic_candidate, solution_at};
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn hadronic_leg_scores_decay_angle_only() {
        let candidate = hadronic_candidate();
        let term = LegPhaseSpace::new("ps1", Leg::First);
        let perpendicular = solution_at(&candidate, FRAC_PI_2, Polarization::Unknown);
        assert_relative_eq!(term.evaluate(&candidate, &perpendicular), 0.0, epsilon = 1e-6);

        let forward = solution_at(&candidate, 0.3, Polarization::Unknown);
        assert_relative_eq!(term.evaluate(&candidate, &forward), -(0.3f64.sin().ln()), epsilon = 1e-5);
    }

    #[test]
    fn depends_on_its_own_leg() {
        let term = LegPhaseSpace::new("ps2", Leg::Second);
        assert!(term.depends_on_parameter(Leg::Second.index(LegParameter::ThetaRest)));
        assert!(term.depends_on_parameter(Leg::Second.index(LegParameter::NuInvMass)));
        assert!(!term.depends_on_parameter(Leg::Second.index(LegParameter::PhiLab)));
        assert!(!term.depends_on_parameter(Leg::First.index(LegParameter::ThetaRest)));
    }
}
