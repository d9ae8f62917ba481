use crate::domain::{DiTauCandidate, DiTauSolution, Leg};
use crate::fit::likelihood::LikelihoodTerm;
use crate::fit::parameters::LegParameter;
use crate::kinematics::constants::{TAU_C_TAU, TAU_MASS};

use super::{IMPOSSIBLE_NLL, depends_on_leg_parameters};

/// Exponential decay-length distribution of one tau: with mean decay length
/// `λ = γβ cτ = (p / m) cτ`, the flight distance `d` scores `d / λ + ln λ`.
#[derive(Debug, Clone)]
pub struct TauDecayLength {
    name: String,
    leg: Leg,
}

impl TauDecayLength {
    pub fn new(name: impl Into<String>, leg: Leg) -> Self {
        Self { name: name.into(), leg }
    }
}

impl LikelihoodTerm for TauDecayLength {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on_parameter(&self, index: usize) -> bool {
        depends_on_leg_parameters(
            index,
            &[self.leg],
            &[LegParameter::ThetaRest, LegParameter::NuInvMass, LegParameter::FlightPath],
        )
    }

    fn evaluate(&self, _candidate: &DiTauCandidate, solution: &DiTauSolution) -> f64 {
        let leg = solution.leg(self.leg);
        let mean = leg.p4().p() / TAU_MASS * TAU_C_TAU;
        if !(mean > 0.0) {
            return IMPOSSIBLE_NLL;
        }
        leg.flight_distance() / mean + mean.ln()
    }
}
