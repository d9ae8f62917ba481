use crate::domain::{DiTauCandidate, DiTauSolution, Leg};
use crate::fit::likelihood::LikelihoodTerm;

use super::depends_on_kinematics;

/// Relativistic Breit–Wigner line shape on the di-tau invariant mass:
/// `-ln(Γ² / ((m² - M²)² + M²Γ²))`.
#[derive(Debug, Clone)]
pub struct DiTauBreitWigner {
    name: String,
    mass2: f64,
    width2: f64,
}

impl DiTauBreitWigner {
    pub fn new(name: impl Into<String>, mass: f64, width: f64) -> Self {
        Self {
            name: name.into(),
            mass2: mass * mass,
            width2: width * width,
        }
    }
}

impl LikelihoodTerm for DiTauBreitWigner {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on_parameter(&self, index: usize) -> bool {
        depends_on_kinematics(index, &Leg::BOTH)
    }

    fn evaluate(&self, _candidate: &DiTauCandidate, solution: &DiTauSolution) -> f64 {
        let m2 = solution.mass().powi(2);
        let d = m2 - self.mass2;
        -(self.width2 / (d * d + self.mass2 * self.width2)).ln()
    }
}
