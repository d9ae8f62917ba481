//! Terms acting on the di-tau invariant mass alone.

use crate::domain::{DiTauCandidate, DiTauSolution, Leg};
use crate::fit::likelihood::LikelihoodTerm;

use super::{IMPOSSIBLE_NLL, depends_on_kinematics};

/// `factor * ln(m)`: disfavours large masses.
#[derive(Debug, Clone)]
pub struct MassPenalty {
    name: String,
    factor: f64,
}

impl MassPenalty {
    pub fn new(name: impl Into<String>, factor: f64) -> Self {
        Self {
            name: name.into(),
            factor,
        }
    }
}

impl LikelihoodTerm for MassPenalty {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on_parameter(&self, index: usize) -> bool {
        depends_on_kinematics(index, &Leg::BOTH)
    }

    fn evaluate(&self, _candidate: &DiTauCandidate, solution: &DiTauSolution) -> f64 {
        let mass = solution.mass();
        if mass > 0.0 { self.factor * mass.ln() } else { IMPOSSIBLE_NLL }
    }
}

/// Zero inside `[min, max]`, `penalty * d²` outside, where `d` is the distance
/// to the nearest edge.
#[derive(Debug, Clone)]
pub struct MassWindow {
    name: String,
    min: f64,
    max: f64,
    penalty: f64,
}

impl MassWindow {
    pub fn new(name: impl Into<String>, min: f64, max: f64, penalty: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            penalty,
        }
    }
}

impl LikelihoodTerm for MassWindow {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on_parameter(&self, index: usize) -> bool {
        depends_on_kinematics(index, &Leg::BOTH)
    }

    fn evaluate(&self, _candidate: &DiTauCandidate, solution: &DiTauSolution) -> f64 {
        let mass = solution.mass();
        let d = if mass < self.min {
            self.min - mass
        } else if mass > self.max {
            mass - self.max
        } else {
            0.0
        };
        self.penalty * d * d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Polarization;
    use crate::likelihoods::fixtures::{hadronic_candidate, solution_at};
    use approx::assert_relative_eq;

    #[test]
    fn window_is_flat_inside_and_quadratic_outside() {
        let candidate = hadronic_candidate();
        let solution = solution_at(&candidate, 1.0, Polarization::Unknown);
        let m = solution.mass();

        let inside = MassWindow::new("w", m - 1.0, m + 1.0, 1.0);
        assert_eq!(inside.evaluate(&candidate, &solution), 0.0);

        let above = MassWindow::new("w", m + 2.0, m + 10.0, 3.0);
        assert_relative_eq!(above.evaluate(&candidate, &solution), 12.0, epsilon = 1e-9);
    }

    #[test]
    fn penalty_grows_with_mass() {
        let candidate = hadronic_candidate();
        let low = solution_at(&candidate, 0.5, Polarization::Unknown);
        let high = solution_at(&candidate, 1.5, Polarization::Unknown);
        let term = MassPenalty::new("p", 1.0);
        let (a, b) = (term.evaluate(&candidate, &low), term.evaluate(&candidate, &high));
        assert_relative_eq!(b - a, (high.mass() / low.mass()).ln(), epsilon = 1e-9);
    }
}
