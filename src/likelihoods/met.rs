//! Missing transverse momentum likelihood.
//!
//! The summed neutrino transverse momentum of both legs is compared with the
//! measured MET. When the MET record carries a 2×2 covariance the residual is
//! scored with the full bivariate Gaussian; otherwise it is split into
//! components parallel and perpendicular to the visible di-tau transverse
//! momentum, each with its own resolution.

use std::f64::consts::PI;

use nalgebra::{Matrix2, Vector2};

use crate::domain::{DiTauCandidate, DiTauSolution, EventContext, Leg, MissingEt};
use crate::error::AppError;
use crate::fit::likelihood::LikelihoodTerm;

use super::{IMPOSSIBLE_NLL, depends_on_kinematics};

#[derive(Debug, Clone)]
pub struct MissingEtTerm {
    name: String,
    sigma_parallel: f64,
    sigma_perp: f64,
    bias_parallel: f64,
    /// Event-level MET collection to read instead of the candidate's own MET.
    collection: Option<String>,
    event_met: Option<MissingEt>,
}

impl MissingEtTerm {
    pub fn new(name: impl Into<String>, sigma_parallel: f64, sigma_perp: f64) -> Self {
        Self {
            name: name.into(),
            sigma_parallel,
            sigma_perp,
            bias_parallel: 0.0,
            collection: None,
            event_met: None,
        }
    }

    pub fn with_bias_parallel(mut self, bias: f64) -> Self {
        self.bias_parallel = bias;
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    fn measured<'a>(&'a self, candidate: &'a DiTauCandidate) -> Option<&'a MissingEt> {
        self.event_met.as_ref().or(candidate.met.as_ref())
    }

    fn gaussian_nll(residual: f64, sigma: f64) -> f64 {
        0.5 * (residual / sigma).powi(2) + sigma.ln() + 0.5 * (2.0 * PI).ln()
    }
}

impl LikelihoodTerm for MissingEtTerm {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin_event(&mut self, event: &EventContext) -> Result<(), AppError> {
        self.event_met = match &self.collection {
            Some(collection) => Some(event.met_collections.get(collection).cloned().ok_or_else(|| {
                AppError::input(format!(
                    "Term '{}': MET collection '{collection}' not found in event {}.",
                    self.name, event.id
                ))
            })?),
            None => None,
        };
        Ok(())
    }

    fn begin_candidate(&mut self, candidate: &DiTauCandidate) -> Result<(), AppError> {
        if self.measured(candidate).is_none() {
            return Err(AppError::input(format!(
                "Term '{}' needs a missing-ET measurement but the candidate has none.",
                self.name
            )));
        }
        Ok(())
    }

    fn depends_on_parameter(&self, index: usize) -> bool {
        depends_on_kinematics(index, &Leg::BOTH)
    }

    fn evaluate(&self, candidate: &DiTauCandidate, solution: &DiTauSolution) -> f64 {
        let Some(met) = self.measured(candidate) else {
            return 0.0;
        };
        let nu = solution.invisible_p4();
        let residual = Vector2::new(nu.px - met.px, nu.py - met.py);

        if let Some(cov) = met.covariance {
            let cov = Matrix2::new(cov[0][0], cov[0][1], cov[1][0], cov[1][1]);
            let det = cov.determinant();
            return match cov.try_inverse() {
                Some(inv) if det > 0.0 => {
                    0.5 * residual.dot(&(inv * residual)) + 0.5 * ((2.0 * PI).powi(2) * det).ln()
                }
                _ => IMPOSSIBLE_NLL,
            };
        }

        let visible = candidate.visible_p4();
        let axis = if visible.pt() > 0.0 {
            Vector2::new(visible.px, visible.py) / visible.pt()
        } else {
            Vector2::x()
        };
        let parallel = residual.dot(&axis) - self.bias_parallel;
        let perp = residual.x * axis.y - residual.y * axis.x;
        Self::gaussian_nll(parallel, self.sigma_parallel) + Self::gaussian_nll(perp, self.sigma_perp)
    }
}
