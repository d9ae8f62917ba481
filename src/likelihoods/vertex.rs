use nalgebra::{Matrix3, Vector3};

use crate::domain::{DiTauCandidate, DiTauSolution};
use crate::error::AppError;
use crate::fit::likelihood::LikelihoodTerm;
use crate::fit::parameters::NUM_VERTEX_PARAMETERS;

/// Gaussian constraint of the fitted production vertex to the refitted primary
/// vertex: `½ dᵀ C⁻¹ d`.
///
/// Candidates without a valid vertex, or with a singular vertex covariance,
/// leave the term inactive: it then depends on no parameter and evaluates to 0.
#[derive(Debug, Clone)]
pub struct PrimaryVertexGaussian {
    name: String,
    reference: Option<(Vector3<f64>, Matrix3<f64>)>,
}

impl PrimaryVertexGaussian {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference: None,
        }
    }
}

impl LikelihoodTerm for PrimaryVertexGaussian {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin_candidate(&mut self, candidate: &DiTauCandidate) -> Result<(), AppError> {
        self.reference = candidate.vertex.as_ref().filter(|pv| pv.is_valid).and_then(|pv| {
            let position = Vector3::from(pv.position);
            let covariance = Matrix3::from_fn(|r, c| pv.covariance[r][c]);
            covariance.try_inverse().map(|inverse| (position, inverse))
        });
        if self.reference.is_none() {
            tracing::warn!(term = %self.name, "no usable primary vertex, term is inactive");
        }
        Ok(())
    }

    fn depends_on_parameter(&self, index: usize) -> bool {
        self.reference.is_some() && index < NUM_VERTEX_PARAMETERS
    }

    fn evaluate(&self, _candidate: &DiTauCandidate, solution: &DiTauSolution) -> f64 {
        match &self.reference {
            Some((position, inverse)) => {
                let d = solution.vertex_position - position;
                0.5 * d.dot(&(inverse * d))
            }
            None => 0.0,
        }
    }
}
