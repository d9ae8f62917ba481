//! Asymmetric error bands by correlated resampling around the optimum.
//!
//! Free parameters are drawn from `N(x*, V)` via the Cholesky factor of the
//! covariance `V`, pushed through the kinematic transform, and the resulting
//! di-tau mass and visible energy fractions are summarised by their 16th, 50th
//! and 84th nearest-rank percentiles.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::domain::DiTauSolution;
use crate::kinematics::apply_parameters;
use crate::math::{AsymmetricError, percentile_band};

#[derive(Debug, Clone, PartialEq)]
pub enum EstimateError {
    /// The covariance has no Cholesky factor.
    NotPositiveDefinite,
    /// Too many draws produced non-finite quantities.
    InsufficientSamples { accepted: usize, attempts: usize },
}

impl fmt::Display for EstimateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimateError::NotPositiveDefinite => write!(f, "covariance matrix is not positive definite"),
            EstimateError::InsufficientSamples { accepted, attempts } => {
                write!(f, "only {accepted} finite samples after {attempts} draws")
            }
        }
    }
}

impl std::error::Error for EstimateError {}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEstimates {
    pub mass: AsymmetricError,
    pub x1: AsymmetricError,
    pub x2: AsymmetricError,
    pub accepted: usize,
    pub attempts: usize,
}

impl ErrorEstimates {
    /// Attach the bands to `solution` and flag it.
    pub fn apply_to(&self, solution: &mut DiTauSolution) {
        solution.mass_error = Some(self.mass);
        solution.leg1.x_error = Some(self.x1);
        solution.leg2.x_error = Some(self.x2);
        solution.has_error_estimates = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UncertaintyEstimator {
    num_samplings: usize,
    max_attempts_factor: usize,
}

impl UncertaintyEstimator {
    /// Even sample counts are bumped to the next odd number so the median is a
    /// single sample.
    pub fn new(num_samplings: usize, max_attempts_factor: usize) -> Self {
        let num_samplings = if num_samplings > 0 && num_samplings % 2 == 0 {
            num_samplings + 1
        } else {
            num_samplings
        };
        Self {
            num_samplings,
            max_attempts_factor: max_attempts_factor.max(1),
        }
    }

    pub fn num_samplings(&self) -> usize {
        self.num_samplings
    }

    pub fn max_attempts(&self) -> usize {
        self.num_samplings.saturating_mul(self.max_attempts_factor)
    }

    /// Resample the `free` entries of `optimum` with `covariance` (ordered like
    /// `free`) and summarise the tracked quantities.
    pub fn estimate<R: Rng>(
        &self,
        template: &DiTauSolution,
        optimum: &[f64],
        free: &[usize],
        covariance: &DMatrix<f64>,
        rng: &mut R,
    ) -> Result<ErrorEstimates, EstimateError> {
        let n = free.len();
        if n == 0 || covariance.nrows() != n || covariance.ncols() != n {
            return Err(EstimateError::NotPositiveDefinite);
        }
        let l = covariance
            .clone()
            .cholesky()
            .ok_or(EstimateError::NotPositiveDefinite)?
            .l();

        let target = self.num_samplings;
        let mut masses = Vec::with_capacity(target);
        let mut x1s = Vec::with_capacity(target);
        let mut x2s = Vec::with_capacity(target);

        let max_attempts = self.max_attempts();
        let mut attempts = 0;
        while masses.len() < target && attempts < max_attempts {
            attempts += 1;

            let z = DVector::<f64>::from_fn(n, |_, _| rng.sample(StandardNormal));
            let shift = &l * z;
            let mut x = optimum.to_vec();
            for (k, &index) in free.iter().enumerate() {
                x[index] += shift[k];
            }

            let mut solution = template.clone();
            apply_parameters(&mut solution, &x);
            let (mass, x1, x2) = (solution.mass(), solution.leg1.x(), solution.leg2.x());
            if !(mass.is_finite() && x1.is_finite() && x2.is_finite()) {
                tracing::trace!(attempts, "rejected non-finite sample");
                continue;
            }
            masses.push(mass);
            x1s.push(x1);
            x2s.push(x2);
        }

        let accepted = masses.len();
        if accepted < target || target == 0 {
            return Err(EstimateError::InsufficientSamples { accepted, attempts });
        }

        let band = |values: &mut Vec<f64>| {
            percentile_band(values)
                .map(|(_, band)| band)
                .ok_or(EstimateError::InsufficientSamples { accepted, attempts })
        };
        Ok(ErrorEstimates {
            mass: band(&mut masses)?,
            x1: band(&mut x1s)?,
            x2: band(&mut x2s)?,
            accepted,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DiTauCandidate, Leg, LegKind, Polarization, VisibleLeg};
    use crate::fit::parameters::{LegParameter, NUM_FIT_PARAMETERS};
    use crate::math::FourMomentum;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn template(leg2_e: f64) -> DiTauSolution {
        let candidate = DiTauCandidate::new(
            VisibleLeg::new(FourMomentum::new(40.0, 0.0, 0.0, 40.0003), LegKind::Hadron),
            VisibleLeg::new(FourMomentum::new(-35.0, 0.0, 10.0, leg2_e), LegKind::Hadron),
        );
        DiTauSolution::template(&candidate, Polarization::Unknown, Polarization::Unknown)
    }

    fn optimum() -> Vec<f64> {
        let mut x = vec![0.0; NUM_FIT_PARAMETERS];
        for leg in Leg::BOTH {
            x[leg.index(LegParameter::ThetaRest)] = 1.0;
            x[leg.index(LegParameter::PhiLab)] = 0.3;
        }
        x
    }

    fn free() -> Vec<usize> {
        Leg::BOTH
            .iter()
            .flat_map(|leg| [leg.index(LegParameter::ThetaRest), leg.index(LegParameter::PhiLab)])
            .collect()
    }

    #[test]
    fn even_sample_counts_become_odd() {
        let estimator = UncertaintyEstimator::new(100, 100);
        assert_eq!(estimator.num_samplings(), 101);
        assert_eq!(UncertaintyEstimator::new(7, 100).num_samplings(), 7);
        assert_eq!(UncertaintyEstimator::new(0, 100).num_samplings(), 0);

        let mut rng = StdRng::seed_from_u64(7);
        let cov = DMatrix::from_diagonal_element(4, 4, 0.01);
        let estimates = estimator
            .estimate(&template(36.402), &optimum(), &free(), &cov, &mut rng)
            .unwrap();
        assert_eq!(estimates.accepted, 101);
        assert!(estimates.mass.up >= 0.0 && estimates.mass.down >= 0.0);
        assert!(estimates.x1.up >= 0.0 && estimates.x2.down >= 0.0);
        assert!(estimates.mass.up + estimates.mass.down > 0.0);
    }

    #[test]
    fn non_positive_definite_covariance_is_rejected() {
        let estimator = UncertaintyEstimator::new(11, 100);
        let mut rng = StdRng::seed_from_u64(1);
        let mut cov = DMatrix::from_diagonal_element(4, 4, 0.01);
        cov[(2, 2)] = -1.0;
        let err = estimator
            .estimate(&template(36.402), &optimum(), &free(), &cov, &mut rng)
            .unwrap_err();
        assert_eq!(err, EstimateError::NotPositiveDefinite);
    }

    #[test]
    fn persistent_non_finite_samples_exhaust_the_retry_cap() {
        // visible mass above the tau mass: every sample is non-finite
        let estimator = UncertaintyEstimator::new(5, 2);
        let mut rng = StdRng::seed_from_u64(3);
        let cov = DMatrix::from_diagonal_element(4, 4, 0.01);
        let err = estimator
            .estimate(&template(40.0), &optimum(), &free(), &cov, &mut rng)
            .unwrap_err();
        assert_eq!(err, EstimateError::InsufficientSamples { accepted: 0, attempts: 10 });
    }

    #[test]
    fn same_seed_gives_same_band() {
        let estimator = UncertaintyEstimator::new(21, 100);
        let cov = DMatrix::from_diagonal_element(4, 4, 0.02);
        let a = estimator
            .estimate(&template(36.402), &optimum(), &free(), &cov, &mut StdRng::seed_from_u64(9))
            .unwrap();
        let b = estimator
            .estimate(&template(36.402), &optimum(), &free(), &cov, &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a, b);
    }
}
