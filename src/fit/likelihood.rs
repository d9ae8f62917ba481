//! Likelihood terms and their aggregation into one objective.
//!
//! A term is any type implementing [`LikelihoodTerm`]; the engine never looks
//! past the trait. Terms return negative log-likelihoods, so the aggregate is
//! a plain sum.

use std::collections::BTreeMap;

use crate::domain::{DiTauCandidate, DiTauSolution, EventContext};
use crate::error::AppError;
use crate::fit::parameters::NUM_FIT_PARAMETERS;
use crate::kinematics::apply_parameters;

/// Objective value handed to the minimizer in place of NaN or infinity.
pub const NON_FINITE_PENALTY: f64 = 1e10;

/// A pluggable negative log-likelihood contribution.
pub trait LikelihoodTerm: Send + Sync {
    /// Key under which the term's value is reported on each solution.
    fn name(&self) -> &str;

    /// Called once per event before any candidate of that event is fitted.
    fn begin_event(&mut self, _event: &EventContext) -> Result<(), AppError> {
        Ok(())
    }

    /// Called before each candidate is fitted.
    fn begin_candidate(&mut self, _candidate: &DiTauCandidate) -> Result<(), AppError> {
        Ok(())
    }

    /// Whether the term's value changes with parameter `index`.
    fn depends_on_parameter(&self, index: usize) -> bool;

    /// Terms that read `LegSolution::polarization` return `true`; this makes
    /// the engine enumerate the four helicity hypotheses.
    fn supports_polarization(&self) -> bool {
        false
    }

    /// Length of the parameter vector the term was written against.
    fn expected_parameter_count(&self) -> usize {
        NUM_FIT_PARAMETERS
    }

    fn evaluate(&self, candidate: &DiTauCandidate, solution: &DiTauSolution) -> f64;
}

/// Read-only view over the active terms.
#[derive(Clone, Copy)]
pub struct LikelihoodAggregator<'a> {
    terms: &'a [Box<dyn LikelihoodTerm>],
}

impl<'a> LikelihoodAggregator<'a> {
    pub fn new(terms: &'a [Box<dyn LikelihoodTerm>]) -> Self {
        Self { terms }
    }

    pub fn any_supports_polarization(&self) -> bool {
        self.terms.iter().any(|t| t.supports_polarization())
    }

    pub fn is_used(&self, index: usize) -> bool {
        self.terms.iter().any(|t| t.depends_on_parameter(index))
    }

    pub fn total(&self, candidate: &DiTauCandidate, solution: &DiTauSolution) -> f64 {
        self.terms.iter().map(|t| t.evaluate(candidate, solution)).sum()
    }

    /// Term name → value.
    pub fn breakdown(&self, candidate: &DiTauCandidate, solution: &DiTauSolution) -> BTreeMap<String, f64> {
        self.terms
            .iter()
            .map(|t| (t.name().to_string(), t.evaluate(candidate, solution)))
            .collect()
    }

    /// Objective at the full parameter vector `x`, starting from `template`.
    ///
    /// Non-finite totals are replaced by [`NON_FINITE_PENALTY`].
    pub fn objective(&self, candidate: &DiTauCandidate, template: &DiTauSolution, x: &[f64]) -> f64 {
        let mut solution = template.clone();
        apply_parameters(&mut solution, x);
        let value = self.total(candidate, &solution);
        if value.is_finite() {
            value
        } else {
            tracing::trace!(value, "non-finite objective replaced by penalty");
            NON_FINITE_PENALTY
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{LegKind, Polarization, VisibleLeg};
    use crate::math::FourMomentum;

    /// Term returning a constant and depending on a fixed set of indices.
    pub(crate) struct ConstantTerm {
        pub name: String,
        pub value: f64,
        pub uses: Vec<usize>,
        pub polarized: bool,
    }

    impl LikelihoodTerm for ConstantTerm {
        fn name(&self) -> &str {
            &self.name
        }

        fn depends_on_parameter(&self, index: usize) -> bool {
            self.uses.contains(&index)
        }

        fn supports_polarization(&self) -> bool {
            self.polarized
        }

        fn evaluate(&self, _candidate: &DiTauCandidate, _solution: &DiTauSolution) -> f64 {
            self.value
        }
    }

    pub(crate) fn constant(name: &str, value: f64, uses: Vec<usize>) -> Box<dyn LikelihoodTerm> {
        Box::new(ConstantTerm {
            name: name.to_string(),
            value,
            uses,
            polarized: false,
        })
    }

    fn candidate() -> DiTauCandidate {
        DiTauCandidate::new(
            VisibleLeg::new(FourMomentum::new(40.0, 0.0, 0.0, 40.0003), LegKind::Hadron),
            VisibleLeg::new(FourMomentum::new(-35.0, 0.0, 10.0, 36.402), LegKind::Hadron),
        )
    }

    #[test]
    fn total_is_sum_and_breakdown_is_keyed_by_name() {
        let terms = vec![constant("a", 1.5, vec![3]), constant("b", -0.5, vec![4, 5])];
        let agg = LikelihoodAggregator::new(&terms);
        let c = candidate();
        let s = DiTauSolution::template(&c, Polarization::Unknown, Polarization::Unknown);

        assert_eq!(agg.total(&c, &s), 1.0);
        let breakdown = agg.breakdown(&c, &s);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown["b"], -0.5);

        assert!(agg.is_used(5));
        assert!(!agg.is_used(0));
        assert!(!agg.any_supports_polarization());
    }

    #[test]
    fn non_finite_objective_is_penalized() {
        let terms = vec![constant("nan", f64::NAN, vec![3])];
        let agg = LikelihoodAggregator::new(&terms);
        let c = candidate();
        let s = DiTauSolution::template(&c, Polarization::Unknown, Polarization::Unknown);
        let x = vec![0.5; NUM_FIT_PARAMETERS];
        assert_eq!(agg.objective(&c, &s, &x), NON_FINITE_PENALTY);
    }
}
