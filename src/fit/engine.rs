//! The reconstruction engine.
//!
//! Ties the pieces together for one candidate:
//!
//! 1. validate the candidate and notify terms (`begin_candidate`)
//! 2. build the parameter table and lock parameters no term uses
//! 3. enumerate polarization hypotheses
//! 4. per hypothesis: minimize, record the per-term breakdown, and optionally
//!    resample for error bands
//!
//! Hypothesis runs share nothing mutable, so they can run on the rayon pool.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::domain::{DiTauCandidate, DiTauSolution, EventContext, FitConfig, InvalidCandidatePolicy};
use crate::error::AppError;
use crate::fit::hypothesis::{HypothesisRun, enumerate};
use crate::fit::likelihood::{LikelihoodAggregator, LikelihoodTerm};
use crate::fit::minimizer::{MinimizationAdapter, MinimizerSettings};
use crate::fit::parameters::{NUM_FIT_PARAMETERS, ParameterTable, parameter_index};
use crate::fit::uncertainty::UncertaintyEstimator;
use crate::kinematics::apply_parameters;
use crate::likelihoods::build_terms;

pub struct SvFitEngine {
    terms: Vec<Box<dyn LikelihoodTerm>>,
    config: FitConfig,
    estimator: UncertaintyEstimator,
}

impl SvFitEngine {
    /// Validate the terms against the parameter layout and the configuration.
    pub fn new(terms: Vec<Box<dyn LikelihoodTerm>>, config: FitConfig) -> Result<Self, AppError> {
        for (i, term) in terms.iter().enumerate() {
            if terms[..i].iter().any(|t| t.name() == term.name()) {
                return Err(AppError::config(format!(
                    "Duplicate likelihood term name '{}'.",
                    term.name()
                )));
            }
        }
        for term in &terms {
            let expected = term.expected_parameter_count();
            if expected != NUM_FIT_PARAMETERS {
                return Err(AppError::config(format!(
                    "Term '{}' expects {expected} fit parameters, engine provides {NUM_FIT_PARAMETERS}.",
                    term.name()
                )));
            }
        }
        if config.strategy > 2 {
            return Err(AppError::config(format!(
                "Minimizer strategy must be 0, 1 or 2, got {}.",
                config.strategy
            )));
        }
        if let Some(name) = config.parameter_overrides.keys().find(|n| parameter_index(n).is_none()) {
            return Err(AppError::config(format!("Unknown fit parameter in overrides: '{name}'.")));
        }

        let estimator = UncertaintyEstimator::new(config.num_samplings, config.max_sampling_attempts_factor);
        if estimator.num_samplings() != config.num_samplings {
            tracing::info!(
                requested = config.num_samplings,
                used = estimator.num_samplings(),
                "number of samplings rounded up to an odd value"
            );
        }

        tracing::info!(
            name = %config.name,
            terms = terms.len(),
            num_samplings = estimator.num_samplings(),
            max_iterations = config.max_iterations,
            strategy = config.strategy,
            parallel = config.parallel,
            "engine configured"
        );
        for term in &terms {
            tracing::debug!(term = term.name(), polarized = term.supports_polarization(), "likelihood term");
        }

        Ok(Self {
            terms,
            config,
            estimator,
        })
    }

    /// Build the terms named in `config.likelihoods` and the engine around them.
    pub fn from_config(config: FitConfig) -> Result<Self, AppError> {
        let terms = build_terms(&config.likelihoods)?;
        Self::new(terms, config)
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    pub fn term_names(&self) -> Vec<&str> {
        self.terms.iter().map(|t| t.name()).collect()
    }

    pub fn begin_event(&mut self, event: &EventContext) -> Result<(), AppError> {
        tracing::debug!(event = event.id, "begin event");
        for term in &mut self.terms {
            term.begin_event(event)?;
        }
        Ok(())
    }

    /// Parameter table for `candidate` with unused parameters locked.
    pub fn prepare_parameters(&self, candidate: &DiTauCandidate) -> Result<ParameterTable, AppError> {
        let mut table = ParameterTable::for_candidate(candidate, &self.config.parameter_overrides)?;
        let aggregator = LikelihoodAggregator::new(&self.terms);
        table.lock_unused(|i| aggregator.is_used(i));
        Ok(table)
    }

    /// Fit every polarization hypothesis of `candidate`, in enumeration order.
    pub fn fit(&mut self, candidate: &DiTauCandidate) -> Result<Vec<DiTauSolution>, AppError> {
        let valid = candidate.leg1.is_valid() && candidate.leg2.is_valid();
        if !valid {
            match self.config.invalid_candidate {
                InvalidCandidatePolicy::Fail => {
                    return Err(AppError::input(
                        "Candidate has a visible leg with non-finite momentum or non-positive energy.",
                    ));
                }
                InvalidCandidatePolicy::Neutral => {
                    tracing::error!(
                        leg1 = ?candidate.leg1.p4,
                        leg2 = ?candidate.leg2.p4,
                        "invalid candidate, objective set to zero"
                    );
                }
            }
        }

        for term in &mut self.terms {
            term.begin_candidate(candidate)?;
        }

        let table = self.prepare_parameters(candidate)?;
        let runs = enumerate(LikelihoodAggregator::new(&self.terms).any_supports_polarization());
        tracing::debug!(
            hypotheses = runs.len(),
            n_free = table.n_free(),
            n_fixed = table.n_fixed(),
            "fitting candidate"
        );

        let this = &*self;
        let solutions = if this.config.parallel {
            runs.par_iter()
                .map(|run| this.fit_hypothesis(candidate, &table, run, valid))
                .collect()
        } else {
            runs.iter()
                .map(|run| this.fit_hypothesis(candidate, &table, run, valid))
                .collect()
        };
        Ok(solutions)
    }

    fn fit_hypothesis(
        &self,
        candidate: &DiTauCandidate,
        table: &ParameterTable,
        run: &HypothesisRun,
        valid: bool,
    ) -> DiTauSolution {
        let table = table.clone();
        let template = DiTauSolution::template(candidate, run.leg1, run.leg2);
        let aggregator = LikelihoodAggregator::new(&self.terms);
        let objective = |x: &[f64]| {
            if valid {
                aggregator.objective(candidate, &template, x)
            } else {
                0.0
            }
        };

        let settings = MinimizerSettings {
            max_iterations: self.config.max_iterations,
            strategy: self.config.strategy,
        };
        let adapter = MinimizationAdapter::new(&table, settings);
        let outcome = adapter.minimize(&objective);

        let mut solution = template.clone();
        apply_parameters(&mut solution, &outcome.parameters);
        // Terms are never evaluated on an invalid candidate.
        if valid {
            solution.log_likelihoods = aggregator.breakdown(candidate, &solution);
        }
        solution.fit_status = outcome.status.code();
        solution.n_free = outcome.n_free;
        solution.n_fixed = outcome.n_fixed;
        solution.min_objective = outcome.fval;

        if self.estimator.num_samplings() > 0 {
            let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(run.index as u64));
            match adapter.covariance(&objective, &outcome.parameters) {
                Some(covariance) => {
                    let free = table.free_indices();
                    match self
                        .estimator
                        .estimate(&template, &outcome.parameters, &free, &covariance, &mut rng)
                    {
                        Ok(estimates) => estimates.apply_to(&mut solution),
                        Err(err) => {
                            tracing::warn!(hypothesis = %run.label(), error = %err, "no error estimates");
                        }
                    }
                }
                None => {
                    tracing::warn!(
                        hypothesis = %run.label(),
                        "covariance matrix is not positive definite, no error estimates"
                    );
                }
            }
        }

        tracing::info!(
            hypothesis = %run.label(),
            mass = solution.mass(),
            status = solution.fit_status,
            fval = outcome.fval,
            n_iter = outcome.n_iter,
            "hypothesis fitted"
        );
        solution
    }
}
