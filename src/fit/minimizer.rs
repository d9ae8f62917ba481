//! Minimization adapter over argmin's Nelder–Mead simplex.
//!
//! The objective is a closure over the full 19-entry parameter vector. The
//! adapter minimizes over the free subspace only: fixed entries keep their start
//! values and free entries are clamped into their bounds before every
//! evaluation.
//!
//! Strategy levels:
//!
//! - `0`: loose simplex tolerance, coarse Hessian steps
//! - `1`: default tolerance
//! - `2`: tight tolerance, one simplex restart from the first optimum, fine
//!   Hessian steps

use argmin::core::{CostFunction, Error, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;
use finitediff::FiniteDiff;
use nalgebra::DMatrix;

use crate::error::AppError;
use crate::fit::likelihood::NON_FINITE_PENALTY;
use crate::fit::parameters::ParameterTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinimizerSettings {
    pub max_iterations: u64,
    pub strategy: u8,
}

impl Default for MinimizerSettings {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            strategy: 2,
        }
    }
}

impl MinimizerSettings {
    /// Standard deviation of simplex costs below which the simplex has converged.
    pub fn sd_tolerance(&self) -> f64 {
        match self.strategy {
            0 => 1e-5,
            1 => 1e-7,
            _ => 1e-9,
        }
    }

    /// Hessian finite-difference step as a fraction of the parameter step.
    pub fn hessian_step_fraction(&self) -> f64 {
        match self.strategy {
            0 | 1 => 1e-2,
            _ => 1e-3,
        }
    }
}

/// Outcome category of one minimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinimizerStatus {
    Converged,
    /// Nothing to minimize; the start point is the result.
    NoFreeParameters,
    MaxIterations,
    BackendFailure,
}

impl MinimizerStatus {
    /// Numeric code stored on solutions.
    pub fn code(self) -> i32 {
        match self {
            MinimizerStatus::Converged => 0,
            MinimizerStatus::NoFreeParameters => 1,
            MinimizerStatus::MaxIterations => 4,
            MinimizerStatus::BackendFailure => 5,
        }
    }

    fn from_termination(status: &TerminationStatus) -> Self {
        match status {
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
            | TerminationStatus::Terminated(TerminationReason::TargetCostReached) => {
                MinimizerStatus::Converged
            }
            TerminationStatus::Terminated(TerminationReason::MaxItersReached) => MinimizerStatus::MaxIterations,
            _ => MinimizerStatus::BackendFailure,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MinimizerOutcome {
    /// Full parameter vector at the optimum.
    pub parameters: Vec<f64>,
    pub fval: f64,
    pub status: MinimizerStatus,
    pub n_free: usize,
    pub n_fixed: usize,
    pub n_iter: u64,
}

/// Objective restricted to the free parameters.
struct SubspaceProblem<'a, F> {
    objective: &'a F,
    table: &'a ParameterTable,
    free: &'a [usize],
    base: &'a [f64],
}

impl<F: Fn(&[f64]) -> f64> SubspaceProblem<'_, F> {
    fn expand(&self, sub: &[f64]) -> Vec<f64> {
        expand(self.table, self.free, self.base, sub)
    }
}

impl<F: Fn(&[f64]) -> f64> CostFunction for SubspaceProblem<'_, F> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        let value = (self.objective)(&self.expand(param));
        // The simplex sorts by cost, which must be totally ordered.
        Ok(if value.is_finite() { value } else { NON_FINITE_PENALTY })
    }
}

fn expand(table: &ParameterTable, free: &[usize], base: &[f64], sub: &[f64]) -> Vec<f64> {
    let mut full = base.to_vec();
    for (&index, &value) in free.iter().zip(sub) {
        full[index] = clamp_index(table, index, value);
    }
    full
}

fn clamp_index(table: &ParameterTable, index: usize, value: f64) -> f64 {
    table.get(index).map_or(value, |p| p.clamp(value))
}

#[derive(Debug, Clone)]
struct SimplexRun {
    best: Vec<f64>,
    fval: f64,
    n_iter: u64,
    status: MinimizerStatus,
}

/// Runs one or two simplex minimizations over the free parameters of a
/// [`ParameterTable`] and estimates the covariance at the optimum.
pub struct MinimizationAdapter<'a> {
    table: &'a ParameterTable,
    settings: MinimizerSettings,
}

impl<'a> MinimizationAdapter<'a> {
    pub fn new(table: &'a ParameterTable, settings: MinimizerSettings) -> Self {
        Self { table, settings }
    }

    pub fn minimize<F: Fn(&[f64]) -> f64>(&self, objective: &F) -> MinimizerOutcome {
        let mut base = self.table.start_values();
        self.table.clamp_all(&mut base);
        let free = self.table.free_indices();
        let n_free = free.len();
        let n_fixed = self.table.n_fixed();

        if free.is_empty() {
            let fval = objective(&base);
            return MinimizerOutcome {
                parameters: base,
                fval,
                status: MinimizerStatus::NoFreeParameters,
                n_free,
                n_fixed,
                n_iter: 0,
            };
        }

        let x0: Vec<f64> = free.iter().map(|&i| base[i]).collect();
        let steps: Vec<f64> = free.iter().map(|&i| self.step(i)).collect();

        let first = match self.run_simplex(objective, &free, &base, x0, &steps, self.settings.max_iterations) {
            Ok(run) => run,
            Err(err) => {
                tracing::warn!(error = %err, "simplex minimization failed");
                let fval = objective(&base);
                return MinimizerOutcome {
                    parameters: base,
                    fval,
                    status: MinimizerStatus::BackendFailure,
                    n_free,
                    n_fixed,
                    n_iter: 0,
                };
            }
        };

        let remaining = self.settings.max_iterations.saturating_sub(first.n_iter);
        let run = if self.settings.strategy >= 2 && first.status == MinimizerStatus::Converged && remaining > 0 {
            let fine_steps: Vec<f64> = steps.iter().map(|s| 0.1 * s).collect();
            match self.run_simplex(objective, &free, &base, first.best.clone(), &fine_steps, remaining) {
                Ok(second) => merge_restart(first, second),
                Err(err) => {
                    tracing::debug!(error = %err, "simplex restart failed, keeping first optimum");
                    first
                }
            }
        } else {
            first
        };

        tracing::debug!(
            fval = run.fval,
            n_iter = run.n_iter,
            status = ?run.status,
            n_free,
            "minimization finished"
        );

        MinimizerOutcome {
            parameters: expand(self.table, &free, &base, &run.best),
            fval: run.fval,
            status: run.status,
            n_free,
            n_fixed,
            n_iter: run.n_iter,
        }
    }

    fn step(&self, index: usize) -> f64 {
        self.table.get(index).map_or(1.0, |p| p.step)
    }

    fn run_simplex<F: Fn(&[f64]) -> f64>(
        &self,
        objective: &F,
        free: &[usize],
        base: &[f64],
        x0: Vec<f64>,
        steps: &[f64],
        max_iters: u64,
    ) -> Result<SimplexRun, AppError> {
        let simplex = self.initial_simplex(free, x0, steps);
        let problem = SubspaceProblem {
            objective,
            table: self.table,
            free,
            base,
        };
        let solver = NelderMead::new(simplex)
            .with_sd_tolerance(self.settings.sd_tolerance())
            .map_err(|e| AppError::fit(format!("Invalid simplex configuration: {e}")))?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.max_iters(max_iters))
            .run()
            .map_err(|e| AppError::fit(format!("Simplex minimization failed: {e}")))?;

        let state = res.state();
        let best = state
            .get_best_param()
            .ok_or_else(|| AppError::fit("Simplex returned no best parameters."))?
            .iter()
            .zip(free)
            .map(|(&v, &i)| clamp_index(self.table, i, v))
            .collect();

        Ok(SimplexRun {
            best,
            fval: state.get_best_cost(),
            n_iter: state.get_iter(),
            status: MinimizerStatus::from_termination(state.get_termination_status()),
        })
    }

    /// `x0` plus one vertex per free parameter displaced by its step. A vertex
    /// that a bound pushes back onto `x0` is displaced the other way instead.
    fn initial_simplex(&self, free: &[usize], x0: Vec<f64>, steps: &[f64]) -> Vec<Vec<f64>> {
        let mut simplex = Vec::with_capacity(free.len() + 1);
        for (k, &index) in free.iter().enumerate() {
            let mut vertex = x0.clone();
            let up = clamp_index(self.table, index, x0[k] + steps[k]);
            vertex[k] = if up != x0[k] {
                up
            } else {
                clamp_index(self.table, index, x0[k] - steps[k])
            };
            simplex.push(vertex);
        }
        simplex.insert(0, x0);
        simplex
    }

    /// Covariance of the free parameters at `optimum`: the inverse of the
    /// finite-difference Hessian of the objective. `None` when the Hessian is
    /// not positive definite or cannot be evaluated.
    ///
    /// The Hessian is taken in scaled coordinates `u`, with
    /// `x = centre + u * scale`, so that the fixed differentiation step of
    /// [`FiniteDiff`] lands on a per-parameter step `h` in `x`.
    pub fn covariance<F: Fn(&[f64]) -> f64>(&self, objective: &F, optimum: &[f64]) -> Option<DMatrix<f64>> {
        let free = self.table.free_indices();
        let n = free.len();
        if n == 0 {
            return None;
        }

        let mut centre = optimum.to_vec();
        let mut scale = vec![0.0; n];
        for (k, &index) in free.iter().enumerate() {
            let mut step = (self.step(index) * self.settings.hessian_step_fraction()).max(1e-8);
            if let Some((lo, hi)) = self.table.get(index).and_then(|p| p.bounds) {
                let width = hi - lo;
                if width < 4.0 * step {
                    step = 0.25 * width;
                }
                // The nested central stencil reaches two steps out.
                centre[index] = centre[index].clamp(lo + 2.0 * step, hi - 2.0 * step);
            }
            scale[k] = step / f64::EPSILON.sqrt();
        }

        let cost = |u: &Vec<f64>| -> f64 {
            let mut x = centre.clone();
            for ((&index, &uk), &sk) in free.iter().zip(u).zip(&scale) {
                x[index] += uk * sk;
            }
            objective(&x)
        };
        let gradient = |u: &Vec<f64>| -> Vec<f64> { u.central_diff(&cost) };

        let origin = vec![0.0; n];
        let mut hessian = origin.central_hessian(&gradient);
        if !all_finite(&hessian) {
            tracing::debug!("central Hessian not finite, retrying with forward differences");
            hessian = origin.forward_hessian(&gradient);
            if !all_finite(&hessian) {
                return None;
            }
        }
        symmetrize(&mut hessian);

        let hessian = DMatrix::from_fn(n, n, |i, j| hessian[i][j] / (scale[i] * scale[j]));
        // Negative log-likelihood with errordef 0.5: V = H^-1.
        hessian.cholesky().map(|chol| chol.inverse())
    }
}

fn all_finite(hessian: &[Vec<f64>]) -> bool {
    hessian.iter().flatten().all(|v| v.is_finite())
}

/// Average each off-diagonal pair in place.
fn symmetrize(hessian: &mut [Vec<f64>]) {
    for i in 0..hessian.len() {
        for j in 0..i {
            let mean = 0.5 * (hessian[i][j] + hessian[j][i]);
            hessian[i][j] = mean;
            hessian[j][i] = mean;
        }
    }
}

/// Combine a first simplex run with its restart. The better point wins; the
/// status always belongs to the run that produced the kept point.
fn merge_restart(first: SimplexRun, second: SimplexRun) -> SimplexRun {
    let n_iter = first.n_iter + second.n_iter;
    if second.fval <= first.fval {
        SimplexRun { n_iter, ..second }
    } else {
        SimplexRun { n_iter, ..first }
    }
}
