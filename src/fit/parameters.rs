//! Fit parameter layout and the per-run parameter table.
//!
//! The parameter vector has a fixed layout of 19 entries:
//!
//! - `0..3`: production vertex shift `(x, y, z)` in cm
//! - `3..11`: first leg, see [`LegParameter`]
//! - `11..19`: second leg
//!
//! Start values, step sizes and bounds are derived from the candidate and can be
//! overridden per parameter name through [`ParameterOverride`].

use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::domain::{DiTauCandidate, Leg, ParameterOverride, VisibleLeg};
use crate::error::AppError;
use crate::kinematics::constants::{TAU_C_TAU, TAU_MASS};

pub const NUM_VERTEX_PARAMETERS: usize = 3;
pub const NUM_FIT_PARAMETERS: usize = NUM_VERTEX_PARAMETERS + 2 * LegParameter::COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexParameter {
    X,
    Y,
    Z,
}

impl VertexParameter {
    pub const ALL: [VertexParameter; 3] = [VertexParameter::X, VertexParameter::Y, VertexParameter::Z];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            VertexParameter::X => "pv_x",
            VertexParameter::Y => "pv_y",
            VertexParameter::Z => "pv_z",
        }
    }
}

/// Per-leg parameters, in layout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegParameter {
    /// Gottfried–Jackson angle of the visible system in the tau rest frame.
    ThetaRest,
    /// Azimuth of the tau direction around the visible momentum.
    PhiLab,
    /// Tau flight distance in the lab, cm.
    FlightPath,
    /// Invariant mass of the neutrino system.
    NuInvMass,
    ThetaVmRho,
    ThetaVmA1,
    ThetaVmA1r,
    PhiVmA1r,
}

impl LegParameter {
    pub const COUNT: usize = 8;

    pub const ALL: [LegParameter; LegParameter::COUNT] = [
        LegParameter::ThetaRest,
        LegParameter::PhiLab,
        LegParameter::FlightPath,
        LegParameter::NuInvMass,
        LegParameter::ThetaVmRho,
        LegParameter::ThetaVmA1,
        LegParameter::ThetaVmA1r,
        LegParameter::PhiVmA1r,
    ];

    /// Position inside the leg's block.
    pub fn offset(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            LegParameter::ThetaRest => "theta_rest",
            LegParameter::PhiLab => "phi_lab",
            LegParameter::FlightPath => "flight_path",
            LegParameter::NuInvMass => "nu_inv_mass",
            LegParameter::ThetaVmRho => "theta_vm_rho",
            LegParameter::ThetaVmA1 => "theta_vm_a1",
            LegParameter::ThetaVmA1r => "theta_vm_a1r",
            LegParameter::PhiVmA1r => "phi_vm_a1r",
        }
    }

    /// Parameters that determine the tau four-momentum.
    pub fn is_kinematic(self) -> bool {
        matches!(
            self,
            LegParameter::ThetaRest | LegParameter::PhiLab | LegParameter::NuInvMass
        )
    }
}

impl Leg {
    /// Index of the first parameter of this leg's block.
    pub fn parameter_offset(self) -> usize {
        match self {
            Leg::First => NUM_VERTEX_PARAMETERS,
            Leg::Second => NUM_VERTEX_PARAMETERS + LegParameter::COUNT,
        }
    }

    pub fn index(self, parameter: LegParameter) -> usize {
        self.parameter_offset() + parameter.offset()
    }
}

/// Split a global index into its leg and leg parameter. Vertex indices give `None`.
pub fn leg_parameter(index: usize) -> Option<(Leg, LegParameter)> {
    if !(NUM_VERTEX_PARAMETERS..NUM_FIT_PARAMETERS).contains(&index) {
        return None;
    }
    let rel = index - NUM_VERTEX_PARAMETERS;
    let leg = if rel < LegParameter::COUNT { Leg::First } else { Leg::Second };
    Some((leg, LegParameter::ALL[rel % LegParameter::COUNT]))
}

pub fn parameter_name(index: usize) -> String {
    match leg_parameter(index) {
        Some((leg, p)) => format!("{}_{}", leg.label(), p.name()),
        None => VertexParameter::ALL
            .get(index)
            .map(|v| v.name().to_string())
            .unwrap_or_else(|| format!("p{index}")),
    }
}

pub fn parameter_index(name: &str) -> Option<usize> {
    (0..NUM_FIT_PARAMETERS).find(|&i| parameter_name(i) == name)
}

/// One entry of the parameter table.
#[derive(Debug, Clone, PartialEq)]
pub struct FitParameter {
    pub index: usize,
    pub name: String,
    /// `None` means unbounded.
    pub bounds: Option<(f64, f64)>,
    pub start: f64,
    pub step: f64,
    pub is_fixed: bool,
}

impl FitParameter {
    fn new(index: usize, start: f64, step: f64, bounds: Option<(f64, f64)>) -> Self {
        Self {
            index,
            name: parameter_name(index),
            bounds,
            start,
            step,
            is_fixed: false,
        }
    }

    /// Collapsed bounds or a non-positive step leave nothing to fit.
    pub fn is_degenerate(&self) -> bool {
        matches!(self.bounds, Some((lo, hi)) if lo >= hi) || !(self.step > 0.0)
    }

    pub fn clamp(&self, value: f64) -> f64 {
        match self.bounds {
            Some((lo, hi)) => value.clamp(lo, hi.max(lo)),
            None => value,
        }
    }
}

/// All 19 parameters for one minimization run.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTable {
    parameters: Vec<FitParameter>,
}

impl ParameterTable {
    /// Start values, steps and bounds for `candidate`, with `overrides` applied.
    pub fn for_candidate(
        candidate: &DiTauCandidate,
        overrides: &BTreeMap<String, ParameterOverride>,
    ) -> Result<Self, AppError> {
        let mut parameters = Vec::with_capacity(NUM_FIT_PARAMETERS);

        let vertex = candidate.vertex.as_ref().filter(|pv| pv.is_valid);
        let fallback_steps = [0.1, 0.1, 10.0];
        let vertex_bounds = [(-1.0, 1.0), (-1.0, 1.0), (-50.0, 50.0)];
        for v in VertexParameter::ALL {
            let i = v.index();
            let (start, step) = match vertex {
                Some(pv) => (pv.position[i], pv.covariance[i][i].max(0.0).sqrt()),
                None => (0.0, fallback_steps[i]),
            };
            parameters.push(FitParameter::new(i, start, step, Some(vertex_bounds[i])));
        }

        for leg in Leg::BOTH {
            let visible = candidate.leg(leg);
            for p in LegParameter::ALL {
                parameters.push(leg_parameter_defaults(leg, p, visible));
            }
        }

        let mut table = Self { parameters };
        table.apply_overrides(overrides)?;
        Ok(table)
    }

    fn apply_overrides(&mut self, overrides: &BTreeMap<String, ParameterOverride>) -> Result<(), AppError> {
        for (name, ov) in overrides {
            let index = parameter_index(name)
                .ok_or_else(|| AppError::config(format!("Unknown fit parameter in overrides: '{name}'.")))?;
            let param = &mut self.parameters[index];

            if ov.lower.is_some() || ov.upper.is_some() {
                let (lo0, hi0) = param.bounds.unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
                let lo = ov.lower.unwrap_or(lo0);
                let hi = ov.upper.unwrap_or(hi0);
                if lo > hi {
                    return Err(AppError::config(format!(
                        "Invalid bounds for '{name}': lower {lo} > upper {hi}."
                    )));
                }
                param.bounds = Some((lo, hi));
            }
            if let Some(step) = ov.step {
                param.step = step;
            }
            if let Some(start) = ov.start {
                param.start = start;
            }
            param.start = param.clamp(param.start);
        }
        Ok(())
    }

    /// Recompute fixed/free status: a parameter is free iff some active term
    /// uses it and its range is not degenerate.
    pub fn lock_unused(&mut self, is_used: impl Fn(usize) -> bool) {
        for param in &mut self.parameters {
            param.is_fixed = !is_used(param.index) || param.is_degenerate();
        }
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FitParameter> {
        self.parameters.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FitParameter> {
        self.parameters.iter()
    }

    pub fn free_indices(&self) -> Vec<usize> {
        self.parameters.iter().filter(|p| !p.is_fixed).map(|p| p.index).collect()
    }

    pub fn n_free(&self) -> usize {
        self.parameters.iter().filter(|p| !p.is_fixed).count()
    }

    pub fn n_fixed(&self) -> usize {
        self.len() - self.n_free()
    }

    pub fn start_values(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.start).collect()
    }

    /// Clamp every entry of `x` into its parameter's bounds.
    pub fn clamp_all(&self, x: &mut [f64]) {
        for (value, param) in x.iter_mut().zip(&self.parameters) {
            *value = param.clamp(*value);
        }
    }
}

fn leg_parameter_defaults(leg: Leg, parameter: LegParameter, visible: &VisibleLeg) -> FitParameter {
    let index = leg.index(parameter);
    match parameter {
        LegParameter::ThetaRest
        | LegParameter::ThetaVmRho
        | LegParameter::ThetaVmA1
        | LegParameter::ThetaVmA1r => FitParameter::new(index, 0.25 * PI, 0.5 * PI, Some((0.0, PI))),
        LegParameter::PhiLab | LegParameter::PhiVmA1r => FitParameter::new(index, 0.0, PI, None),
        LegParameter::FlightPath => {
            let r0 = visible.p4.e * TAU_C_TAU / TAU_MASS;
            FitParameter::new(index, r0, r0, Some((0.0, 100.0 * r0)))
        }
        LegParameter::NuInvMass => {
            if visible.kind.has_massless_invisible() {
                FitParameter::new(index, 0.0, 1.0, Some((0.0, 0.0)))
            } else {
                let max = visible.max_invisible_mass();
                FitParameter::new(index, 0.8_f64.min(0.5 * max), 0.4, Some((0.0, max)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LegKind, PrimaryVertex};
    use crate::math::FourMomentum;

    fn candidate(kind1: LegKind, kind2: LegKind) -> DiTauCandidate {
        DiTauCandidate::new(
            VisibleLeg::new(FourMomentum::new(40.0, 0.0, 0.0, 40.0003), kind1),
            VisibleLeg::new(FourMomentum::new(-35.0, 0.0, 10.0, 36.402), kind2),
        )
    }

    #[test]
    fn layout_names_round_trip() {
        assert_eq!(NUM_FIT_PARAMETERS, 19);
        assert_eq!(parameter_name(0), "pv_x");
        assert_eq!(parameter_name(3), "leg1_theta_rest");
        assert_eq!(parameter_name(14), "leg2_flight_path");
        assert_eq!(parameter_name(18), "leg2_phi_vm_a1r");
        for i in 0..NUM_FIT_PARAMETERS {
            assert_eq!(parameter_index(&parameter_name(i)), Some(i));
        }
        assert_eq!(leg_parameter(Leg::Second.index(LegParameter::NuInvMass)), Some((Leg::Second, LegParameter::NuInvMass)));
        assert_eq!(leg_parameter(2), None);
    }

    #[test]
    fn hadronic_nu_mass_is_degenerate() {
        let table = ParameterTable::for_candidate(&candidate(LegKind::Hadron, LegKind::Muon), &BTreeMap::new()).unwrap();
        let had = table.get(Leg::First.index(LegParameter::NuInvMass)).unwrap();
        assert_eq!(had.bounds, Some((0.0, 0.0)));
        assert_eq!(had.start, 0.0);
        assert!(had.is_degenerate());

        let mu = table.get(Leg::Second.index(LegParameter::NuInvMass)).unwrap();
        assert!(!mu.is_degenerate());
        assert!(mu.start > 0.0);
    }

    #[test]
    fn invalid_vertex_uses_fallback_steps() {
        let mut c = candidate(LegKind::Muon, LegKind::Muon);
        c.vertex = Some(PrimaryVertex {
            position: [0.01, 0.02, 1.5],
            covariance: [[1e-4, 0.0, 0.0], [0.0, 4e-4, 0.0], [0.0, 0.0, 0.01]],
            is_valid: false,
        });
        let table = ParameterTable::for_candidate(&c, &BTreeMap::new()).unwrap();
        assert_eq!(table.get(2).unwrap().start, 0.0);
        assert_eq!(table.get(2).unwrap().step, 10.0);

        c.vertex.as_mut().unwrap().is_valid = true;
        let table = ParameterTable::for_candidate(&c, &BTreeMap::new()).unwrap();
        assert_eq!(table.get(1).unwrap().start, 0.02);
        assert!((table.get(1).unwrap().step - 0.02).abs() < 1e-12);
    }

    #[test]
    fn overrides_are_applied_and_validated() {
        let c = candidate(LegKind::Muon, LegKind::Muon);
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "leg1_theta_rest".to_string(),
            ParameterOverride {
                start: Some(2.0),
                upper: Some(1.5),
                ..Default::default()
            },
        );
        let table = ParameterTable::for_candidate(&c, &overrides).unwrap();
        let p = table.get(Leg::First.index(LegParameter::ThetaRest)).unwrap();
        assert_eq!(p.bounds, Some((0.0, 1.5)));
        assert_eq!(p.start, 1.5);

        overrides.insert("leg3_theta_rest".to_string(), ParameterOverride::default());
        let err = ParameterTable::for_candidate(&c, &overrides).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn locking_follows_usage() {
        let mut table = ParameterTable::for_candidate(&candidate(LegKind::Muon, LegKind::Electron), &BTreeMap::new()).unwrap();
        table.lock_unused(|i| i == 3 || i == 6);
        assert_eq!(table.free_indices(), vec![3, 6]);
        assert_eq!(table.n_free() + table.n_fixed(), NUM_FIT_PARAMETERS);
    }
}
