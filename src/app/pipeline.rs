//! Shared fit pipeline used by the CLI commands.
//!
//! config + event file -> engine -> per-candidate solutions
//!
//! The CLI then only has to print or export the outputs.

use crate::domain::{DiTauCandidate, DiTauSolution, FitConfig, HadronicDecayMode, LegKind, VisibleLeg};
use crate::error::AppError;
use crate::fit::{ParameterTable, SvFitEngine};
use crate::io::EventFile;
use crate::kinematics::constants::{CHARGED_PION_MASS, MUON_MASS};
use crate::math::FourMomentum;

/// All computed outputs of a single `svfit fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub event: u64,
    /// Solutions per candidate, in file order.
    pub solutions: Vec<Vec<DiTauSolution>>,
}

/// Build the engine from `config` and fit every candidate of `event`.
pub fn run_fit(config: &FitConfig, event: &EventFile) -> Result<RunOutput, AppError> {
    let mut engine = SvFitEngine::from_config(config.clone())?;
    engine.begin_event(&event.event)?;

    let mut solutions = Vec::with_capacity(event.candidates.len());
    for (i, candidate) in event.candidates.iter().enumerate() {
        tracing::debug!(candidate = i, "fitting");
        solutions.push(engine.fit(candidate)?);
    }

    Ok(RunOutput {
        event: event.event.id,
        solutions,
    })
}

/// Parameter table for the first candidate of `event` (or a reference
/// candidate), locked against the terms of `config` when one is given.
pub fn parameter_layout(config: Option<&FitConfig>, event: Option<&EventFile>) -> Result<ParameterTable, AppError> {
    let candidate = event
        .and_then(|e| e.candidates.first().cloned())
        .unwrap_or_else(reference_candidate);

    match config {
        Some(config) => {
            let mut engine = SvFitEngine::from_config(config.clone())?;
            if let Some(event) = event {
                engine.begin_event(&event.event)?;
            }
            engine.prepare_parameters(&candidate)
        }
        None => ParameterTable::for_candidate(&candidate, &Default::default()),
    }
}

/// A hadronic tau (`pi nu`) recoiling against a muon.
pub fn reference_candidate() -> DiTauCandidate {
    let pion = FourMomentum::from_pt_eta_phi_m(40.0, 0.3, 0.0, CHARGED_PION_MASS);
    let muon = FourMomentum::from_pt_eta_phi_m(30.0, -0.5, 2.8, MUON_MASS);
    DiTauCandidate::new(
        VisibleLeg::new(pion, LegKind::Hadron).with_decay_mode(HadronicDecayMode::OneProng0Pi0),
        VisibleLeg::new(muon, LegKind::Muon),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventContext, Leg, TermConfig};
    use crate::fit::LegParameter;

    fn mass_window_config() -> FitConfig {
        FitConfig {
            likelihoods: vec![TermConfig {
                name: "window".to_string(),
                plugin_type: "MassWindow".to_string(),
                inputs: Default::default(),
                params: [("min".to_string(), 80.0), ("max".to_string(), 100.0)].into_iter().collect(),
                leg: None,
            }],
            ..FitConfig::default()
        }
    }

    #[test]
    fn reference_candidate_is_valid() {
        let c = reference_candidate();
        assert!(c.leg1.is_valid() && c.leg2.is_valid());
        assert!((c.leg2.mass() - MUON_MASS).abs() < 1e-6);
    }

    #[test]
    fn layout_locks_against_configured_terms() {
        let raw = parameter_layout(None, None).unwrap();
        assert_eq!(raw.n_fixed(), 0);

        let locked = parameter_layout(Some(&mass_window_config()), None).unwrap();
        let flight = Leg::First.index(LegParameter::FlightPath);
        assert!(locked.get(flight).unwrap().is_fixed);
        assert!(!locked.get(Leg::Second.index(LegParameter::NuInvMass)).unwrap().is_fixed);
    }

    #[test]
    fn run_fit_returns_one_block_per_candidate() {
        let event = EventFile {
            event: EventContext {
                id: 12,
                ..EventContext::default()
            },
            candidates: vec![reference_candidate(), reference_candidate()],
        };
        let run = run_fit(&mass_window_config(), &event).unwrap();
        assert_eq!(run.event, 12);
        assert_eq!(run.solutions.len(), 2);
        assert_eq!(run.solutions[0], run.solutions[1]);
    }
}
