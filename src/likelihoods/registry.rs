//! Build likelihood terms from [`TermConfig`] records.
//!
//! `plugin_type` selects the term; `params` supplies its numeric settings,
//! `inputs` names event-level collections, and `leg` picks the target leg of
//! single-leg terms.

use crate::domain::{Leg, TermConfig};
use crate::error::AppError;
use crate::fit::likelihood::LikelihoodTerm;

use super::{
    DiTauBreitWigner, LegPhaseSpace, MassPenalty, MassWindow, MissingEtTerm, PrimaryVertexGaussian,
    TauDecayLength, TauToPiNuPolarization,
};

/// Every accepted `plugin_type`.
pub const PLUGIN_TYPES: [&str; 8] = [
    "DiTauBreitWigner",
    "MassPenalty",
    "MassWindow",
    "MissingEt",
    "LegPhaseSpace",
    "TauToPiNuPolarization",
    "TauDecayLength",
    "PrimaryVertexGaussian",
];

pub fn build_term(config: &TermConfig) -> Result<Box<dyn LikelihoodTerm>, AppError> {
    let name = config.name.clone();
    let term: Box<dyn LikelihoodTerm> = match config.plugin_type.as_str() {
        "DiTauBreitWigner" => Box::new(DiTauBreitWigner::new(
            name,
            required(config, "M")?,
            required(config, "Gamma")?,
        )),
        "MassPenalty" => Box::new(MassPenalty::new(name, required(config, "penaltyFactor")?)),
        "MassWindow" => Box::new(MassWindow::new(
            name,
            required(config, "min")?,
            required(config, "max")?,
            optional(config, "penalty", 1.0),
        )),
        "MissingEt" => {
            let mut term = MissingEtTerm::new(
                name,
                required(config, "sigma_parallel")?,
                required(config, "sigma_perp")?,
            )
            .with_bias_parallel(optional(config, "bias_parallel", 0.0));
            if let Some(collection) = config.inputs.get("met") {
                term = term.with_collection(collection.clone());
            }
            Box::new(term)
        }
        "LegPhaseSpace" => Box::new(LegPhaseSpace::new(name, leg(config)?)),
        "TauToPiNuPolarization" => {
            let mut term = TauToPiNuPolarization::new(name, leg(config)?)
                .with_sin_theta_factor(optional(config, "applySinThetaFactor", 0.0) != 0.0);
            if let Some(&threshold) = config.params.get("visPtCutThreshold") {
                term = term.with_vis_pt_cut(threshold);
            }
            Box::new(term)
        }
        "TauDecayLength" => Box::new(TauDecayLength::new(name, leg(config)?)),
        "PrimaryVertexGaussian" => Box::new(PrimaryVertexGaussian::new(name)),
        other => {
            return Err(AppError::config(format!(
                "Unknown plugin type '{other}' for term '{}'. Known types: {}.",
                config.name,
                PLUGIN_TYPES.join(", ")
            )));
        }
    };
    Ok(term)
}

/// Build all terms, rejecting duplicate names.
pub fn build_terms(configs: &[TermConfig]) -> Result<Vec<Box<dyn LikelihoodTerm>>, AppError> {
    let mut terms: Vec<Box<dyn LikelihoodTerm>> = Vec::with_capacity(configs.len());
    for config in configs {
        if terms.iter().any(|t| t.name() == config.name) {
            return Err(AppError::config(format!("Duplicate likelihood term name '{}'.", config.name)));
        }
        terms.push(build_term(config)?);
    }
    Ok(terms)
}

fn required(config: &TermConfig, key: &str) -> Result<f64, AppError> {
    config.params.get(key).copied().ok_or_else(|| {
        AppError::config(format!(
            "Term '{}' ({}) is missing required parameter '{key}'.",
            config.name, config.plugin_type
        ))
    })
}

fn optional(config: &TermConfig, key: &str, default: f64) -> f64 {
    config.params.get(key).copied().unwrap_or(default)
}

fn leg(config: &TermConfig) -> Result<Leg, AppError> {
    config.leg.ok_or_else(|| {
        AppError::config(format!(
            "Term '{}' ({}) needs a target leg (\"leg1\" or \"leg2\").",
            config.name, config.plugin_type
        ))
    })
}
