//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - fit inputs (`DiTauCandidate`, `VisibleLeg`, `MissingEt`, `PrimaryVertex`, `EventContext`)
//! - fit outputs (`DiTauSolution`, `LegSolution`)
//! - configuration (`FitConfig`, `TermConfig`, `ParameterOverride`)

pub mod types;

pub use types::*;
