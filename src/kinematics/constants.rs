//! Physical constants (GeV, cm).

pub const TAU_MASS: f64 = 1.776_82;
pub const TAU_MASS2: f64 = TAU_MASS * TAU_MASS;

/// Proper decay length `c * tau` of the tau lepton, in cm.
pub const TAU_C_TAU: f64 = 8.711e-3;

pub const ELECTRON_MASS: f64 = 0.000_510_999;
pub const MUON_MASS: f64 = 0.105_658;
pub const CHARGED_PION_MASS: f64 = 0.139_570;
