//! Enumeration of discrete polarization hypotheses.

use crate::domain::Polarization;

/// One independent minimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HypothesisRun {
    /// Position in enumeration order; also offsets the run's RNG seed.
    pub index: usize,
    pub leg1: Polarization,
    pub leg2: Polarization,
}

impl HypothesisRun {
    pub fn label(&self) -> String {
        format!("{}{}", self.leg1.short(), self.leg2.short())
    }
}

/// `LL, LR, RL, RR` when any term is polarization sensitive, otherwise a single
/// unpolarized run.
pub fn enumerate(supports_polarization: bool) -> Vec<HypothesisRun> {
    if !supports_polarization {
        return vec![HypothesisRun {
            index: 0,
            leg1: Polarization::Unknown,
            leg2: Polarization::Unknown,
        }];
    }

    let helicities = [Polarization::Left, Polarization::Right];
    helicities
        .iter()
        .flat_map(|&leg1| helicities.iter().map(move |&leg2| (leg1, leg2)))
        .enumerate()
        .map(|(index, (leg1, leg2))| HypothesisRun { index, leg1, leg2 })
        .collect()
}
