//! Export fitted solutions to JSON.
//!
//! Each solution is written with its derived quantities (hypothesis label,
//! di-tau mass and transverse momentum) next to the raw fitted state, so the
//! file is easy to consume from downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::DiTauSolution;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ExportedSolution<'a> {
    pub hypothesis: String,
    pub mass: f64,
    pub pt: f64,
    #[serde(flatten)]
    pub solution: &'a DiTauSolution,
}

impl<'a> ExportedSolution<'a> {
    pub fn new(solution: &'a DiTauSolution) -> Self {
        let (p1, p2) = solution.polarizations();
        Self {
            hypothesis: format!("{}{}", p1.short(), p2.short()),
            mass: solution.mass(),
            pt: solution.p4().pt(),
            solution,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExportedCandidate<'a> {
    pub candidate: usize,
    pub solutions: Vec<ExportedSolution<'a>>,
}

#[derive(Debug, Serialize)]
pub struct SolutionsFile<'a> {
    pub tool: &'static str,
    pub event: u64,
    pub candidates: Vec<ExportedCandidate<'a>>,
}

impl<'a> SolutionsFile<'a> {
    pub fn new(event: u64, per_candidate: &'a [Vec<DiTauSolution>]) -> Self {
        let candidates = per_candidate
            .iter()
            .enumerate()
            .map(|(candidate, solutions)| ExportedCandidate {
                candidate,
                solutions: solutions.iter().map(ExportedSolution::new).collect(),
            })
            .collect();
        Self {
            tool: "svfit",
            event,
            candidates,
        }
    }
}

pub fn write_solutions<W: Write>(writer: W, file: &SolutionsFile<'_>) -> Result<(), AppError> {
    serde_json::to_writer_pretty(writer, file)
        .map_err(|e| AppError::input(format!("Failed to write solutions JSON: {e}")))
}

/// Write the solutions of every candidate in an event to a JSON file.
pub fn write_solutions_json(path: &Path, event: u64, per_candidate: &[Vec<DiTauSolution>]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create solutions JSON '{}': {e}", path.display())))?;
    write_solutions(file, &SolutionsFile::new(event, per_candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DiTauCandidate, LegKind, Polarization, VisibleLeg};
    use crate::math::FourMomentum;

    #[test]
    fn export_carries_derived_quantities() {
        let candidate = DiTauCandidate::new(
            VisibleLeg::new(FourMomentum::new(40.0, 0.0, 0.0, 40.0003), LegKind::Hadron),
            VisibleLeg::new(FourMomentum::new(-35.0, 0.0, 10.0, 36.402), LegKind::Hadron),
        );
        let mut solution = DiTauSolution::template(&candidate, Polarization::Left, Polarization::Right);
        solution.log_likelihoods.insert("bw".to_string(), 1.25);
        let per_candidate = vec![vec![solution.clone()]];

        let mut buf = Vec::new();
        write_solutions(&mut buf, &SolutionsFile::new(3, &per_candidate)).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(json["tool"], "svfit");
        assert_eq!(json["event"], 3);
        let exported = &json["candidates"][0]["solutions"][0];
        assert_eq!(exported["hypothesis"], "LR");
        assert!((exported["mass"].as_f64().unwrap() - solution.mass()).abs() < 1e-9);
        assert_eq!(exported["log_likelihoods"]["bw"], 1.25);
        assert_eq!(exported["leg1"]["polarization"], "left");
    }
}
