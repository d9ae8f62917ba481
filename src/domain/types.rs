//! Shared domain types.
//!
//! Inputs (`DiTauCandidate`, `EventContext`), outputs (`DiTauSolution`) and the
//! fit configuration are plain serde types so they can be:
//!
//! - built in-memory by callers embedding the engine
//! - read from / written to JSON by the `svfit` binary

use std::collections::BTreeMap;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::kinematics::constants::TAU_MASS;
use crate::math::{AsymmetricError, FourMomentum};

/// Reconstructed type of a visible tau decay product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegKind {
    Electron,
    Muon,
    Hadron,
}

impl LegKind {
    /// Hadronic decays emit a single neutrino, so the invisible system is massless.
    pub fn has_massless_invisible(self) -> bool {
        matches!(self, LegKind::Hadron)
    }

    pub fn label(self) -> &'static str {
        match self {
            LegKind::Electron => "e",
            LegKind::Muon => "mu",
            LegKind::Hadron => "had",
        }
    }
}

/// Reconstructed hadronic decay mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HadronicDecayMode {
    /// `tau -> pi nu`
    OneProng0Pi0,
    /// `tau -> rho nu -> pi pi0 nu`
    OneProng1Pi0,
    /// `tau -> a1 nu -> pi pi0 pi0 nu`
    OneProng2Pi0,
    /// `tau -> a1 nu -> 3pi nu`
    ThreeProng0Pi0,
    Other,
}

/// Visible decay products of one tau.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleLeg {
    pub p4: FourMomentum,
    pub kind: LegKind,
    /// Only meaningful for hadronic legs.
    #[serde(default)]
    pub decay_mode: Option<HadronicDecayMode>,
}

impl VisibleLeg {
    pub fn new(p4: FourMomentum, kind: LegKind) -> Self {
        Self {
            p4,
            kind,
            decay_mode: None,
        }
    }

    pub fn with_decay_mode(mut self, mode: HadronicDecayMode) -> Self {
        self.decay_mode = Some(mode);
        self
    }

    /// Visible mass, floored at zero.
    pub fn mass(&self) -> f64 {
        self.p4.mass().max(0.0)
    }

    /// Upper bound on the invariant mass of the neutrino system.
    pub fn max_invisible_mass(&self) -> f64 {
        if self.kind.has_massless_invisible() {
            0.0
        } else {
            (TAU_MASS - self.mass()).max(0.0)
        }
    }

    /// Finite components and strictly positive energy.
    pub fn is_valid(&self) -> bool {
        self.p4.is_finite() && self.p4.e > 0.0
    }
}

/// Refitted primary (tau production) vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryVertex {
    pub position: [f64; 3],
    pub covariance: [[f64; 3]; 3],
    #[serde(default = "default_true")]
    pub is_valid: bool,
}

fn default_true() -> bool {
    true
}

/// Measured missing transverse momentum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingEt {
    pub px: f64,
    pub py: f64,
    #[serde(default)]
    pub covariance: Option<[[f64; 2]; 2]>,
}

/// A pair of visible tau decay products plus event-level context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiTauCandidate {
    pub leg1: VisibleLeg,
    pub leg2: VisibleLeg,
    #[serde(default)]
    pub met: Option<MissingEt>,
    #[serde(default)]
    pub vertex: Option<PrimaryVertex>,
}

impl DiTauCandidate {
    pub fn new(leg1: VisibleLeg, leg2: VisibleLeg) -> Self {
        Self {
            leg1,
            leg2,
            met: None,
            vertex: None,
        }
    }

    pub fn leg(&self, leg: Leg) -> &VisibleLeg {
        match leg {
            Leg::First => &self.leg1,
            Leg::Second => &self.leg2,
        }
    }

    pub fn visible_p4(&self) -> FourMomentum {
        self.leg1.p4 + self.leg2.p4
    }
}

/// Per-event information handed to likelihood terms before fitting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    #[serde(default)]
    pub id: u64,
    /// Named missing-ET collections terms may look up by input name.
    #[serde(default)]
    pub met_collections: BTreeMap<String, MissingEt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Leg {
    #[serde(rename = "leg1")]
    First,
    #[serde(rename = "leg2")]
    Second,
}

impl Leg {
    pub const BOTH: [Leg; 2] = [Leg::First, Leg::Second];

    pub fn label(self) -> &'static str {
        match self {
            Leg::First => "leg1",
            Leg::Second => "leg2",
        }
    }
}

/// Discrete helicity hypothesis of one tau.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarization {
    Left,
    Right,
    #[default]
    Unknown,
}

impl Polarization {
    /// `-1` for left-handed, `+1` for right-handed, `0` when not hypothesised.
    pub fn sign(self) -> f64 {
        match self {
            Polarization::Left => -1.0,
            Polarization::Right => 1.0,
            Polarization::Unknown => 0.0,
        }
    }

    pub fn short(self) -> char {
        match self {
            Polarization::Left => 'L',
            Polarization::Right => 'R',
            Polarization::Unknown => '?',
        }
    }
}

/// Fitted state of one decay leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegSolution {
    pub p4_vis: FourMomentum,
    pub p4_invis: FourMomentum,
    pub p4_vis_rest: FourMomentum,
    pub p4_invis_rest: FourMomentum,
    pub flight_path: Vector3<f64>,
    pub theta_vm_rho: f64,
    pub theta_vm_a1: f64,
    pub theta_vm_a1r: f64,
    pub phi_vm_a1r: f64,
    pub polarization: Polarization,
    /// Band on the visible energy fraction, when resampling succeeded.
    pub x_error: Option<AsymmetricError>,
}

impl LegSolution {
    /// A leg with nothing fitted yet: the invisible system is empty.
    pub fn from_visible(p4_vis: FourMomentum, polarization: Polarization) -> Self {
        Self {
            p4_vis,
            p4_invis: FourMomentum::default(),
            p4_vis_rest: FourMomentum::default(),
            p4_invis_rest: FourMomentum::default(),
            flight_path: Vector3::zeros(),
            theta_vm_rho: 0.0,
            theta_vm_a1: 0.0,
            theta_vm_a1r: 0.0,
            phi_vm_a1r: 0.0,
            polarization,
            x_error: None,
        }
    }

    /// Full tau four-momentum.
    pub fn p4(&self) -> FourMomentum {
        self.p4_vis + self.p4_invis
    }

    /// Visible energy fraction `E_vis / E_tau`.
    pub fn x(&self) -> f64 {
        self.p4_vis.e / self.p4().e
    }

    /// Angle between the visible momentum in the tau rest frame and the tau
    /// flight direction.
    pub fn decay_angle_rest_frame(&self) -> f64 {
        let vis = self.p4_vis_rest.vect();
        let tau = self.p4().vect();
        let cos = vis.dot(&tau) / (vis.norm() * tau.norm());
        cos.clamp(-1.0, 1.0).acos()
    }

    pub fn flight_distance(&self) -> f64 {
        self.flight_path.norm()
    }
}

/// One full-event reconstruction for one polarization hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiTauSolution {
    /// Fitted production vertex position.
    pub vertex_position: Vector3<f64>,
    pub vertex_is_valid: bool,
    pub vertex_covariance: Matrix3<f64>,
    pub leg1: LegSolution,
    pub leg2: LegSolution,
    /// Term name → negative log-likelihood at the optimum.
    pub log_likelihoods: BTreeMap<String, f64>,
    pub fit_status: i32,
    pub n_free: usize,
    pub n_fixed: usize,
    pub min_objective: f64,
    pub mass_error: Option<AsymmetricError>,
    pub has_error_estimates: bool,
}

impl DiTauSolution {
    /// Unfitted template built from the candidate's visible legs.
    pub fn template(candidate: &DiTauCandidate, pol1: Polarization, pol2: Polarization) -> Self {
        let (vertex_is_valid, vertex_covariance) = match &candidate.vertex {
            Some(pv) if pv.is_valid => (true, Matrix3::from_fn(|r, c| pv.covariance[r][c])),
            _ => (false, Matrix3::zeros()),
        };
        Self {
            vertex_position: Vector3::zeros(),
            vertex_is_valid,
            vertex_covariance,
            leg1: LegSolution::from_visible(candidate.leg1.p4, pol1),
            leg2: LegSolution::from_visible(candidate.leg2.p4, pol2),
            log_likelihoods: BTreeMap::new(),
            fit_status: -1,
            n_free: 0,
            n_fixed: 0,
            min_objective: f64::NAN,
            mass_error: None,
            has_error_estimates: false,
        }
    }

    pub fn leg(&self, leg: Leg) -> &LegSolution {
        match leg {
            Leg::First => &self.leg1,
            Leg::Second => &self.leg2,
        }
    }

    pub fn leg_mut(&mut self, leg: Leg) -> &mut LegSolution {
        match leg {
            Leg::First => &mut self.leg1,
            Leg::Second => &mut self.leg2,
        }
    }

    /// Combined di-tau four-momentum.
    pub fn p4(&self) -> FourMomentum {
        self.leg1.p4() + self.leg2.p4()
    }

    pub fn mass(&self) -> f64 {
        self.p4().mass()
    }

    /// Summed neutrino four-momentum of both legs.
    pub fn invisible_p4(&self) -> FourMomentum {
        self.leg1.p4_invis + self.leg2.p4_invis
    }

    pub fn polarizations(&self) -> (Polarization, Polarization) {
        (self.leg1.polarization, self.leg2.polarization)
    }
}

/// What to do with a candidate whose visible legs are unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidCandidatePolicy {
    /// Reject the candidate before minimizing.
    #[default]
    Fail,
    /// Log the problem and let the objective evaluate to zero.
    Neutral,
}

/// Replacement start/step/bounds for one named fit parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverride {
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub step: Option<f64>,
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
}

/// Named configuration record for one likelihood term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermConfig {
    pub name: String,
    pub plugin_type: String,
    /// Logical input → collection name (e.g. `"met" → "pfMet"`).
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
    /// Target leg for single-leg terms.
    #[serde(default)]
    pub leg: Option<Leg>,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub name: String,
    /// Resampling draws per solution. `0` disables error estimation; even
    /// values are bumped to the next odd number.
    pub num_samplings: usize,
    pub max_iterations: u64,
    /// Minimizer strategy level `0`, `1` or `2`.
    pub strategy: u8,
    pub seed: u64,
    /// Run polarization hypotheses on the rayon pool.
    pub parallel: bool,
    pub invalid_candidate: InvalidCandidatePolicy,
    /// Resampling gives up after `factor * num_samplings` draws.
    pub max_sampling_attempts_factor: usize,
    pub parameter_overrides: BTreeMap<String, ParameterOverride>,
    pub likelihoods: Vec<TermConfig>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            name: "svfit".to_string(),
            num_samplings: 0,
            max_iterations: 1000,
            strategy: 2,
            seed: 0,
            parallel: false,
            invalid_candidate: InvalidCandidatePolicy::Fail,
            max_sampling_attempts_factor: 100,
            parameter_overrides: BTreeMap::new(),
            likelihoods: Vec::new(),
        }
    }
}
