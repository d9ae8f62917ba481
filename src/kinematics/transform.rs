//! Kinematic transform: fit parameters → full tau four-momenta.
//!
//! Each leg is described by the Gottfried–Jackson angle `theta*` of the visible
//! system in the tau rest frame, the azimuth `phi` of the tau around the visible
//! direction, the flight distance, and the invariant mass of the neutrino system.
//! Together with the measured visible four-momentum these fix the tau momentum:
//! the momentum transverse to the tau direction is boost invariant, which gives
//! the lab opening angle, and the longitudinal component gives the boost.

use nalgebra::Vector3;

use crate::domain::{DiTauSolution, Leg, LegSolution};
use crate::fit::parameters::{LegParameter, VertexParameter};
use crate::kinematics::constants::{TAU_MASS, TAU_MASS2};
use crate::math::FourMomentum;

/// Momentum of the visible system in the tau rest frame (two-body decay into
/// the visible system and a neutrino system of mass `nu_mass`).
pub fn p_vis_rest_frame(vis_mass: f64, nu_mass: f64) -> f64 {
    let sum = vis_mass + nu_mass;
    let diff = vis_mass - nu_mass;
    ((TAU_MASS2 - sum * sum) * (TAU_MASS2 - diff * diff)).sqrt() / (2.0 * TAU_MASS)
}

/// Opening angle between the tau and the visible system in the lab frame.
pub fn gj_angle_to_lab_frame(p_vis_rest: f64, gj_angle: f64, p_vis_lab: f64) -> f64 {
    (p_vis_rest * gj_angle.sin() / p_vis_lab).asin()
}

/// Magnitude of the tau momentum in the lab frame.
pub fn tau_momentum_lab_frame(vis_mass: f64, p_vis_rest: f64, gj_angle: f64, p_vis_lab: f64) -> f64 {
    let p_t = p_vis_rest * gj_angle.sin();
    let p_l = (p_vis_lab * p_vis_lab - p_t * p_t).max(0.0).sqrt();
    let p_l_rest = p_vis_rest * gj_angle.cos();
    let e_rest = (vis_mass * vis_mass + p_vis_rest * p_vis_rest).sqrt();

    let e_rest2 = e_rest * e_rest;
    let gamma = (e_rest * (e_rest2 + p_l * p_l - p_l_rest * p_l_rest).sqrt() - p_l_rest * p_l)
        / (e_rest2 - p_l_rest * p_l_rest);
    TAU_MASS * (gamma * gamma - 1.0).max(0.0).sqrt()
}

/// Rotate the visible direction by `angle` away from itself, at azimuth `phi`
/// around it.
pub fn tau_direction(p_vis_lab: &Vector3<f64>, angle: f64, phi: f64) -> Vector3<f64> {
    let u = p_vis_lab.normalize();
    let reference = if u.z.abs() < 0.9 { Vector3::z() } else { Vector3::x() };
    let v = reference.cross(&u).normalize();
    let w = u.cross(&v);
    u * angle.cos() + (v * phi.cos() + w * phi.sin()) * angle.sin()
}

pub fn tau_p4(direction: &Vector3<f64>, p_tau: f64) -> FourMomentum {
    FourMomentum::from_momentum_and_mass(&(direction * p_tau), TAU_MASS)
}

/// Apply one leg's block of parameters (see [`LegParameter`]) to `leg`.
pub fn apply_leg_parameters(leg: &mut LegSolution, params: &[f64]) {
    let get = |p: LegParameter| params[p.offset()];

    let vis = leg.p4_vis;
    let vis_mass = vis.mass().max(0.0);
    let gj_angle = get(LegParameter::ThetaRest);
    let p_vis_lab = vis.p();

    let p_star = p_vis_rest_frame(vis_mass, get(LegParameter::NuInvMass));
    let angle_lab = gj_angle_to_lab_frame(p_star, gj_angle, p_vis_lab);
    let p_tau = tau_momentum_lab_frame(vis_mass, p_star, gj_angle, p_vis_lab);
    let direction = tau_direction(&vis.vect(), angle_lab, get(LegParameter::PhiLab));

    let tau = tau_p4(&direction, p_tau);
    let invis = tau - vis;
    let beta = tau.boost_to_rest_frame();

    leg.p4_invis = invis;
    leg.p4_vis_rest = vis.boost(&beta);
    leg.p4_invis_rest = invis.boost(&beta);
    leg.flight_path = direction * get(LegParameter::FlightPath);
    leg.theta_vm_rho = get(LegParameter::ThetaVmRho);
    leg.theta_vm_a1 = get(LegParameter::ThetaVmA1);
    leg.theta_vm_a1r = get(LegParameter::ThetaVmA1r);
    leg.phi_vm_a1r = get(LegParameter::PhiVmA1r);
}

/// Map a full parameter vector onto `solution`.
pub fn apply_parameters(solution: &mut DiTauSolution, x: &[f64]) {
    solution.vertex_position = Vector3::new(
        x[VertexParameter::X.index()],
        x[VertexParameter::Y.index()],
        x[VertexParameter::Z.index()],
    );
    for leg in Leg::BOTH {
        let start = leg.parameter_offset();
        apply_leg_parameters(solution.leg_mut(leg), &x[start..start + LegParameter::COUNT]);
    }
}
