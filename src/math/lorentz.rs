//! Minimal Lorentz-vector algebra.
//!
//! Conventions: natural units (GeV), metric `(+, -, -, -)`, components stored
//! as `(px, py, pz, E)`. Three-vectors are `nalgebra::Vector3<f64>`.

use std::ops::{Add, Sub};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// A four-momentum `(px, py, pz, E)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FourMomentum {
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub e: f64,
}

impl FourMomentum {
    pub const fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e }
    }

    /// Build an on-shell four-momentum from a three-momentum and a mass.
    pub fn from_momentum_and_mass(p: &Vector3<f64>, mass: f64) -> Self {
        let e = (p.norm_squared() + mass * mass).sqrt();
        Self::new(p.x, p.y, p.z, e)
    }

    /// Build an on-shell four-momentum from collider coordinates.
    pub fn from_pt_eta_phi_m(pt: f64, eta: f64, phi: f64, mass: f64) -> Self {
        let p = Vector3::new(pt * phi.cos(), pt * phi.sin(), pt * eta.sinh());
        Self::from_momentum_and_mass(&p, mass)
    }

    pub fn vect(&self) -> Vector3<f64> {
        Vector3::new(self.px, self.py, self.pz)
    }

    /// Magnitude of the three-momentum.
    pub fn p(&self) -> f64 {
        self.vect().norm()
    }

    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    pub fn mass2(&self) -> f64 {
        self.e * self.e - self.vect().norm_squared()
    }

    /// Invariant mass. Space-like vectors return `-sqrt(-m²)`.
    pub fn mass(&self) -> f64 {
        let m2 = self.mass2();
        if m2 >= 0.0 { m2.sqrt() } else { -(-m2).sqrt() }
    }

    /// Unit vector along the three-momentum.
    ///
    /// A zero three-momentum yields a vector of NaNs.
    pub fn direction(&self) -> Vector3<f64> {
        self.vect() / self.p()
    }

    /// Velocity `β` of the frame in which this four-momentum is at rest,
    /// negated, i.e. the boost that takes the lab frame to the rest frame.
    pub fn boost_to_rest_frame(&self) -> Vector3<f64> {
        -self.vect() / self.e
    }

    /// Apply a pure Lorentz boost with velocity `beta`.
    pub fn boost(&self, beta: &Vector3<f64>) -> Self {
        let b2 = beta.norm_squared();
        let gamma = 1.0 / (1.0 - b2).sqrt();
        let bp = beta.dot(&self.vect());
        let gamma2 = if b2 > 0.0 { (gamma - 1.0) / b2 } else { 0.0 };
        let p = self.vect() + beta * (gamma2 * bp + gamma * self.e);
        Self::new(p.x, p.y, p.z, gamma * (self.e + bp))
    }

    pub fn is_finite(&self) -> bool {
        self.px.is_finite() && self.py.is_finite() && self.pz.is_finite() && self.e.is_finite()
    }
}

impl Add for FourMomentum {
    type Output = FourMomentum;

    fn add(self, rhs: FourMomentum) -> FourMomentum {
        FourMomentum::new(self.px + rhs.px, self.py + rhs.py, self.pz + rhs.pz, self.e + rhs.e)
    }
}

impl Sub for FourMomentum {
    type Output = FourMomentum;

    fn sub(self, rhs: FourMomentum) -> FourMomentum {
        FourMomentum::new(self.px - rhs.px, self.py - rhs.py, self.pz - rhs.pz, self.e - rhs.e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn boost_into_rest_frame_removes_momentum() {
        let p4 = FourMomentum::from_pt_eta_phi_m(45.0, 0.7, -1.2, 1.77);
        let rest = p4.boost(&p4.boost_to_rest_frame());
        assert!(rest.p() < 1e-9, "residual momentum {}", rest.p());
        assert_relative_eq!(rest.e, 1.77, epsilon = 1e-9);
    }

    #[test]
    fn mass_is_invariant_under_boosts() {
        let p4 = FourMomentum::new(3.0, -4.0, 12.0, 20.0);
        let boosted = p4.boost(&Vector3::new(0.1, 0.5, -0.3));
        assert_relative_eq!(boosted.mass(), p4.mass(), epsilon = 1e-9);
    }

    #[test]
    fn space_like_mass_is_negative() {
        let p4 = FourMomentum::new(3.0, 0.0, 0.0, 1.0);
        assert!(p4.mass() < 0.0);
        assert_relative_eq!(p4.mass2(), -8.0);
    }

    #[test]
    fn sum_and_difference_are_componentwise() {
        let a = FourMomentum::new(1.0, 2.0, 3.0, 10.0);
        let b = FourMomentum::new(-1.0, 0.5, 1.0, 4.0);
        assert_eq!((a + b) - b, a);
    }
}
