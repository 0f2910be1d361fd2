use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{EPSILON, GOLDEN_ANGLE};

/// Point or direction in the cluster's 3D space.
///
/// Plain f64 components. Callers that feed results back into simulation state
/// are expected to check `is_finite` before committing them.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PartialEq for Vec3 {
    fn eq(&self, other: &Self) -> bool {
        (self.x - other.x).abs() < EPSILON
            && (self.y - other.y).abs() < EPSILON
            && (self.z - other.z).abs() < EPSILON
    }
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const X: Self = Self {
        x: 1.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn distance(self, other: Self) -> f64 {
        (other - self).length()
    }

    /// Normalize to unit length. Returns `None` below EPSILON magnitude.
    pub fn try_normalize(self) -> Option<Self> {
        let len = self.length();
        if len < EPSILON || !len.is_finite() {
            return None;
        }
        Some(self * (1.0 / len))
    }

    /// Clamp the magnitude to `max_len`, keeping direction.
    pub fn clamp_length(self, max_len: f64) -> Self {
        let len = self.length();
        if len > max_len && len > EPSILON {
            self * (max_len / len)
        } else {
            self
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn lerp(self, other: Self, t: f64) -> Self {
        self + (other - self) * t
    }

    /// Uniform random direction on the unit sphere.
    /// Gaussian components, rejecting the (vanishingly rare) near-zero draw.
    pub fn random_unit(rng: &mut impl Rng) -> Self {
        loop {
            let v = Self::new(gauss_random(rng), gauss_random(rng), gauss_random(rng));
            if let Some(unit) = v.try_normalize() {
                return unit;
            }
        }
    }

    /// Deterministic unit direction for index `i` on a golden-angle spiral.
    /// Successive indices are spread evenly over the sphere.
    pub fn spiral_direction(i: u64) -> Self {
        // Fixed 64-step lattice; larger indices wrap with a phase offset.
        const STEPS: f64 = 64.0;
        let k = (i % 64) as f64;
        let z = 1.0 - (2.0 * k + 1.0) / STEPS;
        let r = (1.0 - z * z).max(0.0).sqrt();
        let theta = (i as f64) * GOLDEN_ANGLE;
        Self::new(r * theta.cos(), r * theta.sin(), z)
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
        self.z -= rhs.z;
    }
}

/// Box-Muller transform for generating Gaussian-distributed random numbers.
fn gauss_random(rng: &mut impl Rng) -> f64 {
    // Clamp u1 away from 0 to avoid ln(0) = -inf
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    #[test]
    fn test_dot_and_length() {
        let a = Vec3::new(1.0, 2.0, 2.0);
        assert!((a.length() - 3.0).abs() < EPSILON);
        assert!((a.dot(Vec3::X) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_try_normalize_zero() {
        assert!(Vec3::ZERO.try_normalize().is_none());
        let n = Vec3::new(0.0, 0.0, 5.0).try_normalize().unwrap();
        assert_eq!(n, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_try_normalize_rejects_infinite() {
        assert!(Vec3::new(f64::INFINITY, 0.0, 0.0).try_normalize().is_none());
    }

    #[test]
    fn test_clamp_length() {
        let v = Vec3::new(3.0, 4.0, 0.0).clamp_length(1.0);
        assert!((v.length() - 1.0).abs() < 1e-12);
        let short = Vec3::new(0.1, 0.0, 0.0);
        assert_eq!(short.clamp_length(1.0), short);
    }

    #[test]
    fn test_random_unit() {
        let mut rng = rng();
        for _ in 0..200 {
            let v = Vec3::random_unit(&mut rng);
            assert!((v.length() - 1.0).abs() < 1e-10, "not unit: {v:?}");
        }
    }

    #[test]
    fn test_random_unit_covers_both_hemispheres() {
        let mut rng = rng();
        let ups = (0..200)
            .filter(|_| Vec3::random_unit(&mut rng).z > 0.0)
            .count();
        assert!(ups > 50 && ups < 150, "skewed distribution: {ups}/200 up");
    }

    #[test]
    fn test_spiral_direction_unit_and_distinct() {
        let a = Vec3::spiral_direction(0);
        let b = Vec3::spiral_direction(1);
        assert!((a.length() - 1.0).abs() < 1e-10);
        assert!((b.length() - 1.0).abs() < 1e-10);
        assert!(a.distance(b) > 0.1);
    }

    #[test]
    fn test_is_finite() {
        assert!(Vec3::new(1.0, 2.0, 3.0).is_finite());
        assert!(!Vec3::new(f64::NAN, 0.0, 0.0).is_finite());
        assert!(!Vec3::new(0.0, f64::NEG_INFINITY, 0.0).is_finite());
    }

    #[test]
    fn test_operators() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(0.5, 0.5, 0.5);
        assert_eq!(a + b, Vec3::new(1.5, 2.5, 3.5));
        assert_eq!(a - b, Vec3::new(0.5, 1.5, 2.5));
        assert_eq!(-a, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        let mut c = a;
        c += b;
        c -= b;
        assert_eq!(c, a);
    }

    #[test]
    fn test_lerp_midpoint() {
        let a = Vec3::ZERO;
        let b = Vec3::new(2.0, 0.0, 0.0);
        assert_eq!(a.lerp(b, 0.5), Vec3::new(1.0, 0.0, 0.0));
    }
}
