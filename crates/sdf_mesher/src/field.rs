//! Distance field capability.
//!
//! Anything that can answer "signed distance at this point" can be meshed.
//! Closures `Fn(Vec3) -> f32` qualify directly.

use glam::Vec3;

use crate::constants::NORMAL_EPSILON;

/// Signed distance field: negative inside, positive outside.
pub trait DistanceField: Send + Sync {
  fn distance(&self, p: Vec3) -> f32;

  /// Unit surface normal at `p`. Defaults to the central-difference gradient.
  fn normal(&self, p: Vec3) -> Vec3 {
    gradient_normal(|q| self.distance(q), p, NORMAL_EPSILON)
  }
}

impl<F> DistanceField for F
where
  F: Fn(Vec3) -> f32 + Send + Sync,
{
  fn distance(&self, p: Vec3) -> f32 {
    self(p)
  }
}

/// Normalized central-difference gradient of `f` at `p`.
///
/// Falls back to +Y where the gradient vanishes.
pub fn gradient_normal<F>(f: F, p: Vec3, eps: f32) -> Vec3
where
  F: Fn(Vec3) -> f32,
{
  let dx = Vec3::new(eps, 0.0, 0.0);
  let dy = Vec3::new(0.0, eps, 0.0);
  let dz = Vec3::new(0.0, 0.0, eps);
  let gradient = Vec3::new(
    f(p + dx) - f(p - dx),
    f(p + dy) - f(p - dy),
    f(p + dz) - f(p - dz),
  );

  let len_sq = gradient.length_squared();
  if len_sq < 1e-20 || !len_sq.is_finite() {
    return Vec3::Y;
  }
  gradient * len_sq.sqrt().recip()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_closure_is_a_field() {
    let sphere = |p: Vec3| p.length() - 1.0;
    assert!((sphere.distance(Vec3::new(2.0, 0.0, 0.0)) - 1.0).abs() < 1e-6);
    assert!(sphere.distance(Vec3::ZERO) < 0.0);
  }

  #[test]
  fn test_sphere_normal_points_outward() {
    let sphere = |p: Vec3| p.length() - 1.0;
    let p = Vec3::new(0.3, -0.8, 0.52).normalize();
    let n = sphere.normal(p);
    assert!((n.length() - 1.0).abs() < 1e-4);
    assert!(n.dot(p) > 0.999, "normal {:?} should align with {:?}", n, p);
  }

  #[test]
  fn test_flat_field_falls_back_to_up() {
    let constant = |_: Vec3| 1.0;
    assert_eq!(constant.normal(Vec3::ZERO), Vec3::Y);
  }
}
