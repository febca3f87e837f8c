//! Analytic distance fields for tests, benches and debugging.
//!
//! Closed-form fields whose surfaces are easy to verify: planes, blobs and a
//! few degenerate cases that stress the pipeline (no surface at all, or a
//! surface through every cell).

use glam::Vec3;

use crate::field::DistanceField;

/// Plane `dot(normal, p) = offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaneField {
  /// Unit normal, pointing outside.
  pub normal: Vec3,
  pub offset: f32,
}

impl Default for PlaneField {
  fn default() -> Self {
    Self {
      normal: Vec3::Y,
      offset: 0.0,
    }
  }
}

impl PlaneField {
  pub fn new(normal: Vec3, offset: f32) -> Self {
    Self {
      normal: normal.normalize(),
      offset,
    }
  }

  /// Horizontal ground plane at `height`.
  pub fn ground(height: f32) -> Self {
    Self::new(Vec3::Y, height)
  }
}

impl DistanceField for PlaneField {
  fn distance(&self, p: Vec3) -> f32 {
    self.normal.dot(p) - self.offset
  }

  fn normal(&self, _p: Vec3) -> Vec3 {
    self.normal
  }
}

/// Plane through `y = height` tilted around Z.
///
/// `(y - height) * cos(angle) - x * sin(angle)`. Default tilt is 45°, so the
/// surface crosses cells at a non-axis-aligned angle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TiltedPlaneField {
  pub height: f32,
  /// Tilt in radians.
  pub angle: f32,
}

impl Default for TiltedPlaneField {
  fn default() -> Self {
    Self {
      height: 0.0,
      angle: std::f32::consts::FRAC_PI_4,
    }
  }
}

impl TiltedPlaneField {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_height(mut self, height: f32) -> Self {
    self.height = height;
    self
  }

  pub fn with_angle_degrees(mut self, degrees: f32) -> Self {
    self.angle = degrees.to_radians();
    self
  }
}

impl DistanceField for TiltedPlaneField {
  fn distance(&self, p: Vec3) -> f32 {
    (p.y - self.height) * self.angle.cos() - p.x * self.angle.sin()
  }
}

/// A single metaball influence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Metaball {
  pub center: Vec3,
  /// Radius of influence.
  pub radius: f32,
  /// Typically 1.0.
  pub strength: f32,
}

/// Blobby field: each ball contributes `strength * r² / d²`, the surface is
/// where the sum reaches `threshold`.
///
/// Not a true distance, but negative inside and positive outside.
#[derive(Clone, Debug, PartialEq)]
pub struct Metaballs {
  pub balls: Vec<Metaball>,
  pub threshold: f32,
}

impl Metaballs {
  pub fn new(balls: Vec<Metaball>, threshold: f32) -> Self {
    Self { balls, threshold }
  }

  /// `count` balls scattered in `[-extent, extent]³`, reproducible per seed.
  pub fn random(seed: u32, count: usize, extent: f32) -> Self {
    let mut rng = XorShift32::new(seed);
    let mut balls = Vec::with_capacity(count);
    for _ in 0..count {
      let x = (rng.next_f32() * 2.0 - 1.0) * extent;
      let y = (rng.next_f32() * 2.0 - 1.0) * extent;
      let z = (rng.next_f32() * 2.0 - 1.0) * extent;
      balls.push(Metaball {
        center: Vec3::new(x, y, z),
        radius: extent * (0.1 + rng.next_f32() * 0.3),
        strength: 1.0,
      });
    }
    Self {
      balls,
      threshold: 1.0,
    }
  }
}

impl DistanceField for Metaballs {
  fn distance(&self, p: Vec3) -> f32 {
    let field: f32 = self
      .balls
      .iter()
      .map(|ball| {
        let dist_sq = p.distance_squared(ball.center);
        let r_sq = ball.radius * ball.radius;
        if dist_sq < r_sq * 0.01 {
          // Saturate near the centre
          ball.strength * 100.0
        } else {
          ball.strength * r_sq / dist_sq
        }
      })
      .sum();
    self.threshold - field
  }
}

/// Same value everywhere. Positive values have no surface at all.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantField(pub f32);

impl DistanceField for ConstantField {
  fn distance(&self, _p: Vec3) -> f32 {
    self.0
  }
}

/// Alternating inside/outside per lattice cell of size `cell`.
///
/// Every lattice point differs in sign from all six neighbours when `cell`
/// equals the lattice spacing, so every cell gets a dual vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CheckerboardField {
  pub cell: f32,
  /// Added to the coordinates before snapping, to sample cell centres.
  pub origin: Vec3,
}

impl CheckerboardField {
  pub fn new(cell: f32) -> Self {
    Self {
      cell,
      origin: Vec3::ZERO,
    }
  }

  pub fn with_origin(mut self, origin: Vec3) -> Self {
    self.origin = origin;
    self
  }
}

impl DistanceField for CheckerboardField {
  fn distance(&self, p: Vec3) -> f32 {
    let cell = ((p - self.origin) / self.cell).round();
    let parity = (cell.x + cell.y + cell.z).rem_euclid(2.0);
    if parity < 0.5 {
      -1.0
    } else {
      1.0
    }
  }
}

/// xorshift32, deterministic across platforms.
struct XorShift32 {
  state: u32,
}

impl XorShift32 {
  fn new(seed: u32) -> Self {
    Self {
      state: if seed == 0 { 1 } else { seed },
    }
  }

  fn next(&mut self) -> u32 {
    let mut x = self.state;
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    self.state = x;
    x
  }

  fn next_f32(&mut self) -> f32 {
    (self.next() as f64 / u32::MAX as f64) as f32
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tilted_plane_crosses_origin() {
    let plane = TiltedPlaneField::default();
    assert!(plane.distance(Vec3::ZERO).abs() < 1e-6);
    assert!(plane.distance(Vec3::new(0.0, 1.0, 0.0)) > 0.0);
    assert!(plane.distance(Vec3::new(1.0, 0.0, 0.0)) < 0.0);
    // Normal is (-sin, cos, 0)
    let n = plane.normal(Vec3::new(3.0, 3.0, 1.0));
    assert!((n - Vec3::new(-1.0, 1.0, 0.0).normalize()).length() < 1e-3);
  }

  #[test]
  fn ground_plane_splits_space() {
    let plane = PlaneField::ground(2.0);
    assert_eq!(plane.distance(Vec3::new(5.0, 3.0, -1.0)), 1.0);
    assert_eq!(plane.distance(Vec3::new(0.0, 0.0, 0.0)), -2.0);
    assert_eq!(plane.normal(Vec3::ZERO), Vec3::Y);
  }

  #[test]
  fn metaballs_inside_near_centres() {
    let blobs = Metaballs::random(12345, 5, 4.0);
    assert_eq!(blobs.balls.len(), 5);
    for ball in &blobs.balls {
      assert!(ball.center.abs().max_element() <= 4.0);
      assert!(ball.radius >= 0.4 && ball.radius <= 1.6);
      assert!(blobs.distance(ball.center) < 0.0);
    }
    assert!(blobs.distance(Vec3::splat(1000.0)) > 0.0);
  }

  #[test]
  fn metaballs_deterministic() {
    assert_eq!(Metaballs::random(7, 4, 2.0), Metaballs::random(7, 4, 2.0));
    assert_ne!(Metaballs::random(7, 4, 2.0), Metaballs::random(8, 4, 2.0));
  }

  #[test]
  fn checkerboard_alternates() {
    let board = CheckerboardField::new(0.5);
    let d = board.distance(Vec3::ZERO);
    assert_eq!(d, -1.0);
    for offset in [Vec3::X, Vec3::Y, Vec3::Z, -Vec3::X] {
      assert_eq!(board.distance(offset * 0.5), 1.0);
    }
    assert_eq!(board.distance(Vec3::new(0.5, 0.5, 0.0)), -1.0);
  }

  #[test]
  fn constant_field_has_no_surface() {
    let field = ConstantField(1.0);
    assert_eq!(field.distance(Vec3::new(-3.0, 7.0, 0.1)), 1.0);
  }
}
