//! LatticeCoord - integer address of a lattice point or cell.
//!
//! Cells are addressed by their min corner, so a cell and the lattice point at
//! its lowest corner share a coordinate.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use glam::Vec3;

/// Integer lattice coordinate.
///
/// Ordered by `k`, then `j`, then `i` (the lattice scan order).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct LatticeCoord {
  pub i: i32,
  pub j: i32,
  pub k: i32,
}

impl LatticeCoord {
  pub const ZERO: Self = Self::new(0, 0, 0);

  pub const fn new(i: i32, j: i32, k: i32) -> Self {
    Self { i, j, k }
  }

  pub const fn splat(v: i32) -> Self {
    Self::new(v, v, v)
  }

  pub const fn from_array(a: [i32; 3]) -> Self {
    Self::new(a[0], a[1], a[2])
  }

  pub const fn to_array(self) -> [i32; 3] {
    [self.i, self.j, self.k]
  }

  /// True when every component lies in `[0, size)`.
  #[inline]
  pub fn in_lattice(self, size: usize) -> bool {
    let size = size as i32;
    (0..size).contains(&self.i) && (0..size).contains(&self.j) && (0..size).contains(&self.k)
  }

  /// Component-wise absolute value.
  #[inline]
  pub fn abs(self) -> Self {
    Self::new(self.i.abs(), self.j.abs(), self.k.abs())
  }

  /// Component-wise floor division, unlike `/` which truncates toward zero.
  #[inline]
  pub fn div_floor(self, rhs: i32) -> Self {
    Self::new(
      self.i.div_euclid(rhs),
      self.j.div_euclid(rhs),
      self.k.div_euclid(rhs),
    )
  }

  /// Components as floats, without any lattice scaling.
  #[inline]
  pub fn as_vec3(self) -> Vec3 {
    Vec3::new(self.i as f32, self.j as f32, self.k as f32)
  }
}

impl Ord for LatticeCoord {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .k
      .cmp(&other.k)
      .then(self.j.cmp(&other.j))
      .then(self.i.cmp(&other.i))
  }
}

impl PartialOrd for LatticeCoord {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Add for LatticeCoord {
  type Output = Self;

  fn add(self, rhs: Self) -> Self {
    Self::new(self.i + rhs.i, self.j + rhs.j, self.k + rhs.k)
  }
}

impl Sub for LatticeCoord {
  type Output = Self;

  fn sub(self, rhs: Self) -> Self {
    Self::new(self.i - rhs.i, self.j - rhs.j, self.k - rhs.k)
  }
}

impl Mul<i32> for LatticeCoord {
  type Output = Self;

  fn mul(self, rhs: i32) -> Self {
    Self::new(self.i * rhs, self.j * rhs, self.k * rhs)
  }
}

impl Mul<LatticeCoord> for i32 {
  type Output = LatticeCoord;

  fn mul(self, rhs: LatticeCoord) -> LatticeCoord {
    rhs * self
  }
}

impl Div<i32> for LatticeCoord {
  type Output = Self;

  fn div(self, rhs: i32) -> Self {
    Self::new(self.i / rhs, self.j / rhs, self.k / rhs)
  }
}

impl From<[i32; 3]> for LatticeCoord {
  fn from(a: [i32; 3]) -> Self {
    Self::from_array(a)
  }
}

impl fmt::Display for LatticeCoord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{} {} {}]", self.i, self.j, self.k)
  }
}

#[cfg(test)]
#[path = "coord_test.rs"]
mod coord_test;
