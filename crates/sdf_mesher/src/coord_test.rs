use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::*;

/// k dominates j, j dominates i.
#[test]
fn test_order_is_k_then_j_then_i() {
  let a = LatticeCoord::new(9, 9, 0);
  let b = LatticeCoord::new(0, 0, 1);
  assert!(a < b, "larger k must sort later regardless of i, j");

  let c = LatticeCoord::new(9, 0, 3);
  let d = LatticeCoord::new(0, 1, 3);
  assert!(c < d, "with equal k, larger j sorts later");

  let e = LatticeCoord::new(1, 2, 3);
  let f = LatticeCoord::new(2, 2, 3);
  assert!(e < f);
  assert_eq!(e.cmp(&e), Ordering::Equal);
}

#[test]
fn test_sorting_matches_scan_order() {
  let size = 3;
  let mut coords = Vec::new();
  for i in (0..size).rev() {
    for k in 0..size {
      for j in (0..size).rev() {
        coords.push(LatticeCoord::new(i, j, k));
      }
    }
  }
  coords.sort();

  let mut expected = Vec::new();
  for k in 0..size {
    for j in 0..size {
      for i in 0..size {
        expected.push(LatticeCoord::new(i, j, k));
      }
    }
  }
  assert_eq!(coords, expected);
}

#[test]
fn test_arithmetic() {
  let a = LatticeCoord::new(1, 2, 3);
  let b = LatticeCoord::new(4, -5, 6);

  assert_eq!(a + b, LatticeCoord::new(5, -3, 9));
  assert_eq!(a - b, LatticeCoord::new(-3, 7, -3));
  assert_eq!(a * 3, LatticeCoord::new(3, 6, 9));
  assert_eq!(3 * a, a * 3);
  assert_eq!(LatticeCoord::new(7, -7, 8) / 2, LatticeCoord::new(3, -3, 4));
  assert_eq!(
    LatticeCoord::new(7, -7, 8).div_floor(2),
    LatticeCoord::new(3, -4, 4)
  );
  assert_eq!((a - b).abs(), LatticeCoord::new(3, 7, 3));
}

#[test]
fn test_equal_coords_hash_equal() {
  let hash = |c: LatticeCoord| {
    let mut hasher = DefaultHasher::new();
    c.hash(&mut hasher);
    hasher.finish()
  };
  assert_eq!(hash(LatticeCoord::new(3, 1, 4)), hash(LatticeCoord::new(3, 1, 4)));
}

#[test]
fn test_in_lattice() {
  assert!(LatticeCoord::new(0, 0, 0).in_lattice(4));
  assert!(LatticeCoord::new(3, 3, 3).in_lattice(4));
  assert!(!LatticeCoord::new(4, 0, 0).in_lattice(4));
  assert!(!LatticeCoord::new(0, -1, 0).in_lattice(4));
}

#[test]
fn test_display() {
  assert_eq!(LatticeCoord::new(1, -2, 3).to_string(), "[1 -2 3]");
}
