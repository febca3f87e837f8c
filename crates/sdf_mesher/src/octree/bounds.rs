//! Half-open integer box partitioning the coordinate space of an index node.

use crate::coord::LatticeCoord;

/// Integer box `[min, max)` covered by one index node.
///
/// The box only steers partitioning: coordinates outside it are still routed
/// to the nearest octant, so nothing is ever rejected for being out of range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoordBounds {
	/// Minimum corner (inclusive).
	pub min: LatticeCoord,
	/// Maximum corner (exclusive).
	pub max: LatticeCoord,
}

impl CoordBounds {
	/// Create a box from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: LatticeCoord, max: LatticeCoord) -> Self {
		debug_assert!(
			min.i <= max.i && min.j <= max.j && min.k <= max.k,
			"bounds min must be <= max on all axes"
		);
		Self { min, max }
	}

	/// Box covering the lattice `[0, size)³`.
	pub fn lattice(size: usize) -> Self {
		Self::new(LatticeCoord::ZERO, LatticeCoord::splat(size as i32))
	}

	/// Per-axis extent.
	#[inline]
	pub fn extent(&self) -> LatticeCoord {
		self.max - self.min
	}

	/// Split point; octant bits are set for coordinates at or above it.
	#[inline]
	pub fn midpoint(&self) -> LatticeCoord {
		(self.min + self.max).div_floor(2)
	}

	/// A box narrower than 2 on every axis addresses a single coordinate and
	/// cannot be partitioned further.
	#[inline]
	pub fn can_split(&self) -> bool {
		let extent = self.extent();
		extent.i >= 2 || extent.j >= 2 || extent.k >= 2
	}

	/// Octant of `coord` relative to the midpoint: bit 0 = i, bit 1 = j, bit 2 = k.
	#[inline]
	pub fn octant(&self, coord: LatticeCoord) -> usize {
		let mid = self.midpoint();
		let mut n = 0;
		if coord.i >= mid.i {
			n |= 1;
		}
		if coord.j >= mid.j {
			n |= 2;
		}
		if coord.k >= mid.k {
			n |= 4;
		}
		n
	}

	/// Sub-box of the given octant, cut from the corners `[min, mid, max]`.
	pub fn child(&self, octant: usize) -> Self {
		let corners = [self.min, self.midpoint(), self.max];
		let bi = octant & 1;
		let bj = (octant >> 1) & 1;
		let bk = (octant >> 2) & 1;
		Self {
			min: LatticeCoord::new(corners[bi].i, corners[bj].j, corners[bk].k),
			max: LatticeCoord::new(corners[bi + 1].i, corners[bj + 1].j, corners[bk + 1].k),
		}
	}

	/// Check if the box contains a coordinate.
	#[inline]
	pub fn contains(&self, coord: LatticeCoord) -> bool {
		coord.i >= self.min.i
			&& coord.i < self.max.i
			&& coord.j >= self.min.j
			&& coord.j < self.max.j
			&& coord.k >= self.min.k
			&& coord.k < self.max.k
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_children_tile_parent() {
		let parent = CoordBounds::new(LatticeCoord::new(0, 2, 4), LatticeCoord::new(8, 6, 9));
		for i in 0..8 {
			for j in 2..6 {
				for k in 4..9 {
					let c = LatticeCoord::new(i, j, k);
					let owners: Vec<usize> = (0..8).filter(|&n| parent.child(n).contains(c)).collect();
					assert_eq!(owners, vec![parent.octant(c)], "{} must land in exactly one child", c);
				}
			}
		}
	}

	#[test]
	fn test_single_coordinate_cannot_split() {
		let unit = CoordBounds::new(LatticeCoord::new(5, 5, 5), LatticeCoord::new(6, 6, 6));
		assert!(!unit.can_split());

		let slab = CoordBounds::new(LatticeCoord::new(5, 5, 5), LatticeCoord::new(6, 7, 6));
		assert!(slab.can_split());
	}

	#[test]
	fn test_negative_midpoint_floors() {
		let b = CoordBounds::new(LatticeCoord::splat(-3), LatticeCoord::splat(0));
		assert_eq!(b.midpoint(), LatticeCoord::splat(-2));
	}
}
