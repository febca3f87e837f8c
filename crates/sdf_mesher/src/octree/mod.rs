//! Sparse coordinate index.
//!
//! Maps a [`LatticeCoord`] to zero or more values without allocating the
//! dense `gridSize³` array. The lattice is only interesting near the surface,
//! so most of the space never gets a node.
//!
//! # Structure
//!
//! ```text
//!                    Branch [0,48)³  mid = 24
//!          ┌──────────┬──────┴─────┬──────────┐
//!       octant 0   octant 1  ...  octant 6   octant 7
//!      [0,24)³    i∈[24,48)               [24,48)³
//!        Leaf       (none)                 Branch
//!      ≤ 8 entries                       ┌────┴────┐
//!                                      Leaf  ...  Leaf
//!
//! octant bits:  i >= mid → 1,  j >= mid → 2,  k >= mid → 4
//! ```
//!
//! A leaf that already addresses a single coordinate cannot split. Instead of
//! dropping entries it keeps growing past capacity; those insertions are
//! counted in [`CoordinateIndex::spilled`] and traced.
//!
//! # Module Structure
//!
//! - [`bounds`]: `CoordBounds` - half-open partition boxes
//! - `node`: leaf/branch storage and recursive insertion

pub mod bounds;
mod node;

pub use bounds::CoordBounds;

use node::{Entry, Inserted, Node};

use crate::coord::LatticeCoord;

/// Sparse multimap from lattice coordinates to values.
pub struct CoordinateIndex<T> {
  root: Node<T>,
  bounds: CoordBounds,
  len: usize,
  spilled: usize,
}

impl<T> CoordinateIndex<T> {
  /// Create an empty index partitioning `bounds`.
  pub fn new(bounds: CoordBounds) -> Self {
    Self {
      root: Node::leaf(bounds),
      bounds,
      len: 0,
      spilled: 0,
    }
  }

  /// Create an empty index over the lattice `[0, size)³`.
  pub fn for_lattice(size: usize) -> Self {
    Self::new(CoordBounds::lattice(size))
  }

  /// Insert `value` at `coord`. Duplicate coordinates are kept side by side.
  pub fn add(&mut self, coord: LatticeCoord, value: T) {
    if self.root.insert(coord, value) == Inserted::Spilled {
      self.spilled += 1;
      tracing::trace!(%coord, spilled = self.spilled, "index leaf over capacity");
    }
    self.len += 1;
  }

  /// First value stored at `coord`.
  pub fn get(&self, coord: LatticeCoord) -> Option<&T> {
    self.root.find(coord, |_| true)
  }

  /// First value stored at `coord` that satisfies `predicate`.
  ///
  /// Disambiguates coordinates holding several values, e.g. edges sharing
  /// their inside endpoint.
  pub fn get_with<P>(&self, coord: LatticeCoord, predicate: P) -> Option<&T>
  where
    P: FnMut(&T) -> bool,
  {
    self.root.find(coord, predicate)
  }

  /// Mutable access to the first value stored at `coord`.
  pub fn get_mut(&mut self, coord: LatticeCoord) -> Option<&mut T> {
    self.root.find_mut(coord, |_| true)
  }

  /// Mutable access to the first value at `coord` satisfying `predicate`.
  pub fn get_mut_with<P>(&mut self, coord: LatticeCoord, predicate: P) -> Option<&mut T>
  where
    P: FnMut(&T) -> bool,
  {
    self.root.find_mut(coord, predicate)
  }

  /// True if any value is stored at `coord`.
  pub fn contains(&self, coord: LatticeCoord) -> bool {
    self.get(coord).is_some()
  }

  /// Apply `f` to every stored value in place, in iteration order.
  pub fn map<F>(&mut self, mut f: F)
  where
    F: FnMut(&mut T),
  {
    self.root.for_each_mut(&mut f);
  }

  /// Lazily iterate `(coord, value)` pairs.
  ///
  /// The order is unspecified but stable as long as the index is not mutated.
  pub fn iter(&self) -> Iter<'_, T> {
    Iter {
      stack: vec![&self.root],
      current: [].iter(),
    }
  }

  /// Lazily iterate stored values.
  pub fn values(&self) -> impl Iterator<Item = &T> {
    self.iter().map(|(_, v)| v)
  }

  /// Number of stored values.
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Insertions that landed past capacity in an unsplittable leaf.
  pub fn spilled(&self) -> usize {
    self.spilled
  }

  /// Longest root-to-leaf path.
  pub fn depth(&self) -> usize {
    self.root.depth()
  }

  /// Partition box of the root.
  pub fn bounds(&self) -> CoordBounds {
    self.bounds
  }

  /// Drop every entry, keeping the root bounds.
  pub fn clear(&mut self) {
    *self = Self::new(self.bounds);
  }
}

impl<'a, T> IntoIterator for &'a CoordinateIndex<T> {
  type Item = (LatticeCoord, &'a T);
  type IntoIter = Iter<'a, T>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

/// Depth-first iterator over index entries.
pub struct Iter<'a, T> {
  stack: Vec<&'a Node<T>>,
  current: std::slice::Iter<'a, Entry<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
  type Item = (LatticeCoord, &'a T);

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if let Some((coord, value)) = self.current.next() {
        return Some((*coord, value));
      }
      match self.stack.pop()? {
        Node::Leaf(leaf) => self.current = leaf.entries.iter(),
        Node::Branch(branch) => {
          // Reversed so octant 0 is visited first
          self
            .stack
            .extend(branch.children.iter().rev().flatten());
        }
      }
    }
  }
}
