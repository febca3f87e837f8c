//! Index tree nodes.
//!
//! A leaf scans up to [`LEAF_CAPACITY`] entries linearly. On overflow it turns
//! into a branch with up to 8 lazily created children, and its entries are
//! redistributed before the new one is inserted.

use smallvec::SmallVec;

use super::bounds::CoordBounds;
use crate::constants::LEAF_CAPACITY;
use crate::coord::LatticeCoord;

pub(crate) type Entry<T> = (LatticeCoord, T);

/// Outcome of an insertion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Inserted {
  /// Stored within leaf capacity.
  Stored,
  /// Stored past capacity in a leaf that addresses a single coordinate.
  Spilled,
}

pub(crate) struct Leaf<T> {
  pub bounds: CoordBounds,
  pub entries: SmallVec<[Entry<T>; LEAF_CAPACITY]>,
}

pub(crate) struct Branch<T> {
  pub bounds: CoordBounds,
  pub children: [Option<Node<T>>; 8],
}

pub(crate) enum Node<T> {
  Leaf(Leaf<T>),
  Branch(Box<Branch<T>>),
}

impl<T> Node<T> {
  pub fn leaf(bounds: CoordBounds) -> Self {
    Node::Leaf(Leaf {
      bounds,
      entries: SmallVec::new(),
    })
  }

  pub fn insert(&mut self, coord: LatticeCoord, value: T) -> Inserted {
    match self {
      Node::Branch(branch) => branch.insert(coord, value),
      Node::Leaf(leaf) => {
        if leaf.entries.len() < LEAF_CAPACITY {
          leaf.entries.push((coord, value));
          return Inserted::Stored;
        }
        if !leaf.bounds.can_split() {
          leaf.entries.push((coord, value));
          return Inserted::Spilled;
        }

        let mut branch = Box::new(Branch::new(leaf.bounds));
        for (c, v) in leaf.entries.drain(..) {
          // A fresh child never overflows from redistribution alone
          branch.insert(c, v);
        }
        let inserted = branch.insert(coord, value);
        *self = Node::Branch(branch);
        inserted
      }
    }
  }

  pub fn find<P>(&self, coord: LatticeCoord, mut predicate: P) -> Option<&T>
  where
    P: FnMut(&T) -> bool,
  {
    let mut node = self;
    loop {
      match node {
        Node::Leaf(leaf) => {
          return leaf
            .entries
            .iter()
            .find(|(c, v)| *c == coord && predicate(v))
            .map(|(_, v)| v)
        }
        Node::Branch(branch) => {
          node = branch.children[branch.bounds.octant(coord)].as_ref()?;
        }
      }
    }
  }

  pub fn find_mut<P>(&mut self, coord: LatticeCoord, mut predicate: P) -> Option<&mut T>
  where
    P: FnMut(&T) -> bool,
  {
    let mut node = self;
    loop {
      match node {
        Node::Leaf(leaf) => {
          return leaf
            .entries
            .iter_mut()
            .find(|(c, v)| *c == coord && predicate(v))
            .map(|(_, v)| v)
        }
        Node::Branch(branch) => {
          let octant = branch.bounds.octant(coord);
          node = branch.children[octant].as_mut()?;
        }
      }
    }
  }

  pub fn for_each_mut<F>(&mut self, f: &mut F)
  where
    F: FnMut(&mut T),
  {
    match self {
      Node::Leaf(leaf) => leaf.entries.iter_mut().for_each(|(_, v)| f(v)),
      Node::Branch(branch) => {
        for child in branch.children.iter_mut().flatten() {
          child.for_each_mut(f);
        }
      }
    }
  }

  pub fn depth(&self) -> usize {
    match self {
      Node::Leaf(_) => 1,
      Node::Branch(branch) => {
        1 + branch
          .children
          .iter()
          .flatten()
          .map(Node::depth)
          .max()
          .unwrap_or(0)
      }
    }
  }
}

impl<T> Branch<T> {
  fn new(bounds: CoordBounds) -> Self {
    Self {
      bounds,
      children: Default::default(),
    }
  }

  fn insert(&mut self, coord: LatticeCoord, value: T) -> Inserted {
    let octant = self.bounds.octant(coord);
    let bounds = self.bounds;
    self.children[octant]
      .get_or_insert_with(|| Node::leaf(bounds.child(octant)))
      .insert(coord, value)
  }
}
