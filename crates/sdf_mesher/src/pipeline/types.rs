//! Per-run state shared between the pipeline and its stage workers.

use crate::octree::CoordinateIndex;
use crate::types::{DistanceGrid, DualVertex, Edge, LatticeGeometry, MeshBuffers};

/// Everything one meshing run produces, stage by stage.
///
/// Written by exactly one stage worker at a time, behind the pipeline's mutex.
/// The next stage only starts after the previous worker released the lock and
/// ended its progress, so each stage sees the complete output of the last.
pub struct RunData {
  pub geometry: LatticeGeometry,
  /// Stage 1 output.
  pub grid: DistanceGrid,
  /// Stage 2 output, keyed by the inside endpoint.
  pub edges: CoordinateIndex<Edge>,
  /// Stage 3 output, keyed by cell min corner.
  pub vertices: CoordinateIndex<DualVertex>,
  /// Assembled mesh waiting for the completion callback.
  pub mesh: Option<MeshBuffers>,
}

impl RunData {
  pub fn new(geometry: LatticeGeometry) -> Self {
    Self {
      geometry,
      grid: DistanceGrid::new(geometry.size),
      edges: CoordinateIndex::for_lattice(geometry.size),
      vertices: CoordinateIndex::for_lattice(geometry.size),
      mesh: None,
    }
  }

  /// Drop all stage outputs and adopt `geometry`.
  pub fn reset(&mut self, geometry: LatticeGeometry) {
    *self = Self::new(geometry);
  }
}
