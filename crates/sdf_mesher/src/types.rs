//! Core data types for dual-contouring meshing.

use glam::Vec3;
use smallvec::SmallVec;

use crate::constants::{
  cell_edge_length, BATCH_CAPACITY, DEFAULT_GRID_RADIUS, DEFAULT_GRID_SIZE, DISTANCE_MAX_ITERS,
  EPSILON, MAX_CONCURRENT_GROUPS, MAX_MESH_VERTICES, MIN_GRID_SIZE, RAYMARCH_MAX_ITERS,
  REFINE_MAX_ITERS, THREADS_PER_GROUP,
};
use crate::coord::LatticeCoord;
use crate::error::ConfigurationError;

// =============================================================================
// Pipeline step
// =============================================================================

/// Last completed pipeline stage. Monotonic within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AlgorithmStep {
  #[default]
  NotStarted,
  DistanceCalculated,
  EdgeIntersectionsFound,
  VerticesConstructed,
  Finished,
}

// =============================================================================
// Lattice geometry
// =============================================================================

/// Maps lattice coordinates to world positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatticeGeometry {
  /// Half-extent of the sampled cube.
  pub radius: f32,
  /// Lattice points per axis.
  pub size: usize,
  /// Distance between neighbouring lattice points.
  pub cell_edge: f32,
}

impl LatticeGeometry {
  pub fn new(radius: f32, size: usize) -> Self {
    Self {
      radius,
      size,
      cell_edge: cell_edge_length(radius, size),
    }
  }

  /// World position of a lattice point: `index * cell_edge - radius` per axis.
  #[inline]
  pub fn position(&self, c: LatticeCoord) -> Vec3 {
    c.as_vec3() * self.cell_edge - Vec3::splat(self.radius)
  }

  #[inline]
  pub fn contains(&self, c: LatticeCoord) -> bool {
    c.in_lattice(self.size)
  }

  /// Lattice points in the whole grid.
  pub fn point_count(&self) -> usize {
    self.size * self.size * self.size
  }
}

// =============================================================================
// Distance grid
// =============================================================================

/// Dense distance samples over `[0, size)³`, k-major.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceGrid {
  size: usize,
  values: Vec<f32>,
}

impl DistanceGrid {
  pub fn new(size: usize) -> Self {
    Self {
      size,
      values: vec![0.0; size * size * size],
    }
  }

  pub fn size(&self) -> usize {
    self.size
  }

  /// Distance at `c`, or `None` outside the lattice.
  #[inline]
  pub fn get(&self, c: LatticeCoord) -> Option<f32> {
    if !c.in_lattice(self.size) {
      return None;
    }
    Some(self.values[self.offset(c)])
  }

  #[inline]
  pub fn set(&mut self, c: LatticeCoord, distance: f32) {
    let offset = self.offset(c);
    self.values[offset] = distance;
  }

  /// Raw samples in scan order.
  pub fn as_slice(&self) -> &[f32] {
    &self.values
  }

  pub fn as_mut_slice(&mut self) -> &mut [f32] {
    &mut self.values
  }

  #[inline]
  fn offset(&self, c: LatticeCoord) -> usize {
    crate::constants::grid_index(c.i as usize, c.j as usize, c.k as usize, self.size)
  }
}

// =============================================================================
// Edges and dual vertices
// =============================================================================

/// Lattice edge crossing the surface.
///
/// `c0` is inside (`d0 <= 0`), `c1` outside (`d1 > 0`); the crossing point is
/// `t * P(c0) + (1 - t) * P(c1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
  pub c0: LatticeCoord,
  pub c1: LatticeCoord,
  pub d0: f32,
  pub d1: f32,
  pub t: f32,
  /// Surface normal at the crossing, when the evaluator reported one.
  pub normal: Option<Vec3>,
}

impl Edge {
  /// Edge with the linearly interpolated crossing parameter.
  pub fn new(c0: LatticeCoord, c1: LatticeCoord, d0: f32, d1: f32) -> Self {
    debug_assert!(d0 <= 0.0 && d1 > 0.0, "edge {c0} -> {c1} does not cross");
    let t = if (d1 - d0).abs() < EPSILON {
      0.5
    } else {
      d1 / (d1 - d0)
    };
    Self {
      c0,
      c1,
      d0,
      d1,
      t,
      normal: None,
    }
  }

  /// World position of the crossing.
  #[inline]
  pub fn crossing_point(&self, geometry: &LatticeGeometry) -> Vec3 {
    self.t * geometry.position(self.c0) + (1.0 - self.t) * geometry.position(self.c1)
  }

  /// Lower endpoint in lattice order.
  #[inline]
  pub fn base(&self) -> LatticeCoord {
    self.c0.min(self.c1)
  }

  /// The four cells around this edge, min corners in `k`, `j`, `i` scan
  /// order. Slots outside the lattice are `None`.
  ///
  /// ```text
  ///   b ▲
  ///     │  [2]       [3]
  ///     │      base
  ///     │  [0]       [1]
  ///     └──────────────▶ a      a, b: the two axes across the edge
  /// ```
  pub fn quad_cells(&self, size: usize) -> [Option<LatticeCoord>; 4] {
    let base = self.base();
    let along = (self.c1 - self.c0).abs();
    let (a, b) = if along.i != 0 {
      (LatticeCoord::new(0, 1, 0), LatticeCoord::new(0, 0, 1))
    } else if along.j != 0 {
      (LatticeCoord::new(1, 0, 0), LatticeCoord::new(0, 0, 1))
    } else {
      (LatticeCoord::new(1, 0, 0), LatticeCoord::new(0, 1, 0))
    };
    [base - a - b, base - b, base - a, base].map(|cell| cell.in_lattice(size).then_some(cell))
  }

  /// Cells sharing this edge, clipped to the lattice. Between 1 and 4 cells.
  pub fn adjacent_cells(&self, size: usize) -> SmallVec<[LatticeCoord; 4]> {
    self.quad_cells(size).into_iter().flatten().collect()
  }

  /// Quad corner permutation for the two emitted triangles
  /// `(q0, q[w0], q[w1])` and `(q0, q[w1], q[w2])`.
  #[inline]
  pub fn winding(&self) -> [usize; 3] {
    if self.c0.i < self.c1.i || self.c0.j > self.c1.j || self.c0.k < self.c1.k {
      [1, 3, 2]
    } else {
      [2, 3, 1]
    }
  }
}

/// Dual vertex of a lattice cell touched by at least one crossing edge.
#[derive(Clone, Debug, PartialEq)]
pub struct DualVertex {
  /// Min corner of the cell.
  pub cell: LatticeCoord,
  /// Ordinals of incident edges, in edge iteration order.
  pub edges: SmallVec<[u32; 12]>,
  /// Sum of incident crossing points.
  pub position_sum: Vec3,
  /// Mean of incident crossing points.
  pub position: Vec3,
  /// Sequential index in the emitted mesh.
  pub index: u32,
}

impl DualVertex {
  pub fn new(cell: LatticeCoord) -> Self {
    Self {
      cell,
      edges: SmallVec::new(),
      position_sum: Vec3::ZERO,
      position: Vec3::ZERO,
      index: u32::MAX,
    }
  }

  /// Register an incident edge and its crossing point.
  pub fn accumulate(&mut self, edge: u32, crossing: Vec3) {
    self.edges.push(edge);
    self.position_sum += crossing;
  }

  /// Settle the position to the mean of the accumulated crossings.
  pub fn resolve(&mut self) {
    if !self.edges.is_empty() {
      self.position = self.position_sum / self.edges.len() as f32;
    }
  }
}

// =============================================================================
// Mesh output
// =============================================================================

/// Vertex, normal and triangle buffers handed to a mesh sink.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffers {
  pub vertices: Vec<Vec3>,
  pub normals: Vec<Vec3>,
  pub triangles: Vec<[u32; 3]>,
}

impl MeshBuffers {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns true if no geometry was generated.
  pub fn is_empty(&self) -> bool {
    self.vertices.is_empty()
  }

  pub fn vertex_count(&self) -> usize {
    self.vertices.len()
  }

  pub fn triangle_count(&self) -> usize {
    self.triangles.len()
  }

  /// Flattened triangle indices (3 per triangle).
  pub fn indices(&self) -> Vec<u32> {
    self.triangles.iter().flatten().copied().collect()
  }

  /// Bounding box of the vertices, `None` when empty.
  pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
    let first = *self.vertices.first()?;
    Some(
      self
        .vertices
        .iter()
        .fold((first, first), |(min, max), v| (min.min(*v), max.max(*v))),
    )
  }
}

// =============================================================================
// Configuration
// =============================================================================

/// Meshing configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct MesherConfig {
  /// Half-extent of the sampled cube, must be positive.
  pub grid_radius: f32,
  /// Lattice points per axis, at least [`MIN_GRID_SIZE`].
  pub grid_size: usize,
  /// Mesh emission is refused above this vertex count.
  pub max_vertices: usize,
  /// Fixed-point correction steps of CPU edge refinement.
  pub refine_iterations: u32,
  /// Raymarch iterations of accelerated edge refinement.
  pub raymarch_iterations: u32,
  /// Iteration budget passed to the distance kernel.
  pub distance_iterations: u32,
  /// Convergence threshold of CPU edge refinement.
  pub epsilon: f32,
}

impl Default for MesherConfig {
  fn default() -> Self {
    Self {
      grid_radius: DEFAULT_GRID_RADIUS,
      grid_size: DEFAULT_GRID_SIZE,
      max_vertices: MAX_MESH_VERTICES,
      refine_iterations: REFINE_MAX_ITERS,
      raymarch_iterations: RAYMARCH_MAX_ITERS,
      distance_iterations: DISTANCE_MAX_ITERS,
      epsilon: EPSILON,
    }
  }
}

impl MesherConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_grid_radius(mut self, radius: f32) -> Self {
    self.grid_radius = radius;
    self
  }

  pub fn with_grid_size(mut self, size: usize) -> Self {
    self.grid_size = size;
    self
  }

  pub fn with_max_vertices(mut self, max_vertices: usize) -> Self {
    self.max_vertices = max_vertices;
    self
  }

  pub fn with_refine_iterations(mut self, iterations: u32) -> Self {
    self.refine_iterations = iterations;
    self
  }

  pub fn with_raymarch_iterations(mut self, iterations: u32) -> Self {
    self.raymarch_iterations = iterations;
    self
  }

  pub fn with_epsilon(mut self, epsilon: f32) -> Self {
    self.epsilon = epsilon;
    self
  }

  /// Check the grid parameters.
  pub fn validate(&self) -> Result<(), ConfigurationError> {
    if !(self.grid_radius > 0.0) || !self.grid_radius.is_finite() {
      return Err(ConfigurationError::InvalidGridRadius(self.grid_radius));
    }
    if self.grid_size < MIN_GRID_SIZE {
      return Err(ConfigurationError::InvalidGridSize {
        size: self.grid_size,
        min: MIN_GRID_SIZE,
      });
    }
    Ok(())
  }

  pub fn geometry(&self) -> LatticeGeometry {
    LatticeGeometry::new(self.grid_radius, self.grid_size)
  }
}

/// Accelerator batch sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcceleratorConfig {
  pub threads_per_group: usize,
  pub max_concurrent_groups: usize,
}

impl Default for AcceleratorConfig {
  fn default() -> Self {
    Self {
      threads_per_group: THREADS_PER_GROUP,
      max_concurrent_groups: MAX_CONCURRENT_GROUPS,
    }
  }
}

impl AcceleratorConfig {
  pub fn with_threads_per_group(mut self, threads: usize) -> Self {
    self.threads_per_group = threads;
    self
  }

  pub fn with_max_concurrent_groups(mut self, groups: usize) -> Self {
    self.max_concurrent_groups = groups;
    self
  }

  /// Queries per dispatch.
  pub fn batch_capacity(&self) -> usize {
    self.threads_per_group * self.max_concurrent_groups
  }

  pub fn validate(&self) -> Result<(), ConfigurationError> {
    if self.threads_per_group == 0 || self.max_concurrent_groups == 0 {
      return Err(ConfigurationError::InvalidBatchSize);
    }
    Ok(())
  }
}

/// Queries per CPU batch; CPU sampling follows the same scan-order batching.
pub const CPU_BATCH_CAPACITY: usize = BATCH_CAPACITY;

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
