//! Lattice and accelerator sizing constants.
//!
//! # Lattice Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        LATTICE TO WORLD MAPPING                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  index:     0        1        2      ...      gs-1        (gs)          │
//! │             │        │        │                 │           ┆           │
//! │  world:   -r     -r+e     -r+2e     ...      r-e          +r           │
//! │             └── e ───┘                                                  │
//! │                                                                         │
//! │  e = cell edge length = 2r / gs                                         │
//! │  world = index * e - r      (per axis, lattice centered on origin)      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Scan Order
//!
//! ```text
//! Dense grid memory layout (k-major, i innermost):
//!
//! index = (k * gs + j) * gs + i
//!
//! Batches are filled in this order, so a batch is a contiguous run of the
//! dense grid and can be copied back with a single slice write.
//! ```
//!
//! # Accelerator Batches
//!
//! ```text
//! batch capacity = THREADS_PER_GROUP * MAX_CONCURRENT_GROUPS = 128 * 32 = 4096
//! groups per dispatch = ceil(queries / THREADS_PER_GROUP)
//! ```

/// Degenerate-denominator threshold for crossing interpolation and the
/// convergence threshold of CPU refinement.
pub const EPSILON: f32 = 1e-6;

/// Central-difference step for CPU normals.
pub const NORMAL_EPSILON: f32 = 1e-4;

/// Invocations per accelerator thread group.
pub const THREADS_PER_GROUP: usize = 128;

/// Thread groups submitted in one dispatch (at most).
pub const MAX_CONCURRENT_GROUPS: usize = 32;

/// Queries per accelerator dispatch.
pub const BATCH_CAPACITY: usize = THREADS_PER_GROUP * MAX_CONCURRENT_GROUPS;

/// Vertex cap of the 16-bit-indexed mesh format downstream.
pub const MAX_MESH_VERTICES: usize = 65_000;

/// Entries held by a sparse index leaf before it splits.
pub const LEAF_CAPACITY: usize = 8;

/// Raymarch iterations for edge refinement; the start point is already close
/// to the surface.
pub const RAYMARCH_MAX_ITERS: u32 = 8;

/// Iteration budget passed to the distance kernel.
pub const DISTANCE_MAX_ITERS: u32 = 256;

/// Fixed-point correction steps for CPU edge refinement.
pub const REFINE_MAX_ITERS: u32 = 4;

/// Smallest accepted lattice resolution per axis.
pub const MIN_GRID_SIZE: usize = 4;

/// Default half-extent of the sampled cube.
pub const DEFAULT_GRID_RADIUS: f32 = 8.0;

/// Default lattice resolution per axis.
pub const DEFAULT_GRID_SIZE: usize = 48;

/// Entry point evaluating distance and normal per query.
pub const DISTANCE_KERNEL: &str = "DistanceMain";

/// Entry point marching a short ray per query.
pub const RAYMARCH_KERNEL: &str = "RaymarchMain";

/// Properties with this prefix travel through the per-node transform path.
pub const TRANSFORM_PROPERTY_PREFIX: &str = "_transform_";

/// The six axis neighbours of a lattice point, in scan order.
pub const NEIGHBOR_OFFSETS: [[i32; 3]; 6] = [
  [0, 0, -1],
  [0, -1, 0],
  [-1, 0, 0],
  [1, 0, 0],
  [0, 1, 0],
  [0, 0, 1],
];

/// Cell edge length for a lattice of `grid_size` points spanning `2 * grid_radius`.
#[inline]
pub fn cell_edge_length(grid_radius: f32, grid_size: usize) -> f32 {
  2.0 * grid_radius / grid_size as f32
}

/// World coordinate of a lattice index along one axis.
#[inline]
pub fn lattice_to_world(index: i32, grid_radius: f32, grid_size: usize) -> f32 {
  index as f32 * cell_edge_length(grid_radius, grid_size) - grid_radius
}

/// Linear offset of `(i, j, k)` in a dense `grid_size³` array, k-major.
#[inline]
pub fn grid_index(i: usize, j: usize, k: usize, grid_size: usize) -> usize {
  (k * grid_size + j) * grid_size + i
}

/// Inverse of [`grid_index`].
#[inline]
pub fn grid_coord(index: usize, grid_size: usize) -> (usize, usize, usize) {
  let i = index % grid_size;
  let j = (index / grid_size) % grid_size;
  let k = index / (grid_size * grid_size);
  (i, j, k)
}

/// Thread groups needed to cover `queries` invocations.
#[inline]
pub fn group_count(queries: usize, threads_per_group: usize) -> usize {
  queries.div_ceil(threads_per_group)
}

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
