//! Batched compute accelerator boundary.
//!
//! The accelerator executes a kernel over fixed-capacity input and output
//! buffers. It is single-owner: only the thread holding the device may touch
//! it, and stage workers reach it through the progress report's owner queue.
//!
//! # Buffer Layout
//!
//! ```text
//! input  [RayQuery; capacity]   origin.xyz, direction.xyz   (zero direction = distance query)
//! output [RayHit;   capacity]   position.xyz, normal.xyz, distance
//!
//! dispatch(kernel, groups, max_iters): invocations 0 .. groups * threads_per_group
//! ```
//!
//! # Module Structure
//!
//! - `host`: [`AcceleratorHost`] - owner-thread handle, configuration, buffers
//! - `software`: [`SoftwareDevice`] - CPU emulation of the two kernels

mod host;
mod software;

pub use host::{AcceleratorHost, Kernels};
pub use software::SoftwareDevice;

use glam::{Quat, Vec3};

use crate::error::DeviceError;

/// Resolved kernel entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelId(pub usize);

/// One kernel invocation's input.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RayQuery {
  pub origin: Vec3,
  pub direction: Vec3,
}

impl RayQuery {
  /// Plain distance query at `origin`.
  pub fn at(origin: Vec3) -> Self {
    Self {
      origin,
      direction: Vec3::ZERO,
    }
  }

  pub fn ray(origin: Vec3, direction: Vec3) -> Self {
    Self { origin, direction }
  }
}

/// One kernel invocation's output.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RayHit {
  pub position: Vec3,
  pub normal: Vec3,
  pub distance: f32,
}

/// A batched distance accelerator.
///
/// Implementations are driven from their owner thread only.
pub trait ComputeDevice {
  /// Resolve a named entry point.
  fn find_kernel(&self, name: &str) -> Option<KernelId>;

  /// Set a float uniform.
  fn set_float(&mut self, name: &str, value: f32) -> Result<(), DeviceError>;

  /// Set the world transform of a field node.
  fn set_transform(&mut self, node: &str, translation: Vec3, rotation: Quat)
    -> Result<(), DeviceError>;

  /// Allocate input and output buffers of `capacity` entries each.
  fn allocate_buffers(&mut self, capacity: usize) -> Result<(), DeviceError>;

  /// Free the buffers. Safe to call when nothing is allocated.
  fn release_buffers(&mut self);

  fn buffers_allocated(&self) -> bool;

  /// Upload `input`, run `groups` thread groups of `kernel`, read back into
  /// `output`. Both slices span the full buffer capacity.
  fn dispatch(
    &mut self,
    kernel: KernelId,
    groups: usize,
    max_iters: u32,
    input: &[RayQuery],
    output: &mut [RayHit],
  ) -> Result<(), DeviceError>;
}
