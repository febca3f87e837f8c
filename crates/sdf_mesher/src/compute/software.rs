//! CPU emulation of the distance accelerator.
//!
//! Behaves like a real device: kernels are looked up by name, the scene is
//! evaluated with whatever uniforms were pushed (unset ones read as zero), and
//! a dispatch only touches `groups * threads_per_group` invocations of the
//! full-capacity buffers.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use rayon::prelude::*;

use super::{ComputeDevice, KernelId, RayHit, RayQuery};
use crate::constants::{DISTANCE_KERNEL, EPSILON, RAYMARCH_KERNEL, THREADS_PER_GROUP};
use crate::error::DeviceError;
use crate::field::DistanceField;
use crate::scene::{FieldScene, ParamSource, ResolvedScene};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KernelKind {
  Distance,
  Raymarch,
}

/// Software compute device executing the distance and raymarch kernels of a
/// [`FieldScene`].
pub struct SoftwareDevice {
  scene: FieldScene,
  kernels: Vec<(String, KernelKind)>,
  threads_per_group: usize,
  floats: HashMap<String, f32>,
  transforms: HashMap<String, (Vec3, Quat)>,
  capacity: Option<usize>,
  dispatches: usize,
}

impl SoftwareDevice {
  pub fn new(scene: FieldScene) -> Self {
    Self {
      scene,
      kernels: vec![
        (DISTANCE_KERNEL.to_string(), KernelKind::Distance),
        (RAYMARCH_KERNEL.to_string(), KernelKind::Raymarch),
      ],
      threads_per_group: THREADS_PER_GROUP,
      floats: HashMap::new(),
      transforms: HashMap::new(),
      capacity: None,
      dispatches: 0,
    }
  }

  pub fn with_threads_per_group(mut self, threads_per_group: usize) -> Self {
    self.threads_per_group = threads_per_group;
    self
  }

  /// Remove an entry point, as if the kernel source did not define it.
  pub fn without_kernel(mut self, name: &str) -> Self {
    self.kernels.retain(|(n, _)| n != name);
    self
  }

  /// Dispatches executed so far.
  pub fn dispatch_count(&self) -> usize {
    self.dispatches
  }

  /// Current value of a float uniform.
  pub fn uniform(&self, name: &str) -> Option<f32> {
    self.floats.get(name).copied()
  }

  fn resolved(&self) -> ResolvedScene {
    self.scene.resolve(self)
  }
}

impl ParamSource for SoftwareDevice {
  fn float(&self, name: &str) -> Option<f32> {
    self.floats.get(name).copied()
  }

  fn transform(&self, node: &str) -> Option<(Vec3, Quat)> {
    self.transforms.get(node).copied()
  }
}

impl ComputeDevice for SoftwareDevice {
  fn find_kernel(&self, name: &str) -> Option<KernelId> {
    self.kernels.iter().position(|(n, _)| n == name).map(KernelId)
  }

  fn set_float(&mut self, name: &str, value: f32) -> Result<(), DeviceError> {
    self.floats.insert(name.to_string(), value);
    Ok(())
  }

  fn set_transform(
    &mut self,
    node: &str,
    translation: Vec3,
    rotation: Quat,
  ) -> Result<(), DeviceError> {
    if self.scene.transform(node).is_none() {
      return Err(DeviceError::UnknownProperty(node.to_string()));
    }
    self.transforms.insert(node.to_string(), (translation, rotation));
    Ok(())
  }

  fn allocate_buffers(&mut self, capacity: usize) -> Result<(), DeviceError> {
    self.capacity = Some(capacity);
    Ok(())
  }

  fn release_buffers(&mut self) {
    self.capacity = None;
  }

  fn buffers_allocated(&self) -> bool {
    self.capacity.is_some()
  }

  fn dispatch(
    &mut self,
    kernel: KernelId,
    groups: usize,
    max_iters: u32,
    input: &[RayQuery],
    output: &mut [RayHit],
  ) -> Result<(), DeviceError> {
    let capacity = self.capacity.ok_or(DeviceError::BuffersNotAllocated)?;
    let kind = self
      .kernels
      .get(kernel.0)
      .map(|(_, kind)| *kind)
      .ok_or(DeviceError::UnknownKernel(kernel.0))?;

    let invocations = groups * self.threads_per_group;
    if invocations > capacity || input.len() != capacity || output.len() != capacity {
      return Err(DeviceError::CapacityExceeded {
        requested: invocations.max(input.len()),
        capacity,
      });
    }

    let field = self.resolved();
    output[..invocations]
      .par_iter_mut()
      .zip(input[..invocations].par_iter())
      .for_each(|(hit, query)| {
        *hit = match kind {
          KernelKind::Distance => distance_main(&field, query),
          KernelKind::Raymarch => raymarch_main(&field, query, max_iters),
        };
      });

    self.dispatches += 1;
    Ok(())
  }
}

fn distance_main(field: &ResolvedScene, query: &RayQuery) -> RayHit {
  RayHit {
    position: query.origin,
    normal: field.normal(query.origin),
    distance: field.distance(query.origin),
  }
}

/// March along the query direction, stepping by the signed distance so the
/// ray moves toward the surface from either side.
fn raymarch_main(field: &ResolvedScene, query: &RayQuery, max_iters: u32) -> RayHit {
  let direction = query.direction.normalize_or_zero();
  let mut position = query.origin;
  let mut distance = field.distance(position);
  for _ in 0..max_iters {
    if distance.abs() < EPSILON {
      break;
    }
    position += direction * distance;
    distance = field.distance(position);
  }
  RayHit {
    position,
    normal: field.normal(position),
    distance,
  }
}

#[cfg(test)]
#[path = "software_test.rs"]
mod software_test;
