//! Owner-thread handle to a compute device.

use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use tracing::debug;

use super::{ComputeDevice, KernelId};
use crate::constants::{DISTANCE_KERNEL, RAYMARCH_KERNEL, TRANSFORM_PROPERTY_PREFIX};
use crate::error::{ConfigurationError, DeviceError};
use crate::progress::ProgressReport;
use crate::scene::{FieldScene, ParamSource, PropertyBlock};
use crate::types::AcceleratorConfig;

/// Resolved entry points of a configured device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Kernels {
  pub distance: KernelId,
  pub raymarch: KernelId,
}

/// Owns a [`ComputeDevice`] on the thread that created it.
///
/// Not `Send`: device calls from stage workers go through
/// [`ProgressReport::enqueue_task`] and are executed by [`drain`](Self::drain).
pub struct AcceleratorHost {
  device: Box<dyn ComputeDevice>,
  scene: Arc<FieldScene>,
  overrides: PropertyBlock,
  config: AcceleratorConfig,
  kernels: Option<Kernels>,
  owner: ThreadId,
  _not_send: PhantomData<*const ()>,
}

impl AcceleratorHost {
  pub fn new(device: Box<dyn ComputeDevice>, scene: Arc<FieldScene>) -> Self {
    Self {
      device,
      scene,
      overrides: PropertyBlock::default(),
      config: AcceleratorConfig::default(),
      kernels: None,
      owner: thread::current().id(),
      _not_send: PhantomData,
    }
  }

  /// Per-instance property values applied on top of the scene's own.
  pub fn with_overrides(mut self, overrides: PropertyBlock) -> Self {
    self.overrides = overrides;
    self
  }

  pub fn with_config(mut self, config: AcceleratorConfig) -> Self {
    self.config = config;
    self
  }

  pub fn config(&self) -> AcceleratorConfig {
    self.config
  }

  pub fn scene(&self) -> &Arc<FieldScene> {
    &self.scene
  }

  /// Kernels resolved by the last successful [`configure`](Self::configure).
  pub fn kernels(&self) -> Option<Kernels> {
    self.kernels
  }

  pub fn device(&self) -> &dyn ComputeDevice {
    self.device.as_ref()
  }

  /// Resolve both kernels and push every scene property to the device.
  pub fn configure(&mut self) -> Result<Kernels, ConfigurationError> {
    self.assert_owner();
    self.config.validate()?;

    let find = |name: &str| {
      self
        .device
        .find_kernel(name)
        .ok_or_else(|| ConfigurationError::MissingKernel(name.to_string()))
    };
    let kernels = Kernels {
      distance: find(DISTANCE_KERNEL)?,
      raymarch: find(RAYMARCH_KERNEL)?,
    };

    let mut properties = self.scene.properties();
    properties.merge(&self.overrides);
    let mut floats = 0;
    for (name, value) in properties.iter() {
      if name.starts_with(TRANSFORM_PROPERTY_PREFIX) {
        continue;
      }
      self.device.set_float(name, value)?;
      floats += 1;
    }

    let mut transforms = 0;
    for node in self.scene.shape_nodes() {
      let (translation, rotation) = self
        .scene
        .transform(&node.name)
        .ok_or_else(|| DeviceError::UnknownProperty(node.name.clone()))?;
      self.device.set_transform(&node.name, translation, rotation)?;
      transforms += 1;
    }

    debug!(floats, transforms, "accelerator configured");
    self.kernels = Some(kernels);
    Ok(kernels)
  }

  /// Allocate full-capacity buffers unless already allocated.
  pub fn acquire_buffers(&mut self) -> Result<(), DeviceError> {
    self.assert_owner();
    if self.device.buffers_allocated() {
      return Ok(());
    }
    let capacity = self.config.batch_capacity();
    debug!(capacity, "allocating accelerator buffers");
    self.device.allocate_buffers(capacity)
  }

  /// Free the buffers. Idempotent.
  pub fn release_buffers(&mut self) {
    self.assert_owner();
    if self.device.buffers_allocated() {
      debug!("releasing accelerator buffers");
      self.device.release_buffers();
    }
  }

  pub fn buffers_allocated(&self) -> bool {
    self.device.buffers_allocated()
  }

  /// Execute queued device tasks. Returns how many ran.
  pub fn drain(&mut self, report: &ProgressReport) -> usize {
    self.assert_owner();
    report.drain_queue(&mut *self.device)
  }

  /// Block up to `timeout` for device tasks, then execute them.
  pub fn wait_and_drain(&mut self, report: &ProgressReport, timeout: Duration) -> usize {
    self.assert_owner();
    report.wait_and_drain(&mut *self.device, timeout)
  }

  fn assert_owner(&self) {
    debug_assert_eq!(
      thread::current().id(),
      self.owner,
      "accelerator used off its owner thread"
    );
  }
}

impl Drop for AcceleratorHost {
  fn drop(&mut self) {
    if self.device.buffers_allocated() {
      self.device.release_buffers();
    }
  }
}

#[cfg(test)]
#[path = "host_test.rs"]
mod host_test;
