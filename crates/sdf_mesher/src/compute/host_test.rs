use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;

use super::*;
use crate::compute::{RayHit, RayQuery, SoftwareDevice};
use crate::scene::FieldNode;

fn sphere_scene() -> Arc<FieldScene> {
  let root = FieldNode::group("root")
    .with_child(FieldNode::sphere("ball", 1.0).with_translation(Vec3::new(0.5, 0.0, 0.0)));
  Arc::new(FieldScene::new(root).unwrap())
}

fn small_config() -> AcceleratorConfig {
  AcceleratorConfig::default()
    .with_threads_per_group(16)
    .with_max_concurrent_groups(4)
}

fn host(scene: Arc<FieldScene>, device: SoftwareDevice) -> AcceleratorHost {
  AcceleratorHost::new(Box::new(device.with_threads_per_group(16)), scene).with_config(small_config())
}

/// Dispatch one distance query from a worker thread while the test thread
/// drains the owner queue.
fn distance_via_queue(host: &mut AcceleratorHost, point: Vec3) -> f32 {
  let kernels = host.kernels().unwrap();
  let capacity = host.config().batch_capacity();
  let report = Arc::new(ProgressReport::new());
  report.start_progress("dispatch");

  let worker_report = Arc::clone(&report);
  let worker = std::thread::spawn(move || {
    worker_report.enqueue_task(move |device| {
      let mut input = vec![RayQuery::default(); capacity];
      input[0] = RayQuery::at(point);
      let mut output = vec![RayHit::default(); capacity];
      device.dispatch(kernels.distance, 1, 0, &input, &mut output)?;
      Ok::<_, DeviceError>(output[0].distance)
    })
  });

  while !worker.is_finished() {
    host.wait_and_drain(&report, Duration::from_millis(1));
  }
  worker.join().unwrap().unwrap().unwrap()
}

#[test]
fn test_configure_resolves_kernels() {
  let scene = sphere_scene();
  let mut host = host(Arc::clone(&scene), SoftwareDevice::new((*scene).clone()));
  assert!(host.kernels().is_none());
  let kernels = host.configure().unwrap();
  assert_eq!(host.kernels(), Some(kernels));
  assert_ne!(kernels.distance, kernels.raymarch);
}

#[test]
fn test_missing_kernel_is_configuration_error() {
  let scene = sphere_scene();
  let device = SoftwareDevice::new((*scene).clone()).without_kernel(RAYMARCH_KERNEL);
  let mut host = host(scene, device);
  assert_eq!(
    host.configure(),
    Err(ConfigurationError::MissingKernel(RAYMARCH_KERNEL.to_string()))
  );
  assert!(host.kernels().is_none());
}

#[test]
fn test_invalid_batch_sizing() {
  let scene = sphere_scene();
  let mut host = AcceleratorHost::new(Box::new(SoftwareDevice::new((*scene).clone())), scene)
    .with_config(AcceleratorConfig::default().with_max_concurrent_groups(0));
  assert_eq!(host.configure(), Err(ConfigurationError::InvalidBatchSize));
}

#[test]
fn test_configure_pushes_scene_properties() {
  let scene = sphere_scene();
  let mut host = host(Arc::clone(&scene), SoftwareDevice::new((*scene).clone()));
  host.configure().unwrap();
  host.acquire_buffers().unwrap();

  // Sphere of radius 1 centred at x = 0.5
  let d = distance_via_queue(&mut host, Vec3::new(3.5, 0.0, 0.0));
  assert!((d - 2.0).abs() < 1e-5, "distance {d}");
}

#[test]
fn test_overrides_win_over_scene_values() {
  let scene = sphere_scene();
  let mut overrides = PropertyBlock::default();
  overrides.set("ball_radius", 2.5);
  let mut host =
    host(Arc::clone(&scene), SoftwareDevice::new((*scene).clone())).with_overrides(overrides);
  host.configure().unwrap();
  host.acquire_buffers().unwrap();

  let d = distance_via_queue(&mut host, Vec3::new(3.5, 0.0, 0.0));
  assert!((d - 0.5).abs() < 1e-5, "distance {d}");
}

#[test]
fn test_buffer_lifecycle() {
  let scene = sphere_scene();
  let mut host = host(Arc::clone(&scene), SoftwareDevice::new((*scene).clone()));
  host.release_buffers();
  assert!(!host.buffers_allocated());

  host.acquire_buffers().unwrap();
  host.acquire_buffers().unwrap();
  assert!(host.buffers_allocated());

  host.release_buffers();
  host.release_buffers();
  assert!(!host.buffers_allocated());
}
