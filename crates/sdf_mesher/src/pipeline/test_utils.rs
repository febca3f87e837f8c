//! Test utilities for pipeline tests.
//!
//! Fixtures for the CPU and software-accelerated pipelines plus helpers that
//! drive stages to completion on the test thread.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use glam::Vec3;

use super::MeshingPipeline;
use crate::compute::{AcceleratorHost, SoftwareDevice};
use crate::error::PipelineError;
use crate::progress::{ProgressReport, ProgressState, RunStatus};
use crate::scene::{FieldNode, FieldScene};
use crate::sink::{MemorySink, MeshSink};
use crate::types::{AcceleratorConfig, MeshBuffers, MesherConfig};

// =============================================================================
// Fixtures
// =============================================================================

/// Sphere SDF at the origin.
pub fn sphere(radius: f32) -> impl Fn(Vec3) -> f32 + Send + Sync + Clone + 'static {
  move |p: Vec3| p.length() - radius
}

/// Grid radius 4, 16 points per axis.
pub fn small_config() -> MesherConfig {
  MesherConfig::new().with_grid_radius(4.0).with_grid_size(16)
}

pub fn sphere_scene(radius: f32) -> FieldScene {
  FieldScene::new(FieldNode::sphere("ball", radius)).unwrap()
}

/// Small batches so a run spans several dispatches.
pub fn test_accelerator_config() -> AcceleratorConfig {
  AcceleratorConfig::default()
    .with_threads_per_group(64)
    .with_max_concurrent_groups(8)
}

pub fn accelerator_host(scene: FieldScene, device: SoftwareDevice) -> AcceleratorHost {
  let accel = test_accelerator_config();
  AcceleratorHost::new(
    Box::new(device.with_threads_per_group(accel.threads_per_group)),
    Arc::new(scene),
  )
  .with_config(accel)
}

pub fn accelerated_sphere(config: MesherConfig, radius: f32) -> MeshingPipeline {
  let scene = sphere_scene(radius);
  let device = SoftwareDevice::new(scene.clone());
  MeshingPipeline::accelerated(config, accelerator_host(scene, device))
}

// =============================================================================
// Drivers
// =============================================================================

/// Start a stage and pump until it is over.
pub fn run_stage<F>(pipeline: &mut MeshingPipeline, report: &Arc<ProgressReport>, start: F) -> ProgressState
where
  F: FnOnce(&mut MeshingPipeline, &Arc<ProgressReport>) -> Result<(), PipelineError>,
{
  start(pipeline, report).expect("stage should start");
  let state = pipeline.run_blocking(report);
  assert_eq!(state.status, RunStatus::Finished, "stage ended as {state:?}");
  assert_eq!(state.failure, None);
  state
}

/// Clear, then run stages 1 to 3.
pub fn run_to_vertices(pipeline: &mut MeshingPipeline, report: &Arc<ProgressReport>) {
  pipeline.clear().unwrap();
  run_stage(pipeline, report, |p, r| p.calculate_distances(r));
  run_stage(pipeline, report, |p, r| p.find_edge_intersections(r));
  run_stage(pipeline, report, |p, r| p.construct_vertices(r));
}

/// Full run into a memory sink. Returns the delivered mesh.
pub fn run_to_mesh(pipeline: &mut MeshingPipeline, report: &Arc<ProgressReport>) -> MeshBuffers {
  run_to_vertices(pipeline, report);
  let sink = MemorySink::new();
  let handle: Box<dyn MeshSink> = Box::new(sink.clone());
  run_stage(pipeline, report, move |p, r| p.create_mesh(r, Some(handle)));
  assert_eq!(sink.len(), 1);
  sink.last().unwrap()
}

/// Spin until a stage worker is parked on an owner task.
pub fn wait_for_owner_task(report: &ProgressReport) {
  while report.pending_tasks() == 0 {
    thread::sleep(Duration::from_millis(1));
  }
}

/// Spin until no stage worker holds the run data any more.
pub fn wait_until_idle(pipeline: &MeshingPipeline) {
  while matches!(pipeline.vertex_count(), Err(PipelineError::Busy)) {
    thread::sleep(Duration::from_millis(1));
  }
}
