//! Pipeline benchmarks.
//!
//! Measures each stage in isolation and full runs end to end:
//! - **isolated/<stage>**: one stage, previous stages prepared in setup
//! - **full/<field>**: clear through mesh delivery, CPU evaluator
//! - **backend/<backend>**: the same sphere on the CPU and the software device
//!
//! Field scenarios:
//! - **sphere**: one smooth closed surface
//! - **metaballs**: several blended blobs, more crossings
//! - **terrain**: tilted plane cutting the whole lattice
//! - **empty**: constant positive field, no crossings

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use glam::Vec3;
use sdf_mesher::{
  samplers::{ConstantField, Metaballs, TiltedPlaneField},
  AcceleratorConfig, AcceleratorHost, DistanceField, Evaluator, FieldNode, FieldScene, MemorySink,
  MeshSink, MesherConfig, MeshingPipeline, ProgressReport, RunStatus, SoftwareDevice,
};

// =============================================================================
// Fixtures
// =============================================================================

fn sphere(p: Vec3) -> f32 {
  p.length() - 2.5
}

fn config(size: usize) -> MesherConfig {
  MesherConfig::new().with_grid_radius(4.0).with_grid_size(size)
}

fn shared<F: DistanceField + 'static>(field: F) -> Arc<dyn DistanceField> {
  Arc::new(field)
}

fn fields() -> Vec<(&'static str, Arc<dyn DistanceField>)> {
  vec![
    ("sphere", shared(sphere)),
    ("metaballs", shared(Metaballs::random(7, 6, 2.5))),
    ("terrain", shared(TiltedPlaneField::new().with_angle_degrees(20.0))),
    ("empty", shared(ConstantField(1.0))),
  ]
}

fn software_pipeline(config: MesherConfig) -> MeshingPipeline {
  let scene = FieldScene::new(FieldNode::sphere("ball", 2.5)).expect("valid scene");
  let accel = AcceleratorConfig::default();
  let device = SoftwareDevice::new(scene.clone()).with_threads_per_group(accel.threads_per_group);
  let host = AcceleratorHost::new(Box::new(device), Arc::new(scene)).with_config(accel);
  MeshingPipeline::accelerated(config, host)
}

// =============================================================================
// Drivers
// =============================================================================

fn finish(pipeline: &mut MeshingPipeline, report: &ProgressReport) {
  let state = pipeline.run_blocking(report);
  assert_eq!(state.status, RunStatus::Finished);
}

/// Run stages until `stages` of them completed (0 = cleared only).
fn prepare(pipeline: &mut MeshingPipeline, report: &Arc<ProgressReport>, stages: usize) {
  pipeline.clear().expect("valid config");
  if stages > 0 {
    pipeline.calculate_distances(report).expect("distances");
    finish(pipeline, report);
  }
  if stages > 1 {
    pipeline.find_edge_intersections(report).expect("edges");
    finish(pipeline, report);
  }
  if stages > 2 {
    pipeline.construct_vertices(report).expect("vertices");
    finish(pipeline, report);
  }
}

fn create_mesh(pipeline: &mut MeshingPipeline, report: &Arc<ProgressReport>) -> usize {
  let sink = MemorySink::new();
  let handle: Box<dyn MeshSink> = Box::new(sink.clone());
  pipeline.create_mesh(report, Some(handle)).expect("mesh");
  finish(pipeline, report);
  sink.last().map_or(0, |mesh| mesh.triangle_count())
}

fn full_run(pipeline: &mut MeshingPipeline, report: &Arc<ProgressReport>) -> usize {
  prepare(pipeline, report, 3);
  create_mesh(pipeline, report)
}

// =============================================================================
// Isolated Stage Benchmarks
// =============================================================================

fn bench_stages_isolated(c: &mut Criterion) {
  let mut group = c.benchmark_group("isolated");
  group.sample_size(20);
  let report = Arc::new(ProgressReport::new());

  for (name, field) in fields() {
    let new_pipeline = || MeshingPipeline::new(config(48), Evaluator::Cpu(field.clone()));

    group.bench_function(BenchmarkId::new("distances", name), |b| {
      b.iter_batched(
        || {
          let mut pipeline = new_pipeline();
          prepare(&mut pipeline, &report, 0);
          pipeline
        },
        |mut pipeline| {
          pipeline.calculate_distances(&report).expect("distances");
          finish(&mut pipeline, &report);
        },
        BatchSize::LargeInput,
      )
    });

    group.bench_function(BenchmarkId::new("edges", name), |b| {
      b.iter_batched(
        || {
          let mut pipeline = new_pipeline();
          prepare(&mut pipeline, &report, 1);
          pipeline
        },
        |mut pipeline| {
          pipeline.find_edge_intersections(&report).expect("edges");
          finish(&mut pipeline, &report);
          black_box(pipeline.edge_count().expect("idle"))
        },
        BatchSize::LargeInput,
      )
    });

    group.bench_function(BenchmarkId::new("vertices", name), |b| {
      b.iter_batched(
        || {
          let mut pipeline = new_pipeline();
          prepare(&mut pipeline, &report, 2);
          pipeline
        },
        |mut pipeline| {
          pipeline.construct_vertices(&report).expect("vertices");
          finish(&mut pipeline, &report);
          black_box(pipeline.vertex_count().expect("idle"))
        },
        BatchSize::LargeInput,
      )
    });

    group.bench_function(BenchmarkId::new("assembly", name), |b| {
      b.iter_batched(
        || {
          let mut pipeline = new_pipeline();
          prepare(&mut pipeline, &report, 3);
          pipeline
        },
        |mut pipeline| black_box(create_mesh(&mut pipeline, &report)),
        BatchSize::LargeInput,
      )
    });
  }

  group.finish();
}

// =============================================================================
// Full Pipeline Benchmarks
// =============================================================================

fn bench_full_by_grid_size(c: &mut Criterion) {
  let mut group = c.benchmark_group("full");
  group.sample_size(10);
  let report = Arc::new(ProgressReport::new());

  for size in [16, 32, 64] {
    let mut pipeline = MeshingPipeline::cpu(config(size), sphere);
    group.bench_with_input(BenchmarkId::new("sphere", size), &size, |b, _| {
      b.iter(|| black_box(full_run(&mut pipeline, &report)))
    });
  }

  let mut pipeline = MeshingPipeline::cpu(config(48), Metaballs::random(7, 6, 2.5));
  group.bench_function("metaballs/48", |b| {
    b.iter(|| black_box(full_run(&mut pipeline, &report)))
  });

  group.finish();
}

fn bench_backends(c: &mut Criterion) {
  let mut group = c.benchmark_group("backend");
  group.sample_size(10);
  let report = Arc::new(ProgressReport::new());

  let scene = FieldScene::new(FieldNode::sphere("ball", 2.5)).expect("valid scene");
  let mut cpu = MeshingPipeline::cpu(config(32), scene);
  group.bench_function("cpu", |b| b.iter(|| black_box(full_run(&mut cpu, &report))));

  let mut software = software_pipeline(config(32));
  group.bench_function("software", |b| {
    b.iter(|| black_box(full_run(&mut software, &report)))
  });

  group.finish();
}

criterion_group!(
  benches,
  bench_stages_isolated,
  bench_full_by_grid_size,
  bench_backends,
);
criterion_main!(benches);
