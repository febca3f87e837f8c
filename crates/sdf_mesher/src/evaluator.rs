//! Distance evaluator capability.
//!
//! Two sides of one evaluator:
//!
//! ```text
//! owner thread                      stage worker
//! ┌────────────────┐  batch_handle  ┌─────────────────┐
//! │ Evaluator      ├───────────────►│ BatchEvaluator  │
//! │  Cpu(field)    │                │  sample()       │
//! │  Accelerated   │◄───── queue ───┤  refine()       │
//! │   (host)       │  enqueue_task  └─────────────────┘
//! └────────────────┘
//! ```
//!
//! The CPU variant calls the field directly from the worker. The accelerated
//! variant pads each batch to the buffer capacity and ships the dispatch to
//! the owner thread, which runs it while draining the progress report.

use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use rayon::prelude::*;

use crate::compute::{AcceleratorHost, KernelId, Kernels, RayHit, RayQuery};
use crate::constants::group_count;
use crate::error::{ConfigurationError, StageError};
use crate::field::DistanceField;
use crate::progress::{ProgressReport, RunTicket};
use crate::types::{Edge, LatticeGeometry, MesherConfig, CPU_BATCH_CAPACITY};

/// One evaluated query.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FieldSample {
  pub distance: f32,
  /// Where the distance was taken; a raymarch hit for ray queries.
  pub position: Vec3,
  pub normal: Option<Vec3>,
}

// =============================================================================
// Owner side
// =============================================================================

/// Distance evaluator owned by the pipeline.
pub enum Evaluator {
  /// Plain function call per point, from any thread.
  Cpu(Arc<dyn DistanceField>),
  /// Batched dispatch on an owner-thread compute device.
  Accelerated(AcceleratorHost),
}

impl Evaluator {
  pub fn cpu<F: DistanceField + 'static>(field: F) -> Self {
    Self::Cpu(Arc::new(field))
  }

  pub fn is_accelerated(&self) -> bool {
    matches!(self, Self::Accelerated(_))
  }

  /// Prepare for a run. A no-op for the CPU variant.
  pub fn configure(&mut self) -> Result<(), ConfigurationError> {
    match self {
      Self::Cpu(_) => Ok(()),
      Self::Accelerated(host) => host.configure().map(|_| ()),
    }
  }

  /// Worker-side handle. `None` until an accelerated evaluator is configured.
  pub fn batch_handle(&self, config: &MesherConfig) -> Option<BatchEvaluator> {
    match self {
      Self::Cpu(field) => Some(BatchEvaluator::cpu(Arc::clone(field))),
      Self::Accelerated(host) => Some(BatchEvaluator::accelerated(host, host.kernels()?, config)),
    }
  }

  /// Worker-side handle, configuring the accelerator first if needed.
  pub fn prepare(&mut self, config: &MesherConfig) -> Result<BatchEvaluator, ConfigurationError> {
    match self {
      Self::Cpu(field) => Ok(BatchEvaluator::cpu(Arc::clone(field))),
      Self::Accelerated(host) => {
        let kernels = match host.kernels() {
          Some(kernels) => kernels,
          None => host.configure()?,
        };
        Ok(BatchEvaluator::accelerated(host, kernels, config))
      }
    }
  }

  pub fn acquire_buffers(&mut self) -> Result<(), ConfigurationError> {
    match self {
      Self::Cpu(_) => Ok(()),
      Self::Accelerated(host) => Ok(host.acquire_buffers()?),
    }
  }

  /// Idempotent.
  pub fn release_buffers(&mut self) {
    if let Self::Accelerated(host) = self {
      host.release_buffers();
    }
  }

  pub fn buffers_allocated(&self) -> bool {
    match self {
      Self::Cpu(_) => false,
      Self::Accelerated(host) => host.buffers_allocated(),
    }
  }

  /// Execute pending accelerator tasks.
  pub fn drain(&mut self, report: &ProgressReport) -> usize {
    match self {
      Self::Cpu(_) => 0,
      Self::Accelerated(host) => host.drain(report),
    }
  }

  /// Wait up to `timeout` for accelerator tasks, or just sleep for CPU.
  pub fn wait(&mut self, report: &ProgressReport, timeout: Duration) -> usize {
    match self {
      Self::Cpu(_) => {
        std::thread::sleep(timeout);
        0
      }
      Self::Accelerated(host) => host.wait_and_drain(report, timeout),
    }
  }
}

// =============================================================================
// Worker side
// =============================================================================

/// Batched evaluation from a stage worker.
#[derive(Clone)]
pub enum BatchEvaluator {
  Cpu {
    field: Arc<dyn DistanceField>,
    capacity: usize,
  },
  Accelerated {
    kernels: Kernels,
    capacity: usize,
    threads_per_group: usize,
    distance_iterations: u32,
  },
}

impl BatchEvaluator {
  fn cpu(field: Arc<dyn DistanceField>) -> Self {
    Self::Cpu {
      field,
      capacity: CPU_BATCH_CAPACITY,
    }
  }

  fn accelerated(host: &AcceleratorHost, kernels: Kernels, config: &MesherConfig) -> Self {
    let accel = host.config();
    Self::Accelerated {
      kernels,
      capacity: accel.batch_capacity(),
      threads_per_group: accel.threads_per_group,
      distance_iterations: config.distance_iterations,
    }
  }

  /// Queries per batch.
  pub fn capacity(&self) -> usize {
    match self {
      Self::Cpu { capacity, .. } | Self::Accelerated { capacity, .. } => *capacity,
    }
  }

  /// Evaluate one batch of at most [`capacity`](Self::capacity) points.
  pub fn sample(
    &self,
    report: &ProgressReport,
    points: &[Vec3],
    want_normal: bool,
  ) -> Result<Vec<FieldSample>, StageError> {
    debug_assert!(points.len() <= self.capacity());
    match self {
      Self::Cpu { field, .. } => Ok(
        points
          .par_iter()
          .map(|&p| FieldSample {
            distance: field.distance(p),
            position: p,
            normal: want_normal.then(|| field.normal(p)),
          })
          .collect(),
      ),
      Self::Accelerated {
        kernels,
        capacity,
        threads_per_group,
        distance_iterations,
      } => {
        let queries = points.iter().map(|&p| RayQuery::at(p)).collect();
        let hits = dispatch_padded(
          report,
          kernels.distance,
          *capacity,
          *threads_per_group,
          *distance_iterations,
          queries,
        )?;
        Ok(
          hits
            .into_iter()
            .map(|hit| FieldSample {
              distance: hit.distance,
              position: hit.position,
              normal: want_normal.then_some(hit.normal),
            })
            .collect(),
        )
      }
    }
  }

  /// Refine the crossing parameter of every edge, batch by batch.
  pub fn refine(
    &self,
    report: &ProgressReport,
    ticket: RunTicket,
    edges: &mut [Edge],
    geometry: &LatticeGeometry,
    config: &MesherConfig,
  ) -> Result<(), StageError> {
    for batch in edges.chunks_mut(self.capacity()) {
      if report.is_cancelled(ticket) {
        return Err(StageError::Cancelled);
      }
      match self {
        Self::Cpu { field, .. } => {
          batch
            .par_iter_mut()
            .for_each(|edge| refine_fixed_point(field.as_ref(), edge, geometry, config));
        }
        Self::Accelerated {
          kernels,
          capacity,
          threads_per_group,
          ..
        } => {
          refine_raymarch(
            report,
            kernels.raymarch,
            *capacity,
            *threads_per_group,
            batch,
            geometry,
            config,
          )?;
        }
      }
    }
    Ok(())
  }
}

#[allow(clippy::too_many_arguments)]
fn refine_raymarch(
  report: &ProgressReport,
  kernel: KernelId,
  capacity: usize,
  threads_per_group: usize,
  batch: &mut [Edge],
  geometry: &LatticeGeometry,
  config: &MesherConfig,
) -> Result<(), StageError> {
  let queries = batch
    .iter()
    .map(|edge| {
      let v0 = geometry.position(edge.c0);
      let v1 = geometry.position(edge.c1);
      RayQuery::ray(edge.t * v0 + (1.0 - edge.t) * v1, (v0 - v1).normalize())
    })
    .collect();
  let hits = dispatch_padded(
    report,
    kernel,
    capacity,
    threads_per_group,
    config.raymarch_iterations,
    queries,
  )?;

  for (edge, hit) in batch.iter_mut().zip(hits) {
    let v0 = geometry.position(edge.c0);
    let v1 = geometry.position(edge.c1);
    let axis = v0 - v1;
    edge.t = (axis.dot(hit.position - v1) / axis.dot(axis)).clamp(0.0, 1.0);
    edge.normal = Some(hit.normal);
  }
  Ok(())
}

/// Pad `queries` to capacity, dispatch on the owner thread, truncate.
fn dispatch_padded(
  report: &ProgressReport,
  kernel: KernelId,
  capacity: usize,
  threads_per_group: usize,
  max_iters: u32,
  mut queries: Vec<RayQuery>,
) -> Result<Vec<RayHit>, StageError> {
  let count = queries.len();
  if count == 0 {
    return Ok(Vec::new());
  }
  let groups = group_count(count, threads_per_group);
  queries.resize(capacity, RayQuery::default());

  let mut hits = report.enqueue_task(move |device| {
    let mut output = vec![RayHit::default(); capacity];
    device
      .dispatch(kernel, groups, max_iters, &queries, &mut output)
      .map(|()| output)
  })??;
  hits.truncate(count);
  Ok(hits)
}

/// `t += cell_edge * d(point)` until the crossing is within epsilon of the
/// surface or the iteration cap is hit.
pub fn refine_fixed_point(
  field: &dyn DistanceField,
  edge: &mut Edge,
  geometry: &LatticeGeometry,
  config: &MesherConfig,
) {
  for _ in 0..config.refine_iterations {
    let d = field.distance(edge.crossing_point(geometry));
    if d.abs() < config.epsilon {
      break;
    }
    edge.t = (edge.t + geometry.cell_edge * d).clamp(0.0, 1.0);
  }
}

#[cfg(test)]
#[path = "evaluator_test.rs"]
mod evaluator_test;
