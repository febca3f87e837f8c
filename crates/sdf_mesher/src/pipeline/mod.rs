//! Dual-contouring meshing pipeline.
//!
//! ```text
//! ┌───────┐   ┌────────────┐   ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Clear ├──►│ Distances  ├──►│ Edges        ├──►│ Vertices     ├──►│ Mesh        │
//! └───────┘   └────────────┘   └──────────────┘   └──────────────┘   └─────────────┘
//!                   │                 │                  │                  │
//!            DistanceCalculated  EdgeIntersections  VerticesConstructed  Finished
//!                                     Found
//! ```
//!
//! Each stage call validates the step, spawns one worker through
//! [`spawn_stage`](crate::threading::spawn_stage) and returns immediately.
//! The caller polls the shared [`ProgressReport`] and calls
//! [`MeshingPipeline::pump`] on the owner thread, which serves accelerator
//! tasks, runs the completion callback and releases buffers once the run is
//! over.
//!
//! # Stage Modules
//!
//! - `distances`: dense grid sampling in scan-order batches
//! - `edges`: crossing edges and their refinement
//! - `vertices`: one dual vertex per touched cell
//! - `assembly`: quads, normals and mesh buffers

pub mod assembly;
pub mod distances;
pub mod edges;
pub mod types;
pub mod vertices;

#[cfg(test)]
pub mod test_utils;


pub use types::RunData;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::compute::AcceleratorHost;
use crate::coord::LatticeCoord;
use crate::error::{PipelineError, StageError};
use crate::evaluator::{BatchEvaluator, Evaluator};
use crate::field::DistanceField;
use crate::progress::{CompletionCallback, ProgressReport, ProgressState, RunStatus, RunTicket};
use crate::sink::MeshSink;
use crate::threading::spawn_stage;
use crate::types::{AlgorithmStep, DistanceGrid, DualVertex, Edge, LatticeGeometry, MesherConfig};

/// Owner-thread driver of one meshing session.
pub struct MeshingPipeline {
  config: MesherConfig,
  evaluator: Evaluator,
  geometry: LatticeGeometry,
  data: Arc<Mutex<RunData>>,
  step: Arc<Mutex<AlgorithmStep>>,
}

impl MeshingPipeline {
  pub fn new(config: MesherConfig, evaluator: Evaluator) -> Self {
    let geometry = config.geometry();
    Self {
      config,
      evaluator,
      geometry,
      data: Arc::new(Mutex::new(RunData::new(geometry))),
      step: Arc::new(Mutex::new(AlgorithmStep::NotStarted)),
    }
  }

  /// Pipeline evaluating `field` directly on the stage workers.
  pub fn cpu<F: DistanceField + 'static>(config: MesherConfig, field: F) -> Self {
    Self::new(config, Evaluator::cpu(field))
  }

  /// Pipeline dispatching through an owner-thread accelerator.
  pub fn accelerated(config: MesherConfig, host: AcceleratorHost) -> Self {
    Self::new(config, Evaluator::Accelerated(host))
  }

  pub fn config(&self) -> &MesherConfig {
    &self.config
  }

  /// Replace the configuration. Takes effect at the next [`clear`](Self::clear).
  pub fn set_config(&mut self, config: MesherConfig) {
    self.config = config;
  }

  pub fn evaluator(&self) -> &Evaluator {
    &self.evaluator
  }

  // ===========================================================================
  // Control surface
  // ===========================================================================

  /// Back to `NotStarted` with empty stage outputs, recomputed geometry,
  /// released buffers and a reconfigured evaluator. Idempotent.
  pub fn clear(&mut self) -> Result<(), PipelineError> {
    self.config.validate()?;
    let geometry = self.config.geometry();
    self.try_data()?.reset(geometry);
    self.geometry = geometry;
    *self.step_guard() = AlgorithmStep::NotStarted;
    self.evaluator.release_buffers();
    self.evaluator.configure()?;
    debug!(
      radius = geometry.radius,
      size = geometry.size,
      cell_edge = geometry.cell_edge,
      "pipeline cleared"
    );
    Ok(())
  }

  /// Stage 1: sample the distance field over the lattice.
  pub fn calculate_distances(&mut self, report: &Arc<ProgressReport>) -> Result<(), PipelineError> {
    self.config.validate()?;
    self.launch(
      report,
      Stage {
        name: "distances",
        message: "Calculating distances",
        required: AlgorithmStep::NotStarted,
        completes: AlgorithmStep::DistanceCalculated,
      },
      None,
      |report, ticket, evaluator, _, data| {
        distances::sample_distances(report, ticket, evaluator, data)
      },
    )
  }

  /// Stage 2: find and refine surface-crossing lattice edges.
  pub fn find_edge_intersections(
    &mut self,
    report: &Arc<ProgressReport>,
  ) -> Result<(), PipelineError> {
    self.launch(
      report,
      Stage {
        name: "edges",
        message: "Finding edge intersections",
        required: AlgorithmStep::DistanceCalculated,
        completes: AlgorithmStep::EdgeIntersectionsFound,
      },
      None,
      |report, ticket, evaluator, config, data| {
        edges::find_edges(report, ticket, evaluator, config, data)
      },
    )
  }

  /// Stage 3: build dual vertices.
  pub fn construct_vertices(&mut self, report: &Arc<ProgressReport>) -> Result<(), PipelineError> {
    self.launch(
      report,
      Stage {
        name: "vertices",
        message: "Constructing vertices",
        required: AlgorithmStep::EdgeIntersectionsFound,
        completes: AlgorithmStep::VerticesConstructed,
      },
      None,
      |report, ticket, _, _, data| vertices::build_vertices(report, ticket, data),
    )
  }

  /// Stage 4: assemble the mesh and hand it to `sink` once finished.
  ///
  /// Rejected synchronously without a sink, or when the vertex count is over
  /// the cap. The sink is then never touched.
  pub fn create_mesh(
    &mut self,
    report: &Arc<ProgressReport>,
    sink: Option<Box<dyn MeshSink>>,
  ) -> Result<(), PipelineError> {
    let Some(mut sink) = sink else {
      warn!("create_mesh called without a mesh sink");
      return Err(PipelineError::SinkUnavailable);
    };

    self.check_idle(report, AlgorithmStep::VerticesConstructed)?;
    let vertices = self.try_data()?.vertices.len();
    let limit = self.config.max_vertices.min(sink.max_vertices());
    if vertices > limit {
      warn!(vertices, limit, "mesh too large, not emitting");
      return Err(PipelineError::MeshTooLarge { vertices, limit });
    }

    let data = Arc::clone(&self.data);
    let deliver: CompletionCallback = Box::new(move || {
      let mesh = data
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .mesh
        .take();
      let Some(mesh) = mesh else {
        warn!("no mesh assembled, sink not invoked");
        return Ok(());
      };
      let (vertices, triangles) = (mesh.vertex_count(), mesh.triangle_count());
      match sink.accept(mesh) {
        Ok(()) => {
          info!(vertices, triangles, "mesh delivered");
          Ok(())
        }
        Err(err) => {
          error!(%err, "mesh sink rejected mesh");
          Err(format!("mesh sink: {err}"))
        }
      }
    });

    self.launch(
      report,
      Stage {
        name: "assembly",
        message: "Creating mesh",
        required: AlgorithmStep::VerticesConstructed,
        completes: AlgorithmStep::Finished,
      },
      Some(deliver),
      |report, ticket, evaluator, _, data| assembly::assemble_mesh(report, ticket, evaluator, data),
    )
  }

  /// Owner-thread housekeeping. Serves queued accelerator work; once the run
  /// is terminal, releases buffers, runs the completion callback (finished
  /// runs only) and resets the report. Returns the status seen.
  ///
  /// A sink that rejects the mesh leaves its error in the report's `failure`.
  pub fn pump(&mut self, report: &ProgressReport) -> RunStatus {
    self.evaluator.drain(report);
    let status = report.status();
    if status.is_terminal() {
      self.evaluator.release_buffers();
      if status == RunStatus::Finished {
        report.run_completion_callback();
      }
      report.reset();
    }
    status
  }

  /// Pump until the current run is over. Returns its final state.
  pub fn run_blocking(&mut self, report: &ProgressReport) -> ProgressState {
    loop {
      let state = report.current_state();
      match state.status {
        RunStatus::NotStarted => return state,
        RunStatus::Running => {
          self.evaluator.wait(report, Duration::from_millis(1));
        }
        RunStatus::Cancelled | RunStatus::Finished => {
          self.pump(report);
          return state;
        }
      }
    }
  }

  // ===========================================================================
  // Accessors
  // ===========================================================================

  /// Last completed step.
  pub fn step(&self) -> AlgorithmStep {
    *self.step_guard()
  }

  /// Lattice geometry as of the last [`clear`](Self::clear).
  pub fn geometry(&self) -> LatticeGeometry {
    self.geometry
  }

  // Run data accessors never wait on a stage worker. While one holds the data
  // they fail with `Busy`; an accelerated worker may be parked on this very
  // thread, so blocking here could never return.

  /// Copy of the distance grid.
  pub fn grid(&self) -> Result<DistanceGrid, PipelineError> {
    Ok(self.try_data()?.grid.clone())
  }

  pub fn edge_count(&self) -> Result<usize, PipelineError> {
    Ok(self.try_data()?.edges.len())
  }

  pub fn vertex_count(&self) -> Result<usize, PipelineError> {
    Ok(self.try_data()?.vertices.len())
  }

  /// Crossing edges in index order.
  pub fn edges(&self) -> Result<Vec<Edge>, PipelineError> {
    Ok(self.try_data()?.edges.values().copied().collect())
  }

  /// Dual vertices in index order.
  pub fn dual_vertices(&self) -> Result<Vec<DualVertex>, PipelineError> {
    Ok(self.try_data()?.vertices.values().cloned().collect())
  }

  /// The stored edge from inside point `c0` to outside point `c1`.
  pub fn edge_between(&self, c0: LatticeCoord, c1: LatticeCoord) -> Result<Option<Edge>, PipelineError> {
    Ok(
      self
        .try_data()?
        .edges
        .get_with(c0, |edge| edge.c1 == c1)
        .copied(),
    )
  }

  /// Dual vertex of the cell with min corner `cell`.
  pub fn vertex_at(&self, cell: LatticeCoord) -> Result<Option<DualVertex>, PipelineError> {
    Ok(self.try_data()?.vertices.get(cell).cloned())
  }

  // ===========================================================================
  // Internals
  // ===========================================================================

  fn check_idle(&self, report: &ProgressReport, required: AlgorithmStep) -> Result<(), PipelineError> {
    if report.status() == RunStatus::Running {
      return Err(PipelineError::Busy);
    }
    // A cancelled worker may still hold the data
    drop(self.try_data()?);

    let current = self.step();
    if current != required {
      return Err(PipelineError::StepOutOfOrder { required, current });
    }
    Ok(())
  }

  fn launch<F>(
    &mut self,
    report: &Arc<ProgressReport>,
    stage: Stage,
    callback: Option<CompletionCallback>,
    work: F,
  ) -> Result<(), PipelineError>
  where
    F: FnOnce(&ProgressReport, RunTicket, &BatchEvaluator, &MesherConfig, &mut RunData) -> Result<(), StageError>
      + Send
      + 'static,
  {
    self.check_idle(report, stage.required)?;

    let evaluator = self.evaluator.prepare(&self.config)?;
    self.evaluator.acquire_buffers()?;

    let ticket = report.start_progress(stage.message);
    if let Some(callback) = callback {
      report.set_completion_callback(ticket, callback);
    }
    info!(
      stage = stage.name,
      grid_size = self.config.grid_size,
      "{}",
      stage.message
    );

    let config = self.config.clone();
    let step = Arc::clone(&self.step);
    spawn_stage(
      Arc::clone(report),
      ticket,
      stage.name,
      Arc::clone(&self.data),
      move |report, ticket, data| {
        work(report, ticket, &evaluator, &config, data)?;
        *step.lock().unwrap_or_else(PoisonError::into_inner) = stage.completes;
        Ok(())
      },
    );
    Ok(())
  }

  fn try_data(&self) -> Result<MutexGuard<'_, RunData>, PipelineError> {
    match self.data.try_lock() {
      Ok(data) => Ok(data),
      Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
      Err(TryLockError::WouldBlock) => Err(PipelineError::Busy),
    }
  }

  fn step_guard(&self) -> MutexGuard<'_, AlgorithmStep> {
    self.step.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Static description of one stage.
#[derive(Clone, Copy)]
struct Stage {
  name: &'static str,
  message: &'static str,
  required: AlgorithmStep,
  completes: AlgorithmStep,
}
