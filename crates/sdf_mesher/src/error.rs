//! Error types.
//!
//! Control-surface calls fail synchronously with [`PipelineError`] before any
//! background work is spawned. Failures inside a stage worker are
//! [`StageError`]s; they never escape the worker and end up on the progress
//! state instead.

use thiserror::Error;

use crate::types::AlgorithmStep;

/// Evaluator or grid parameters cannot be used.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
  #[error("compute entry point `{0}` not found")]
  MissingKernel(String),

  #[error("grid radius must be positive, got {0}")]
  InvalidGridRadius(f32),

  #[error("grid size must be at least {min}, got {size}")]
  InvalidGridSize { size: usize, min: usize },

  #[error("accelerator batch sizing must be non-zero")]
  InvalidBatchSize,

  #[error("duplicate field node name `{0}`")]
  DuplicateNode(String),

  #[error("device rejected configuration: {0}")]
  Device(#[from] DeviceError),
}

/// Synchronous rejection of a pipeline control call.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("stage requires step {required:?}, pipeline is at {current:?}")]
  StepOutOfOrder {
    required: AlgorithmStep,
    current: AlgorithmStep,
  },

  #[error("a previous stage is still running")]
  Busy,

  #[error("no mesh sink supplied")]
  SinkUnavailable,

  #[error("refusing to create mesh with {vertices} vertices (limit {limit})")]
  MeshTooLarge { vertices: usize, limit: usize },

  #[error(transparent)]
  Configuration(#[from] ConfigurationError),
}

/// Failure inside a stage worker.
#[derive(Debug, Error)]
pub enum StageError {
  #[error("run was cancelled")]
  Cancelled,

  #[error("accelerator hand-off failed: {0}")]
  Rendezvous(#[from] RendezvousError),

  #[error("accelerator dispatch failed: {0}")]
  Device(#[from] DeviceError),

  #[error("stage panicked: {0}")]
  Panicked(String),
}

/// Accelerator dispatch failure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeviceError {
  #[error("unknown kernel id {0}")]
  UnknownKernel(usize),

  #[error("buffers not allocated")]
  BuffersNotAllocated,

  #[error("dispatch of {requested} invocations exceeds buffer capacity {capacity}")]
  CapacityExceeded { requested: usize, capacity: usize },

  #[error("property `{0}` is not declared by the kernel")]
  UnknownProperty(String),
}

/// Cross-thread hand-off to the owner thread failed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RendezvousError {
  #[error("owner queue is closed")]
  Closed,

  #[error("owner dropped the task without running it")]
  Abandoned,
}

/// Mesh sink rejected or failed to store a mesh.
#[derive(Debug, Error)]
pub enum SinkError {
  #[error("mesh has {vertices} vertices, sink accepts at most {limit}")]
  TooManyVertices { vertices: usize, limit: usize },

  #[error("failed to write mesh: {0}")]
  Io(#[from] std::io::Error),
}
