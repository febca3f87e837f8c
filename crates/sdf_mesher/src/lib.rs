//! sdf_mesher - Dual-contouring surface extraction for signed distance fields
//!
//! Samples a signed distance field over a cubic lattice, finds the lattice
//! edges where the sign changes, places one dual vertex per touched cell and
//! connects them into a triangle mesh. Work runs on background workers; the
//! owning thread polls progress and serves accelerator dispatches.
//!
//! # Features
//!
//! - **Four-stage pipeline**: distances, edge intersections, dual vertices,
//!   mesh assembly. Each stage is started explicitly and can be cancelled
//! - **Two evaluators**: closures and scenes evaluated on the CPU with rayon,
//!   or batched dispatch through an owner-thread [`ComputeDevice`]
//! - **Sparse storage**: crossing edges and dual vertices live in an octree
//!   keyed by lattice coordinate
//! - **Mesh sinks**: in-memory collection or Wavefront OBJ output
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sdf_mesher::{MemorySink, MeshSink, MesherConfig, MeshingPipeline, ProgressReport};
//!
//! let config = MesherConfig::new().with_grid_radius(4.0).with_grid_size(32);
//! let mut pipeline = MeshingPipeline::cpu(config, |p: glam::Vec3| p.length() - 2.0);
//! let report = Arc::new(ProgressReport::new());
//!
//! pipeline.clear()?;
//! pipeline.calculate_distances(&report)?;
//! pipeline.run_blocking(&report);
//! pipeline.find_edge_intersections(&report)?;
//! pipeline.run_blocking(&report);
//! pipeline.construct_vertices(&report)?;
//! pipeline.run_blocking(&report);
//!
//! let sink = MemorySink::new();
//! let handle: Box<dyn MeshSink> = Box::new(sink.clone());
//! pipeline.create_mesh(&report, Some(handle))?;
//! pipeline.run_blocking(&report);
//!
//! let mesh = sink.last().unwrap();
//! println!("{} vertices, {} triangles", mesh.vertex_count(), mesh.triangle_count());
//! ```

pub mod constants;
pub mod coord;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use constants::{
  DEFAULT_GRID_RADIUS, DEFAULT_GRID_SIZE, DISTANCE_KERNEL, MAX_MESH_VERTICES, RAYMARCH_KERNEL,
};
pub use coord::LatticeCoord;
pub use error::{ConfigurationError, DeviceError, PipelineError, SinkError, StageError};
pub use types::{
  AcceleratorConfig, AlgorithmStep, DistanceGrid, DualVertex, Edge, LatticeGeometry, MeshBuffers,
  MesherConfig,
};

// Sparse coordinate index for edges and dual vertices
pub mod octree;
pub use octree::CoordinateIndex;

// Distance field capability and the built-in fields
pub mod field;
pub mod samplers;
pub mod scene;
pub use field::DistanceField;
pub use scene::{FieldNode, FieldScene, Primitive, PropertyBlock};

// Owner-thread rendezvous and progress reporting
pub mod progress;
pub mod rendezvous;
pub use progress::{ProgressReport, ProgressState, RunStatus, RunTicket};

// Accelerator abstraction and evaluators
pub mod compute;
pub mod evaluator;
pub use compute::{AcceleratorHost, ComputeDevice, SoftwareDevice};
pub use evaluator::Evaluator;

// Stage workers
pub mod threading;

// Mesh delivery
pub mod sink;
pub use sink::{MemorySink, MeshSink, ObjSink};

// Four-stage meshing pipeline
pub mod pipeline;
pub use pipeline::MeshingPipeline;
