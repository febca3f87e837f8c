//! Stage 4: Mesh assembly
//!
//! ```text
//! dual vertices ──▶ positions[index] ──▶ sample(want_normal) ──▶ normals
//!
//! edge ──▶ quad_cells ──▶ q[0..4] (missing slots = first present index)
//!      ──▶ winding w ──▶ (q0, q[w0], q[w1]), (q0, q[w1], q[w2])
//! ```
//!
//! Exactly two triangles per crossing edge. Near the lattice boundary some of
//! them are degenerate.

use glam::Vec3;

use crate::error::StageError;
use crate::evaluator::BatchEvaluator;
use crate::progress::{ProgressReport, RunTicket};
use crate::types::{Edge, MeshBuffers};

use super::types::RunData;

/// Assemble vertex, normal and triangle buffers into `data.mesh`.
#[tracing::instrument(skip_all, name = "pipeline::assemble_mesh")]
pub fn assemble_mesh(
  report: &ProgressReport,
  ticket: RunTicket,
  evaluator: &BatchEvaluator,
  data: &mut RunData,
) -> Result<(), StageError> {
  let mut vertices = vec![Vec3::ZERO; data.vertices.len()];
  for (_, vertex) in data.vertices.iter() {
    vertices[vertex.index as usize] = vertex.position;
  }

  let mut normals = Vec::with_capacity(vertices.len());
  let batches = vertices.len().div_ceil(evaluator.capacity()).max(1);
  for (n, chunk) in vertices.chunks(evaluator.capacity()).enumerate() {
    if report.is_cancelled(ticket) {
      return Err(StageError::Cancelled);
    }
    let samples = evaluator.sample(report, chunk, true)?;
    normals.extend(samples.iter().map(|s| s.normal.unwrap_or(Vec3::Y)));
    report.set_progress(0.5 * (n + 1) as f64 / batches as f64);
  }

  if report.is_cancelled(ticket) {
    return Err(StageError::Cancelled);
  }
  let mut triangles = Vec::with_capacity(data.edges.len() * 2);
  for (_, edge) in data.edges.iter() {
    let q = quad_indices(edge, data);
    let w = edge.winding();
    triangles.push([q[0], q[w[0]], q[w[1]]]);
    triangles.push([q[0], q[w[1]], q[w[2]]]);
  }

  report.set_progress(1.0);
  tracing::debug!(
    vertices = vertices.len(),
    triangles = triangles.len(),
    "mesh assembled"
  );
  data.mesh = Some(MeshBuffers {
    vertices,
    normals,
    triangles,
  });
  Ok(())
}

/// Vertex indices of the cells around `edge`, in quad slot order.
fn quad_indices(edge: &Edge, data: &RunData) -> [u32; 4] {
  let slots = edge
    .quad_cells(data.geometry.size)
    .map(|cell| cell.and_then(|c| data.vertices.get(c)).map(|v| v.index));
  // Stage 3 registered every in-lattice cell, so at least the base is present
  let fill = slots.iter().flatten().next().copied().unwrap_or(0);
  slots.map(|slot| slot.unwrap_or(fill))
}
