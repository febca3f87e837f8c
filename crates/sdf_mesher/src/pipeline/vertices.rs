//! Stage 3: Dual vertex construction
//!
//! ```text
//! edge (c0, c1) ──▶ base = min(c0, c1) ──▶ ≤ 4 cells across the edge
//!                                          │
//!                      first sighting: register DualVertex(cell)
//!                      every sighting: += crossing point, push edge ordinal
//!
//! then: position = mean of crossings, index = iteration order
//! ```

use crate::error::StageError;
use crate::progress::{ProgressReport, RunTicket};
use crate::types::DualVertex;

use super::types::RunData;

/// Edges between cancellation checks.
const CHECK_INTERVAL: usize = 4096;

/// Build one dual vertex per cell touched by a crossing edge.
#[tracing::instrument(skip_all, name = "pipeline::build_vertices")]
pub fn build_vertices(
  report: &ProgressReport,
  ticket: RunTicket,
  data: &mut RunData,
) -> Result<(), StageError> {
  let RunData {
    geometry,
    edges,
    vertices,
    ..
  } = data;
  vertices.clear();

  let total = edges.len().max(1);
  for (ordinal, (_, edge)) in edges.iter().enumerate() {
    if ordinal % CHECK_INTERVAL == 0 {
      if report.is_cancelled(ticket) {
        return Err(StageError::Cancelled);
      }
      report.set_progress(ordinal as f64 / total as f64);
    }

    let crossing = edge.crossing_point(geometry);
    for cell in edge.adjacent_cells(geometry.size) {
      match vertices.get_mut(cell) {
        Some(vertex) => vertex.accumulate(ordinal as u32, crossing),
        None => {
          let mut vertex = DualVertex::new(cell);
          vertex.accumulate(ordinal as u32, crossing);
          vertices.add(cell, vertex);
        }
      }
    }
  }

  let mut next = 0u32;
  vertices.map(|vertex| {
    vertex.resolve();
    vertex.index = next;
    next += 1;
  });

  report.set_progress(1.0);
  tracing::debug!(
    vertices = vertices.len(),
    depth = vertices.depth(),
    spilled = vertices.spilled(),
    "dual vertices built"
  );
  Ok(())
}
