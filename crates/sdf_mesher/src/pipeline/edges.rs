//! Stage 2: Edge intersection
//!
//! Every inside point (`d <= 0`) looks at its six axis neighbours; each
//! outside neighbour (`d > 0`) makes a crossing edge. Crossings start at the
//! linear interpolation and are refined by the evaluator before being stored
//! in the edge index under their inside endpoint.
//!
//! Progress: first half scanning k-slices, second half refining batches.

use crate::constants::NEIGHBOR_OFFSETS;
use crate::coord::LatticeCoord;
use crate::error::StageError;
use crate::evaluator::BatchEvaluator;
use crate::progress::{ProgressReport, RunTicket};
use crate::types::{Edge, MesherConfig};

use super::types::RunData;

/// Crossing edges of the grid in scan order, unrefined.
pub fn scan_edges(
  report: &ProgressReport,
  ticket: RunTicket,
  data: &RunData,
) -> Result<Vec<Edge>, StageError> {
  let size = data.geometry.size as i32;
  let mut edges = Vec::new();
  for k in 0..size {
    if report.is_cancelled(ticket) {
      return Err(StageError::Cancelled);
    }
    for j in 0..size {
      for i in 0..size {
        let c0 = LatticeCoord::new(i, j, k);
        let Some(d0) = data.grid.get(c0) else {
          continue;
        };
        if d0 > 0.0 {
          continue;
        }
        for offset in NEIGHBOR_OFFSETS {
          let c1 = c0 + LatticeCoord::from_array(offset);
          match data.grid.get(c1) {
            Some(d1) if d1 > 0.0 => edges.push(Edge::new(c0, c1, d0, d1)),
            _ => {}
          }
        }
      }
    }
    report.set_progress(0.5 * (k + 1) as f64 / size as f64);
  }
  Ok(edges)
}

/// Find, refine and index every crossing edge.
#[tracing::instrument(skip_all, name = "pipeline::find_edges")]
pub fn find_edges(
  report: &ProgressReport,
  ticket: RunTicket,
  evaluator: &BatchEvaluator,
  config: &MesherConfig,
  data: &mut RunData,
) -> Result<(), StageError> {
  let mut edges = scan_edges(report, ticket, data)?;

  let batches = edges.len().div_ceil(evaluator.capacity()).max(1);
  for (n, batch) in edges.chunks_mut(evaluator.capacity()).enumerate() {
    evaluator.refine(report, ticket, batch, &data.geometry, config)?;
    report.set_progress(0.5 + 0.5 * (n + 1) as f64 / batches as f64);
  }

  data.edges.clear();
  for edge in edges {
    data.edges.add(edge.c0, edge);
  }
  report.set_progress(1.0);
  tracing::debug!(
    edges = data.edges.len(),
    depth = data.edges.depth(),
    spilled = data.edges.spilled(),
    "edge index built"
  );
  Ok(())
}
