//! Stage 1: Distance sampling
//!
//! ```text
//! dense index 0 ─────────────────────────────────────────────▶ gs³
//!             │ batch 0 (capacity) │ batch 1 │ ... │ tail (padded) │
//!
//! batch → world positions → BatchEvaluator::sample → grid[start..end]
//! progress = completed k-slices / gs
//! ```

use crate::constants::grid_coord;
use crate::coord::LatticeCoord;
use crate::error::StageError;
use crate::evaluator::BatchEvaluator;
use crate::progress::{ProgressReport, RunTicket};

use super::types::RunData;

/// Fill the distance grid in scan order.
#[tracing::instrument(skip_all, name = "pipeline::sample_distances")]
pub fn sample_distances(
  report: &ProgressReport,
  ticket: RunTicket,
  evaluator: &BatchEvaluator,
  data: &mut RunData,
) -> Result<(), StageError> {
  let geometry = data.geometry;
  let size = geometry.size;
  let slice = size * size;
  let total = geometry.point_count();
  let capacity = evaluator.capacity();

  let mut points = Vec::with_capacity(capacity);
  let mut start = 0;
  while start < total {
    if report.is_cancelled(ticket) {
      return Err(StageError::Cancelled);
    }
    let end = (start + capacity).min(total);

    points.clear();
    points.extend((start..end).map(|index| {
      let (i, j, k) = grid_coord(index, size);
      geometry.position(LatticeCoord::new(i as i32, j as i32, k as i32))
    }));
    let samples = evaluator.sample(report, &points, false)?;

    let out = &mut data.grid.as_mut_slice()[start..end];
    for (slot, sample) in out.iter_mut().zip(&samples) {
      *slot = sample.distance;
    }

    report.set_progress((end / slice) as f64 / size as f64);
    start = end;
  }
  Ok(())
}
