//! Stage worker threads.
//!
//! Each pipeline stage runs on its own detached, named thread. Workers stay
//! off rayon's pool: a worker parked on an owner task must never occupy a
//! pool thread the owner needs for its own dispatch.
//!
//! ```text
//! owner                       worker (mesher-<stage>)
//!   start_progress ─┐
//!   spawn_stage ────┼────────► lock data ─► work() ─► unlock
//!   pump() ◄────────┘                                   │
//!      ▲                         record_failure (if Err) │
//!      └──────────────────────── end_progress ◄──────────┘
//! ```
//!
//! The worker always reaches `end_progress` after dropping the data lock, so
//! the owner never observes a terminal state while the data is still held.
//! Panics are caught and recorded like any other stage failure.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tracing::{error, info, info_span};
use web_time::Instant;

use crate::error::StageError;
use crate::progress::{ProgressReport, RunTicket};

/// Run `work` on a new `mesher-<name>` thread against the locked `data`.
///
/// If the thread cannot be spawned the run is failed and ended right away.
pub fn spawn_stage<T, F>(
  report: Arc<ProgressReport>,
  ticket: RunTicket,
  name: &'static str,
  data: Arc<Mutex<T>>,
  work: F,
) where
  T: Send + 'static,
  F: FnOnce(&ProgressReport, RunTicket, &mut T) -> Result<(), StageError> + Send + 'static,
{
  let owner_report = Arc::clone(&report);
  let spawned = thread::Builder::new().name(format!("mesher-{name}")).spawn(move || {
    let _span = info_span!("stage", name).entered();
    let start = Instant::now();

    let outcome = {
      let mut guard = data.lock().unwrap_or_else(PoisonError::into_inner);
      panic::catch_unwind(AssertUnwindSafe(|| work(&report, ticket, &mut guard)))
        .unwrap_or_else(|payload| Err(StageError::Panicked(panic_message(payload))))
    };

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    match outcome {
      Ok(()) => info!(stage = name, elapsed_ms, "stage complete"),
      // An abandoned hand-off after cancel is part of the cancellation
      Err(_) if report.is_cancelled(ticket) => info!(stage = name, elapsed_ms, "stage cancelled"),
      Err(err) => {
        error!(stage = name, %err, "stage failed");
        report.record_failure(ticket, format!("{name}: {err}"));
      }
    }

    report.end_progress(ticket);
  });

  if let Err(err) = spawned {
    error!(stage = name, %err, "failed to spawn stage worker");
    owner_report.record_failure(ticket, format!("{name}: {err}"));
    owner_report.end_progress(ticket);
  }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}

// =============================================================================
// Tests
// =============================================================================
