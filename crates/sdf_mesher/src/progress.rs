//! Progress and cancellation coordinator.
//!
//! One [`ProgressReport`] is shared (behind an `Arc`) between the session that
//! drives the pipeline and the stage worker of the current run.
//!
//! ```text
//!              start                    end
//! NotStarted ─────────▶ Running ─────────────▶ Finished
//!     ▲                    │                      │
//!     │                    │ cancel               │
//!     │                    ▼                      │
//!     └──── reset ──── Cancelled ◀────────────────┘ reset
//! ```
//!
//! `end` and `cancel` only act on a `Running` state, so whichever happens
//! first wins. Each run gets a [`RunTicket`]; a worker holding the ticket of
//! an older run can no longer touch the state of a newer one.
//!
//! Worker failures are recorded in [`ProgressState::failure`] while the status
//! still reaches `Finished`, so a poller never waits forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::compute::ComputeDevice;
use crate::error::RendezvousError;
use crate::rendezvous::OwnerQueue;

/// Run status of the current operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RunStatus {
  #[default]
  NotStarted,
  Running,
  Cancelled,
  Finished,
}

impl RunStatus {
  /// Finished or cancelled; the session should consume and reset.
  pub fn is_terminal(self) -> bool {
    matches!(self, RunStatus::Finished | RunStatus::Cancelled)
  }
}

/// Snapshot of the observable progress.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ProgressState {
  pub status: RunStatus,
  /// Fraction of the current stage completed, in `[0, 1]`.
  pub progress: f64,
  pub message: String,
  /// Set when the worker of this run failed.
  pub failure: Option<String>,
}

/// Identifies one run started with [`ProgressReport::start_progress`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RunTicket(u64);

/// Executed on the owner thread once a run is observed as finished.
pub type CompletionCallback = Box<dyn FnOnce() -> Result<(), String> + Send>;

struct Inner {
  state: ProgressState,
  run: u64,
  callback: Option<CompletionCallback>,
}

/// Thread-safe progress state plus the owner-thread task queue.
pub struct ProgressReport {
  inner: Mutex<Inner>,
  changed: AtomicBool,
  queue: OwnerQueue<dyn ComputeDevice>,
}

impl Default for ProgressReport {
  fn default() -> Self {
    Self::new()
  }
}

impl ProgressReport {
  pub fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: ProgressState::default(),
        run: 0,
        callback: None,
      }),
      changed: AtomicBool::new(false),
      queue: OwnerQueue::new(),
    }
  }

  // ===========================================================================
  // Worker side
  // ===========================================================================

  /// Enter `Running` for a new run.
  pub fn start_progress(&self, message: impl Into<String>) -> RunTicket {
    let ticket = {
      let mut inner = self.lock();
      inner.run += 1;
      inner.state = ProgressState {
        status: RunStatus::Running,
        progress: 0.0,
        message: message.into(),
        failure: None,
      };
      RunTicket(inner.run)
    };
    self.queue.reopen();
    self.mark_changed();
    ticket
  }

  /// Update the completed fraction while running.
  pub fn set_progress(&self, fraction: f64) {
    {
      let mut inner = self.lock();
      if inner.state.status != RunStatus::Running {
        return;
      }
      inner.state.progress = fraction.clamp(0.0, 1.0);
    }
    self.mark_changed();
  }

  /// `Running → Finished` for the ticket's run. Returns whether it applied.
  pub fn end_progress(&self, ticket: RunTicket) -> bool {
    let ended = {
      let mut inner = self.lock();
      let applies = inner.run == ticket.0 && inner.state.status == RunStatus::Running;
      if applies {
        inner.state.status = RunStatus::Finished;
      }
      applies
    };
    self.mark_changed();
    ended
  }

  /// Record a failure of the ticket's run without changing its status.
  pub fn record_failure(&self, ticket: RunTicket, message: impl Into<String>) {
    {
      let mut inner = self.lock();
      if inner.run != ticket.0 {
        return;
      }
      inner.state.failure = Some(message.into());
    }
    self.mark_changed();
  }

  /// True once the ticket's run is no longer running: cancelled, reset after
  /// a cancel, or superseded.
  pub fn is_cancelled(&self, ticket: RunTicket) -> bool {
    let inner = self.lock();
    inner.run != ticket.0 || inner.state.status != RunStatus::Running
  }

  /// Run `task` against the owner's compute device and wait for its result.
  pub fn enqueue_task<F, R>(&self, task: F) -> Result<R, RendezvousError>
  where
    F: FnOnce(&mut (dyn ComputeDevice + 'static)) -> R + Send + 'static,
    R: Send + 'static,
  {
    self.queue.call(task)
  }

  // ===========================================================================
  // Session side
  // ===========================================================================

  /// `Running → Cancelled`. Drops the completion callback and abandons queued
  /// owner tasks. No-op unless running.
  pub fn cancel_progress(&self) -> bool {
    let dropped_callback = {
      let mut inner = self.lock();
      if inner.state.status != RunStatus::Running {
        return false;
      }
      inner.state.status = RunStatus::Cancelled;
      inner.callback.take()
    };
    // Dropped outside the lock, the callback may own arbitrary state
    drop(dropped_callback);
    self.queue.abandon();
    self.mark_changed();
    true
  }

  /// Register the callback run by [`run_completion_callback`](Self::run_completion_callback)
  /// once the ticket's run finishes.
  pub fn set_completion_callback(&self, ticket: RunTicket, callback: CompletionCallback) {
    let mut inner = self.lock();
    if inner.run == ticket.0 && inner.state.status == RunStatus::Running {
      inner.callback = Some(callback);
    }
  }

  /// Execute the completion callback if the run finished. Owner thread only.
  pub fn run_completion_callback(&self) -> bool {
    let callback = {
      let mut inner = self.lock();
      if inner.state.status != RunStatus::Finished {
        return false;
      }
      inner.callback.take()
    };
    let Some(callback) = callback else {
      return false;
    };
    if let Err(message) = callback() {
      {
        let mut inner = self.lock();
        if inner.state.status == RunStatus::Finished {
          inner.state.failure = Some(message);
        }
      }
      self.mark_changed();
    }
    true
  }

  /// Execute queued owner tasks against `device`. Owner thread only.
  pub fn drain_queue(&self, device: &mut (dyn ComputeDevice + 'static)) -> usize {
    self.queue.drain(device)
  }

  /// Like [`drain_queue`](Self::drain_queue) but waits up to `timeout` for work.
  pub fn wait_and_drain(
    &self,
    device: &mut (dyn ComputeDevice + 'static),
    timeout: Duration,
  ) -> usize {
    self.queue.wait_and_drain(device, timeout)
  }

  /// Owner tasks currently waiting for a drain.
  pub fn pending_tasks(&self) -> usize {
    self.queue.pending()
  }

  /// Consume a terminal state back to `NotStarted`.
  pub fn reset(&self) {
    {
      let mut inner = self.lock();
      if !inner.state.status.is_terminal() {
        return;
      }
      inner.state.status = RunStatus::NotStarted;
      inner.callback = None;
    }
    self.mark_changed();
  }

  /// Snapshot of the current state.
  pub fn current_state(&self) -> ProgressState {
    self.lock().state.clone()
  }

  pub fn status(&self) -> RunStatus {
    self.lock().state.status
  }

  /// Whether anything changed since the last call. Clears the flag.
  pub fn changed(&self) -> bool {
    self.changed.swap(false, Ordering::AcqRel)
  }

  fn mark_changed(&self) {
    self.changed.store(true, Ordering::Release);
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    // Every mutation leaves Inner consistent, so a poisoned lock is still usable
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

#[cfg(test)]
#[path = "progress_test.rs"]
mod progress_test;
