use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use super::*;

fn counting_callback(counter: &Arc<AtomicUsize>) -> CompletionCallback {
  let counter = Arc::clone(counter);
  Box::new(move || {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(())
  })
}

#[test]
fn test_initial_state() {
  let report = ProgressReport::new();
  let state = report.current_state();
  assert_eq!(state.status, RunStatus::NotStarted);
  assert_eq!(state.progress, 0.0);
  assert!(state.failure.is_none());
  assert!(!report.changed());
}

#[test]
fn test_start_set_end_lifecycle() {
  let report = ProgressReport::new();
  let ticket = report.start_progress("Calculating distances");

  let state = report.current_state();
  assert_eq!(state.status, RunStatus::Running);
  assert_eq!(state.message, "Calculating distances");

  report.set_progress(0.25);
  assert_eq!(report.current_state().progress, 0.25);
  report.set_progress(3.0);
  assert_eq!(report.current_state().progress, 1.0, "progress is clamped");

  assert!(report.end_progress(ticket));
  assert_eq!(report.status(), RunStatus::Finished);

  report.reset();
  assert_eq!(report.status(), RunStatus::NotStarted);
}

#[test]
fn test_changed_flag_clears_on_read() {
  let report = ProgressReport::new();
  report.start_progress("work");
  assert!(report.changed());
  assert!(!report.changed(), "flag must clear on read");

  report.set_progress(0.5);
  assert!(report.changed());
  assert!(!report.changed());
}

#[test]
fn test_cancel_only_applies_while_running() {
  let report = ProgressReport::new();
  assert!(!report.cancel_progress());
  assert_eq!(report.status(), RunStatus::NotStarted);

  let ticket = report.start_progress("work");
  assert!(report.end_progress(ticket));
  assert!(!report.cancel_progress(), "cancel after natural completion is a no-op");
  assert_eq!(report.status(), RunStatus::Finished);
}

#[test]
fn test_end_after_cancel_keeps_cancelled() {
  let report = ProgressReport::new();
  let ticket = report.start_progress("work");
  assert!(report.cancel_progress());
  assert!(report.is_cancelled(ticket));
  assert!(!report.end_progress(ticket));
  assert_eq!(report.status(), RunStatus::Cancelled);
}

#[test]
fn test_reset_after_cancel_stays_cancelled_for_old_worker() {
  let report = ProgressReport::new();
  let ticket = report.start_progress("work");
  report.cancel_progress();
  report.reset();
  assert_eq!(report.status(), RunStatus::NotStarted);
  assert!(report.is_cancelled(ticket));
}

#[test]
fn test_cancel_drops_completion_callback() {
  let report = ProgressReport::new();
  let calls = Arc::new(AtomicUsize::new(0));

  let ticket = report.start_progress("work");
  report.set_completion_callback(ticket, counting_callback(&calls));
  assert!(report.cancel_progress());
  report.end_progress(ticket);

  assert!(!report.run_completion_callback());
  assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_completion_callback_runs_once_after_finish() {
  let report = ProgressReport::new();
  let calls = Arc::new(AtomicUsize::new(0));

  let ticket = report.start_progress("work");
  report.set_completion_callback(ticket, counting_callback(&calls));
  assert!(!report.run_completion_callback(), "not finished yet");

  report.end_progress(ticket);
  assert!(report.run_completion_callback());
  assert!(!report.run_completion_callback());
  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_callback_is_recorded() {
  let report = ProgressReport::new();
  let ticket = report.start_progress("work");
  report.set_completion_callback(ticket, Box::new(|| Err("disk full".to_string())));
  report.end_progress(ticket);

  assert!(report.run_completion_callback());
  let state = report.current_state();
  assert_eq!(state.status, RunStatus::Finished);
  assert_eq!(state.failure.as_deref(), Some("disk full"));

  // Survives the reset so the session can still read it
  report.reset();
  assert_eq!(report.current_state().failure.as_deref(), Some("disk full"));
}

#[test]
fn test_stale_ticket_cannot_touch_newer_run() {
  let report = ProgressReport::new();
  let old = report.start_progress("first");
  report.cancel_progress();
  report.reset();

  let current = report.start_progress("second");
  assert!(report.is_cancelled(old));
  assert!(!report.is_cancelled(current));

  assert!(!report.end_progress(old));
  report.record_failure(old, "late failure");
  let state = report.current_state();
  assert_eq!(state.status, RunStatus::Running);
  assert!(state.failure.is_none());

  assert!(report.end_progress(current));
}

#[test]
fn test_failure_still_reaches_finished() {
  let report = ProgressReport::new();
  let ticket = report.start_progress("work");
  report.record_failure(ticket, "evaluator exploded");
  report.end_progress(ticket);

  let state = report.current_state();
  assert_eq!(state.status, RunStatus::Finished);
  assert_eq!(state.failure.as_deref(), Some("evaluator exploded"));

  let ticket = report.start_progress("again");
  assert!(
    report.current_state().failure.is_none(),
    "a new run starts without failure"
  );
  report.end_progress(ticket);
}

#[test]
fn test_reset_ignores_running_state() {
  let report = ProgressReport::new();
  report.start_progress("work");
  report.reset();
  assert_eq!(report.status(), RunStatus::Running);
}

#[test]
fn test_concurrent_progress_updates() {
  let report = Arc::new(ProgressReport::new());
  let ticket = report.start_progress("work");

  let workers: Vec<_> = (0..4)
    .map(|n| {
      let report = Arc::clone(&report);
      std::thread::spawn(move || {
        for step in 0..100 {
          report.set_progress((n * 100 + step) as f64 / 400.0);
        }
      })
    })
    .collect();
  for worker in workers {
    worker.join().unwrap();
  }

  let progress = report.current_state().progress;
  assert!((0.0..=1.0).contains(&progress));
  assert!(report.end_progress(ticket));
}
