//! Cross-thread calls into a single owner thread.
//!
//! Some work may only run on the thread that owns a resource (the accelerator
//! device). A worker hands such work over with [`OwnerQueue::call`] and blocks
//! until the owner has executed it during [`OwnerQueue::drain`].
//!
//! ```text
//!  worker                         slot (bounded 1)             owner
//!  ──────                         ────────────────             ─────
//!  call(f) ──── Box<FnOnce> ────▶  [ task ]  ────────▶  drain(&mut ctx)
//!     │                                                      │
//!     │ blocks on reply                                   f(ctx)
//!     ◀──────────────── reply (bounded 1, per call) ─────────┘
//! ```
//!
//! Each call is executed exactly once and calls from one worker are executed
//! in order, because the worker cannot issue the next call before the reply
//! to the previous one arrives. A task dropped without running (the queue was
//! abandoned) wakes its caller with [`RendezvousError::Abandoned`].
//!
//! Sending into the slot and closing the queue both happen under one gate, so
//! no task can land in the slot after [`OwnerQueue::abandon`] emptied it.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError};

use crate::error::RendezvousError;

type OwnerTask<C> = Box<dyn FnOnce(&mut C) + Send>;

/// Longest a caller holds the gate while the slot is full.
const SEND_SLICE: Duration = Duration::from_millis(1);

/// Single-slot queue of closures executed against an owner-held context `C`.
pub struct OwnerQueue<C: ?Sized> {
  sender: Sender<OwnerTask<C>>,
  receiver: Receiver<OwnerTask<C>>,
  /// Closed flag; also held around every send.
  gate: Mutex<bool>,
}

impl<C: ?Sized + 'static> Default for OwnerQueue<C> {
  fn default() -> Self {
    Self::new()
  }
}

impl<C: ?Sized + 'static> OwnerQueue<C> {
  pub fn new() -> Self {
    let (sender, receiver) = crossbeam_channel::bounded(1);
    Self {
      sender,
      receiver,
      gate: Mutex::new(false),
    }
  }

  /// Run `f` on the owner thread and block until its result is back.
  ///
  /// Must not be called from the owner thread itself: nobody would drain.
  pub fn call<F, R>(&self, f: F) -> Result<R, RendezvousError>
  where
    F: FnOnce(&mut C) -> R + Send + 'static,
    R: Send + 'static,
  {
    let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
    let mut task: OwnerTask<C> = Box::new(move |ctx: &mut C| {
      // Caller may have given up; nothing to report then
      let _ = reply_tx.send(f(ctx));
    });

    loop {
      let closed = self.gate();
      if *closed {
        return Err(RendezvousError::Closed);
      }
      match self.sender.send_timeout(task, SEND_SLICE) {
        Ok(()) => break,
        Err(SendTimeoutError::Timeout(pending)) => task = pending,
        Err(SendTimeoutError::Disconnected(_)) => return Err(RendezvousError::Closed),
      }
      drop(closed);
    }

    reply_rx.recv().map_err(|_| RendezvousError::Abandoned)
  }

  /// Execute every queued task against `ctx`. Returns the number executed.
  ///
  /// While the queue is closed, queued tasks are dropped instead, which wakes
  /// their callers with an error.
  pub fn drain(&self, ctx: &mut C) -> usize {
    let mut executed = 0;
    loop {
      match self.receiver.try_recv() {
        Ok(task) => executed += self.execute(task, ctx),
        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return executed,
      }
    }
  }

  /// Wait up to `timeout` for a task, then drain everything queued.
  pub fn wait_and_drain(&self, ctx: &mut C, timeout: Duration) -> usize {
    match self.receiver.recv_timeout(timeout) {
      Ok(task) => self.execute(task, ctx) + self.drain(ctx),
      Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
    }
  }

  /// Close the queue and drop anything pending. Blocked callers wake with an
  /// error; later calls fail fast until [`reopen`](Self::reopen).
  pub fn abandon(&self) -> usize {
    let mut closed = self.gate();
    *closed = true;
    let mut dropped = 0;
    while self.receiver.try_recv().is_ok() {
      dropped += 1;
    }
    dropped
  }

  /// Accept calls again.
  pub fn reopen(&self) {
    *self.gate() = false;
  }

  pub fn is_closed(&self) -> bool {
    *self.gate()
  }

  /// Tasks waiting in the slot (0 or 1).
  pub fn pending(&self) -> usize {
    self.receiver.len()
  }

  fn gate(&self) -> MutexGuard<'_, bool> {
    self.gate.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn execute(&self, task: OwnerTask<C>, ctx: &mut C) -> usize {
    if self.is_closed() {
      drop(task);
      0
    } else {
      task(ctx);
      1
    }
  }
}

#[cfg(test)]
#[path = "rendezvous_test.rs"]
mod rendezvous_test;
