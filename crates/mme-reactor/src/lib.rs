//
// Copyright (c) 2024 Elide Technologies, Inc.
//
// Licensed under the MIT license (the "License"); you may not use this file except in compliance
// with the License. You may obtain a copy of the License at
//
// https://opensource.org/license/mit/
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on
// an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under the License.
//

//! Single-threaded cooperative event loop and timer service (spec.md §4.1).
//!
//! Every protocol FSM in this workspace runs its transitions synchronously
//! on the reactor's one OS thread; the reactor itself is a thin shell around
//! a `tokio` current-thread runtime plus a `LocalSet`; it supplies exactly
//! the primitives spec.md §4.1 names:
//!
//! - `spawn` is `register_read`'s realization: a transport module owns its
//!   socket, spawns a task that loops on the socket's own readiness, and
//!   forwards decoded events into whatever channel its owner is selecting
//!   on. A separate raw-fd registration layer would just duplicate what
//!   tokio's socket types already do.
//! - `arm_timer`/`cancel_timer` wrap one-shot timer tasks tracked in a
//!   handle table so a still-pending timer can be cancelled before it fires.
//! - `run` drives everything to completion; `Shutdown`/`ShutdownSignal` give
//!   a cooperative, deadline-bounded stop (spec.md §4.1, §5).

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, LocalSet};

/// Grace period a stopping reactor allows in-flight sessions to quiesce.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Opaque handle returned by `arm_timer`; pass to `cancel_timer` to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// The event loop. Not `Send`/`Sync` by design — it and everything it drives
/// live on a single thread (spec.md §5).
pub struct Reactor {
  rt: tokio::runtime::Runtime,
  local: LocalSet,
  timers: RefCell<HashMap<u64, JoinHandle<()>>>,
  next_timer: RefCell<u64>,
}

impl Reactor {
  pub fn new() -> std::io::Result<Self> {
    let rt = tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()?;
    Ok(Self {
      rt,
      local: LocalSet::new(),
      timers: RefCell::new(HashMap::new()),
      next_timer: RefCell::new(1),
    })
  }

  /// Register interest in a readable source by spawning the task that
  /// drives it. Returns a handle; dropping or aborting it deregisters.
  pub fn spawn<F>(&self, fut: F) -> JoinHandle<()>
  where
    F: Future<Output = ()> + 'static,
  {
    self.local.spawn_local(fut)
  }

  /// Arm a one-shot timer. `on_fire` runs serialized on the reactor thread
  /// when `duration` elapses, unless `cancel_timer` runs first.
  pub fn arm_timer<F>(&self, duration: Duration, on_fire: F) -> TimerHandle
  where
    F: FnOnce() + 'static,
  {
    let id = {
      let mut n = self.next_timer.borrow_mut();
      let id = *n;
      *n = n.wrapping_add(1).max(1);
      id
    };
    let handle = self.local.spawn_local(async move {
      tokio::time::sleep(duration).await;
      on_fire();
    });
    self.timers.borrow_mut().insert(id, handle);
    TimerHandle(id)
  }

  /// Cancel a previously armed timer. A no-op if it already fired.
  pub fn cancel_timer(&self, handle: TimerHandle) {
    if let Some(h) = self.timers.borrow_mut().remove(&handle.0) {
      h.abort();
    }
  }

  /// Drive the reactor until `main` completes.
  pub fn run<F>(&self, main: F) -> F::Output
  where
    F: Future + 'static,
  {
    self.rt.block_on(self.local.run_until(main))
  }
}

/// Cooperative shutdown signal: one `Shutdown` sender, any number of
/// `ShutdownSignal` receivers. Used so `stop(deadline)` (spec.md §4.1) can
/// ask every live session to wind down instead of yanking the thread.
#[derive(Clone)]
pub struct Shutdown(watch::Sender<bool>);

pub struct ShutdownSignal(watch::Receiver<bool>);

impl Shutdown {
  pub fn new() -> (Self, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (Self(tx), ShutdownSignal(rx))
  }

  pub fn trigger(&self) {
    let _ = self.0.send(true);
  }
}

impl ShutdownSignal {
  pub fn is_set(&self) -> bool {
    *self.0.borrow()
  }

  /// Resolves once `trigger()` has been called.
  pub async fn triggered(&mut self) {
    while !*self.0.borrow() {
      if self.0.changed().await.is_err() {
        return;
      }
    }
  }

  pub fn clone_receiver(&self) -> Self {
    Self(self.0.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::rc::Rc;

  #[test]
  fn timer_fires() {
    let reactor = Reactor::new().unwrap();
    let fired = Rc::new(RefCell::new(false));
    let fired2 = fired.clone();
    reactor.arm_timer(Duration::from_millis(1), move || {
      *fired2.borrow_mut() = true;
    });
    reactor.run(async {
      tokio::time::sleep(Duration::from_millis(20)).await;
    });
    assert!(*fired.borrow());
  }

  #[test]
  fn cancelled_timer_does_not_fire() {
    let reactor = Reactor::new().unwrap();
    let fired = Rc::new(RefCell::new(false));
    let fired2 = fired.clone();
    let handle = reactor.arm_timer(Duration::from_millis(10), move || {
      *fired2.borrow_mut() = true;
    });
    reactor.cancel_timer(handle);
    reactor.run(async {
      tokio::time::sleep(Duration::from_millis(30)).await;
    });
    assert!(!*fired.borrow());
  }

  #[test]
  fn shutdown_signal_propagates() {
    let (tx, mut rx) = Shutdown::new();
    assert!(!rx.is_set());
    tx.trigger();
    let reactor = Reactor::new().unwrap();
    reactor.run(async move {
      rx.triggered().await;
    });
  }
}
