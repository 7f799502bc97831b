//! A cooperative event loop with a thread-safe posting handle.
//!
//! This is the queued-invocation primitive the loop-bound executors build
//! on: actions posted from any thread run serially, in FIFO order, on
//! whichever thread is inside [`EventLoop::run`]. Watchers use private
//! loops the same way, with a quit-post as the only cross-context
//! notification.

use super::BoxedAction;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

struct LoopState {
    queue: VecDeque<BoxedAction>,
    quit: bool,
    stopped: bool,
}

struct LoopShared {
    state: Mutex<LoopState>,
    wake: Condvar,
}

/// Why a [`EventLoop::run_with_deadline`] call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopRunResult {
    /// A quit was posted.
    Quit,
    /// The deadline passed without a quit.
    DeadlineExpired,
}

/// A FIFO action loop owned by one thread at a time.
pub struct EventLoop {
    shared: Arc<LoopShared>,
}

impl EventLoop {
    /// Creates a loop with an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(LoopShared {
                state: Mutex::new(LoopState {
                    queue: VecDeque::new(),
                    quit: false,
                    stopped: false,
                }),
                wake: Condvar::new(),
            }),
        }
    }

    /// Returns a handle for posting from any thread.
    #[must_use]
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Runs posted actions until a quit is posted.
    ///
    /// The quit flag is consumed, so the loop can be run again afterwards;
    /// actions left in the queue stay queued across runs.
    pub fn run(&self) {
        let _ = self.run_internal(None);
    }

    /// Runs posted actions until a quit is posted or `deadline` passes.
    /// Without a deadline this never returns `DeadlineExpired`.
    pub fn run_with_deadline(&self, deadline: Option<Instant>) -> LoopRunResult {
        self.run_internal(deadline)
    }

    fn run_internal(&self, deadline: Option<Instant>) -> LoopRunResult {
        loop {
            let mut state = self.shared.state.lock();
            if state.quit {
                state.quit = false;
                return LoopRunResult::Quit;
            }
            if let Some(action) = state.queue.pop_front() {
                drop(state);
                action.execute();
                continue;
            }
            match deadline {
                Some(deadline) => {
                    let timed_out = self
                        .shared
                        .wake
                        .wait_until(&mut state, deadline)
                        .timed_out();
                    // Prefer a quit that raced with the deadline.
                    if timed_out && !state.quit && state.queue.is_empty() {
                        return LoopRunResult::DeadlineExpired;
                    }
                }
                None => {
                    self.shared.wake.wait(&mut state);
                }
            }
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.stopped = true;
        state.queue.clear();
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("EventLoop")
            .field("queued", &state.queue.len())
            .field("quit", &state.quit)
            .finish()
    }
}

/// A clonable, thread-safe posting handle for an [`EventLoop`].
#[derive(Clone)]
pub struct LoopHandle {
    shared: Arc<LoopShared>,
}

impl LoopHandle {
    /// Posts an action. Posting to a dropped loop drops the action
    /// silently.
    pub fn post(&self, action: BoxedAction) {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return;
        }
        state.queue.push_back(action);
        drop(state);
        self.shared.wake.notify_one();
    }

    /// Posts a quit; the loop returns once it reaches it. Safe from any
    /// thread.
    pub fn post_quit(&self) {
        let mut state = self.shared.state.lock();
        state.quit = true;
        drop(state);
        self.shared.wake.notify_one();
    }
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle").finish_non_exhaustive()
    }
}
