//! An executor owning one dedicated background thread.

use super::event_loop::{EventLoop, LoopHandle};
use super::{BoxedAction, ContinuationRegistry, Executor};
use std::fmt;
use std::thread::{self, JoinHandle, ThreadId};

/// Runs actions serially, in FIFO order, on a thread owned by the executor.
///
/// Dropping the executor joins the thread cleanly; actions enqueued but not
/// yet executed at that point are dropped silently, so downstream futures
/// may remain pending forever. Call sites that need every action to run tie
/// the executor's lifetime to the producers feeding it.
pub struct SingleThreadExecutor {
    handle: LoopHandle,
    registry: ContinuationRegistry,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl SingleThreadExecutor {
    /// Spawns the background thread and starts its loop.
    #[must_use]
    pub fn new() -> Self {
        let event_loop = EventLoop::new();
        let handle = event_loop.handle();
        let thread = thread::Builder::new()
            .name("taskweave-executor".into())
            .spawn(move || event_loop.run())
            .expect("spawning the executor thread failed");
        let thread_id = thread.thread().id();
        Self {
            handle,
            registry: ContinuationRegistry::new(),
            thread: Some(thread),
            thread_id,
        }
    }

    /// Returns a posting handle for the owned loop, for callers that need
    /// to marshal raw actions onto this executor's thread.
    #[must_use]
    pub fn loop_handle(&self) -> LoopHandle {
        self.handle.clone()
    }
}

impl Default for SingleThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for SingleThreadExecutor {
    fn schedule_impl(&self, action: BoxedAction) {
        self.handle.post(action);
    }

    fn registry(&self) -> &ContinuationRegistry {
        &self.registry
    }
}

impl Drop for SingleThreadExecutor {
    fn drop(&mut self) {
        self.handle.post_quit();
        if let Some(thread) = self.thread.take() {
            // An action may hold the last reference to this executor, in
            // which case the drop runs on the owned thread itself; the
            // thread cannot join itself, so it is detached instead.
            if thread::current().id() == self.thread_id {
                drop(thread);
            } else {
                let _ = thread.join();
            }
        }
    }
}

impl fmt::Debug for SingleThreadExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleThreadExecutor")
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorExt;
    use std::sync::Arc;

    #[test]
    fn actions_run_on_the_owned_thread() {
        let executor = Arc::new(SingleThreadExecutor::new());
        let outside = thread::current().id();
        let future = executor.schedule(move || thread::current().id() != outside);
        assert!(*future.get());
    }

    #[test]
    fn drop_joins_the_thread() {
        let executor = Arc::new(SingleThreadExecutor::new());
        let future = executor.schedule(|| 1);
        assert_eq!(*future.get(), 1);
        drop(executor);
    }
}
