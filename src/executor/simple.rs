//! A FIFO executor drained explicitly on one thread.

use super::{BoxedAction, ContinuationRegistry, Executor};
use crossbeam_queue::SegQueue;
use std::fmt;

/// Queues actions into an internal FIFO; nothing runs until [`drain`] is
/// called.
///
/// Scheduling is thread-safe, draining is meant to happen on a single
/// thread. Actions scheduled *during* a drain (by the actions being
/// executed) are picked up by the same drain call.
///
/// [`drain`]: SimpleExecutor::drain
#[derive(Default)]
pub struct SimpleExecutor {
    queue: SegQueue<BoxedAction>,
    registry: ContinuationRegistry,
}

impl SimpleExecutor {
    /// Creates an executor with an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            registry: ContinuationRegistry::new(),
        }
    }

    /// Pops and executes queued actions until the queue is empty.
    pub fn drain(&self) {
        while let Some(action) = self.queue.pop() {
            action.execute();
        }
    }

    /// Number of actions queued and not yet drained.
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }
}

impl Executor for SimpleExecutor {
    fn schedule_impl(&self, action: BoxedAction) {
        self.queue.push(action);
    }

    fn registry(&self) -> &ContinuationRegistry {
        &self.registry
    }
}

impl fmt::Debug for SimpleExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleExecutor")
            .field("queued_count", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorExt;
    use std::sync::Arc;

    #[test]
    fn nothing_runs_before_drain() {
        let executor = Arc::new(SimpleExecutor::new());
        let future = executor.schedule(|| 1);
        assert!(!future.is_finished());
        assert_eq!(executor.queued_count(), 1);

        executor.drain();
        assert!(future.is_finished());
        assert_eq!(*future.get(), 1);
    }

    #[test]
    fn actions_scheduled_during_drain_run_in_the_same_drain() {
        let executor = Arc::new(SimpleExecutor::new());
        let inner = {
            let executor = Arc::clone(&executor);
            move || executor.schedule(|| 2)
        };
        let outer = executor.schedule(inner);

        executor.drain();
        assert!(outer.is_finished());
        let nested = outer.get().clone();
        assert!(nested.is_finished());
        assert_eq!(*nested.get(), 2);
    }

    #[test]
    fn drain_preserves_fifo_order() {
        let executor = Arc::new(SimpleExecutor::new());
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = Arc::clone(&order);
            executor.schedule_impl(Box::new(move || order.lock().push(i)));
        }
        executor.drain();
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }
}
