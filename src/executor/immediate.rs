//! An executor that runs work inline in the caller's context.

use super::{BoxedAction, ContinuationRegistry, Executor};

/// Runs every action synchronously on the thread that schedules it.
///
/// `schedule` therefore returns an already-completed future, and a chained
/// continuation fires on whichever thread completes the input future. Useful
/// as test-harness glue and as the escape hatch for "continue on whoever
/// finished the producer".
#[derive(Debug, Default)]
pub struct ImmediateExecutor {
    registry: ContinuationRegistry,
}

impl ImmediateExecutor {
    /// Creates a new immediate executor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: ContinuationRegistry::new(),
        }
    }
}

impl Executor for ImmediateExecutor {
    fn schedule_impl(&self, action: BoxedAction) {
        action.execute();
    }

    fn registry(&self) -> &ContinuationRegistry {
        &self.registry
    }
}
