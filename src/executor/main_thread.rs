//! An executor bound to an external cooperative event loop.

use super::event_loop::LoopHandle;
use super::{BoxedAction, ContinuationRegistry, Executor};
use parking_lot::Mutex;
use slab::Slab;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) struct WaiterEntry {
    pub(crate) aborted: Arc<AtomicBool>,
    pub(crate) wake: LoopHandle,
}

/// Marshals actions onto an externally provided cooperative loop, "the
/// main thread" of the embedding application.
///
/// Actions run serially, in FIFO order, on the loop's thread. The executor
/// additionally tracks watchers waiting on futures on its behalf;
/// [`abort_waiting_jobs`](Self::abort_waiting_jobs) resolves all of their
/// pending waits with an abort. It does not cancel in-flight actions.
pub struct MainThreadExecutor {
    loop_handle: LoopHandle,
    registry: ContinuationRegistry,
    waiters: Mutex<Slab<WaiterEntry>>,
}

impl MainThreadExecutor {
    /// Binds to the loop behind `loop_handle`.
    #[must_use]
    pub fn new(loop_handle: LoopHandle) -> Self {
        Self {
            loop_handle,
            registry: ContinuationRegistry::new(),
            waiters: Mutex::new(Slab::new()),
        }
    }

    /// Resolves every pending [`FutureWatcher`](crate::watcher::FutureWatcher)
    /// wait bound to this executor with an abort.
    pub fn abort_waiting_jobs(&self) {
        let waiters = self.waiters.lock();
        #[cfg(feature = "tracing-integration")]
        tracing::debug!(waiters = waiters.len(), "aborting waiting jobs");
        for (_, waiter) in waiters.iter() {
            waiter.aborted.store(true, Ordering::SeqCst);
            waiter.wake.post_quit();
        }
    }

    pub(crate) fn register_waiter(&self, entry: WaiterEntry) -> usize {
        self.waiters.lock().insert(entry)
    }

    pub(crate) fn unregister_waiter(&self, key: usize) {
        let _ = self.waiters.lock().try_remove(key);
    }
}

impl Executor for MainThreadExecutor {
    fn schedule_impl(&self, action: BoxedAction) {
        self.loop_handle.post(action);
    }

    fn registry(&self) -> &ContinuationRegistry {
        &self.registry
    }
}

impl fmt::Debug for MainThreadExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainThreadExecutor")
            .field("waiters", &self.waiters.lock().len())
            .finish()
    }
}
