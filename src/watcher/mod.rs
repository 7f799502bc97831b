//! Event-loop-driven blocking waits with timeout and abort.
//!
//! A [`FutureWatcher`] is a transient helper bound to a
//! [`MainThreadExecutor`]: it blocks the calling thread inside a private
//! event loop until the watched future(s) complete, a timeout expires, or
//! the executor broadcasts
//! [`abort_waiting_jobs`](MainThreadExecutor::abort_waiting_jobs). The only
//! cross-context notification is a quit posted to the private loop, which
//! is safe from any thread.

use crate::executor::{EventLoop, LoopRunResult, MainThreadExecutor, WaiterEntry};
use crate::future::{Future, RegisterContinuationResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Why a watcher wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// The watched future(s) finished.
    FutureCompleted,
    /// The timeout elapsed first.
    Timeout,
    /// The executor aborted its waiting jobs.
    AbortRequested,
}

/// Blocks until futures complete, a timeout expires, or an abort fires.
pub struct FutureWatcher {
    executor: Arc<MainThreadExecutor>,
}

impl FutureWatcher {
    /// Creates a watcher whose waits can be aborted through `executor`.
    #[must_use]
    pub fn new(executor: &Arc<MainThreadExecutor>) -> Self {
        Self {
            executor: Arc::clone(executor),
        }
    }

    /// Waits until `future` completes, `timeout` elapses, or an abort
    /// fires. An invalid or already-finished future completes the wait
    /// immediately.
    pub fn wait_for<T>(&self, future: &Future<T>, timeout: Option<Duration>) -> WaitResult {
        if !future.is_valid() || future.is_finished() {
            return WaitResult::FutureCompleted;
        }

        let event_loop = EventLoop::new();
        let aborted = Arc::new(AtomicBool::new(false));
        let waiter = self.register(&event_loop, &aborted);

        let quit = event_loop.handle();
        if future.register_continuation(move |_| quit.post_quit())
            == RegisterContinuationResult::AlreadyCompleted
        {
            drop(waiter);
            return WaitResult::FutureCompleted;
        }

        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let run = event_loop.run_with_deadline(deadline);
        drop(waiter);

        if future.is_finished() {
            WaitResult::FutureCompleted
        } else if aborted.load(Ordering::SeqCst) {
            WaitResult::AbortRequested
        } else if run == LoopRunResult::DeadlineExpired {
            WaitResult::Timeout
        } else {
            // A quit with nothing finished can only come from an abort
            // broadcast that raced with the flag store.
            WaitResult::AbortRequested
        }
    }

    /// Waits until every valid future in `futures` completes, `timeout`
    /// elapses, or an abort fires. Invalid and already-finished members
    /// count as complete up front.
    pub fn wait_for_all<T>(
        &self,
        futures: &[Future<T>],
        timeout: Option<Duration>,
    ) -> WaitResult {
        let event_loop = EventLoop::new();
        let aborted = Arc::new(AtomicBool::new(false));

        // Incomplete-future counter behind its own mutex, seeded with every
        // valid member before any continuation can fire. Zeroing it on a
        // cancelled wait tells still-pending continuations to stay silent.
        let valid_members = futures.iter().filter(|future| future.is_valid()).count();
        if valid_members == 0 {
            return WaitResult::FutureCompleted;
        }
        let remaining = Arc::new(Mutex::new(valid_members));
        for future in futures {
            if !future.is_valid() {
                continue;
            }
            let quit = event_loop.handle();
            let counter = Arc::clone(&remaining);
            let registered = future.register_continuation(move |_| {
                let mut remaining = counter.lock();
                if *remaining == 0 {
                    return;
                }
                *remaining -= 1;
                if *remaining == 0 {
                    quit.post_quit();
                }
            });
            if registered == RegisterContinuationResult::AlreadyCompleted {
                // Decrement inline for members that completed before the
                // wait began.
                let mut remaining = remaining.lock();
                *remaining = remaining.saturating_sub(1);
            }
        }
        if *remaining.lock() == 0 {
            return WaitResult::FutureCompleted;
        }

        let waiter = self.register(&event_loop, &aborted);
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let run = event_loop.run_with_deadline(deadline);
        drop(waiter);

        let mut remaining = remaining.lock();
        if *remaining == 0 && !aborted.load(Ordering::SeqCst) {
            return WaitResult::FutureCompleted;
        }
        *remaining = 0;
        if aborted.load(Ordering::SeqCst) {
            WaitResult::AbortRequested
        } else if run == LoopRunResult::DeadlineExpired {
            WaitResult::Timeout
        } else {
            WaitResult::AbortRequested
        }
    }

    fn register(&self, event_loop: &EventLoop, aborted: &Arc<AtomicBool>) -> WaiterGuard<'_> {
        let key = self.executor.register_waiter(WaiterEntry {
            aborted: Arc::clone(aborted),
            wake: event_loop.handle(),
        });
        WaiterGuard {
            executor: &self.executor,
            key,
        }
    }
}

impl std::fmt::Debug for FutureWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FutureWatcher").finish_non_exhaustive()
    }
}

struct WaiterGuard<'a> {
    executor: &'a MainThreadExecutor,
    key: usize,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.executor.unregister_waiter(self.key);
    }
}

/// Blocks until `future` completes and returns a clone of its value.
///
/// Intended for tests and other throwaway call sites: if the future already
/// finished the value is read inline, otherwise a local event loop runs
/// until a continuation quits it.
///
/// # Panics
///
/// Panics if the future is invalid.
#[must_use]
pub fn wait_for_result<T>(future: &Future<T>) -> T
where
    T: Clone + Send + Sync + 'static,
{
    if !future.is_finished() {
        let event_loop = EventLoop::new();
        let quit = event_loop.handle();
        if future.register_continuation(move |_| quit.post_quit())
            == RegisterContinuationResult::Registered
        {
            event_loop.run();
        }
    }
    future.get().clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::Promise;
    use std::thread;

    fn watcher_fixture() -> (Arc<MainThreadExecutor>, FutureWatcher) {
        let event_loop = EventLoop::new();
        let executor = Arc::new(MainThreadExecutor::new(event_loop.handle()));
        let watcher = FutureWatcher::new(&executor);
        (executor, watcher)
    }

    #[test]
    fn finished_future_completes_the_wait_immediately() {
        let (_executor, watcher) = watcher_fixture();
        let promise = Promise::new();
        promise.set_result(1);
        assert_eq!(
            watcher.wait_for(&promise.get_future(), None),
            WaitResult::FutureCompleted
        );
    }

    #[test]
    fn invalid_future_counts_as_completed() {
        let (_executor, watcher) = watcher_fixture();
        assert_eq!(
            watcher.wait_for(&Future::<i32>::invalid(), None),
            WaitResult::FutureCompleted
        );
    }

    #[test]
    fn completion_from_another_thread_ends_the_wait() {
        let (_executor, watcher) = watcher_fixture();
        let promise = Promise::<i32>::new();
        let future = promise.get_future();
        let completer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            promise.set_result(3);
        });
        assert_eq!(
            watcher.wait_for(&future, Some(Duration::from_secs(5))),
            WaitResult::FutureCompleted
        );
        completer.join().expect("completer thread panicked");
    }

    #[test]
    fn timeout_expires_for_a_pending_future() {
        let (_executor, watcher) = watcher_fixture();
        let promise = Promise::<i32>::new();
        assert_eq!(
            watcher.wait_for(&promise.get_future(), Some(Duration::from_millis(10))),
            WaitResult::Timeout
        );
    }

    #[test]
    fn abort_resolves_a_pending_wait() {
        let (executor, watcher) = watcher_fixture();
        let promise = Promise::<i32>::new();
        let future = promise.get_future();
        let aborter = thread::spawn({
            let executor = Arc::clone(&executor);
            move || {
                thread::sleep(Duration::from_millis(10));
                executor.abort_waiting_jobs();
            }
        });
        assert_eq!(
            watcher.wait_for(&future, Some(Duration::from_secs(5))),
            WaitResult::AbortRequested
        );
        aborter.join().expect("aborter thread panicked");
    }

    #[test]
    fn wait_for_all_returns_once_every_member_finished() {
        let (_executor, watcher) = watcher_fixture();
        let first = Promise::<i32>::new();
        let second = Promise::<i32>::new();
        second.set_result(2);
        let futures = [first.get_future(), second.get_future()];

        let completer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            first.set_result(1);
        });
        assert_eq!(
            watcher.wait_for_all(&futures, Some(Duration::from_secs(5))),
            WaitResult::FutureCompleted
        );
        completer.join().expect("completer thread panicked");
    }

    #[test]
    fn wait_for_all_times_out_and_silences_late_members() {
        let (_executor, watcher) = watcher_fixture();
        let pending = Promise::<i32>::new();
        let futures = [pending.get_future()];
        assert_eq!(
            watcher.wait_for_all(&futures, Some(Duration::from_millis(10))),
            WaitResult::Timeout
        );
        // The late completion must not disturb anything.
        pending.set_result(9);
    }

    #[test]
    fn wait_for_result_returns_the_value() {
        let promise = Promise::<i32>::new();
        let future = promise.get_future();
        let completer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            promise.set_result(27);
        });
        assert_eq!(wait_for_result(&future), 27);
        completer.join().expect("completer thread panicked");
    }
}
