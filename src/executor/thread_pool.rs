//! A dynamically sized worker pool with idle TTL and graceful shutdown.

use super::{BoxedAction, ContinuationRegistry, Executor};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Wrapper applied around action execution when installed; it receives the
/// boxed action and decides when (or whether) to execute it.
pub type RunActionHook = Box<dyn Fn(BoxedAction) + Send + Sync>;

struct PoolState {
    queue: VecDeque<BoxedAction>,
    /// Live worker threads, including busy and idle ones.
    workers: usize,
    /// Workers currently blocked waiting for work.
    idle: usize,
    /// Workers currently executing an action.
    busy: usize,
    shutdown: bool,
    handles: Vec<JoinHandle<()>>,
}

struct PoolInner {
    state: Mutex<PoolState>,
    work_available: Condvar,
    min_workers: usize,
    max_workers: usize,
    idle_ttl: Duration,
    run_action: Option<RunActionHook>,
}

/// A worker pool that grows on demand up to `max_workers` and decays back to
/// `min_workers` once workers sit idle for `idle_ttl`.
///
/// Dispatch is FIFO; there is no priority and no work stealing. Queued
/// actions are still executed during shutdown; scheduling after shutdown is
/// a fatal programming error.
pub struct ThreadPool {
    inner: Arc<PoolInner>,
    registry: ContinuationRegistry,
}

impl ThreadPool {
    /// Creates a pool.
    ///
    /// # Panics
    ///
    /// Panics unless `min_workers >= 1`, `min_workers <= max_workers`, and
    /// `idle_ttl` is at least one millisecond.
    #[must_use]
    pub fn new(min_workers: usize, max_workers: usize, idle_ttl: Duration) -> Self {
        Self::with_run_action_hook(min_workers, max_workers, idle_ttl, None)
    }

    /// Creates a pool whose action execution is replaced by `run_action`.
    #[must_use]
    pub fn with_run_action(
        min_workers: usize,
        max_workers: usize,
        idle_ttl: Duration,
        run_action: RunActionHook,
    ) -> Self {
        Self::with_run_action_hook(min_workers, max_workers, idle_ttl, Some(run_action))
    }

    fn with_run_action_hook(
        min_workers: usize,
        max_workers: usize,
        idle_ttl: Duration,
        run_action: Option<RunActionHook>,
    ) -> Self {
        assert!(min_workers >= 1, "thread pool needs at least one worker");
        assert!(
            min_workers <= max_workers,
            "thread pool min_workers must not exceed max_workers"
        );
        assert!(
            idle_ttl >= Duration::from_millis(1),
            "thread pool idle_ttl must be at least one millisecond"
        );
        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    queue: VecDeque::new(),
                    workers: 0,
                    idle: 0,
                    busy: 0,
                    shutdown: false,
                    handles: Vec::new(),
                }),
                work_available: Condvar::new(),
                min_workers,
                max_workers,
                idle_ttl,
                run_action,
            }),
            registry: ContinuationRegistry::new(),
        }
    }

    /// Current number of live worker threads.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.inner.state.lock().workers
    }

    /// Number of workers currently executing an action.
    #[must_use]
    pub fn busy_count(&self) -> usize {
        self.inner.state.lock().busy
    }

    /// Stops accepting work. In-flight and queued actions still complete;
    /// workers exit once the queue is empty.
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            state.shutdown = true;
        }
        self.inner.work_available.notify_all();
        #[cfg(feature = "tracing-integration")]
        tracing::debug!("thread pool shutdown requested");
    }

    /// Blocks until all workers have exited.
    ///
    /// # Panics
    ///
    /// Panics if the pool was not shut down first.
    pub fn wait(&self) {
        let handles = {
            let mut state = self.inner.state.lock();
            assert!(
                state.shutdown,
                "wait called on a thread pool that was not shut down"
            );
            std::mem::take(&mut state.handles)
        };
        for handle in handles {
            let _ = handle.join();
        }
    }

    /// [`shutdown`](Self::shutdown) followed by [`wait`](Self::wait).
    pub fn shutdown_and_wait(&self) {
        self.shutdown();
        self.wait();
    }

    fn spawn_worker(inner: &Arc<PoolInner>, state: &mut PoolState) {
        let worker_inner = Arc::clone(inner);
        state.workers += 1;
        #[cfg(feature = "tracing-integration")]
        tracing::trace!(workers = state.workers, "spawning thread pool worker");
        let handle = thread::Builder::new()
            .name("taskweave-pool-worker".into())
            .spawn(move || worker_loop(&worker_inner))
            .expect("spawning a thread pool worker failed");
        state.handles.push(handle);
    }
}

impl Executor for ThreadPool {
    fn schedule_impl(&self, action: BoxedAction) {
        let mut state = self.inner.state.lock();
        assert!(
            !state.shutdown,
            "action scheduled on a thread pool after shutdown"
        );
        state.queue.push_back(action);
        if state.idle == 0 && state.workers < self.inner.max_workers {
            Self::spawn_worker(&self.inner, &mut state);
        } else {
            self.inner.work_available.notify_one();
        }
    }

    fn registry(&self) -> &ContinuationRegistry {
        &self.registry
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock();
            state.shutdown = true;
        }
        self.inner.work_available.notify_all();
        let handles = std::mem::take(&mut self.inner.state.lock().handles);
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ThreadPool")
            .field("workers", &state.workers)
            .field("busy", &state.busy)
            .field("queued", &state.queue.len())
            .field("shutdown", &state.shutdown)
            .finish()
    }
}

fn worker_loop(inner: &Arc<PoolInner>) {
    let mut state = inner.state.lock();
    loop {
        if let Some(action) = state.queue.pop_front() {
            state.busy += 1;
            MutexGuard::unlocked(&mut state, || run_one(inner, action));
            state.busy -= 1;
            continue;
        }
        if state.shutdown {
            break;
        }
        state.idle += 1;
        let timed_out = inner
            .work_available
            .wait_for(&mut state, inner.idle_ttl)
            .timed_out();
        state.idle -= 1;
        if timed_out
            && state.queue.is_empty()
            && !state.shutdown
            && state.workers > inner.min_workers
        {
            break;
        }
    }
    state.workers -= 1;
    #[cfg(feature = "tracing-integration")]
    tracing::trace!(workers = state.workers, "thread pool worker exiting");
}

fn run_one(inner: &PoolInner, action: BoxedAction) {
    match &inner.run_action {
        Some(hook) => hook(action),
        None => action.execute(),
    }
}

/// Process-wide default pool management.
///
/// The default pool may be installed at most once, and only before anything
/// has observed it; afterwards installation is a fatal programming error.
struct DefaultPoolSlot {
    pool: Option<Arc<ThreadPool>>,
    observed: bool,
}

static DEFAULT_POOL: Mutex<DefaultPoolSlot> = Mutex::new(DefaultPoolSlot {
    pool: None,
    observed: false,
});

/// Returns the process-wide default pool, creating one on first use.
///
/// The created pool keeps one worker alive and grows up to the machine's
/// available parallelism with a one second idle TTL.
#[must_use]
pub fn default_thread_pool() -> Arc<ThreadPool> {
    let mut slot = DEFAULT_POOL.lock();
    slot.observed = true;
    slot.pool
        .get_or_insert_with(|| {
            let max_workers = thread::available_parallelism().map_or(4, usize::from);
            Arc::new(ThreadPool::new(1, max_workers.max(2), Duration::from_secs(1)))
        })
        .clone()
}

/// Installs a freshly created default pool.
///
/// # Panics
///
/// Panics if the default pool was already installed or observed.
pub fn initialize_default_thread_pool() {
    let max_workers = thread::available_parallelism().map_or(4, usize::from);
    set_default_thread_pool(Arc::new(ThreadPool::new(
        1,
        max_workers.max(2),
        Duration::from_secs(1),
    )));
}

/// Installs `pool` as the process-wide default.
///
/// # Panics
///
/// Panics if the default pool was already installed or observed.
pub fn set_default_thread_pool(pool: Arc<ThreadPool>) {
    let mut slot = DEFAULT_POOL.lock();
    assert!(
        !slot.observed && slot.pool.is_none(),
        "default thread pool installed after first use"
    );
    slot.pool = Some(pool);
}
