//! Executors: targets onto which work is dispatched.
//!
//! An executor accepts type-erased single-shot [`Action`]s through
//! [`Executor::schedule_impl`] and decides where and when they run. The
//! chain operators ([`ExecutorExt::schedule`],
//! [`ExecutorExt::schedule_after`],
//! [`ExecutorExt::schedule_after_if_success`]) package closures into actions
//! and wire their results into fresh [`Future`]s.
//!
//! # Concrete executors
//!
//! - [`ImmediateExecutor`]: runs work inline in the caller's context.
//! - [`SimpleExecutor`]: queues work into a FIFO drained explicitly on one
//!   thread.
//! - [`ThreadPool`]: dynamically sized worker pool with idle TTL and
//!   graceful shutdown.
//! - [`MainThreadExecutor`]: marshals work onto an external cooperative
//!   event loop.
//! - [`SingleThreadExecutor`]: owns a dedicated background thread and its
//!   queued-invocation queue.
//!
//! # Ownership discipline
//!
//! A chained closure lives in the executor's waiting-continuation registry
//! from insertion until the chain step (or its error-path cleanup action)
//! removes it *on the executor's context*. Chain continuations hold only a
//! weak handle to the executor; when the executor is gone before the input
//! future completes, the step is silently dropped and the downstream future
//! never completes. Higher layers tie lifetimes together.

mod event_loop;
mod immediate;
mod main_thread;
mod simple;
mod single_thread;
mod thread_pool;

pub use event_loop::{EventLoop, LoopHandle, LoopRunResult};
pub use immediate::ImmediateExecutor;
pub use main_thread::MainThreadExecutor;
pub(crate) use main_thread::WaiterEntry;
pub use simple::SimpleExecutor;
pub use single_thread::SingleThreadExecutor;
pub use thread_pool::{
    RunActionHook, ThreadPool, default_thread_pool, initialize_default_thread_pool,
    set_default_thread_pool,
};

use crate::erased::AnyMovable;
use crate::future::{Future, Promise, register_continuation_or_call_directly};
use crate::outcome::ErrorMessageOr;
use parking_lot::Mutex;
use slab::Slab;
use std::fmt;
use std::sync::{Arc, Weak};

/// A move-only, single-shot unit of work executed by an executor.
///
/// Implemented for every `FnOnce() + Send` closure; executors and hooks deal
/// in `Box<dyn Action>` so heterogeneous work travels through one queue
/// type. The executor owns the boxed action and destroys it after (or
/// instead of) invoking it.
pub trait Action: Send {
    /// Consumes the action and runs it.
    fn execute(self: Box<Self>);
}

impl<F: FnOnce() + Send> Action for F {
    fn execute(self: Box<Self>) {
        (*self)()
    }
}

/// The unit of scheduling accepted by [`Executor::schedule_impl`].
pub type BoxedAction = Box<dyn Action>;

/// Storage for closures belonging to pending chained operations.
///
/// Keys are stable: inserting or removing one slot never disturbs another,
/// so each scheduled chain step can hold its key across arbitrary registry
/// churn. Slots are removed on the executor's own context, which is where
/// a chained closure's resources must be destroyed.
pub struct ContinuationRegistry {
    slots: Mutex<Slab<AnyMovable>>,
}

impl ContinuationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slab::new()),
        }
    }

    /// Returns the number of retained closures.
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        self.slots.lock().len()
    }

    fn insert(&self, value: AnyMovable) -> usize {
        self.slots.lock().insert(value)
    }

    fn remove(&self, key: usize) -> Option<AnyMovable> {
        self.slots.lock().try_remove(key)
    }
}

impl Default for ContinuationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContinuationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuationRegistry")
            .field("waiting_count", &self.waiting_count())
            .finish()
    }
}

/// A target onto which actions are dispatched.
///
/// Implementations provide [`schedule_impl`](Self::schedule_impl), which
/// must be callable from any thread, and expose their waiting-continuation
/// registry. The composition surface lives on [`ExecutorExt`], implemented
/// for `Arc<E>` so chain steps can observe executor liveness through a weak
/// handle.
pub trait Executor: Send + Sync {
    /// Dispatches one action. Thread-safe.
    fn schedule_impl(&self, action: BoxedAction);

    /// The registry retaining closures of pending chained operations.
    fn registry(&self) -> &ContinuationRegistry;

    /// Number of chained closures currently retained by this executor.
    fn waiting_continuation_count(&self) -> usize {
        self.registry().waiting_count()
    }
}

/// Chain operators available on any `Arc`-held executor.
pub trait ExecutorExt {
    /// Packages `f` into an action, schedules it, and returns a future for
    /// its result.
    fn schedule<F, R>(&self, f: F) -> Future<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static;

    /// Schedules `f` to run on this executor once `future` completes,
    /// feeding it the completed value.
    ///
    /// If the input already completed, the chain step is still dispatched
    /// through the executor rather than run inline.
    fn schedule_after<T, F, R>(&self, future: &Future<T>, f: F) -> Future<R>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        R: Send + 'static;

    /// Like [`schedule_after`](Self::schedule_after), but over a
    /// fallible input: `f` runs only on success and its value is rewrapped
    /// in `Ok`. An error input short-circuits to the output future without
    /// invoking `f`, while the retained closure is still destroyed on this
    /// executor's context.
    fn schedule_after_if_success<T, F, R>(
        &self,
        future: &Future<ErrorMessageOr<T>>,
        f: F,
    ) -> Future<ErrorMessageOr<R>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        R: Send + 'static;

    /// The flattening sibling of
    /// [`schedule_after_if_success`](Self::schedule_after_if_success): `f`
    /// itself returns a fallible result, which becomes the output without an
    /// extra `Ok` layer.
    fn schedule_after_and_then<T, F, U>(
        &self,
        future: &Future<ErrorMessageOr<T>>,
        f: F,
    ) -> Future<ErrorMessageOr<U>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> ErrorMessageOr<U> + Send + 'static,
        U: Send + 'static;
}

impl<E> ExecutorExt for Arc<E>
where
    E: Executor + 'static,
{
    fn schedule<F, R>(&self, f: F) -> Future<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let promise = Promise::new();
        let future = promise.get_future();
        self.schedule_impl(Box::new(move || promise.set_result(f())));
        future
    }

    fn schedule_after<T, F, R>(&self, future: &Future<T>, f: F) -> Future<R>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        R: Send + 'static,
    {
        let promise = Promise::new();
        let output = promise.get_future();
        let key = self.registry().insert(AnyMovable::new(f));
        let weak = Arc::downgrade(self);

        register_continuation_or_call_directly(future, move |value: &T| {
            let Some(executor) = weak.upgrade() else {
                return;
            };
            let value = value.clone();
            let weak = Weak::clone(&weak);
            let step: BoxedAction = Box::new(move || {
                let Some(executor) = weak.upgrade() else {
                    return;
                };
                let Some(slot) = executor.registry().remove(key) else {
                    return;
                };
                let f = slot
                    .into_inner::<F>()
                    .expect("waiting-continuation slot held a foreign type");
                promise.set_result(f(value));
            });
            executor.schedule_impl(step);
        });
        output
    }

    fn schedule_after_if_success<T, F, R>(
        &self,
        future: &Future<ErrorMessageOr<T>>,
        f: F,
    ) -> Future<ErrorMessageOr<R>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.schedule_after_and_then(future, move |value| Ok(f(value)))
    }

    fn schedule_after_and_then<T, F, U>(
        &self,
        future: &Future<ErrorMessageOr<T>>,
        f: F,
    ) -> Future<ErrorMessageOr<U>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> ErrorMessageOr<U> + Send + 'static,
        U: Send + 'static,
    {
        let promise = Promise::new();
        let output = promise.get_future();
        let key = self.registry().insert(AnyMovable::new(f));
        let weak = Arc::downgrade(self);

        register_continuation_or_call_directly(future, move |value: &ErrorMessageOr<T>| {
            let Some(executor) = weak.upgrade() else {
                return;
            };
            match value {
                Ok(value) => {
                    let value = value.clone();
                    let weak = Weak::clone(&weak);
                    let step: BoxedAction = Box::new(move || {
                        let Some(executor) = weak.upgrade() else {
                            return;
                        };
                        let Some(slot) = executor.registry().remove(key) else {
                            return;
                        };
                        let f = slot
                            .into_inner::<F>()
                            .expect("waiting-continuation slot held a foreign type");
                        promise.set_result(f(value));
                    });
                    executor.schedule_impl(step);
                }
                Err(error) => {
                    promise.set_result(Err(error.clone()));
                    // The closure may own resources tied to the executor's
                    // context; its destruction is routed there even though it
                    // will never run.
                    let weak = Weak::clone(&weak);
                    let cleanup: BoxedAction = Box::new(move || {
                        if let Some(executor) = weak.upgrade() {
                            drop(executor.registry().remove(key));
                        }
                    });
                    executor.schedule_impl(cleanup);
                }
            }
        });
        output
    }
}
