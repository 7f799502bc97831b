//! Deferred values: the [`Promise`]/[`Future`] pair and their shared state.
//!
//! A producer constructs a [`Promise<T>`], hands out [`Future<T>`] handles,
//! and completes the shared state exactly once. Consumers observe completion
//! by polling ([`Future::is_finished`]), blocking ([`Future::wait`],
//! [`Future::get`]), or registering a one-shot continuation
//! ([`Future::register_continuation`]).
//!
//! # Continuation contract
//!
//! Continuations registered before completion fire in insertion order, under
//! the shared-state mutex, with the result already stored. A continuation
//! must therefore not block or call back into the same future; long-running
//! work belongs on an executor. A registration attempted after completion is
//! rejected with [`RegisterContinuationResult::AlreadyCompleted`] and the
//! caller invokes the closure itself (see
//! [`register_continuation_or_call_directly`]).
//!
//! # Lifetime
//!
//! The shared state is reference counted and lives until the last `Promise`
//! or `Future` referencing it is gone. Dropping a `Promise` without
//! completing it leaves every downstream future pending forever; call sites
//! guarantee completion themselves.

use parking_lot::{Condvar, MappedMutexGuard, Mutex, MutexGuard};
use smallvec::SmallVec;
use std::fmt;
use std::mem;
use std::ops::Deref;
use std::sync::Arc;

type Continuation<T> = Box<dyn FnOnce(&T) + Send>;

struct Inner<T> {
    result: Option<T>,
    continuations: SmallVec<[Continuation<T>; 2]>,
}

struct SharedState<T> {
    inner: Mutex<Inner<T>>,
    finished: Condvar,
}

impl<T> SharedState<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                result: None,
                continuations: SmallVec::new(),
            }),
            finished: Condvar::new(),
        })
    }
}

/// Outcome of [`Future::register_continuation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterContinuationResult {
    /// The continuation was appended and will fire on completion.
    Registered,
    /// The future was already completed; the continuation was not appended
    /// and the caller is responsible for invoking it.
    AlreadyCompleted,
}

/// The producer side of a deferred value. Move-only; completes the shared
/// state exactly once.
pub struct Promise<T> {
    state: Arc<SharedState<T>>,
}

impl<T> Promise<T> {
    /// Creates a promise with a fresh, pending shared state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SharedState::new(),
        }
    }

    /// Returns a future observing this promise. May be called before or
    /// after the result is set, any number of times.
    #[must_use]
    pub fn get_future(&self) -> Future<T> {
        Future {
            state: Some(Arc::clone(&self.state)),
        }
    }

    /// Stores the result and fires all registered continuations in
    /// insertion order.
    ///
    /// # Panics
    ///
    /// Panics if a result was already set. Completing a promise twice is a
    /// programming error.
    pub fn set_result(&self, value: T) {
        let mut inner = self.state.inner.lock();
        assert!(
            inner.result.is_none(),
            "result set on an already-completed promise"
        );
        inner.result = Some(value);
        let continuations = mem::take(&mut inner.continuations);
        if !continuations.is_empty() {
            let value = inner.result.as_ref().expect("result was just stored");
            for continuation in continuations {
                continuation(value);
            }
        }
        drop(inner);
        self.state.finished.notify_all();
    }

    /// Returns true if the result has been set.
    #[must_use]
    pub fn has_result(&self) -> bool {
        self.state.inner.lock().result.is_some()
    }
}

impl Promise<()> {
    /// Completes a value-less promise.
    pub fn mark_finished(&self) {
        self.set_result(());
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("has_result", &self.has_result())
            .finish()
    }
}

/// A copyable observer of a deferred value.
///
/// A default-constructed future is *invalid*: it observes nothing and never
/// completes. Valid futures are obtained from [`Promise::get_future`].
pub struct Future<T> {
    state: Option<Arc<SharedState<T>>>,
}

impl<T> Future<T> {
    /// Creates an invalid future that observes nothing.
    #[must_use]
    pub const fn invalid() -> Self {
        Self { state: None }
    }

    /// Returns true if this future observes a shared state.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    /// Returns true if the observed value is available. An invalid future is
    /// never finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match &self.state {
            Some(state) => state.inner.lock().result.is_some(),
            None => false,
        }
    }

    /// Blocks until the result is available.
    ///
    /// # Panics
    ///
    /// Panics if the future is invalid.
    pub fn wait(&self) {
        let state = self.expect_state("wait");
        let mut inner = state.inner.lock();
        while inner.result.is_none() {
            state.finished.wait(&mut inner);
        }
    }

    /// Blocks until the result is available and returns a borrowed view of
    /// it. Repeated calls observe the same value.
    ///
    /// # Panics
    ///
    /// Panics if the future is invalid.
    #[must_use]
    pub fn get(&self) -> ValueRef<'_, T> {
        let state = self.expect_state("get");
        let mut inner = state.inner.lock();
        while inner.result.is_none() {
            state.finished.wait(&mut inner);
        }
        ValueRef {
            guard: MutexGuard::map(inner, |inner| {
                inner.result.as_mut().expect("result present after wait")
            }),
        }
    }

    /// Registers a one-shot continuation to fire on completion.
    ///
    /// If the future already completed, the continuation is *not* appended
    /// and [`RegisterContinuationResult::AlreadyCompleted`] is returned; the
    /// caller decides whether and where to invoke it.
    ///
    /// # Panics
    ///
    /// Panics if the future is invalid.
    pub fn register_continuation<F>(&self, continuation: F) -> RegisterContinuationResult
    where
        F: FnOnce(&T) + Send + 'static,
    {
        match self.try_register(continuation) {
            Ok(()) => RegisterContinuationResult::Registered,
            Err(_) => RegisterContinuationResult::AlreadyCompleted,
        }
    }

    /// Like [`register_continuation`](Self::register_continuation), but hands
    /// the closure back when the future already completed.
    pub(crate) fn try_register<F>(&self, continuation: F) -> Result<(), F>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let state = self.expect_state("register_continuation");
        let mut inner = state.inner.lock();
        if inner.result.is_some() {
            return Err(continuation);
        }
        inner.continuations.push(Box::new(continuation));
        Ok(())
    }

    fn expect_state(&self, operation: &str) -> &Arc<SharedState<T>> {
        self.state
            .as_ref()
            .unwrap_or_else(|| panic!("{operation} called on an invalid future"))
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> Default for Future<T> {
    fn default() -> Self {
        Self::invalid()
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("is_valid", &self.is_valid())
            .field("is_finished", &self.is_finished())
            .finish()
    }
}

/// A borrowed view of a completed future's value, held under the
/// shared-state lock.
///
/// Completing the same shared state is impossible while a `ValueRef` exists,
/// so keep the borrow short.
pub struct ValueRef<'a, T> {
    guard: MappedMutexGuard<'a, T>,
}

impl<T> Deref for ValueRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Registers `continuation` on `future`, or invokes it inline on the calling
/// thread when the future already completed.
///
/// This is the glue used by executors and combinators to make "fire on
/// completion" uniform regardless of whether completion already happened.
pub fn register_continuation_or_call_directly<T, F>(future: &Future<T>, continuation: F)
where
    F: FnOnce(&T) + Send + 'static,
{
    if let Err(continuation) = future.try_register(continuation) {
        let value = future.get();
        continuation(&value);
    }
}
