//! Deadline futures backed by a process-wide timer thread.
//!
//! [`create_timeout`] hands out a [`Future`] that completes once a duration
//! has elapsed on the monotonic clock. The timer never fires early; one
//! extra millisecond of slack is added because the underlying wait is only
//! accurate to within a millisecond. Composed with
//! [`when_any2`](crate::combinator::when_any2) this expresses "first of
//! completion or timeout"; [`with_timeout`] packages that composition.

use crate::future::{Future, Promise, register_continuation_or_call_directly};
use crate::outcome::{Timeout, TimeoutOr};
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// The timer wait is only millisecond-accurate, so every deadline is pushed
/// out by this much to guarantee the future never completes early.
const TIMER_SLACK: Duration = Duration::from_millis(1);

struct TimerEntry {
    deadline: Instant,
    generation: u64,
    promise: Promise<Timeout>,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.generation == other.generation
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for a min-heap (earliest deadline first).
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    next_generation: u64,
}

struct TimerShared {
    queue: Mutex<TimerQueue>,
    wake: Condvar,
}

fn timer_shared() -> &'static Arc<TimerShared> {
    static SHARED: OnceLock<Arc<TimerShared>> = OnceLock::new();
    SHARED.get_or_init(|| {
        let shared = Arc::new(TimerShared {
            queue: Mutex::new(TimerQueue::default()),
            wake: Condvar::new(),
        });
        let timer_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name("taskweave-timer".into())
            .spawn(move || timer_loop(&timer_shared))
            .expect("spawning the timer thread failed");
        shared
    })
}

fn timer_loop(shared: &TimerShared) {
    let mut queue = shared.queue.lock();
    loop {
        let now = Instant::now();
        let mut expired = Vec::new();
        while queue
            .heap
            .peek()
            .is_some_and(|entry| entry.deadline <= now)
        {
            if let Some(entry) = queue.heap.pop() {
                expired.push(entry.promise);
            }
        }
        if !expired.is_empty() {
            parking_lot::MutexGuard::unlocked(&mut queue, || {
                for promise in expired {
                    promise.set_result(Timeout);
                }
            });
            continue;
        }
        match queue.heap.peek().map(|entry| entry.deadline) {
            Some(deadline) => {
                let _ = shared.wake.wait_until(&mut queue, deadline);
            }
            None => shared.wake.wait(&mut queue),
        }
    }
}

/// Returns a future that completes once `duration` has elapsed.
///
/// The completion is never early with respect to the monotonic clock and
/// happens within a bounded slack afterwards.
#[must_use]
pub fn create_timeout(duration: Duration) -> Future<Timeout> {
    let shared = timer_shared();
    let promise = Promise::new();
    let future = promise.get_future();
    {
        let mut queue = shared.queue.lock();
        let generation = queue.next_generation;
        queue.next_generation += 1;
        queue.heap.push(TimerEntry {
            deadline: Instant::now() + duration + TIMER_SLACK,
            generation,
            promise,
        });
    }
    shared.wake.notify_one();
    future
}

/// Resolves to the future's value, or to [`Timeout`] if `timeout` elapses
/// first. Whichever side loses the race is simply ignored.
#[must_use]
pub fn with_timeout<T>(future: &Future<T>, timeout: Duration) -> Future<TimeoutOr<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let promise = Promise::new();
    let output = promise.get_future();
    let slot = Arc::new(Mutex::new(Some(promise)));

    let value_slot = Arc::clone(&slot);
    register_continuation_or_call_directly(future, move |value: &T| {
        if let Some(promise) = value_slot.lock().take() {
            promise.set_result(Ok(value.clone()));
        }
    });

    register_continuation_or_call_directly(&create_timeout(timeout), move |_| {
        if let Some(promise) = slot.lock().take() {
            promise.set_result(Err(Timeout));
        }
    });

    output
}
