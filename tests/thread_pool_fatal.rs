//! Fatal misuse of the thread pool.

use std::time::Duration;
use taskweave::executor::{Executor, ThreadPool};

#[test]
#[should_panic(expected = "at least one worker")]
fn zero_min_workers_is_fatal() {
    let _ = ThreadPool::new(0, 1, Duration::from_millis(1));
}

#[test]
#[should_panic(expected = "must not exceed max_workers")]
fn min_above_max_is_fatal() {
    let _ = ThreadPool::new(2, 1, Duration::from_millis(1));
}

#[test]
#[should_panic(expected = "at least one millisecond")]
fn sub_millisecond_ttl_is_fatal() {
    let _ = ThreadPool::new(1, 2, Duration::from_nanos(999));
}

#[test]
#[should_panic(expected = "after shutdown")]
fn schedule_after_shutdown_is_fatal() {
    let pool = ThreadPool::new(1, 2, Duration::from_millis(5));
    pool.shutdown();
    pool.schedule_impl(Box::new(|| {}));
}

#[test]
#[should_panic(expected = "not shut down")]
fn wait_without_shutdown_is_fatal() {
    let pool = ThreadPool::new(1, 2, Duration::from_millis(5));
    pool.wait();
}
