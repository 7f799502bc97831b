//! Composition scenarios across combinators and timers.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskweave::combinator::{OneOf3, unwrap_future, when_all, when_any3};
use taskweave::executor::{ExecutorExt, ThreadPool};
use taskweave::future::Promise;
use taskweave::outcome::Timeout;
use taskweave::timer::{create_timeout, with_timeout};

#[test]
fn when_all_finishes_last_and_orders_by_input() {
    let promises: Vec<Promise<i32>> = (0..3).map(|_| Promise::new()).collect();
    let futures: Vec<_> = promises.iter().map(Promise::get_future).collect();
    let joined = when_all(&futures);

    promises[0].set_result(0);
    promises[2].set_result(2);
    assert!(!joined.is_finished());
    promises[1].set_result(1);
    assert!(joined.is_finished());
    assert_eq!(*joined.get(), vec![0, 1, 2]);
}

#[test]
fn when_any_over_mixed_types_keeps_the_first_winner() {
    let first = Promise::<i32>::new();
    let second = Promise::<String>::new();
    let third = Promise::<i32>::new();
    let raced = when_any3(
        &first.get_future(),
        &second.get_future(),
        &third.get_future(),
    );

    second.set_result("Hello".to_owned());
    assert_eq!(*raced.get(), OneOf3::Second("Hello".to_owned()));

    first.set_result(1);
    third.set_result(2);
    assert_eq!(*raced.get(), OneOf3::Second("Hello".to_owned()));
}

#[test]
fn unwrap_completes_only_when_outer_and_inner_did() {
    let outer = Promise::<taskweave::Future<i32>>::new();
    let inner = Promise::<i32>::new();
    let flat = unwrap_future(&outer.get_future());

    assert!(!flat.is_finished());
    outer.set_result(inner.get_future());
    assert!(!flat.is_finished());
    inner.set_result(5);
    assert_eq!(*flat.get(), 5);
}

#[test]
fn create_timeout_respects_the_monotonic_lower_bound() {
    let duration = Duration::from_millis(25);
    let started = Instant::now();
    let timeout = create_timeout(duration);
    timeout.wait();

    let elapsed = started.elapsed();
    assert!(elapsed >= duration, "timer fired early after {elapsed:?}");
    assert!(
        elapsed < duration + Duration::from_secs(2),
        "timer fired far too late after {elapsed:?}"
    );
}

#[test]
fn timeout_races_against_pool_work() {
    let pool = Arc::new(ThreadPool::new(1, 2, Duration::from_millis(5)));

    let quick = pool.schedule(|| "quick");
    let raced = with_timeout(&quick, Duration::from_secs(5));
    assert_eq!(*raced.get(), Ok("quick"));

    let never = Promise::<&'static str>::new();
    let raced = with_timeout(&never.get_future(), Duration::from_millis(10));
    raced.wait();
    assert_eq!(*raced.get(), Err(Timeout));

    pool.shutdown_and_wait();
}

proptest! {
    /// The joined vector is in input order no matter the completion order.
    #[test]
    fn when_all_is_completion_order_independent(
        count in 1_usize..10,
        seed in any::<u64>(),
    ) {
        let promises: Vec<Promise<usize>> = (0..count).map(|_| Promise::new()).collect();
        let futures: Vec<_> = promises.iter().map(Promise::get_future).collect();
        let joined = when_all(&futures);

        let mut order: Vec<usize> = (0..count).collect();
        let mut rng = fastrand::Rng::with_seed(seed);
        rng.shuffle(&mut order);
        for &index in &order {
            prop_assert!(!joined.is_finished() || index == *order.last().unwrap());
            promises[index].set_result(index);
        }

        prop_assert!(joined.is_finished());
        let expected: Vec<usize> = (0..count).collect();
        prop_assert_eq!(&*joined.get(), &expected);
    }

    /// The first completion wins and later ones never replace it.
    #[test]
    fn when_any_is_stable_under_later_completions(
        count in 2_usize..8,
        seed in any::<u64>(),
    ) {
        let promises: Vec<Promise<usize>> = (0..count).map(|_| Promise::new()).collect();
        let futures: Vec<_> = promises.iter().map(Promise::get_future).collect();
        let raced = taskweave::when_any(&futures);

        let mut order: Vec<usize> = (0..count).collect();
        let mut rng = fastrand::Rng::with_seed(seed);
        rng.shuffle(&mut order);

        let winner = order[0];
        promises[winner].set_result(winner);
        prop_assert_eq!(*raced.get(), (winner, winner));
        for &index in &order[1..] {
            promises[index].set_result(index);
        }
        prop_assert_eq!(*raced.get(), (winner, winner));
    }
}
