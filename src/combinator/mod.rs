//! Composition of futures: joining, racing, and flattening.
//!
//! Every combinator is pure composition: it allocates a fresh
//! promise/future pair plus a small aggregation state behind its own mutex,
//! and registers continuations on its inputs. No combinator spawns a
//! thread or fails by itself; member outcomes pass through unchanged.

use crate::future::{Future, Promise, register_continuation_or_call_directly};
use crate::outcome::ErrorMessageOr;
use parking_lot::Mutex;
use std::sync::Arc;

/// One of two alternatives, preserving per-input ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneOf2<A, B> {
    /// The first input completed first.
    First(A),
    /// The second input completed first.
    Second(B),
}

/// One of three alternatives, preserving per-input ordering even when
/// several inputs share a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneOf3<A, B, C> {
    /// The first input completed first.
    First(A),
    /// The second input completed first.
    Second(B),
    /// The third input completed first.
    Third(C),
}

struct JoinState<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
    promise: Option<Promise<Vec<T>>>,
}

/// Joins a span of futures into a future of all their values, in input
/// order regardless of completion order.
///
/// An empty span yields an already-completed empty vector. The same future
/// appearing twice is fine: each appearance registers its own continuation
/// and fills its own slot.
///
/// # Panics
///
/// Panics if any input future is invalid.
#[must_use]
pub fn when_all<T>(futures: &[Future<T>]) -> Future<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let promise = Promise::new();
    let output = promise.get_future();
    if futures.is_empty() {
        promise.set_result(Vec::new());
        return output;
    }

    let state = Arc::new(Mutex::new(JoinState {
        slots: (0..futures.len()).map(|_| None).collect(),
        remaining: futures.len(),
        promise: Some(promise),
    }));

    for (index, future) in futures.iter().enumerate() {
        assert!(future.is_valid(), "when_all requires valid futures");
        let state = Arc::clone(&state);
        register_continuation_or_call_directly(future, move |value: &T| {
            let mut state = state.lock();
            if state.slots[index].is_none() {
                state.slots[index] = Some(value.clone());
            }
            state.remaining -= 1;
            if state.remaining == 0 {
                let values = state
                    .slots
                    .iter_mut()
                    .map(|slot| slot.take().expect("every join slot is filled"))
                    .collect();
                state
                    .promise
                    .take()
                    .expect("join completes exactly once")
                    .set_result(values);
            }
        });
    }
    output
}

/// Joins a span of value-less futures; completes once all of them have.
///
/// # Panics
///
/// Panics if any input future is invalid.
#[must_use]
pub fn join_futures(futures: &[Future<()>]) -> Future<()> {
    let promise = Promise::new();
    let output = promise.get_future();
    if futures.is_empty() {
        promise.mark_finished();
        return output;
    }

    struct CountState {
        remaining: usize,
        promise: Option<Promise<()>>,
    }
    let state = Arc::new(Mutex::new(CountState {
        remaining: futures.len(),
        promise: Some(promise),
    }));

    for future in futures {
        assert!(future.is_valid(), "join_futures requires valid futures");
        let state = Arc::clone(&state);
        register_continuation_or_call_directly(future, move |(): &()| {
            let mut state = state.lock();
            state.remaining -= 1;
            if state.remaining == 0 {
                state
                    .promise
                    .take()
                    .expect("join completes exactly once")
                    .mark_finished();
            }
        });
    }
    output
}

/// Resolves to the index and value of whichever input completes first.
/// Later completions do not change the observed result.
///
/// # Panics
///
/// Panics if the span is empty or any input future is invalid.
#[must_use]
pub fn when_any<T>(futures: &[Future<T>]) -> Future<(usize, T)>
where
    T: Clone + Send + Sync + 'static,
{
    assert!(!futures.is_empty(), "when_any requires at least one future");
    let promise = Promise::new();
    let output = promise.get_future();
    let slot = Arc::new(Mutex::new(Some(promise)));

    for (index, future) in futures.iter().enumerate() {
        assert!(future.is_valid(), "when_any requires valid futures");
        let slot = Arc::clone(&slot);
        register_continuation_or_call_directly(future, move |value: &T| {
            if let Some(promise) = slot.lock().take() {
                promise.set_result((index, value.clone()));
            }
        });
    }
    output
}

/// Races two futures of different types; the first completion wins.
#[must_use]
pub fn when_any2<A, B>(first: &Future<A>, second: &Future<B>) -> Future<OneOf2<A, B>>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    let promise = Promise::new();
    let output = promise.get_future();
    let slot = Arc::new(Mutex::new(Some(promise)));

    let first_slot = Arc::clone(&slot);
    register_continuation_or_call_directly(first, move |value: &A| {
        if let Some(promise) = first_slot.lock().take() {
            promise.set_result(OneOf2::First(value.clone()));
        }
    });
    register_continuation_or_call_directly(second, move |value: &B| {
        if let Some(promise) = slot.lock().take() {
            promise.set_result(OneOf2::Second(value.clone()));
        }
    });
    output
}

/// Races three futures of possibly repeated types; the first completion
/// wins and its position is preserved in the [`OneOf3`] alternative.
#[must_use]
pub fn when_any3<A, B, C>(
    first: &Future<A>,
    second: &Future<B>,
    third: &Future<C>,
) -> Future<OneOf3<A, B, C>>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    let promise = Promise::new();
    let output = promise.get_future();
    let slot = Arc::new(Mutex::new(Some(promise)));

    let first_slot = Arc::clone(&slot);
    register_continuation_or_call_directly(first, move |value: &A| {
        if let Some(promise) = first_slot.lock().take() {
            promise.set_result(OneOf3::First(value.clone()));
        }
    });
    let second_slot = Arc::clone(&slot);
    register_continuation_or_call_directly(second, move |value: &B| {
        if let Some(promise) = second_slot.lock().take() {
            promise.set_result(OneOf3::Second(value.clone()));
        }
    });
    register_continuation_or_call_directly(third, move |value: &C| {
        if let Some(promise) = slot.lock().take() {
            promise.set_result(OneOf3::Third(value.clone()));
        }
    });
    output
}

/// Joins two futures of different types into a future of the pair.
#[must_use]
pub fn when_all2<A, B>(first: &Future<A>, second: &Future<B>) -> Future<(A, B)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    let promise = Promise::new();
    let output = promise.get_future();
    let state = Arc::new(Mutex::new(PairState {
        first: None,
        second: None,
        promise: Some(promise),
    }));

    let first_state = Arc::clone(&state);
    register_continuation_or_call_directly(first, move |value: &A| {
        let mut state = first_state.lock();
        state.first = Some(value.clone());
        state.finish_if_complete();
    });
    register_continuation_or_call_directly(second, move |value: &B| {
        let mut state = state.lock();
        state.second = Some(value.clone());
        state.finish_if_complete();
    });
    output
}

struct PairState<A, B> {
    first: Option<A>,
    second: Option<B>,
    promise: Option<Promise<(A, B)>>,
}

impl<A, B> PairState<A, B> {
    fn finish_if_complete(&mut self) {
        if self.first.is_some() && self.second.is_some() {
            let first = self.first.take().expect("first slot is filled");
            let second = self.second.take().expect("second slot is filled");
            self.promise
                .take()
                .expect("pair join completes exactly once")
                .set_result((first, second));
        }
    }
}

/// Joins three futures of different types into a future of the triple.
#[must_use]
pub fn when_all3<A, B, C>(
    first: &Future<A>,
    second: &Future<B>,
    third: &Future<C>,
) -> Future<(A, B, C)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    let pair = when_all2(first, second);
    let nested = when_all2(&pair, third);
    let promise = Promise::new();
    let output = promise.get_future();
    register_continuation_or_call_directly(&nested, move |value: &((A, B), C)| {
        let ((first, second), third) = value;
        promise.set_result((first.clone(), second.clone(), third.clone()));
    });
    output
}

/// Folds a future of a future into a future of the inner value.
#[must_use]
pub fn unwrap_future<T>(future: &Future<Future<T>>) -> Future<T>
where
    T: Clone + Send + Sync + 'static,
{
    let promise = Promise::new();
    let output = promise.get_future();
    register_continuation_or_call_directly(future, move |inner: &Future<T>| {
        register_continuation_or_call_directly(&inner.clone(), move |value: &T| {
            promise.set_result(value.clone());
        });
    });
    output
}

/// Folds a fallible future of a future: an outer error short-circuits to
/// the output, otherwise the inner future's value is forwarded as success.
#[must_use]
pub fn unwrap_result_future<T>(
    future: &Future<ErrorMessageOr<Future<T>>>,
) -> Future<ErrorMessageOr<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let promise = Promise::new();
    let output = promise.get_future();
    register_continuation_or_call_directly(future, move |result: &ErrorMessageOr<Future<T>>| {
        match result {
            Err(error) => promise.set_result(Err(error.clone())),
            Ok(inner) => {
                register_continuation_or_call_directly(&inner.clone(), move |value: &T| {
                    promise.set_result(Ok(value.clone()));
                });
            }
        }
    });
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::ErrorMessage;

    #[test]
    fn when_all_preserves_input_order() {
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
    fn when_all_of_nothing_is_already_complete() {
        let joined = when_all::<i32>(&[]);
        assert!(joined.is_finished());
        assert!(joined.get().is_empty());
    }

    #[test]
    fn when_all_tolerates_duplicate_inputs() {
        let promise = Promise::new();
        let future = promise.get_future();
        let joined = when_all(&[future.clone(), future]);
        promise.set_result(5);
        assert_eq!(*joined.get(), vec![5, 5]);
    }

    #[test]
    fn when_any_keeps_the_first_completion() {
        let first = Promise::<&'static str>::new();
        let second = Promise::<&'static str>::new();
        let raced = when_any(&[first.get_future(), second.get_future()]);

        second.set_result("second");
        assert_eq!(*raced.get(), (1, "second"));
        first.set_result("first");
        assert_eq!(*raced.get(), (1, "second"));
    }

    #[test]
    fn when_any3_preserves_position_for_repeated_types() {
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
        third.set_result(3);
        assert_eq!(*raced.get(), OneOf3::Second("Hello".to_owned()));
    }

    #[test]
    fn join_futures_counts_void_members() {
        let promises: Vec<Promise<()>> = (0..3).map(|_| Promise::new()).collect();
        let futures: Vec<_> = promises.iter().map(Promise::get_future).collect();
        let joined = join_futures(&futures);

        promises[1].mark_finished();
        promises[0].mark_finished();
        assert!(!joined.is_finished());
        promises[2].mark_finished();
        assert!(joined.is_finished());
    }

    #[test]
    fn when_all2_joins_heterogeneous_values() {
        let number = Promise::<i32>::new();
        let text = Promise::<String>::new();
        let joined = when_all2(&number.get_future(), &text.get_future());

        text.set_result("joined".to_owned());
        number.set_result(4);
        assert_eq!(*joined.get(), (4, "joined".to_owned()));
    }

    #[test]
    fn when_all3_joins_in_input_order() {
        let a = Promise::<i32>::new();
        let b = Promise::<bool>::new();
        let c = Promise::<String>::new();
        let joined = when_all3(&a.get_future(), &b.get_future(), &c.get_future());

        c.set_result("last".to_owned());
        a.set_result(1);
        assert!(!joined.is_finished());
        b.set_result(true);
        assert_eq!(*joined.get(), (1, true, "last".to_owned()));
    }

    #[test]
    fn unwrap_future_completes_with_the_inner_value() {
        let outer = Promise::<Future<i32>>::new();
        let inner = Promise::<i32>::new();
        let flat = unwrap_future(&outer.get_future());

        outer.set_result(inner.get_future());
        assert!(!flat.is_finished());
        inner.set_result(17);
        assert_eq!(*flat.get(), 17);
    }

    #[test]
    fn unwrap_result_future_short_circuits_outer_errors() {
        let outer = Promise::<ErrorMessageOr<Future<i32>>>::new();
        let flat = unwrap_result_future(&outer.get_future());

        outer.set_result(Err(ErrorMessage::new("no inner work")));
        assert_eq!(*flat.get(), Err(ErrorMessage::new("no inner work")));
    }

    #[test]
    fn unwrap_result_future_forwards_the_inner_value() {
        let outer = Promise::<ErrorMessageOr<Future<i32>>>::new();
        let inner = Promise::<i32>::new();
        let flat = unwrap_result_future(&outer.get_future());

        outer.set_result(Ok(inner.get_future()));
        inner.set_result(23);
        assert_eq!(*flat.get(), Ok(23));
    }
}
