//! Scheduling and chaining across executors.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use taskweave::executor::{Executor, ExecutorExt, ImmediateExecutor, SimpleExecutor};
use taskweave::future::Promise;
use taskweave::outcome::{ErrorMessage, ErrorMessageOr};

#[test]
fn chained_continuation_via_immediate_executor() {
    let executor = Arc::new(ImmediateExecutor::new());
    let promise = Promise::<()>::new();
    let chained = executor.schedule_after(&promise.get_future(), |()| 7);

    promise.mark_finished();
    assert!(chained.is_finished());
    assert_eq!(*chained.get(), 7);
}

#[test]
fn error_input_short_circuits_the_chain() {
    let executor = Arc::new(ImmediateExecutor::new());
    let promise = Promise::<ErrorMessageOr<i32>>::new();
    let chained = executor.schedule_after_if_success(&promise.get_future(), |_: i32| -> i32 {
        unreachable!("the continuation must not run on an error input")
    });

    promise.set_result(Err(ErrorMessage::new("Error")));
    assert!(chained.is_finished());
    let result = chained.get();
    assert_eq!(result.as_ref().err().map(ErrorMessage::message), Some("Error"));
}

#[test]
fn error_short_circuit_still_cleans_up_on_the_executor() {
    let executor = Arc::new(SimpleExecutor::new());
    let promise = Promise::<ErrorMessageOr<i32>>::new();
    let before = executor.waiting_continuation_count();
    let chained = executor.schedule_after_if_success(&promise.get_future(), |value: i32| value);
    assert_eq!(executor.waiting_continuation_count(), before + 1);

    promise.set_result(Err(ErrorMessage::new("nope")));
    // The output completes immediately, the retained closure is destroyed
    // only once the executor gets to run its cleanup action.
    assert!(chained.is_finished());
    assert_eq!(executor.waiting_continuation_count(), before + 1);
    executor.drain();
    assert_eq!(executor.waiting_continuation_count(), before);
}

#[test]
fn successful_input_feeds_the_continuation() {
    let executor = Arc::new(SimpleExecutor::new());
    let promise = Promise::<ErrorMessageOr<i32>>::new();
    let chained =
        executor.schedule_after_if_success(&promise.get_future(), |value: i32| value * 2);

    promise.set_result(Ok(21));
    assert!(!chained.is_finished());
    executor.drain();
    assert_eq!(*chained.get(), Ok(42));
    assert_eq!(executor.waiting_continuation_count(), 0);
}

#[test]
fn and_then_flattens_fallible_continuations() {
    let executor = Arc::new(ImmediateExecutor::new());
    let promise = Promise::<ErrorMessageOr<i32>>::new();
    let chained = executor.schedule_after_and_then(&promise.get_future(), |value: i32| {
        if value > 0 {
            Ok(value + 1)
        } else {
            Err(ErrorMessage::new("not positive"))
        }
    });

    promise.set_result(Ok(-3));
    assert_eq!(
        chained.get().as_ref().err().map(ErrorMessage::message),
        Some("not positive")
    );
}

#[test]
fn schedule_completes_its_future_only_when_the_action_runs() {
    let executor = Arc::new(SimpleExecutor::new());
    let future = executor.schedule(|| "ran");
    assert!(!future.is_finished());

    executor.drain();
    assert!(future.is_finished());
    assert_eq!(*future.get(), "ran");
}

#[test]
fn chaining_onto_a_finished_future_still_routes_through_the_executor() {
    let executor = Arc::new(SimpleExecutor::new());
    let promise = Promise::new();
    promise.set_result(10);

    let chained = executor.schedule_after(&promise.get_future(), |value: i32| value + 1);
    // The input was complete, but the step itself runs on the executor.
    assert!(!chained.is_finished());
    executor.drain();
    assert_eq!(*chained.get(), 11);
}

#[test]
fn a_dead_executor_drops_the_chain_silently() {
    let executor = Arc::new(SimpleExecutor::new());
    let promise = Promise::<i32>::new();
    let chained = executor.schedule_after(&promise.get_future(), |value: i32| value);

    drop(executor);
    promise.set_result(1);
    // The step had nowhere to run; the downstream future stays pending.
    assert!(!chained.is_finished());
}

#[test]
fn scheduled_work_observes_the_chained_value() {
    let executor = Arc::new(ImmediateExecutor::new());
    let promise = Promise::<String>::new();
    let saw_value = Arc::new(AtomicBool::new(false));
    let saw_value_in_step = Arc::clone(&saw_value);
    let chained = executor.schedule_after(&promise.get_future(), move |value: String| {
        saw_value_in_step.store(value == "input", Ordering::SeqCst);
        value.len()
    });

    promise.set_result("input".to_owned());
    assert_eq!(*chained.get(), 5);
    assert!(saw_value.load(Ordering::SeqCst));
}
