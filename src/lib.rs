//! Taskweave: continuation-based futures, executors, and composition
//! combinators for long-running native applications.
//!
//! # Overview
//!
//! Taskweave is the asynchronous-composition core of an in-process
//! concurrency runtime. Producers construct a [`Promise<T>`], hand a
//! [`Future<T>`] to consumers, and complete the shared state exactly once.
//! Consumers observe completion by polling, blocking, or registering a
//! one-shot continuation. Executors dispatch type-erased actions to
//! threads or event loops under explicit ownership rules, and combinators
//! build aggregate futures out of existing ones without spawning anything.
//!
//! The model is deliberately push-based: this crate does not implement
//! `std::future::Future`, and there is no poll loop or waker. Completion
//! drives continuations directly, which keeps the register/complete race
//! window inside one mutex.
//!
//! # Module Structure
//!
//! - [`outcome`]: the success/failure taxonomy ([`ErrorMessage`],
//!   [`Canceled`], [`NotFound`], [`Timeout`]) and its nested aliases
//! - [`future`](mod@future): [`Promise`], [`Future`], continuation
//!   registration
//! - [`erased`]: type-erased move-only storage for retained closures
//! - [`executor`]: the [`Executor`] contract, chain operators, and the
//!   concrete executors (immediate, simple, thread pool, main-thread,
//!   single-thread)
//! - [`combinator`]: `when_all`, `when_any`, `join_futures`,
//!   `unwrap_future` and friends
//! - [`timer`]: deadline futures ([`create_timeout`], [`with_timeout`])
//! - [`watcher`]: event-loop-driven waits with timeout and abort
//! - [`stop`]: cooperative cancellation ([`StopSource`], [`StopToken`])
//! - [`http`]: a bounded download operation and its serializing manager,
//!   the reference producer for the whole fabric
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use taskweave::executor::{ExecutorExt, ThreadPool};
//!
//! let pool = Arc::new(ThreadPool::new(1, 4, Duration::from_millis(50)));
//! let future = pool.schedule(|| 6 * 7);
//! assert_eq!(*future.get(), 42);
//! pool.shutdown_and_wait();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod combinator;
pub mod erased;
pub mod executor;
pub mod future;
pub mod http;
pub mod outcome;
pub mod stop;
pub mod timer;
pub mod watcher;

pub use combinator::{join_futures, unwrap_future, unwrap_result_future, when_all, when_any};
pub use executor::{Executor, ExecutorExt, ImmediateExecutor, SimpleExecutor, ThreadPool};
pub use future::{Future, Promise, RegisterContinuationResult};
pub use outcome::{Canceled, ErrorMessage, ErrorMessageOr, NotFound, Timeout};
pub use stop::{StopSource, StopToken};
pub use timer::{create_timeout, with_timeout};
pub use watcher::{FutureWatcher, WaitResult};
