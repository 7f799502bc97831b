//! One URL-to-file download with cooperative cancellation.

use super::client::{FetchOutcome, fetch_to_file};
use crate::executor::{ExecutorExt, ImmediateExecutor, LoopHandle, SingleThreadExecutor};
use crate::stop::StopToken;
use parking_lot::Mutex;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Lifecycle of a download operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    /// Constructed, not yet started.
    Initial,
    /// The transfer is running.
    Started,
    /// The stop token fired or an abort was requested; any partial file was
    /// removed.
    Cancelled,
    /// The transfer completed and the file is in place.
    Done,
    /// The server answered 404; any partial file was removed.
    NotFound,
    /// The transfer failed; any partial file was removed.
    Error,
}

impl DownloadState {
    /// Returns true for the states that end the operation.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Done | Self::NotFound | Self::Error
        )
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Started => write!(f, "started"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Done => write!(f, "done"),
            Self::NotFound => write!(f, "not found"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Fired exactly once when the operation reaches a terminal state.
pub type FinishedCallback = Box<dyn FnOnce(DownloadState, Option<String>) + Send>;

struct OperationInner {
    url: String,
    save_file_path: PathBuf,
    stop_token: StopToken,
    /// Posts onto the thread the operation runs on; used to marshal aborts.
    marshal: LoopHandle,
    state: Mutex<OperationState>,
    abort_requested: AtomicBool,
}

struct OperationState {
    state: DownloadState,
    finished: Option<FinishedCallback>,
}

impl OperationInner {
    fn abort(&self) {
        self.abort_requested.store(true, Ordering::SeqCst);
    }

    fn cancelled(&self) -> bool {
        self.abort_requested.load(Ordering::SeqCst) || self.stop_token.is_stop_requested()
    }

    fn run(&self) {
        if self.cancelled() {
            self.finish(DownloadState::Cancelled, None);
            return;
        }
        let outcome = fetch_to_file(&self.url, &self.save_file_path, &|| self.cancelled());
        let (state, message) = match outcome {
            FetchOutcome::Done => (DownloadState::Done, None),
            FetchOutcome::Cancelled => (DownloadState::Cancelled, None),
            FetchOutcome::NotFound => (DownloadState::NotFound, None),
            FetchOutcome::Failed(message) => (DownloadState::Error, Some(message)),
        };
        if state != DownloadState::Done {
            // Only a completed transfer leaves a file behind.
            let _ = fs::remove_file(&self.save_file_path);
        }
        self.finish(state, message);
    }

    fn finish(&self, state: DownloadState, message: Option<String>) {
        let finished = {
            let mut operation = self.state.lock();
            if operation.state.is_terminal() {
                return;
            }
            operation.state = state;
            operation.finished.take()
        };
        #[cfg(feature = "tracing-integration")]
        tracing::debug!(url = %self.url, %state, "download finished");
        if let Some(finished) = finished {
            finished(state, message);
        }
    }
}

/// Downloads one URL to one local file, honoring a stop token, and fires a
/// terminal callback carrying the final state and an optional error
/// message.
///
/// The transfer runs on the executor the operation is bound to. The stop
/// token's continuation may fire on any thread; it flags the in-flight
/// transfer and additionally marshals an abort onto the operation's thread
/// for the not-yet-started case.
pub struct DownloadOperation {
    inner: Arc<OperationInner>,
    executor: Arc<SingleThreadExecutor>,
    stop_relay: Arc<ImmediateExecutor>,
}

impl DownloadOperation {
    /// Creates an operation bound to `executor`; nothing happens until
    /// [`start`](Self::start).
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        save_file_path: impl Into<PathBuf>,
        stop_token: StopToken,
        executor: Arc<SingleThreadExecutor>,
        finished: FinishedCallback,
    ) -> Self {
        let inner = Arc::new(OperationInner {
            url: url.into(),
            save_file_path: save_file_path.into(),
            stop_token,
            marshal: executor.loop_handle(),
            state: Mutex::new(OperationState {
                state: DownloadState::Initial,
                finished: Some(finished),
            }),
            abort_requested: AtomicBool::new(false),
        });
        Self {
            inner,
            executor,
            stop_relay: Arc::new(ImmediateExecutor::new()),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DownloadState {
        self.inner.state.lock().state
    }

    /// Begins the transfer.
    ///
    /// # Panics
    ///
    /// Panics if the operation was already started.
    pub fn start(&self) {
        {
            let mut operation = self.inner.state.lock();
            assert!(
                operation.state == DownloadState::Initial,
                "download operation started twice"
            );
            operation.state = DownloadState::Started;
        }
        #[cfg(feature = "tracing-integration")]
        tracing::debug!(url = %self.inner.url, "download started");

        // The stop continuation runs inline on whichever thread requests
        // the stop: it flags the transfer and marshals an abort onto the
        // operation's own thread.
        let weak = Arc::downgrade(&self.inner);
        let _ = self
            .stop_relay
            .schedule_after(self.inner.stop_token.future(), move |()| {
                if let Some(inner) = weak.upgrade() {
                    inner.abort();
                    let marshalled = Weak::clone(&weak);
                    inner.marshal.post(Box::new(move || {
                        if let Some(inner) = marshalled.upgrade() {
                            inner.abort();
                        }
                    }));
                }
            });

        let weak = Arc::downgrade(&self.inner);
        let _ = self.executor.schedule(move || {
            if let Some(inner) = weak.upgrade() {
                inner.run();
            }
        });
    }

    /// Requests cancellation of the transfer. The terminal state is emitted
    /// by the transfer itself once it observes the request.
    pub fn abort(&self) {
        self.inner.abort();
    }
}

impl fmt::Debug for DownloadOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadOperation")
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish()
    }
}
