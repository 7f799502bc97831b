//! Serialization of downloads onto one shared transport.

use super::download::{DownloadOperation, DownloadState};
use crate::executor::SingleThreadExecutor;
use crate::future::{Future, Promise};
use crate::outcome::{Canceled, CanceledOr, ErrorMessage, ErrorMessageOr, NotFound, NotFoundOr};
use crate::stop::StopToken;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// The boundary result of one download: failure, cancellation, absence, or
/// success, nested outermost-first.
pub type DownloadResult = ErrorMessageOr<CanceledOr<NotFoundOr<()>>>;

struct PendingDownload {
    url: String,
    save_file_path: PathBuf,
    stop_token: StopToken,
    promise: Promise<DownloadResult>,
}

struct ManagerState {
    queue: VecDeque<PendingDownload>,
    active: Option<DownloadOperation>,
}

struct ManagerInner {
    executor: Arc<SingleThreadExecutor>,
    state: Mutex<ManagerState>,
}

impl ManagerInner {
    fn start_next(inner: &Arc<Self>, state: &mut ManagerState) {
        let Some(pending) = state.queue.pop_front() else {
            state.active = None;
            return;
        };
        let weak = Arc::downgrade(inner);
        let promise = pending.promise;
        let operation = DownloadOperation::new(
            pending.url,
            pending.save_file_path,
            pending.stop_token,
            Arc::clone(&inner.executor),
            Box::new(move |terminal_state, message| {
                promise.set_result(terminal_result(terminal_state, message));
                if let Some(inner) = weak.upgrade() {
                    let mut state = inner.state.lock();
                    Self::start_next(&inner, &mut state);
                }
            }),
        );
        operation.start();
        state.active = Some(operation);
    }
}

fn terminal_result(state: DownloadState, message: Option<String>) -> DownloadResult {
    match state {
        DownloadState::Done => Ok(Ok(Ok(()))),
        DownloadState::Cancelled => Ok(Err(Canceled)),
        DownloadState::NotFound => Ok(Ok(Err(match message {
            Some(message) => NotFound::with_message(message),
            None => NotFound::new(),
        }))),
        DownloadState::Error => Err(ErrorMessage::new(
            message.unwrap_or_else(|| "download failed".to_owned()),
        )),
        DownloadState::Initial | DownloadState::Started => {
            unreachable!("terminal callback fired in a non-terminal state")
        }
    }
}

/// Runs downloads one at a time over a single shared transport thread.
///
/// Requests queue in FIFO order; the next one starts from the terminal
/// signal of the previous. Dropping the manager aborts the active operation
/// and abandons the queued ones (their futures never complete).
pub struct DownloadManager {
    inner: Arc<ManagerInner>,
}

impl DownloadManager {
    /// Creates a manager with its own transport thread.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                executor: Arc::new(SingleThreadExecutor::new()),
                state: Mutex::new(ManagerState {
                    queue: VecDeque::new(),
                    active: None,
                }),
            }),
        }
    }

    /// Enqueues a download and returns a future for its boundary result.
    pub fn download(
        &self,
        url: impl Into<String>,
        save_file_path: impl Into<PathBuf>,
        stop_token: StopToken,
    ) -> Future<DownloadResult> {
        let promise = Promise::new();
        let future = promise.get_future();
        let mut state = self.inner.state.lock();
        state.queue.push_back(PendingDownload {
            url: url.into(),
            save_file_path: save_file_path.into(),
            stop_token,
            promise,
        });
        if state.active.is_none() {
            ManagerInner::start_next(&self.inner, &mut state);
        }
        future
    }
}

impl Default for DownloadManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DownloadManager {
    fn drop(&mut self) {
        let active = {
            let mut state = self.inner.state.lock();
            state.queue.clear();
            state.active.take()
        };
        if let Some(operation) = active {
            operation.abort();
        }
    }
}

impl fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("DownloadManager")
            .field("queued", &state.queue.len())
            .field("active", &state.active.is_some())
            .finish()
    }
}
