//! Cooperative cancellation signals.
//!
//! A [`StopSource`] owns the producer side of a stop signal; every
//! [`StopToken`] cloned from it observes the same signal. The signal is a
//! value-less future, so producers integrate cancellation the same way they
//! integrate any other completion: poll it between work items, or register
//! a continuation on it.

use crate::future::{Future, Promise};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

struct StopShared {
    promise: Promise<()>,
    requested: AtomicBool,
}

/// The requesting side of a stop signal. Move-only.
///
/// Dropping the source without requesting a stop leaves the signal pending
/// forever; tokens then simply never report a stop.
pub struct StopSource {
    shared: Arc<StopShared>,
}

impl StopSource {
    /// Creates a source with no stop requested.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(StopShared {
                promise: Promise::new(),
                requested: AtomicBool::new(false),
            }),
        }
    }

    /// Requests a stop. Idempotent; observers see the signal exactly once.
    pub fn request_stop(&self) {
        if !self.shared.requested.swap(true, Ordering::SeqCst) {
            self.shared.promise.mark_finished();
        }
    }

    /// Returns true if a stop was requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.shared.requested.load(Ordering::SeqCst)
    }

    /// Returns a token observing this source's signal.
    #[must_use]
    pub fn token(&self) -> StopToken {
        StopToken {
            future: self.shared.promise.get_future(),
        }
    }
}

impl Default for StopSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StopSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSource")
            .field("is_stop_requested", &self.is_stop_requested())
            .finish()
    }
}

/// The observing side of a stop signal.
#[derive(Clone, Debug)]
pub struct StopToken {
    future: Future<()>,
}

impl StopToken {
    /// Returns true once a stop was requested on the owning source.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.future.is_finished()
    }

    /// The underlying signal, for continuation registration and
    /// composition.
    #[must_use]
    pub fn future(&self) -> &Future<()> {
        &self.future
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn tokens_observe_a_requested_stop() {
        let source = StopSource::new();
        let token = source.token();
        assert!(!token.is_stop_requested());

        source.request_stop();
        assert!(token.is_stop_requested());
        assert!(source.token().is_stop_requested());
    }

    #[test]
    fn request_stop_is_idempotent() {
        let source = StopSource::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_continuation = Arc::clone(&fired);
        let _ = source.token().future().register_continuation(move |()| {
            fired_in_continuation.fetch_add(1, Ordering::SeqCst);
        });

        source.request_stop();
        source.request_stop();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
