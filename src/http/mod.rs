//! Bounded HTTP downloads feeding the async fabric.
//!
//! [`DownloadOperation`] is a protocol-driven producer: one URL, one local
//! file, a stop token, and a terminal signal carrying the final
//! [`DownloadState`] plus an optional error message. [`DownloadManager`]
//! serializes operations one at a time because the underlying transport
//! thread is a shared single-user resource.
//!
//! Partial files never survive: every terminal state other than
//! [`DownloadState::Done`] removes whatever was written.

mod client;
mod download;
mod manager;

pub use download::{DownloadOperation, DownloadState, FinishedCallback};
pub use manager::{DownloadManager, DownloadResult};
