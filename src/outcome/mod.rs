//! The result-type taxonomy shared across the crate.
//!
//! Operations distinguish four non-success outcomes: an application failure
//! carrying a message ([`ErrorMessage`]), a cooperative termination
//! ([`Canceled`]), a lookup-style absence ([`NotFound`]), and a deadline
//! expiration ([`Timeout`]). The aliases compose through nesting; at a system
//! boundary a download result is typically
//! `ErrorMessageOr<CanceledOr<NotFoundOr<()>>>`.

use std::fmt;

/// A message-carrying failure produced by application logic.
///
/// `Display` renders the message verbatim, so an `ErrorMessage` can be
/// forwarded to user-facing surfaces without additional formatting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ErrorMessage {
    message: String,
}

impl ErrorMessage {
    /// Creates an error from any message-like value.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for ErrorMessage {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ErrorMessage {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// A user- or system-requested cooperative termination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Canceled;

impl fmt::Display for Canceled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "canceled")
    }
}

impl std::error::Error for Canceled {}

/// A lookup-style absence with an optional context string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotFound {
    message: Option<String>,
}

impl NotFound {
    /// Creates a `NotFound` without context.
    #[must_use]
    pub const fn new() -> Self {
        Self { message: None }
    }

    /// Creates a `NotFound` carrying a context string.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// Returns the context string, if one was attached.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "not found: {message}"),
            None => write!(f, "not found"),
        }
    }
}

impl std::error::Error for NotFound {}

/// A deadline expiration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeout;

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timed out")
    }
}

impl std::error::Error for Timeout {}

/// Either a value or an application failure.
pub type ErrorMessageOr<T> = Result<T, ErrorMessage>;

/// Either a value or a cooperative termination.
pub type CanceledOr<T> = Result<T, Canceled>;

/// Either a value or a lookup absence.
pub type NotFoundOr<T> = Result<T, NotFound>;

/// Either a value or a deadline expiration.
pub type TimeoutOr<T> = Result<T, Timeout>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_displays_verbatim() {
        let error = ErrorMessage::new("disk on fire");
        assert_eq!(error.to_string(), "disk on fire");
        assert_eq!(error.message(), "disk on fire");
    }

    #[test]
    fn not_found_display_includes_context() {
        assert_eq!(NotFound::new().to_string(), "not found");
        assert_eq!(
            NotFound::with_message("symbols for libfoo.so").to_string(),
            "not found: symbols for libfoo.so"
        );
    }

    #[test]
    fn nested_boundary_result_composes() {
        let done: ErrorMessageOr<CanceledOr<NotFoundOr<()>>> = Ok(Ok(Ok(())));
        assert!(done.is_ok());

        let canceled: ErrorMessageOr<CanceledOr<NotFoundOr<()>>> = Ok(Err(Canceled));
        assert_eq!(canceled, Ok(Err(Canceled)));
    }
}
