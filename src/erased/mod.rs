//! Type-erased storage for move-only values.
//!
//! Executors retain heterogeneous chain-step closures while the futures they
//! are chained onto are still pending. [`AnyMovable`] is the storage cell for
//! those closures: a move-only box with a checked downcast back to the
//! concrete type. A mismatched downcast fails by returning the cell, never by
//! panicking.
//!
//! The callable half of the erasure story needs no bespoke type in Rust:
//! single-shot callables are passed around as `Box<dyn FnOnce(..) + Send>`
//! trait objects (see `executor::Action`).

use std::any::Any;
use std::fmt;

/// A type-erased move-only value cell.
pub struct AnyMovable {
    value: Box<dyn Any + Send>,
}

impl AnyMovable {
    /// Wraps a value, erasing its type.
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Self {
            value: Box::new(value),
        }
    }

    /// Returns true if the cell holds a `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Borrows the contained value, or `None` on a type mismatch.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Mutably borrows the contained value, or `None` on a type mismatch.
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.value.downcast_mut::<T>()
    }

    /// Moves the contained value out, or returns the cell on a mismatch.
    pub fn into_inner<T: 'static>(self) -> Result<T, Self> {
        match self.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Self { value }),
        }
    }
}

impl fmt::Debug for AnyMovable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyMovable").finish_non_exhaustive()
    }
}
