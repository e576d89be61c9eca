//! Per-call success/error callbacks.

use crate::error::{ErrorFlow, GcnError};

/// Invoked with the result of a successful operation.
pub type SuccessFn<T> = Box<dyn FnOnce(T)>;

/// Invoked with a failure; decides whether the error still goes global.
pub type ErrorFn = Box<dyn FnOnce(&GcnError) -> ErrorFlow>;

/// Optional success and error continuations for one asynchronous operation.
///
/// Without an error callback every failure is published on
/// `error-encountered`.
///
/// # Examples
///
/// ```
/// use gcn_core::{Callbacks, ErrorFlow};
///
/// let callbacks: Callbacks<u32> = Callbacks::new()
///     .on_success(|n| println!("got {}", n))
///     .on_error(|_| ErrorFlow::Handled);
/// assert!(callbacks.has_error_handler());
/// ```
pub struct Callbacks<T> {
    pub(crate) success: Option<SuccessFn<T>>,
    pub(crate) error: Option<ErrorFn>,
}

impl<T: 'static> Callbacks<T> {
    /// No callbacks; errors go to the global channel.
    pub fn new() -> Self {
        Self {
            success: None,
            error: None,
        }
    }

    /// Sets the success continuation.
    pub fn on_success(mut self, f: impl FnOnce(T) + 'static) -> Self {
        self.success = Some(Box::new(f));
        self
    }

    /// Sets the error continuation.
    pub fn on_error(mut self, f: impl FnOnce(&GcnError) -> ErrorFlow + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    /// Whether an error continuation is set.
    pub fn has_error_handler(&self) -> bool {
        self.error.is_some()
    }

    /// Runs the success continuation, if any.
    pub(crate) fn succeed(self, value: T) {
        if let Some(f) = self.success {
            f(value);
        }
    }

    /// Runs the error continuation and reports whether the error must go global.
    pub(crate) fn reject(self, err: &GcnError) -> ErrorFlow {
        match self.error {
            Some(f) => f(err),
            None => ErrorFlow::Propagate,
        }
    }

    /// Adapts the success side to a different input type.
    pub fn map<U: 'static>(self, f: impl FnOnce(U) -> T + 'static) -> Callbacks<U> {
        let success = self
            .success
            .map(|s| -> SuccessFn<U> { Box::new(move |u| s(f(u))) });
        Callbacks {
            success,
            error: self.error,
        }
    }
}

impl<T: 'static> Default for Callbacks<T> {
    fn default() -> Self {
        Self::new()
    }
}
