//! Usage errors raised by operations, channels, and the registry.
//!
//! These are fail-fast programmer errors, not runtime conditions: mutating a
//! destroyed operation, completing a delivery channel twice, or attaching a
//! second listener without detaching the first. Errors an operation's *work*
//! reports are never surfaced here; they flow through
//! [`Listen::on_error`](crate::Listen::on_error) only.

use thiserror::Error;

use crate::registry::OpId;

/// # Fail-fast usage errors.
///
/// Returned at the call site the moment a contract is broken. None of these are
/// recoverable for that call; they indicate a caller bug (a missed `detach`, a
/// duplicate id, a stale handle kept past `destroy`).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// A mutating method was called after `destroy()`.
    #[error("cannot call {method}() after destroy()")]
    Destroyed {
        /// Name of the offending method.
        method: &'static str,
    },

    /// A channel delivery was attempted after `success()` completed the run.
    #[error("cannot call {method}() after success()")]
    AfterSuccess {
        /// Name of the offending channel method.
        method: &'static str,
    },

    /// A channel delivery was attempted after `error()` completed the run.
    #[error("cannot call {method}() after error()")]
    AfterError {
        /// Name of the offending channel method.
        method: &'static str,
    },

    /// `init` hit an id whose operation already has a listener (live or withheld).
    #[error(
        "operation {id} already has a listener; use unique ids and make sure the \
         previous scope was detached"
    )]
    ListenerAttached {
        /// The duplicated identifier.
        id: OpId,
    },

    /// `init` hit an id whose existing operation has different result/error types.
    #[error("operation {id} already exists with different result/error types")]
    TypeMismatch {
        /// The conflicting identifier.
        id: OpId,
    },
}

impl UsageError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use opvisor::UsageError;
    ///
    /// let err = UsageError::Destroyed { method: "start" };
    /// assert_eq!(err.as_label(), "usage_destroyed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            UsageError::Destroyed { .. } => "usage_destroyed",
            UsageError::AfterSuccess { .. } => "usage_after_success",
            UsageError::AfterError { .. } => "usage_after_error",
            UsageError::ListenerAttached { .. } => "usage_listener_attached",
            UsageError::TypeMismatch { .. } => "usage_type_mismatch",
        }
    }
}
