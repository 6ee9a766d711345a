//! Listener contract for operation callbacks.
//!
//! Every method has a default no-op body, so implementors override only what
//! they need. Callbacks are always invoked from the operation's dispatch queue,
//! never in-line from the call that triggered them; it is safe to call back into
//! the operation (for example `restart()` from `on_error`).

use std::sync::Arc;

/// Receives lifecycle callbacks from one [`Operation`](crate::Operation).
///
/// At most one listener is attached to an operation at a time. A listener
/// attached mid-flight catches up from cached state first:
///
/// | cached state           | callbacks on attach        |
/// |------------------------|----------------------------|
/// | has a result           | `on_result` only           |
/// | running, no result yet | `on_start` only            |
/// | succeeded              | (result, then) `on_success`|
/// | failed                 | (result, then) `on_error`  |
/// | idle                   | none                       |
pub trait Listen<T, E>: Send + Sync {
    /// The operation started and has nothing cached yet. Show loading UI here.
    fn on_start(&self) {}

    /// A result was delivered, or the cached result is being replayed.
    fn on_result(&self, value: &T) {
        let _ = value;
    }

    /// The operation completed; no further results will arrive.
    fn on_success(&self) {}

    /// The operation failed; no further results will arrive and `on_success`
    /// will not be called for this run.
    fn on_error(&self, error: &E) {
        let _ = error;
    }
}

/// Shared listener handle, as stored in the operation's slot and the registry's
/// withheld table.
pub type ListenerRef<T, E> = Arc<dyn Listen<T, E>>;
