//! The work-execution contract.

use std::sync::Arc;

use crate::ops::Channel;

/// # The unit of work behind an operation.
///
/// `on_start` is invoked synchronously from
/// [`Operation::start`](crate::Operation::start) on the supervising thread — it
/// should kick execution off elsewhere (spawn a task, arm a timer, subscribe to
/// a source) and return promptly, keeping the [`Channel`] to report through.
/// Deliveries made before `on_start` returns are queued, never re-entrant.
///
/// Cancellation is cooperative: `on_cancel` fires when a running operation is
/// canceled (or destroyed mid-run), and the channel is already invalidated by
/// then, so anything the work still delivers is dropped. Stop the background
/// execution here if you can; leaking it is safe but wasteful.
///
/// # Example
/// ```rust
/// use opvisor::{Channel, Work};
///
/// struct Ticker;
///
/// impl Work<u64, String> for Ticker {
///     fn on_start(&self, chan: Channel<u64, String>) {
///         tokio::spawn(async move {
///             for n in 0..3 {
///                 if chan.result(n).is_err() {
///                     return;
///                 }
///                 tokio::task::yield_now().await;
///             }
///             let _ = chan.success();
///         });
///     }
/// }
/// ```
pub trait Work<T, E>: Send + Sync + 'static {
    /// Begin the work for one run, reporting through `channel`.
    fn on_start(&self, channel: Channel<T, E>);

    /// The result is no longer needed; stop background execution if possible.
    /// Called only when the operation was running.
    fn on_cancel(&self) {}

    /// The operation is being destroyed; release any held resources. No hook
    /// is called after this.
    fn on_destroy(&self) {}
}

// Lets callers keep a handle to their work (counters, queues) while the
// operation owns the other.
impl<T, E, W: Work<T, E>> Work<T, E> for Arc<W> {
    fn on_start(&self, channel: Channel<T, E>) {
        (**self).on_start(channel);
    }

    fn on_cancel(&self) {
        (**self).on_cancel();
    }

    fn on_destroy(&self) {
        (**self).on_destroy();
    }
}
