//! Closure-backed work (`WorkFn`).
//!
//! The lightest way to plug execution into an operation: the closure receives
//! the fresh [`Channel`] on every start and decides where the work actually
//! runs. No cancel hook — pair it with [`Channel::is_canceled`] polling, or use
//! [`FutureWork`](crate::FutureWork)/[`StreamWork`](crate::StreamWork) when you
//! want managed cancellation.

use crate::ops::Channel;

use super::work::Work;

/// Function-backed work implementation.
///
/// # Example
/// ```rust
/// use opvisor::{Channel, Operation, WorkFn};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), opvisor::UsageError> {
/// let op = Operation::new(WorkFn::new(|chan: Channel<u32, String>| {
///     tokio::spawn(async move {
///         let _ = chan.success_with(7);
///     });
/// }));
/// op.start()?;
/// # Ok(())
/// # }
/// ```
pub struct WorkFn<F> {
    f: F,
}

impl<F> WorkFn<F> {
    /// Wraps a closure invoked once per run with that run's channel.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, E, F> Work<T, E> for WorkFn<F>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: Fn(Channel<T, E>) + Send + Sync + 'static,
{
    fn on_start(&self, channel: Channel<T, E>) {
        (self.f)(channel);
    }
}
