//! Future-backed work (`FutureWork`).
//!
//! Runs one future per start on the tokio runtime and delivers its output as
//! the final result: `Ok(value)` becomes `success_with(value)`, `Err(err)`
//! becomes `error(err)`. Cancellation aborts the spawned task cooperatively
//! through a [`CancellationToken`]; a run canceled mid-flight delivers nothing.

use std::future::Future;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::lock;
use crate::ops::Channel;

use super::work::Work;

/// Work that resolves a single future per run.
///
/// The factory is called on every start (and restart), so each run owns fresh
/// state; share anything deliberate through an `Arc` inside the closure.
///
/// # Example
/// ```rust
/// use opvisor::{FutureWork, Operation};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), opvisor::UsageError> {
/// let op = Operation::new(FutureWork::new(|| async {
///     Ok::<_, String>("loaded".to_string())
/// }));
/// op.start()?;
/// # Ok(())
/// # }
/// ```
pub struct FutureWork<F> {
    f: F,
    token: Mutex<Option<CancellationToken>>,
}

impl<F> FutureWork<F> {
    /// Wraps a factory that produces the future for each run.
    pub fn new(f: F) -> Self {
        Self {
            f,
            token: Mutex::new(None),
        }
    }
}

impl<T, E, F, Fut> Work<T, E> for FutureWork<F>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    fn on_start(&self, channel: Channel<T, E>) {
        let token = CancellationToken::new();
        *lock(&self.token) = Some(token.clone());

        let fut = (self.f)();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                out = fut => match out {
                    // The channel may have been invalidated while the future
                    // ran; both calls are no-ops then.
                    Ok(value) => {
                        let _ = channel.success_with(value);
                    }
                    Err(error) => {
                        let _ = channel.error(error);
                    }
                },
            }
        });
    }

    fn on_cancel(&self) {
        if let Some(token) = lock(&self.token).take() {
            token.cancel();
        }
    }

    fn on_destroy(&self) {
        self.on_cancel();
    }
}
