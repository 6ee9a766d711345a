//! Stream-backed work (`StreamWork`).
//!
//! Drains a cold [`Stream`] per run: each `Ok` item is delivered as a result,
//! the end of the stream completes the operation, and the first `Err` item
//! fails it and stops the drain. The factory must return a stream that does
//! nothing until polled — it is not expected to run before `start()`.

use std::sync::Mutex;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::lock;
use crate::ops::Channel;

use super::work::Work;

/// Work that forwards a stream of results into the operation.
///
/// Good for sources that emit many interim values: watch channels, pub/sub
/// subscriptions, polling loops wrapped as streams.
///
/// # Example
/// ```rust
/// use opvisor::{Operation, StreamWork};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), opvisor::UsageError> {
/// let op = Operation::new(StreamWork::new(|| {
///     futures::stream::iter(vec![Ok::<_, String>(1), Ok(2), Ok(3)])
/// }));
/// op.start()?;
/// # Ok(())
/// # }
/// ```
pub struct StreamWork<F> {
    f: F,
    token: Mutex<Option<CancellationToken>>,
}

impl<F> StreamWork<F> {
    /// Wraps a factory that produces a fresh (cold) stream for each run.
    pub fn new(f: F) -> Self {
        Self {
            f,
            token: Mutex::new(None),
        }
    }
}

impl<T, E, F, S> Work<T, E> for StreamWork<F>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: Fn() -> S + Send + Sync + 'static,
    S: Stream<Item = Result<T, E>> + Send + 'static,
{
    fn on_start(&self, channel: Channel<T, E>) {
        let token = CancellationToken::new();
        *lock(&self.token) = Some(token.clone());

        let mut stream = Box::pin((self.f)());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    item = stream.next() => match item {
                        Some(Ok(value)) => {
                            if channel.result(value).is_err() {
                                return;
                            }
                        }
                        Some(Err(error)) => {
                            let _ = channel.error(error);
                            return;
                        }
                        None => {
                            let _ = channel.success();
                            return;
                        }
                    },
                }
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
