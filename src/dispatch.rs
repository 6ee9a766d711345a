//! Ordered, asynchronous delivery of listener callbacks.
//!
//! Every callback an [`Operation`](crate::Operation) makes goes through one of
//! these queues: an unbounded channel drained by a single worker task. That gives
//! two guarantees the state machine relies on:
//!
//! - **FIFO per operation** — a replayed cached result can never be overtaken by
//!   a delivery that happened after the listener attached.
//! - **No re-entrancy** — a result produced while `start()` is still on the stack
//!   is observed by the listener only on a later turn of the event loop.
//!
//! Jobs carry a generation stamp. Cancel, destroy, and listener replacement bump
//! the generation, turning any still-queued job into a no-op; this is how a result
//! delivered just before a cancel is guaranteed never to reach the listener.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};

/// One queued callback invocation.
struct Job {
    gen: u64,
    run: Box<dyn FnOnce() + Send>,
}

/// Per-operation callback queue with a dedicated worker task.
///
/// The worker exits when the queue is dropped (the sender side closes).
pub(crate) struct DispatchQueue {
    tx: mpsc::UnboundedSender<Job>,
    gen: Arc<AtomicU64>,
    pending: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl DispatchQueue {
    /// Creates the queue and spawns its worker. Must be called inside a tokio
    /// runtime.
    pub(crate) fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let gen = Arc::new(AtomicU64::new(0));
        let pending = Arc::new(AtomicUsize::new(0));
        let notify = Arc::new(Notify::new());

        let worker_gen = Arc::clone(&gen);
        let worker_pending = Arc::clone(&pending);
        let worker_notify = Arc::clone(&notify);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if job.gen == worker_gen.load(Ordering::Acquire) {
                    let run = job.run;
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(run)) {
                        eprintln!("[opvisor] listener panicked: {payload:?}");
                    }
                }
                if worker_pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                    worker_notify.notify_waiters();
                }
            }
        });

        Self {
            tx,
            gen,
            pending,
            notify,
        }
    }

    /// Queues a callback for the current generation.
    pub(crate) fn enqueue(&self, run: Box<dyn FnOnce() + Send>) {
        let job = Job {
            gen: self.gen.load(Ordering::Acquire),
            run,
        };
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(job).is_err() {
            // Worker gone; nothing will drain this slot.
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Revokes every callback queued so far. Jobs already in flight are skipped
    /// by the worker, not interrupted.
    pub(crate) fn revoke_pending(&self) {
        self.gen.fetch_add(1, Ordering::AcqRel);
    }

    /// Resolves once every queued callback has been drained (delivered or
    /// skipped as revoked).
    pub(crate) async fn settled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}
