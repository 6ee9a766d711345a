//! The operation state machine.
//!
//! One [`Operation`] wraps one asynchronous unit of work. Starting it invokes
//! the work hook with a fresh [`Channel`]; results pushed through the channel
//! are cached (latest only) and forwarded to the attached listener through the
//! dispatch queue. Because the cache lives here and not in the listener, the
//! listener can be detached and a new one attached later — say, across a UI
//! rebuild — and the new one catches up from cached state without the work
//! re-running.
//!
//! All mutating methods are expected to run on one logical thread (typically
//! the UI thread). The channel handle is the one piece background work may call
//! from anywhere.

use std::sync::{Arc, Mutex};

use crate::dispatch::DispatchQueue;
use crate::error::UsageError;
use crate::lock;
use crate::work::Work;

use super::channel::{Channel, ChannelCore};
use super::listen::ListenerRef;
use super::status::RunState;

/// State behind the operation's lock. Callbacks never run while this is held.
struct Inner<T, E> {
    state: RunState,
    has_result: bool,
    cached_result: Option<T>,
    cached_error: Option<E>,
    listener: Option<ListenerRef<T, E>>,
    /// Channel for the current run; `None` when idle or after cancel.
    channel: Option<Arc<ChannelCore>>,
}

/// A single supervised operation with a cached latest result.
///
/// Create one per unit of work via [`Operation::new`], usually from the factory
/// passed to [`Registry::init`](crate::Registry::init). Must be created inside
/// a tokio runtime (the dispatch worker is spawned on it).
///
/// # Example
/// ```rust
/// use opvisor::{Operation, WorkFn, Channel};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), opvisor::UsageError> {
/// let op = Operation::new(WorkFn::new(|chan: Channel<u32, String>| {
///     let _ = chan.success_with(42);
/// }));
///
/// op.start()?;
/// op.settled().await;
/// assert!(op.is_succeeded());
/// assert!(op.has_result());
/// # Ok(())
/// # }
/// ```
pub struct Operation<T, E> {
    inner: Mutex<Inner<T, E>>,
    queue: DispatchQueue,
    work: Box<dyn Work<T, E>>,
}

impl<T, E> std::fmt::Debug for Operation<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation").finish_non_exhaustive()
    }
}

impl<T, E> Operation<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Wraps `work` in a new, idle operation.
    pub fn new(work: impl Work<T, E>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                state: RunState::Idle,
                has_result: false,
                cached_result: None,
                cached_error: None,
                listener: None,
                channel: None,
            }),
            queue: DispatchQueue::new(),
            work: Box::new(work),
        })
    }

    /// Starts the operation if it has not already been started.
    ///
    /// Queues `on_start` for the attached listener, mints a fresh channel, and
    /// invokes the work hook with it. No-op when already `Running`, `Succeeded`,
    /// or `Failed`. Deliveries the hook makes synchronously are queued and
    /// observed only after this call returns.
    pub fn start(self: &Arc<Self>) -> Result<(), UsageError> {
        let core = {
            let mut inner = lock(&self.inner);
            match inner.state {
                RunState::Destroyed => return Err(UsageError::Destroyed { method: "start" }),
                s if s.is_started() => return Ok(()),
                _ => {}
            }
            inner.state = RunState::Running;
            let core = Arc::new(ChannelCore::new());
            inner.channel = Some(Arc::clone(&core));
            if let Some(listener) = inner.listener.clone() {
                self.queue.enqueue(Box::new(move || listener.on_start()));
            }
            core
        };

        // The hook runs without the lock so it may deliver in-line; those
        // deliveries land on the queue, not the listener.
        self.work.on_start(Channel::new(core, Arc::downgrade(self)));
        Ok(())
    }

    /// Cancels the current run, clearing the cached result.
    ///
    /// Invalidates the channel (stale deliveries become no-ops), revokes every
    /// still-queued callback, invokes the cancel hook iff the operation was
    /// running, and resets to `Idle`. Safe to call when not running; the cache
    /// is cleared either way.
    pub fn cancel(&self) -> Result<(), UsageError> {
        let was_running = {
            let mut inner = lock(&self.inner);
            if inner.state == RunState::Destroyed {
                return Err(UsageError::Destroyed { method: "cancel" });
            }
            inner.has_result = false;
            inner.cached_result = None;
            inner.cached_error = None;
            if let Some(core) = inner.channel.take() {
                core.cancel();
            }
            self.queue.revoke_pending();
            let was_running = inner.state == RunState::Running;
            inner.state = RunState::Idle;
            was_running
        };

        if was_running {
            self.work.on_cancel();
        }
        Ok(())
    }

    /// Forces the operation to run again: `cancel()` followed by `start()`.
    pub fn restart(self: &Arc<Self>) -> Result<(), UsageError> {
        self.cancel()?;
        self.start()
    }

    /// Destroys the operation, canceling it first if necessary.
    ///
    /// Clears the listener and invokes the destroy hook. Terminal: every
    /// mutating call afterwards fails with a usage error, and the caller must
    /// treat the instance as dead. Normally called by the registry.
    pub fn destroy(&self) -> Result<(), UsageError> {
        {
            let inner = lock(&self.inner);
            if inner.state == RunState::Destroyed {
                return Err(UsageError::Destroyed { method: "destroy" });
            }
        }
        self.cancel()?;
        {
            let mut inner = lock(&self.inner);
            inner.state = RunState::Destroyed;
            inner.listener = None;
        }
        self.work.on_destroy();
        Ok(())
    }

    /// Replaces the listener slot; `None` detaches.
    ///
    /// Pending deliveries for the previous listener are revoked. Attaching a
    /// listener replays cached state through the queue: a cached result yields
    /// `on_result` (and suppresses the `on_start` notice); a running operation
    /// without one yields `on_start`; a completed operation additionally yields
    /// its terminal `on_success`/`on_error`.
    pub fn set_listener(&self, listener: Option<ListenerRef<T, E>>) -> Result<(), UsageError> {
        let mut inner = lock(&self.inner);
        if inner.state == RunState::Destroyed {
            return Err(UsageError::Destroyed { method: "set_listener" });
        }
        self.queue.revoke_pending();
        inner.listener = listener.clone();

        let Some(listener) = listener else {
            return Ok(());
        };

        let mut jobs: Vec<Box<dyn FnOnce() + Send>> = Vec::new();
        if inner.has_result {
            if let Some(value) = inner.cached_result.clone() {
                let l = Arc::clone(&listener);
                jobs.push(Box::new(move || l.on_result(&value)));
            }
        } else if inner.state == RunState::Running {
            let l = Arc::clone(&listener);
            jobs.push(Box::new(move || l.on_start()));
        }
        match inner.state {
            RunState::Succeeded => {
                let l = Arc::clone(&listener);
                jobs.push(Box::new(move || l.on_success()));
            }
            RunState::Failed => {
                if let Some(error) = inner.cached_error.clone() {
                    let l = Arc::clone(&listener);
                    jobs.push(Box::new(move || l.on_error(&error)));
                }
            }
            _ => {}
        }
        drop(inner);

        for job in jobs {
            self.queue.enqueue(job);
        }
        Ok(())
    }

    /// Returns the currently attached listener, if any.
    pub fn listener(&self) -> Option<ListenerRef<T, E>> {
        lock(&self.inner).listener.clone()
    }

    /// Clones the cached latest result, if one is buffered.
    pub fn cached_result(&self) -> Option<T> {
        lock(&self.inner).cached_result.clone()
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        lock(&self.inner).state
    }

    /// True while started and not yet completed; more results may arrive.
    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// True if a result is buffered for replay on the next attach.
    pub fn has_result(&self) -> bool {
        lock(&self.inner).has_result
    }

    /// True once the current run completed via `success()`.
    pub fn is_succeeded(&self) -> bool {
        self.state() == RunState::Succeeded
    }

    /// True once the current run completed via `error()`.
    pub fn is_failed(&self) -> bool {
        self.state() == RunState::Failed
    }

    /// True once destroyed; the instance is dead.
    pub fn is_destroyed(&self) -> bool {
        self.state() == RunState::Destroyed
    }

    /// True while a listener is attached.
    pub fn is_attached(&self) -> bool {
        lock(&self.inner).listener.is_some()
    }

    /// Resolves once every queued callback has been delivered (or revoked).
    ///
    /// Handy in tests and in glue code that must observe the listener's view
    /// of the world before proceeding.
    pub async fn settled(&self) {
        self.queue.settled().await;
    }

    // ---- Channel-side entry points ----
    //
    // Each re-checks that `core` is still the active channel under the lock:
    // a delivery that lost the race against cancel() must not touch the cache.

    pub(super) fn deliver_result(&self, core: &Arc<ChannelCore>, value: T) {
        let listener = {
            let mut inner = lock(&self.inner);
            if !Self::is_active(&inner, core) {
                return;
            }
            inner.has_result = true;
            inner.cached_result = Some(value.clone());
            inner.listener.clone()
        };
        if let Some(listener) = listener {
            self.queue
                .enqueue(Box::new(move || listener.on_result(&value)));
        }
    }

    pub(super) fn deliver_error(&self, core: &Arc<ChannelCore>, error: E) {
        let listener = {
            let mut inner = lock(&self.inner);
            if !Self::is_active(&inner, core) {
                return;
            }
            inner.state = RunState::Failed;
            inner.cached_error = Some(error.clone());
            inner.listener.clone()
        };
        if let Some(listener) = listener {
            self.queue
                .enqueue(Box::new(move || listener.on_error(&error)));
        }
    }

    pub(super) fn deliver_success(&self, core: &Arc<ChannelCore>) {
        let listener = {
            let mut inner = lock(&self.inner);
            if !Self::is_active(&inner, core) {
                return;
            }
            inner.state = RunState::Succeeded;
            inner.listener.clone()
        };
        if let Some(listener) = listener {
            self.queue.enqueue(Box::new(move || listener.on_success()));
        }
    }

    fn is_active(inner: &Inner<T, E>, core: &Arc<ChannelCore>) -> bool {
        matches!(&inner.channel, Some(active) if Arc::ptr_eq(active, core))
    }
}
