//! Delivery channel: how work pushes results back into an operation.
//!
//! A fresh channel is minted for every run. `cancel()` invalidates it in place,
//! so deliveries from stale background work fall into silent no-ops instead of
//! racing the next run. Completing a channel twice (`success`/`error` after
//! either has been called) is a usage error; guard ordering matches the
//! delivery contract — the canceled check always wins, so a canceled channel
//! never reports usage errors.

use std::sync::{Arc, Mutex, Weak};

use crate::error::UsageError;
use crate::lock;

use super::operation::Operation;

/// Completion state shared between a channel handle and its operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    /// Accepting deliveries.
    Open,
    /// Invalidated by `cancel()`/`destroy()`; every delivery is a no-op.
    Canceled,
    /// `success()` was called; further deliveries are usage errors.
    Succeeded,
    /// `error()` was called; further deliveries are usage errors.
    Failed,
}

/// The operation-side half of a channel, kept to invalidate it on cancel.
pub(super) struct ChannelCore {
    state: Mutex<ChannelState>,
}

impl ChannelCore {
    pub(super) fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState::Open),
        }
    }

    pub(super) fn cancel(&self) {
        *lock(&self.state) = ChannelState::Canceled;
    }
}

/// Handle given to an operation's [`Work`](crate::Work) for pushing results,
/// errors, and completion back into the state machine.
///
/// Clonable and callable from any thread; deliveries are serialized by the
/// operation and its dispatch queue. Valid for a single run: once the
/// operation is canceled or restarted, this handle goes dead silently.
pub struct Channel<T, E> {
    core: Arc<ChannelCore>,
    op: Weak<Operation<T, E>>,
}

impl<T, E> Clone for Channel<T, E> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            op: Weak::clone(&self.op),
        }
    }
}

impl<T, E> Channel<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub(super) fn new(core: Arc<ChannelCore>, op: Weak<Operation<T, E>>) -> Self {
        Self { core, op }
    }

    /// Delivers an (interim or final) result.
    ///
    /// Caches the value on the operation and queues `on_result` for the
    /// attached listener. Deliver as many results as you like, then finish
    /// with [`success`](Self::success) or [`error`](Self::error).
    pub fn result(&self, value: T) -> Result<(), UsageError> {
        if !self.guard("result")? {
            return Ok(());
        }
        if let Some(op) = self.op.upgrade() {
            op.deliver_result(&self.core, value);
        }
        Ok(())
    }

    /// Completes the run with an error.
    ///
    /// Moves the operation to `Failed`, caches the error, and queues
    /// `on_error`. No further deliveries are valid on this channel.
    pub fn error(&self, error: E) -> Result<(), UsageError> {
        if !self.guard("error")? {
            return Ok(());
        }
        *lock(&self.core.state) = ChannelState::Failed;
        if let Some(op) = self.op.upgrade() {
            op.deliver_error(&self.core, error);
        }
        Ok(())
    }

    /// Completes the run successfully.
    ///
    /// Moves the operation to `Succeeded` and queues `on_success`. No further
    /// deliveries are valid on this channel.
    pub fn success(&self) -> Result<(), UsageError> {
        if !self.guard("success")? {
            return Ok(());
        }
        *lock(&self.core.state) = ChannelState::Succeeded;
        if let Some(op) = self.op.upgrade() {
            op.deliver_success(&self.core);
        }
        Ok(())
    }

    /// Delivers a final result and completes: `result(value)` then `success()`.
    pub fn success_with(&self, value: T) -> Result<(), UsageError> {
        self.result(value)?;
        self.success()
    }

    /// Returns true once the channel has been invalidated by a cancel.
    ///
    /// Long-running work can poll this to stop early; deliveries after this
    /// point are dropped either way.
    pub fn is_canceled(&self) -> bool {
        *lock(&self.core.state) == ChannelState::Canceled
    }

    /// Shared guard. `Ok(false)` means canceled: the delivery is silently
    /// dropped, since the caller no longer wants the outcome. Completed states
    /// fail fast instead.
    fn guard(&self, method: &'static str) -> Result<bool, UsageError> {
        match *lock(&self.core.state) {
            ChannelState::Canceled => Ok(false),
            ChannelState::Succeeded => Err(UsageError::AfterSuccess { method }),
            ChannelState::Failed => Err(UsageError::AfterError { method }),
            ChannelState::Open => Ok(true),
        }
    }
}
