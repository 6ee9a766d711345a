//! Test harness: drive operations by hand and record what listeners see.
//!
//! Compiled for this crate's own tests, and exported to downstream crates with
//! the `harness` feature so they can exercise their `Work` implementations the
//! same way.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::lock;
use crate::ops::{Channel, Listen};
use crate::work::Work;

/// One observed listener callback, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note<T, E> {
    /// `on_start` fired.
    Started,
    /// `on_result` fired with this value.
    Result(T),
    /// `on_success` fired.
    Succeeded,
    /// `on_error` fired with this error.
    Failed(E),
}

/// Listener that records the exact callback sequence it receives.
///
/// Assert against [`take`](Self::take) after awaiting
/// [`Operation::settled`](crate::Operation::settled).
#[derive(Default)]
pub struct RecordingListener<T, E> {
    notes: Mutex<Vec<Note<T, E>>>,
}

impl<T, E> RecordingListener<T, E> {
    pub fn new() -> Self {
        Self {
            notes: Mutex::new(Vec::new()),
        }
    }

    /// New listener behind an `Arc`, ready to attach.
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Drains and returns everything recorded so far.
    pub fn take(&self) -> Vec<Note<T, E>> {
        std::mem::take(&mut lock(&self.notes))
    }

    /// Number of callbacks recorded (without draining).
    pub fn len(&self) -> usize {
        lock(&self.notes).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T, E> Listen<T, E> for RecordingListener<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn on_start(&self) {
        lock(&self.notes).push(Note::Started);
    }

    fn on_result(&self, value: &T) {
        lock(&self.notes).push(Note::Result(value.clone()));
    }

    fn on_success(&self) {
        lock(&self.notes).push(Note::Succeeded);
    }

    fn on_error(&self, error: &E) {
        lock(&self.notes).push(Note::Failed(error.clone()));
    }
}

/// Work that does nothing until the test drives its channel by hand.
///
/// Keep an `Arc` to it, hand a clone to [`Operation::new`](crate::Operation::new),
/// then pull the current run's channel with [`channel`](Self::channel).
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use opvisor::Operation;
/// use opvisor::harness::ManualWork;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), opvisor::UsageError> {
/// let work = Arc::new(ManualWork::<String, String>::new());
/// let op = Operation::new(Arc::clone(&work));
///
/// op.start()?;
/// work.channel().unwrap().success_with("driven".into())?;
/// assert!(op.is_succeeded());
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ManualWork<T, E> {
    channel: Mutex<Option<Channel<T, E>>>,
    starts: AtomicUsize,
    canceled: AtomicBool,
    destroyed: AtomicBool,
}

impl<T, E> ManualWork<T, E> {
    pub fn new() -> Self {
        Self {
            channel: Mutex::new(None),
            starts: AtomicUsize::new(0),
            canceled: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Channel of the most recent run, if the operation has been started.
    pub fn channel(&self) -> Option<Channel<T, E>> {
        lock(&self.channel).clone()
    }

    /// How many times the operation invoked `on_start`.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::Acquire)
    }

    /// Whether a running operation canceled this work.
    pub fn was_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Whether the operation destroyed this work.
    pub fn was_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

impl<T, E> Work<T, E> for ManualWork<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn on_start(&self, channel: Channel<T, E>) {
        self.starts.fetch_add(1, Ordering::AcqRel);
        *lock(&self.channel) = Some(channel);
    }

    fn on_cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    fn on_destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
    }
}
