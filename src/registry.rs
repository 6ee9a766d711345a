//! Keyed collection of operations with bulk lifecycle control.
//!
//! A [`Registry`] is what the owning scope retains across its own destructive
//! re-creation. It maps an [`OpId`] to an operation plus, while listeners are
//! withheld, that operation's parked listener. The registry moves between two
//! phases:
//!
//! - **withheld** (initial, and after `stop()`/`detach()`): `init` parks the
//!   listener instead of attaching it; operations keep running and caching, but
//!   no callbacks are delivered;
//! - **attached** (after `start()`): `init` attaches directly, and parked
//!   listeners have been attached with their caches replayed.
//!
//! ```text
//! init() ──► start() ──► stop() ──► detach() ──► destroy()
//!   ▲           ▲──────────┘            │
//!   └───────────────────────────────────┘
//! ```
//!
//! Operations of different result/error types can share one registry; `init`
//! downcasts the slot it finds and fails fast on a type mismatch.

use std::any::Any;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::UsageError;
use crate::lock;
use crate::ops::{ListenerRef, Operation};

/// Identifier of one operation within a registry. Unique for the registry's
/// lifetime; picking them is the caller's job.
pub type OpId = u64;

/// Type-erased slot holding one operation and its possibly-parked listener.
///
/// The typed state lives inside [`Entry<T, E>`]; these methods are the pieces
/// the registry's bulk transitions need without knowing `T`/`E`.
trait Slot: Send {
    fn as_any(&mut self) -> &mut dyn Any;

    /// `start()`: attach the parked listener, replaying cached state.
    fn attach_withheld(&mut self) -> Result<(), UsageError>;

    /// `stop()`: park the live listener, detaching it from the operation.
    fn withhold(&mut self) -> Result<(), UsageError>;

    /// `detach()`: drop the listener, live or parked.
    fn clear_listeners(&mut self) -> Result<(), UsageError>;

    /// `remove()`/`destroy()`: tear the operation down.
    fn destroy(&mut self) -> Result<(), UsageError>;
}

struct Entry<T, E> {
    op: Arc<Operation<T, E>>,
    withheld: Option<ListenerRef<T, E>>,
}

impl<T, E> Slot for Entry<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn as_any(&mut self) -> &mut dyn Any {
        self
    }

    fn attach_withheld(&mut self) -> Result<(), UsageError> {
        match self.withheld.take() {
            Some(listener) => self.op.set_listener(Some(listener)),
            None => Ok(()),
        }
    }

    fn withhold(&mut self) -> Result<(), UsageError> {
        self.withheld = self.op.listener();
        self.op.set_listener(None)
    }

    fn clear_listeners(&mut self) -> Result<(), UsageError> {
        self.withheld = None;
        self.op.set_listener(None)
    }

    fn destroy(&mut self) -> Result<(), UsageError> {
        self.withheld = None;
        self.op.set_listener(None)?;
        self.op.destroy()
    }
}

struct RegistryInner {
    entries: HashMap<OpId, Box<dyn Slot>>,
    /// Phase flag: false = withheld (initial/stopped), true = attached.
    attached: bool,
    destroyed: bool,
}

/// Manages a set of operations in the same scope.
///
/// Retain this instance across the scope's re-creation, calling
/// [`start`](Self::start), [`stop`](Self::stop), [`detach`](Self::detach), and
/// [`destroy`](Self::destroy) as the scope's own lifecycle dictates. A freshly
/// created registry is in the withheld phase: listeners passed to
/// [`init`](Self::init) are parked until the first `start()`.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use opvisor::{Channel, Listen, Operation, Registry, WorkFn};
///
/// struct Ui;
///
/// impl Listen<u32, String> for Ui {
///     fn on_result(&self, value: &u32) {
///         println!("loaded: {value}");
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), opvisor::UsageError> {
/// let registry = Registry::new();
///
/// let op = registry.init(
///     7,
///     || Operation::new(WorkFn::new(|chan: Channel<u32, String>| {
///         let _ = chan.success_with(1);
///     })),
///     Arc::new(Ui),
/// )?;
///
/// registry.start()?; // attach parked listeners
/// op.start()?;       // run the work
/// registry.destroy()?;
/// # Ok(())
/// # }
/// ```
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    /// Creates an empty registry in the withheld phase.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                entries: HashMap::new(),
                attached: false,
                destroyed: false,
            }),
        }
    }

    /// Initializes the operation for `id`, creating it if it does not exist.
    ///
    /// `factory` runs at most once per id for the registry's lifetime — once an
    /// operation exists it is reused until [`remove`](Self::remove). In the
    /// attached phase the listener is attached immediately (replaying cached
    /// state); in the withheld phase it is parked until [`start`](Self::start).
    ///
    /// Fails fast if the operation already has a listener, live or parked
    /// (duplicate id, or a previous scope that never detached), or if `id`
    /// holds an operation of different result/error types.
    pub fn init<T, E, F>(
        &self,
        id: OpId,
        factory: F,
        listener: ListenerRef<T, E>,
    ) -> Result<Arc<Operation<T, E>>, UsageError>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
        F: FnOnce() -> Arc<Operation<T, E>>,
    {
        let mut inner = lock(&self.inner);
        if inner.destroyed {
            return Err(UsageError::Destroyed { method: "init" });
        }
        let RegistryInner {
            entries, attached, ..
        } = &mut *inner;

        let slot = match entries.entry(id) {
            MapEntry::Occupied(occupied) => occupied.into_mut(),
            MapEntry::Vacant(vacant) => vacant.insert(Box::new(Entry {
                op: factory(),
                withheld: None,
            })),
        };
        let entry = slot
            .as_any()
            .downcast_mut::<Entry<T, E>>()
            .ok_or(UsageError::TypeMismatch { id })?;

        if entry.op.is_attached() || entry.withheld.is_some() {
            return Err(UsageError::ListenerAttached { id });
        }

        if *attached {
            entry.op.set_listener(Some(listener))?;
        } else {
            entry.withheld = Some(listener);
        }
        Ok(Arc::clone(&entry.op))
    }

    /// Destroys and removes the operation for `id`, clearing any parked
    /// listener; a later `init` with the same id creates a brand-new operation.
    /// Unknown ids are ignored.
    pub fn remove(&self, id: OpId) -> Result<(), UsageError> {
        let mut inner = lock(&self.inner);
        if inner.destroyed {
            return Err(UsageError::Destroyed { method: "remove" });
        }
        if let Some(mut slot) = inner.entries.remove(&id) {
            slot.destroy()?;
        }
        Ok(())
    }

    /// Starts delivering results: attaches every parked listener (replaying
    /// cached state) and enters the attached phase. No-op when already there.
    pub fn start(&self) -> Result<(), UsageError> {
        let mut inner = lock(&self.inner);
        if inner.destroyed {
            return Err(UsageError::Destroyed { method: "start" });
        }
        if inner.attached {
            return Ok(());
        }
        for slot in inner.entries.values_mut() {
            slot.attach_withheld()?;
        }
        inner.attached = true;
        Ok(())
    }

    /// Stops delivering results without losing the listeners.
    ///
    /// Each live listener is parked and detached from its operation; the
    /// operations keep running and caching. Unlike [`detach`](Self::detach) the
    /// references survive, so a later [`start`](Self::start) resumes delivery
    /// without another `init`. No-op when already withheld.
    pub fn stop(&self) -> Result<(), UsageError> {
        let mut inner = lock(&self.inner);
        if inner.destroyed {
            return Err(UsageError::Destroyed { method: "stop" });
        }
        if !inner.attached {
            return Ok(());
        }
        for slot in inner.entries.values_mut() {
            slot.withhold()?;
        }
        inner.attached = false;
        Ok(())
    }

    /// Drops every listener, live or parked, keeping the operations.
    ///
    /// Call when the owning scope is being torn down but will be re-created —
    /// the re-created scope re-`init`s the same ids and gets the cached state
    /// replayed. Leaves the registry in the withheld phase with empty slots.
    pub fn detach(&self) -> Result<(), UsageError> {
        let mut inner = lock(&self.inner);
        if inner.destroyed {
            return Err(UsageError::Destroyed { method: "detach" });
        }
        for slot in inner.entries.values_mut() {
            slot.clear_listeners()?;
        }
        inner.attached = false;
        Ok(())
    }

    /// Destroys every operation and empties the registry.
    ///
    /// Terminal: the registry is not reusable, and every later call (including
    /// `init`) fails with a usage error.
    pub fn destroy(&self) -> Result<(), UsageError> {
        let mut inner = lock(&self.inner);
        if inner.destroyed {
            return Err(UsageError::Destroyed { method: "destroy" });
        }
        for slot in inner.entries.values_mut() {
            slot.destroy()?;
        }
        inner.entries.clear();
        inner.destroyed = true;
        Ok(())
    }

    /// Number of operations currently held.
    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    /// True when no operations are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{ManualWork, Note, RecordingListener};

    type StrWork = Arc<ManualWork<String, String>>;
    type StrOp = Arc<Operation<String, String>>;

    fn manual_factory() -> (StrWork, impl FnOnce() -> StrOp) {
        let work: StrWork = Arc::new(ManualWork::new());
        let for_factory = Arc::clone(&work);
        (work, move || Operation::new(for_factory))
    }

    #[tokio::test(flavor = "current_thread")]
    async fn init_creates_the_operation_once() {
        let registry = Registry::new();
        let (_, factory) = manual_factory();

        let op = registry
            .init(0, factory, RecordingListener::arc() as _)
            .unwrap();
        registry.detach().unwrap();

        let mut second_factory_ran = false;
        let op2 = registry
            .init(
                0,
                || {
                    second_factory_ran = true;
                    Operation::new(ManualWork::<String, String>::new())
                },
                RecordingListener::arc() as _,
            )
            .unwrap();

        assert!(Arc::ptr_eq(&op, &op2));
        assert!(!second_factory_ran);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn different_ids_get_different_operations() {
        let registry = Registry::new();
        let (_, f1) = manual_factory();
        let (_, f2) = manual_factory();

        let a = registry.init(0, f1, RecordingListener::arc() as _).unwrap();
        let b = registry.init(1, f2, RecordingListener::arc() as _).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn duplicate_init_fails_without_running_the_factory() {
        let registry = Registry::new();
        let (_, factory) = manual_factory();
        registry
            .init(0, factory, RecordingListener::arc() as _)
            .unwrap();

        let mut second_factory_ran = false;
        let err = registry
            .init(
                0,
                || {
                    second_factory_ran = true;
                    Operation::new(ManualWork::<String, String>::new())
                },
                RecordingListener::arc() as _,
            )
            .unwrap_err();

        assert_eq!(err, UsageError::ListenerAttached { id: 0 });
        assert!(!second_factory_ran);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn duplicate_init_fails_in_the_attached_phase_too() {
        let registry = Registry::new();
        registry.start().unwrap();
        let (_, factory) = manual_factory();
        registry
            .init(0, factory, RecordingListener::arc() as _)
            .unwrap();

        let (_, factory2) = manual_factory();
        let err = registry
            .init(0, factory2, RecordingListener::arc() as _)
            .unwrap_err();
        assert_eq!(err, UsageError::ListenerAttached { id: 0 });
    }

    #[tokio::test(flavor = "current_thread")]
    async fn init_with_mismatched_types_fails_fast() {
        let registry = Registry::new();
        let (_, factory) = manual_factory();
        registry
            .init(0, factory, RecordingListener::arc() as _)
            .unwrap();
        registry.detach().unwrap();

        let err = registry
            .init(
                0,
                || Operation::new(ManualWork::<u32, String>::new()),
                RecordingListener::<u32, String>::arc() as _,
            )
            .unwrap_err();
        assert_eq!(err, UsageError::TypeMismatch { id: 0 });
    }

    #[tokio::test(flavor = "current_thread")]
    async fn listeners_are_parked_until_the_registry_starts() {
        let registry = Registry::new();
        let (work, factory) = manual_factory();
        let rec = RecordingListener::arc();
        let op = registry.init(0, factory, rec.clone() as _).unwrap();

        op.start().unwrap();
        work.channel().unwrap().result("early".into()).unwrap();
        op.settled().await;
        assert!(rec.take().is_empty());

        registry.start().unwrap();
        op.settled().await;
        assert_eq!(rec.take(), vec![Note::Result("early".into())]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn stop_then_start_replays_a_result_produced_while_stopped_once() {
        let registry = Registry::new();
        let (work, factory) = manual_factory();
        let rec = RecordingListener::arc();
        let op = registry.init(0, factory, rec.clone() as _).unwrap();
        registry.start().unwrap();
        op.start().unwrap();
        op.settled().await;
        assert_eq!(rec.take(), vec![Note::Started]);

        registry.stop().unwrap();
        work.channel().unwrap().result("while-stopped".into()).unwrap();
        op.settled().await;
        assert!(rec.take().is_empty());

        registry.start().unwrap();
        op.settled().await;
        assert_eq!(rec.take(), vec![Note::Result("while-stopped".into())]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn start_twice_is_a_no_op() {
        let registry = Registry::new();
        let (_, factory) = manual_factory();
        let rec = RecordingListener::arc();
        let op = registry.init(0, factory, rec.clone() as _).unwrap();
        op.start().unwrap();

        registry.start().unwrap();
        registry.start().unwrap();
        op.settled().await;

        assert_eq!(rec.take(), vec![Note::Started]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn detach_then_reinit_replays_cached_state_to_the_new_listener() {
        let registry = Registry::new();
        let (work, factory) = manual_factory();
        let old = RecordingListener::arc();
        let op = registry.init(0, factory, old.clone() as _).unwrap();
        registry.start().unwrap();
        op.start().unwrap();
        op.settled().await;

        registry.detach().unwrap();
        work.channel().unwrap().result("survives".into()).unwrap();

        let mut factory_ran_again = false;
        let fresh = RecordingListener::arc();
        let op2 = registry
            .init(
                0,
                || {
                    factory_ran_again = true;
                    Operation::new(ManualWork::<String, String>::new())
                },
                fresh.clone() as _,
            )
            .unwrap();
        assert!(!factory_ran_again);
        assert!(Arc::ptr_eq(&op, &op2));

        registry.start().unwrap();
        op.settled().await;
        assert_eq!(fresh.take(), vec![Note::Result("survives".into())]);
        // The detached listener saw the start notice and nothing since.
        assert_eq!(old.take(), vec![Note::Started]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn remove_destroys_and_allows_a_fresh_init() {
        let registry = Registry::new();
        let (_, factory) = manual_factory();
        let op = registry
            .init(0, factory, RecordingListener::arc() as _)
            .unwrap();

        registry.remove(0).unwrap();
        assert!(op.is_destroyed());
        assert!(registry.is_empty());

        // The withheld entry went with it; the id is free again.
        let mut factory_ran = false;
        let op2 = registry
            .init(
                0,
                || {
                    factory_ran = true;
                    Operation::new(ManualWork::<String, String>::new())
                },
                RecordingListener::arc() as _,
            )
            .unwrap();
        assert!(factory_ran);
        assert!(!Arc::ptr_eq(&op, &op2));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn remove_of_an_unknown_id_is_ignored() {
        let registry = Registry::new();
        registry.remove(99).unwrap();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn destroy_tears_everything_down_and_locks_the_registry() {
        let registry = Registry::new();
        let (work, factory) = manual_factory();
        let rec = RecordingListener::arc();
        let op = registry.init(0, factory, rec.clone() as _).unwrap();
        registry.start().unwrap();
        op.start().unwrap();
        op.settled().await;
        let chan = work.channel().unwrap();

        registry.destroy().unwrap();
        assert!(op.is_destroyed());
        assert!(registry.is_empty());

        // Late delivery from the destroyed run is dropped.
        chan.result("late".into()).unwrap();
        op.settled().await;
        assert_eq!(rec.take(), vec![Note::Started]);

        let err = registry
            .init(
                0,
                || Operation::new(ManualWork::<String, String>::new()),
                RecordingListener::arc() as _,
            )
            .unwrap_err();
        assert_eq!(err, UsageError::Destroyed { method: "init" });
        assert_eq!(
            registry.start(),
            Err(UsageError::Destroyed { method: "start" })
        );
        assert_eq!(
            registry.destroy(),
            Err(UsageError::Destroyed { method: "destroy" })
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn mixed_types_can_share_a_registry() {
        let registry = Registry::new();
        let (_, factory) = manual_factory();
        registry
            .init(0, factory, RecordingListener::arc() as _)
            .unwrap();
        let numbers = registry
            .init(
                1,
                || Operation::new(ManualWork::<u32, String>::new()),
                RecordingListener::<u32, String>::arc() as _,
            )
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(!numbers.is_running());
    }
}
