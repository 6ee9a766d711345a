//! # opvisor
//!
//! **Opvisor** supervises asynchronous operations whose results must outlive the
//! scope that requested them (for example, a UI surface rebuilt after a
//! configuration change). Each [`Operation`] caches its latest result and replays
//! it to whichever listener is currently attached; a [`Registry`] drives many
//! operations through a shared attach/detach lifecycle.
//!
//! ## Architecture
//! ```text
//!   caller scope (UI, component, ...)
//!        │ init(id, factory, listener)
//!        ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │  Registry (keyed operations + withheld listeners)       │
//! │  - start(): attach withheld listeners, replay caches    │
//! │  - stop():  park listeners, keep operations running     │
//! │  - detach(): drop listeners, keep operations            │
//! │  - destroy(): tear everything down                      │
//! └──────┬──────────────────┬──────────────────┬────────────┘
//!        ▼                  ▼                  ▼
//!  ┌───────────┐      ┌───────────┐      ┌───────────┐
//!  │ Operation │      │ Operation │      │ Operation │
//!  │ (state    │      │ (state    │      │ (state    │
//!  │  machine) │      │  machine) │      │  machine) │
//!  └─┬───────▲─┘      └───────────┘      └───────────┘
//!    │       │ result / error / success
//!    │   ┌───┴─────┐
//!    │   │ Channel │ ◄── background work (Work impl)
//!    │   └─────────┘
//!    ▼
//!  dispatch queue ──► listener callbacks (ordered, never in-line)
//! ```
//!
//! ## Lifecycle
//! ```text
//! init() ──► start() ──► stop() ──► detach() ──► destroy()
//!   ▲           ▲──────────┘            │
//!   └───────────────────────────────────┘
//! ```
//!
//! An operation's work runs wherever its [`Work`] implementation puts it (a spawned
//! task, a timer, an external event source) and reports back through the
//! [`Channel`] handle. The operation buffers the most recent result, so a listener
//! attached after a detach/reattach cycle catches up immediately without the work
//! re-running. Results delivered synchronously while `start()` is still on the
//! stack are queued and observed only after `start()` returns.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use opvisor::{Listen, Operation, Registry, WorkFn};
//!
//! struct Print;
//!
//! impl Listen<String, String> for Print {
//!     fn on_result(&self, value: &String) {
//!         println!("got: {value}");
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), opvisor::UsageError> {
//!     let registry = Registry::new();
//!
//!     let op = registry.init(
//!         0,
//!         || Operation::new(WorkFn::new(|chan: opvisor::Channel<String, String>| {
//!             // Deliveries made here are queued, never re-entrant.
//!             let _ = chan.success_with("hello".to_string());
//!         })),
//!         Arc::new(Print),
//!     )?;
//!
//!     registry.start()?;
//!     op.start()?;
//!     op.settled().await;
//!
//!     registry.destroy()?;
//!     Ok(())
//! }
//! ```

mod dispatch;
mod error;
mod ops;
mod registry;
mod work;

// ---- Public re-exports ----

pub use error::UsageError;
pub use ops::{Channel, Listen, ListenerRef, Operation, RunState};
pub use registry::{OpId, Registry};
pub use work::{FutureWork, StreamWork, Work, WorkFn};

// Optional: test harness types (RecordingListener, ManualWork).
// Enable with: `--features harness`
#[cfg(any(test, feature = "harness"))]
pub mod harness;

// Optional: a simple println-based forwarding listener (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
mod logging;
#[cfg(feature = "logging")]
pub use logging::LogListener;

/// Locks a mutex, recovering the guard if a listener panic poisoned it.
///
/// Callbacks never run under these locks, so the guarded state is always
/// internally consistent even after a panic elsewhere.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
