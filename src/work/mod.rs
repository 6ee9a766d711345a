//! Work-execution contract and stock implementations.
//!
//! An [`Operation`](crate::Operation) knows nothing about *how* its work runs;
//! it only invokes the [`Work`] hooks and consumes whatever comes back through
//! the [`Channel`](crate::Channel). This module provides the contract and three
//! ready-made shapes:
//! - [`WorkFn`]: closure-backed, for inline or hand-rolled execution;
//! - [`FutureWork`]: runs a future on the tokio runtime, one result per run;
//! - [`StreamWork`]: drains a cold stream, many results per run.

mod future;
mod stream;
mod work;
mod work_fn;

pub use future::FutureWork;
pub use stream::StreamWork;
pub use work::Work;
pub use work_fn::WorkFn;
