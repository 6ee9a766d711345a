//! Operation core: the state machine and its delivery surface.
//!
//! Internal modules:
//! - [`status`]: the mutually exclusive run states;
//! - [`listen`]: the listener contract with default no-op callbacks;
//! - [`channel`]: the handle work uses to push results back in;
//! - [`operation`]: the state machine tying the three together.

mod channel;
mod listen;
mod operation;
mod status;

pub use channel::Channel;
pub use listen::{Listen, ListenerRef};
pub use operation::Operation;
pub use status::RunState;
