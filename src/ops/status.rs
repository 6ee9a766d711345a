//! Run states of an operation.

/// Mutually exclusive run state of an [`Operation`](crate::Operation).
///
/// Exactly one of these holds at any time. "Has a cached result" is orthogonal —
/// a `Running` operation may already have delivered an intermediate result — and
/// is exposed separately via [`Operation::has_result`](crate::Operation::has_result).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not started, or reset by `cancel()`.
    Idle,
    /// Started and not yet completed; more results may arrive.
    Running,
    /// Completed via `success()`; no further deliveries.
    Succeeded,
    /// Completed via `error()`; no further deliveries.
    Failed,
    /// Terminal. Every mutating call from here on is a usage error.
    Destroyed,
}

impl RunState {
    /// Returns true for the states `start()` treats as "already started".
    pub(crate) fn is_started(self) -> bool {
        matches!(
            self,
            RunState::Running | RunState::Succeeded | RunState::Failed
        )
    }
}
