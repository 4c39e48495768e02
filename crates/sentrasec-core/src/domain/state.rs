//! Task lifecycle state.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a simulated task.
///
/// State transitions:
/// - Pending -> Running
/// - Running -> Paused -> Running
/// - Running -> Completed
/// - Running | Paused -> Cancelled
///
/// `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Created, clock subscription not yet attached.
    Pending,

    /// Advancing on every clock tick.
    Running,

    /// Frozen by the operator; no ticks are applied.
    Paused,

    /// Reached 100%.
    Completed,

    /// Stopped by the operator (or superseded) before completion.
    Cancelled,
}

impl TaskState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled)
    }

    /// May a task in this state stay in the registry's live map?
    pub fn is_live(self) -> bool {
        !self.is_terminal()
    }
}
