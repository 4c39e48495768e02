//! Read-side types delivered to subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{TaskId, TaskKey, TaskKind, TaskState};

/// Read-only snapshot of a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    pub id: TaskId,
    pub key: TaskKey,
    pub kind: TaskKind,
    pub label: String,
    /// Always within `[0, 100]`.
    pub progress: f64,
    pub state: TaskState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Event delivered to listeners after each mutation.
///
/// For one tick the order is `Progress`, then `StateChanged` if the tick
/// crossed a state boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    Progress(TaskView),
    StateChanged { from: TaskState, view: TaskView },
}

impl TaskEvent {
    pub fn view(&self) -> &TaskView {
        match self {
            TaskEvent::Progress(view) => view,
            TaskEvent::StateChanged { view, .. } => view,
        }
    }
}
