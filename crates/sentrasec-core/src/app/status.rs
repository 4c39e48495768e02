use serde::Serialize;

/// Per-state task counts.
///
/// `pending`, `running` and `paused` count live tasks; `completed` and
/// `cancelled` are totals since the registry was built, not bounded by the
/// history limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryCounts {
    pub pending: u64,
    pub running: u64,
    pub paused: u64,
    pub completed: u64,
    pub cancelled: u64,
}

impl RegistryCounts {
    pub fn live(&self) -> u64 {
        self.pending + self.running + self.paused
    }

    pub fn finished(&self) -> u64 {
        self.completed + self.cancelled
    }
}
