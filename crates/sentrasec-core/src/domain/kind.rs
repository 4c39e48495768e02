//! Operation kinds and their collision policies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of simulated operation.
///
/// Only display text, default presets and the default [`CollisionPolicy`]
/// depend on the kind; the task state machine never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// Network reconnaissance sweep.
    Scan,
    /// Single-host scan launched from the emergency scan dialog.
    FocusedScan,
    /// Exploit run against one vulnerability.
    Exploit,
    /// GPU password cracking run.
    Crack,
    /// Hijacked interactive session.
    Session,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::Scan,
        TaskKind::FocusedScan,
        TaskKind::Exploit,
        TaskKind::Crack,
        TaskKind::Session,
    ];

    /// Stable machine name (config keys, serialized form).
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Scan => "scan",
            TaskKind::FocusedScan => "focused-scan",
            TaskKind::Exploit => "exploit",
            TaskKind::Crack => "crack",
            TaskKind::Session => "session",
        }
    }

    /// Human-readable name used in notification text.
    pub fn display_name(self) -> &'static str {
        match self {
            TaskKind::Scan => "Scan",
            TaskKind::FocusedScan => "Focused scan",
            TaskKind::Exploit => "Exploit",
            TaskKind::Crack => "Password cracking",
            TaskKind::Session => "Session",
        }
    }

    /// Default collision policy.
    ///
    /// Scans, exploits and cracking runs are single-flight per key; sessions
    /// never collide because every hijack is a fresh session.
    pub fn default_policy(self) -> CollisionPolicy {
        match self {
            TaskKind::Session => CollisionPolicy::Unrestricted,
            TaskKind::Scan | TaskKind::FocusedScan | TaskKind::Exploit | TaskKind::Crack => {
                CollisionPolicy::Reject
            }
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `start` does when the key already maps to a live task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Single-flight: refuse the new start with `AlreadyRunning`.
    Reject,
    /// Cancel the live task, then start the new one under the same key.
    Supersede,
    /// Never refuse: an occupied key is replaced by a freshly minted one.
    Unrestricted,
}
