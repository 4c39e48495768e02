//! Error types.
//!
//! Absence (unknown key, terminal task) is never an error: those calls are
//! no-ops or return `None`. What remains is a short list of recoverable
//! conditions.

use thiserror::Error;

use super::{TaskKey, TaskKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A single-flight start hit a key that already has a live task.
    #[error("{kind} already running for key {key}")]
    AlreadyRunning { key: TaskKey, kind: TaskKind },
}

/// Failure reported by a notification sink. The registry logs it and moves on.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel unavailable")]
    Unavailable,

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
