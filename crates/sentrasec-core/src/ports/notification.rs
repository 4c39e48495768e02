//! NotificationSink port - toast-style status messages for the operator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::NotifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotifyLevel::Info => "info",
            NotifyLevel::Success => "success",
            NotifyLevel::Warning => "warning",
            NotifyLevel::Error => "error",
        })
    }
}

/// Delivers human-readable status text.
///
/// Delivery is best effort: callers log an `Err` and carry on, so a broken
/// sink can never change task state.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str, level: NotifyLevel) -> Result<(), NotifyError>;
}

impl<N: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<N> {
    fn notify(&self, message: &str, level: NotifyLevel) -> Result<(), NotifyError> {
        (**self).notify(message, level)
    }
}
