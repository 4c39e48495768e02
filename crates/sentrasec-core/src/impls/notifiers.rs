//! Notification sinks.

use std::sync::{Mutex, PoisonError};

use tracing::{error, info, warn};

use crate::domain::NotifyError;
use crate::ports::{NotificationSink, NotifyLevel};

/// Writes every notification to the `tracing` pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, message: &str, level: NotifyLevel) -> Result<(), NotifyError> {
        match level {
            NotifyLevel::Info | NotifyLevel::Success => info!(%level, "{message}"),
            NotifyLevel::Warning => warn!(%level, "{message}"),
            NotifyLevel::Error => error!(%level, "{message}"),
        }
        Ok(())
    }
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {
    fn notify(&self, _message: &str, _level: NotifyLevel) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Keeps every notification in memory, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<(NotifyLevel, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(NotifyLevel, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, message)| message).collect()
    }

    /// Drain the recorded entries.
    pub fn take(&self) -> Vec<(NotifyLevel, String)> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, message: &str, level: NotifyLevel) -> Result<(), NotifyError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_keeps_order() {
        let sink = RecordingNotifier::new();
        sink.notify("Exploit started: CVE-2024-1221", NotifyLevel::Info).unwrap();
        sink.notify("Exploit completed: CVE-2024-1221", NotifyLevel::Success).unwrap();

        assert_eq!(
            sink.take(),
            vec![
                (NotifyLevel::Info, "Exploit started: CVE-2024-1221".to_string()),
                (NotifyLevel::Success, "Exploit completed: CVE-2024-1221".to_string()),
            ]
        );
        assert!(sink.entries().is_empty());
    }
}
