//! Terminal output and waiting.

use std::time::Duration;

use anyhow::Result;
use sentrasec_core::app::{Subscription, TaskHandle, TaskRegistry};
use sentrasec_core::domain::TaskEvent;
use tracing::warn;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Print progress of `handle` to stdout.
pub fn follow(registry: &TaskRegistry, handle: &TaskHandle) -> Option<Subscription> {
    registry.subscribe(handle.key.as_str(), |event| match event {
        TaskEvent::Progress(view) => {
            println!("[{}] {:>5.1}%", view.key, view.progress);
        }
        TaskEvent::StateChanged { from, view } => {
            println!("[{}] {from:?} -> {:?}", view.key, view.state);
        }
    })
}

/// Wait until `done` holds. Ctrl-C cancels every live operation.
///
/// Returns `false` when interrupted.
pub async fn wait_until(registry: &TaskRegistry, done: impl Fn() -> bool) -> Result<bool> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut poll = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res?;
                let cancelled = registry.cancel_all();
                warn!(cancelled, "interrupted");
                return Ok(false);
            }
            _ = poll.tick() => {
                if done() {
                    return Ok(true);
                }
            }
        }
    }
}

/// Wait for the single operation behind `handle`.
pub async fn wait_for(registry: &TaskRegistry, handle: &TaskHandle) -> Result<bool> {
    wait_until(registry, || registry.snapshot(handle.key.as_str()).is_none()).await
}
