//! TokioClock - real-time scheduling on a tokio runtime.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::ports::{CancelToken, Clock, MIN_INTERVAL, TickCallback};

/// One spawned interval task per schedule.
///
/// A slow callback delays the following ticks instead of bursting to catch
/// up, matching a browser timer loop.
#[derive(Clone)]
pub struct TokioClock {
    handle: Handle,
}

impl TokioClock {
    /// Clock bound to the runtime this is called from.
    ///
    /// # Panics
    /// Outside a tokio runtime (same contract as `Handle::current`).
    pub fn current() -> Self {
        Self::from_handle(Handle::current())
    }

    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn schedule(&self, interval: Duration, callback: TickCallback) -> CancelToken {
        let token = CancelToken::new();
        let guard = token.clone();
        let interval = interval.max(MIN_INTERVAL);

        let join = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if guard.is_cancelled() {
                    break;
                }
                callback();
            }
        });

        let abort = join.abort_handle();
        token.on_cancel(move || abort.abort());
        token
    }
}
