//! Clock port - time and periodic scheduling.
//!
//! Every simulated operation advances on a periodic callback. The registry
//! never touches timers directly; it asks a `Clock` for a subscription and
//! keeps the returned [`CancelToken`].
//!
//! # Implementations
//! - `ManualClock`: virtual time for deterministic tests
//! - `TokioClock`: tokio interval tasks for the console

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Shortest period a schedule may have. Both clocks clamp to it: a zero
/// period never lets virtual time move and makes tokio's interval panic.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Callback fired on every period of a schedule.
pub type TickCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Clock provides the current time and periodic callbacks.
///
/// # Model
/// - Callbacks of one schedule never overlap each other.
/// - The first callback fires one full `interval` after `schedule`.
/// - No ordering is promised across different schedules.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn schedule(&self, interval: Duration, callback: TickCallback) -> CancelToken;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn schedule(&self, interval: Duration, callback: TickCallback) -> CancelToken {
        (**self).schedule(interval, callback)
    }
}

type CancelHook = Box<dyn FnOnce() + Send + 'static>;

struct TokenInner {
    cancelled: AtomicBool,
    on_cancel: Mutex<Option<CancelHook>>,
}

/// Handle to a schedule. Cancelling is idempotent; clones share the flag.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                on_cancel: Mutex::new(None),
            }),
        }
    }

    /// Token that runs `hook` the first time it is cancelled.
    pub fn with_hook<F>(hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let token = Self::new();
        token.on_cancel(hook);
        token
    }

    /// Attach `hook` to run on cancellation. If the token is already
    /// cancelled the hook runs immediately.
    pub fn on_cancel<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_cancelled() {
            hook();
            return;
        }
        *self
            .inner
            .on_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
        // cancel() may have raced us between the check and the store.
        if self.is_cancelled() {
            self.run_hook();
        }
    }

    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.run_hook();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    fn run_hook(&self) {
        let hook = self
            .inner
            .on_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
