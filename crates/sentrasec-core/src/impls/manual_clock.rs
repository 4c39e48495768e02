//! ManualClock - virtual time for deterministic tests and replays.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::ports::{CancelToken, Clock, MIN_INTERVAL, TickCallback};


struct Schedule {
    seq: u64,
    interval: Duration,
    next_due: Duration,
    callback: TickCallback,
    token: CancelToken,
}

#[derive(Default)]
struct ManualState {
    elapsed: Duration,
    next_seq: u64,
    schedules: Vec<Schedule>,
}

/// Clock whose time only moves when [`ManualClock::advance`] is called.
///
/// Due callbacks fire in due-time order, ties in scheduling order. Each
/// callback runs with the clock unlocked, so it may schedule or cancel.
#[derive(Default)]
pub struct ManualClock {
    base: DateTime<Utc>,
    state: Mutex<ManualState>,
}

impl ManualClock {
    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            state: Mutex::default(),
        }
    }

    /// Virtual time elapsed since construction.
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// Number of schedules that have not been cancelled.
    pub fn active_schedules(&self) -> usize {
        self.lock()
            .schedules
            .iter()
            .filter(|s| !s.token.is_cancelled())
            .count()
    }

    /// Move virtual time forward by `by`, firing every callback that falls due.
    /// Returns how many callbacks fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.lock().elapsed + by;
        let mut fired = 0;

        loop {
            let callback = {
                let mut state = self.lock();
                state.schedules.retain(|s| !s.token.is_cancelled());

                let due = state
                    .schedules
                    .iter_mut()
                    .filter(|s| s.next_due <= target)
                    .min_by_key(|s| (s.next_due, s.seq));

                match due {
                    Some(schedule) => {
                        let due_at = schedule.next_due;
                        schedule.next_due += schedule.interval;
                        let callback = schedule.callback.clone();
                        state.elapsed = due_at;
                        callback
                    }
                    None => {
                        state.elapsed = target;
                        break;
                    }
                }
            };

            callback();
            fired += 1;
        }

        fired
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.lock().elapsed;
        self.base
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }

    fn schedule(&self, interval: Duration, callback: TickCallback) -> CancelToken {
        let token = CancelToken::new();
        let interval = interval.max(MIN_INTERVAL);

        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let next_due = state.elapsed + interval;
        state.schedules.push(Schedule {
            seq,
            interval,
            next_due,
            callback,
            token: token.clone(),
        });

        token
    }
}
