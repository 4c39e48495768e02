//! The task state machine.
//!
//! `Task` owns progress and lifecycle state only. Scheduling, listeners and
//! notifications live in the registry; every method here is synchronous and
//! reports which transition (if any) it caused so the registry can fan the
//! change out.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{TaskEvent, TaskId, TaskKey, TaskKind, TaskState, TaskView};

pub const MAX_PROGRESS: f64 = 100.0;

/// Side effect run exactly once, on the Running -> Completed transition.
pub type CompletionHook = Box<dyn FnOnce(&TaskView) + Send + 'static>;

/// Parameters of a simulated operation.
pub struct TaskConfig {
    /// Period between progress updates.
    pub tick_interval: Duration,

    /// Upper bound of the per-tick increment; each tick adds `uniform(0, max_step)`.
    pub max_step: f64,

    /// Text used in notifications. Defaults to the task key.
    pub label: Option<String>,

    on_complete: Option<CompletionHook>,
}

impl TaskConfig {
    pub fn new(tick_interval: Duration, max_step: f64) -> Self {
        Self {
            tick_interval,
            max_step,
            label: None,
            on_complete: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&TaskView) + Send + 'static,
    {
        self.on_complete = Some(Box::new(hook));
        self
    }

    /// Run `hook` after whatever hook is already set.
    pub fn then_on_complete<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&TaskView) + Send + 'static,
    {
        let composed: CompletionHook = match self.on_complete.take() {
            Some(first) => Box::new(move |view: &TaskView| {
                first(view);
                hook(view);
            }),
            None => Box::new(hook),
        };
        self.on_complete = Some(composed);
        self
    }
}

impl fmt::Debug for TaskConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskConfig")
            .field("tick_interval", &self.tick_interval)
            .field("max_step", &self.max_step)
            .field("label", &self.label)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// A state change caused by one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: TaskState,
    pub to: TaskState,
}

/// Result of one applied tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub previous: f64,
    pub progress: f64,
    pub transition: Option<Transition>,
}

/// One simulated long-running operation.
pub struct Task {
    id: TaskId,
    key: TaskKey,
    kind: TaskKind,
    label: String,
    progress: f64,
    state: TaskState,
    tick_interval: Duration,
    max_step: f64,
    on_complete: Option<CompletionHook>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        id: TaskId,
        key: TaskKey,
        kind: TaskKind,
        config: TaskConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let label = config.label.unwrap_or_else(|| key.to_string());
        Self {
            id,
            key,
            kind,
            label,
            progress: 0.0,
            state: TaskState::Pending,
            tick_interval: config.tick_interval,
            max_step: sanitize_step(config.max_step),
            on_complete: config.on_complete,
            started_at: now,
            finished_at: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn max_step(&self) -> f64 {
        self.max_step
    }

    /// Pending -> Running.
    pub fn begin(&mut self) -> Option<Transition> {
        match self.state {
            TaskState::Pending => Some(self.transition_to(TaskState::Running)),
            _ => None,
        }
    }

    /// Apply one tick of `delta` percent.
    ///
    /// Returns `None` (and changes nothing) unless the task is `Running`.
    /// Progress is clamped to 100; the tick that reaches it completes the task.
    pub fn advance(&mut self, delta: f64, now: DateTime<Utc>) -> Option<Step> {
        if self.state != TaskState::Running {
            return None;
        }

        let previous = self.progress;
        self.progress = (previous + sanitize_step(delta)).min(MAX_PROGRESS);
        debug_assert!(self.progress >= previous, "progress went backwards");

        let transition = if self.progress >= MAX_PROGRESS {
            self.progress = MAX_PROGRESS;
            self.finished_at = Some(now);
            Some(self.transition_to(TaskState::Completed))
        } else {
            None
        };

        Some(Step {
            previous,
            progress: self.progress,
            transition,
        })
    }

    /// Running -> Paused.
    pub fn pause(&mut self) -> Option<Transition> {
        match self.state {
            TaskState::Running => Some(self.transition_to(TaskState::Paused)),
            _ => None,
        }
    }

    /// Paused -> Running. Progress continues from the frozen value.
    pub fn resume(&mut self) -> Option<Transition> {
        match self.state {
            TaskState::Paused => Some(self.transition_to(TaskState::Running)),
            _ => None,
        }
    }

    /// Pending | Running | Paused -> Cancelled. The completion hook will
    /// never run; see [`Task::take_abandoned_hook`].
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        if self.state.is_terminal() {
            return None;
        }
        self.finished_at = Some(now);
        Some(self.transition_to(TaskState::Cancelled))
    }

    /// Hand out the completion hook. Only a completed task yields it, and
    /// only once.
    pub fn take_completion_hook(&mut self) -> Option<CompletionHook> {
        if self.state != TaskState::Completed {
            return None;
        }
        self.on_complete.take()
    }

    /// Hand out the hook of a cancelled task so the caller decides where it
    /// gets dropped (hooks may own guards with side effects on drop).
    pub fn take_abandoned_hook(&mut self) -> Option<CompletionHook> {
        if self.state != TaskState::Cancelled {
            return None;
        }
        self.on_complete.take()
    }

    pub fn view(&self) -> TaskView {
        TaskView {
            id: self.id,
            key: self.key.clone(),
            kind: self.kind,
            label: self.label.clone(),
            progress: self.progress,
            state: self.state,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    /// Listener event for `transition`.
    pub fn transition_event(&self, transition: Transition) -> TaskEvent {
        TaskEvent::StateChanged {
            from: transition.from,
            view: self.view(),
        }
    }

    fn transition_to(&mut self, to: TaskState) -> Transition {
        let from = self.state;
        self.state = to;
        Transition { from, to }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("progress", &self.progress)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// A negative or non-finite step is a defect in the step source.
/// Debug builds stop on it; release builds treat it as no progress.
fn sanitize_step(delta: f64) -> f64 {
    debug_assert!(
        delta.is_finite() && delta >= 0.0,
        "progress step must be finite and non-negative, got {delta}"
    );
    if delta.is_finite() { delta.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use ulid::Ulid;

    fn running_task(max_step: f64) -> Task {
        let mut task = Task::new(
            TaskId::from_ulid(Ulid::new()),
            TaskKey::from("host-1"),
            TaskKind::Scan,
            TaskConfig::new(Duration::from_millis(100), max_step),
            Utc::now(),
        );
        task.begin();
        task
    }

    #[test]
    fn new_task_is_pending_at_zero() {
        let task = Task::new(
            TaskId::from_ulid(Ulid::new()),
            TaskKey::from("host-1"),
            TaskKind::Scan,
            TaskConfig::new(Duration::from_millis(100), 15.0),
            Utc::now(),
        );
        assert_eq!(task.state(), TaskState::Pending);
        assert_eq!(task.progress(), 0.0);
        assert_eq!(task.label(), "host-1");
    }

    #[test]
    fn begin_only_from_pending() {
        let mut task = running_task(10.0);
        assert_eq!(task.state(), TaskState::Running);
        assert_eq!(task.begin(), None);
    }

    #[test]
    fn crossing_threshold_completes_in_same_tick() {
        let mut task = running_task(30.0);
        task.advance(85.0, Utc::now());

        let step = task.advance(30.0, Utc::now()).unwrap();
        assert_eq!(step.previous, 85.0);
        assert_eq!(step.progress, 100.0);
        assert_eq!(
            step.transition,
            Some(Transition {
                from: TaskState::Running,
                to: TaskState::Completed
            })
        );
        assert_eq!(task.progress(), 100.0);
        assert!(task.view().finished_at.is_some());
    }

    #[test]
    fn paused_task_ignores_ticks() {
        let mut task = running_task(10.0);
        task.advance(10.0, Utc::now());
        task.pause();

        assert_eq!(task.advance(10.0, Utc::now()), None);
        assert_eq!(task.progress(), 10.0);

        task.resume();
        task.advance(5.0, Utc::now());
        assert_eq!(task.progress(), 15.0);
    }

    #[test]
    fn pause_resume_cancel_are_idempotent() {
        let mut task = running_task(10.0);
        assert!(task.pause().is_some());
        assert!(task.pause().is_none());
        assert_eq!(task.state(), TaskState::Paused);

        assert!(task.resume().is_some());
        assert!(task.resume().is_none());
        assert_eq!(task.state(), TaskState::Running);

        assert!(task.cancel(Utc::now()).is_some());
        assert!(task.cancel(Utc::now()).is_none());
        assert_eq!(task.state(), TaskState::Cancelled);
    }

    #[test]
    fn terminal_task_is_immutable() {
        let mut task = running_task(100.0);
        task.advance(100.0, Utc::now());
        let before = task.view();

        assert!(task.advance(50.0, Utc::now()).is_none());
        assert!(task.pause().is_none());
        assert!(task.resume().is_none());
        assert!(task.cancel(Utc::now()).is_none());
        assert_eq!(task.view(), before);
    }

    #[test]
    fn completion_hook_is_handed_out_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut task = Task::new(
            TaskId::from_ulid(Ulid::new()),
            TaskKey::from("cred-3"),
            TaskKind::Crack,
            TaskConfig::new(Duration::from_millis(100), 100.0).on_complete(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            Utc::now(),
        );
        task.begin();
        assert!(task.take_completion_hook().is_none());

        task.advance(100.0, Utc::now());
        let hook = task.take_completion_hook().unwrap();
        hook(&task.view());
        assert!(task.take_completion_hook().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn composed_hooks_run_in_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (first, second) = (Arc::clone(&log), Arc::clone(&log));
        let config = TaskConfig::new(Duration::from_millis(100), 100.0)
            .on_complete(move |_| first.lock().unwrap().push("domain"))
            .then_on_complete(move |_| second.lock().unwrap().push("chain"));
        let mut task = Task::new(
            TaskId::from_ulid(Ulid::new()),
            TaskKey::from("exp"),
            TaskKind::Exploit,
            config,
            Utc::now(),
        );
        task.begin();
        task.advance(100.0, Utc::now());
        task.take_completion_hook().unwrap()(&task.view());

        assert_eq!(*log.lock().unwrap(), vec!["domain", "chain"]);
    }

    #[test]
    fn cancelled_task_never_yields_hook() {
        let mut task = Task::new(
            TaskId::from_ulid(Ulid::new()),
            TaskKey::from("sess-9"),
            TaskKind::Session,
            TaskConfig::new(Duration::from_millis(100), 10.0).on_complete(|_| {}),
            Utc::now(),
        );
        task.begin();
        task.cancel(Utc::now());
        assert!(task.take_completion_hook().is_none());
        assert!(task.take_abandoned_hook().is_some());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "progress step must be finite and non-negative")]
    fn negative_step_is_a_defect_in_debug() {
        let mut task = running_task(10.0);
        task.advance(-5.0, Utc::now());
    }
}
