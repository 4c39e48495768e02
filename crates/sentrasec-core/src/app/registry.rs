//! TaskRegistry - owner of every live simulated operation.
//!
//! # Flow
//! 1. `start` creates a `Task`, moves it to Running and asks the `Clock` for
//!    a tick subscription.
//! 2. Each tick draws a step from the `StepSource` and advances the task.
//! 3. Terminal tasks leave the live map at once and go to the bounded history.
//!
//! # Locking
//! All mutation happens under one mutex. Listener calls, notifications and
//! completion hooks are collected in an [`Outbox`] and delivered after the
//! lock is released, so any of them may call back into the registry.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info, warn};

use super::config::SimulatorConfig;
use super::status::RegistryCounts;
use crate::domain::{
    CollisionPolicy, CompletionHook, RegistryError, Task, TaskConfig, TaskEvent, TaskId, TaskKey,
    TaskKind, TaskState, TaskView, Transition,
};
use crate::impls::{NoopNotifier, RandomSteps};
use crate::ports::{
    CancelToken, Clock, IdGenerator, NotificationSink, NotifyLevel, StepSource, UlidGenerator,
};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Listener for progress and state changes of one task.
pub type Listener = Arc<dyn Fn(&TaskEvent) + Send + Sync + 'static>;

/// What `start` hands back. `key` may differ from the requested key when an
/// unrestricted start had to mint a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub id: TaskId,
    pub key: TaskKey,
    pub kind: TaskKind,
}

/// Identifies one clock subscription: the task it drives and which of that
/// task's schedules it belongs to. Every resume bumps the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TickStamp {
    id: TaskId,
    generation: u64,
}

struct LiveTask {
    task: Task,
    schedule: Option<CancelToken>,
    generation: u64,
    listeners: Vec<(u64, Listener)>,
}

impl LiveTask {
    fn detach_clock(&mut self) {
        if let Some(token) = self.schedule.take() {
            token.cancel();
        }
    }

    fn stamp(&self) -> TickStamp {
        TickStamp {
            id: self.task.id(),
            generation: self.generation,
        }
    }

    fn listeners(&self) -> Vec<Listener> {
        self.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
    }
}

#[derive(Default)]
struct Totals {
    completed: u64,
    cancelled: u64,
}

struct RegistryState {
    tasks: HashMap<TaskKey, LiveTask>,
    history: VecDeque<TaskView>,
    totals: Totals,
    next_listener_id: u64,
    steps: Box<dyn StepSource>,
}

struct Inner {
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSink>,
    ids: Box<dyn IdGenerator>,
    policies: HashMap<TaskKind, CollisionPolicy>,
    history_limit: usize,
    state: Mutex<RegistryState>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for live in state.tasks.values_mut() {
            live.detach_clock();
        }
    }
}

/// Side effects collected under the lock, delivered after it is released.
#[derive(Default)]
struct Outbox {
    events: Vec<(Vec<Listener>, TaskEvent)>,
    notices: Vec<(String, NotifyLevel)>,
    hook: Option<(CompletionHook, TaskView)>,
    abandoned: Vec<CompletionHook>,
}

impl Outbox {
    fn emit(&mut self, live: &LiveTask, event: TaskEvent) {
        if !live.listeners.is_empty() {
            self.events.push((live.listeners(), event));
        }
    }

    fn notice(&mut self, message: String, level: NotifyLevel) {
        self.notices.push((message, level));
    }
}

/// Registry of simulated operations, keyed by target.
///
/// Cheap to clone; clones share the same tasks.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<Inner>,
}

/// Non-owning registry reference, for callbacks that must not keep the
/// registry alive.
#[derive(Clone)]
pub struct WeakRegistry {
    inner: Weak<Inner>,
}

impl WeakRegistry {
    pub fn upgrade(&self) -> Option<TaskRegistry> {
        self.inner.upgrade().map(|inner| TaskRegistry { inner })
    }
}

impl TaskRegistry {
    pub fn builder(clock: impl Clock + 'static) -> RegistryBuilder {
        RegistryBuilder::new(clock)
    }

    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Collision policy in effect for `kind`.
    pub fn policy_for(&self, kind: TaskKind) -> CollisionPolicy {
        self.inner
            .policies
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_policy())
    }

    /// Start a simulated operation under `key` using the kind's policy.
    pub fn start(
        &self,
        key: impl Into<TaskKey>,
        kind: TaskKind,
        config: TaskConfig,
    ) -> Result<TaskHandle, RegistryError> {
        self.start_with_policy(key, kind, config, self.policy_for(kind))
    }

    pub fn start_with_policy(
        &self,
        key: impl Into<TaskKey>,
        kind: TaskKind,
        config: TaskConfig,
        policy: CollisionPolicy,
    ) -> Result<TaskHandle, RegistryError> {
        let mut key = key.into();
        let mut outbox = Outbox::default();

        let handle = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let id = self.inner.ids.generate_task_id();

            if state.tasks.contains_key(key.as_str()) {
                match policy {
                    CollisionPolicy::Reject => {
                        drop(guard);
                        warn!(%key, %kind, "start rejected, operation already running");
                        self.notify(
                            &format!("{} already running: {key}", kind.display_name()),
                            NotifyLevel::Warning,
                        );
                        return Err(RegistryError::AlreadyRunning { key, kind });
                    }
                    CollisionPolicy::Supersede => {
                        info!(%key, %kind, "superseding live operation");
                        self.cancel_locked(state, key.as_str(), &mut outbox);
                    }
                    CollisionPolicy::Unrestricted => {
                        key = TaskKey::new(format!("{key}-{id}"));
                    }
                }
            }

            let mut task = Task::new(id, key.clone(), kind, config, self.inner.clock.now());
            task.begin();
            let schedule =
                self.schedule_ticks(key.clone(), TickStamp { id, generation: 0 }, &task);
            outbox.notice(
                format!("{} started: {}", kind.display_name(), task.label()),
                NotifyLevel::Info,
            );
            info!(%key, %id, %kind, interval_ms = task.tick_interval().as_millis() as u64, "operation started");

            state.tasks.insert(
                key.clone(),
                LiveTask {
                    task,
                    schedule: Some(schedule),
                    generation: 0,
                    listeners: Vec::new(),
                },
            );
            TaskHandle { id, key, kind }
        };

        self.flush(outbox);
        Ok(handle)
    }

    /// Running -> Paused. Returns whether anything changed.
    pub fn pause(&self, key: &str) -> bool {
        let mut outbox = Outbox::default();
        let changed = {
            let mut state = self.lock();
            match state.tasks.get_mut(key) {
                Some(live) => match live.task.pause() {
                    Some(transition) => {
                        live.detach_clock();
                        outbox.emit(live, live.task.transition_event(transition));
                        info!(%key, progress = live.task.progress(), "operation paused");
                        true
                    }
                    None => false,
                },
                None => false,
            }
        };
        self.flush(outbox);
        changed
    }

    /// Paused -> Running. The next tick comes one full interval from now.
    pub fn resume(&self, key: &str) -> bool {
        let mut outbox = Outbox::default();
        let changed = {
            let mut state = self.lock();
            match state.tasks.get_mut(key) {
                Some(live) => match live.task.resume() {
                    Some(transition) => {
                        live.generation += 1;
                        let schedule =
                            self.schedule_ticks(live.task.key().clone(), live.stamp(), &live.task);
                        live.schedule = Some(schedule);
                        outbox.emit(live, live.task.transition_event(transition));
                        info!(%key, progress = live.task.progress(), "operation resumed");
                        true
                    }
                    None => false,
                },
                None => false,
            }
        };
        self.flush(outbox);
        changed
    }

    /// Cancel the live task under `key`. Its completion hook never runs.
    pub fn cancel(&self, key: &str) -> bool {
        let mut outbox = Outbox::default();
        let changed = {
            let mut state = self.lock();
            self.cancel_locked(&mut state, key, &mut outbox)
        };
        self.flush(outbox);
        changed
    }

    /// Cancel every live task; returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut outbox = Outbox::default();
        let cancelled = {
            let mut state = self.lock();
            let mut keys: Vec<TaskKey> = state.tasks.keys().cloned().collect();
            keys.sort();
            keys.iter()
                .filter(|key| self.cancel_locked(&mut state, key.as_str(), &mut outbox))
                .count()
        };
        self.flush(outbox);
        cancelled
    }

    /// Advance the task under `key` by one random step.
    ///
    /// Normally driven by the clock; exposed for deterministic tests. Returns
    /// the snapshot after the tick, or `None` if no running task was advanced.
    pub fn tick(&self, key: &str) -> Option<TaskView> {
        self.advance(key, None, None)
    }

    /// Like [`TaskRegistry::tick`] with a forced increment.
    pub fn tick_by(&self, key: &str, delta: f64) -> Option<TaskView> {
        self.advance(key, None, Some(delta))
    }

    /// Register `listener` for the live task under `key`.
    ///
    /// `None` when no live task exists under `key`. Listeners go away with
    /// the task, after receiving its final state change.
    pub fn subscribe<F>(&self, key: &str, listener: F) -> Option<Subscription>
    where
        F: Fn(&TaskEvent) + Send + Sync + 'static,
    {
        let mut guard = self.lock();
        let state = &mut *guard;
        let live = state.tasks.get_mut(key)?;
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        let listener: Listener = Arc::new(listener);
        live.listeners.push((id, listener));
        Some(Subscription {
            registry: self.downgrade(),
            key: live.task.key().clone(),
            id,
        })
    }

    pub fn snapshot(&self, key: &str) -> Option<TaskView> {
        self.lock().tasks.get(key).map(|live| live.task.view())
    }

    /// Snapshots of every live task, sorted by key.
    pub fn live_tasks(&self) -> Vec<TaskView> {
        let mut views: Vec<TaskView> = self
            .lock()
            .tasks
            .values()
            .map(|live| live.task.view())
            .collect();
        views.sort_by(|a, b| a.key.cmp(&b.key));
        views
    }

    /// Recently finished tasks, oldest first.
    pub fn history(&self) -> Vec<TaskView> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn counts(&self) -> RegistryCounts {
        let state = self.lock();
        let mut counts = RegistryCounts {
            completed: state.totals.completed,
            cancelled: state.totals.cancelled,
            ..RegistryCounts::default()
        };
        for live in state.tasks.values() {
            match live.task.state() {
                TaskState::Pending => counts.pending += 1,
                TaskState::Running => counts.running += 1,
                TaskState::Paused => counts.paused += 1,
                TaskState::Completed | TaskState::Cancelled => {
                    debug_assert!(false, "terminal task left in the live map");
                }
            }
        }
        counts
    }

    pub fn is_idle(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    /// Deliver a message through the registry's sink. Failures are logged
    /// and dropped.
    pub fn notify(&self, message: &str, level: NotifyLevel) {
        if let Err(err) = self.inner.notifier.notify(message, level) {
            warn!(error = %err, %level, "notification dropped");
        }
    }

    fn advance(
        &self,
        key: &str,
        expected: Option<TickStamp>,
        forced: Option<f64>,
    ) -> Option<TaskView> {
        let mut outbox = Outbox::default();

        let view = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let live = state.tasks.get_mut(key)?;

            // A tick from an earlier task under the same key, or from a
            // schedule that a pause already replaced.
            if expected.is_some_and(|stamp| stamp != live.stamp()) {
                debug!(%key, "ignoring stale tick");
                return None;
            }
            if live.task.state() != TaskState::Running {
                return None;
            }

            let delta = match forced {
                Some(delta) => delta,
                None => state.steps.next_step(live.task.max_step()),
            };
            let step = live.task.advance(delta, self.inner.clock.now())?;
            let view = live.task.view();
            debug!(%key, previous = step.previous, progress = step.progress, "tick");
            outbox.emit(live, TaskEvent::Progress(view.clone()));

            let finished = match step.transition {
                Some(transition) => {
                    self.complete_locked(live, transition, &view, &mut outbox);
                    true
                }
                None => false,
            };
            if finished {
                self.retire(state, key);
            }
            view
        };

        self.flush(outbox);
        Some(view)
    }

    fn complete_locked(
        &self,
        live: &mut LiveTask,
        transition: Transition,
        view: &TaskView,
        outbox: &mut Outbox,
    ) {
        live.detach_clock();
        outbox.emit(live, live.task.transition_event(transition));
        outbox.notice(
            format!("{} completed: {}", live.task.kind().display_name(), live.task.label()),
            NotifyLevel::Success,
        );
        if let Some(hook) = live.task.take_completion_hook() {
            outbox.hook = Some((hook, view.clone()));
        }
        info!(key = %view.key, id = %view.id, "operation completed");
    }

    fn cancel_locked(&self, state: &mut RegistryState, key: &str, outbox: &mut Outbox) -> bool {
        let Some(live) = state.tasks.get_mut(key) else {
            return false;
        };
        let Some(transition) = live.task.cancel(self.inner.clock.now()) else {
            return false;
        };

        live.detach_clock();
        outbox.emit(live, live.task.transition_event(transition));
        outbox.notice(
            format!("{} cancelled: {}", live.task.kind().display_name(), live.task.label()),
            NotifyLevel::Warning,
        );
        if let Some(hook) = live.task.take_abandoned_hook() {
            outbox.abandoned.push(hook);
        }
        info!(%key, progress = live.task.progress(), "operation cancelled");

        self.retire(state, key);
        true
    }

    /// Move a terminal task from the live map to the history.
    fn retire(&self, state: &mut RegistryState, key: &str) {
        let Some(live) = state.tasks.remove(key) else {
            return;
        };
        let view = live.task.view();
        match view.state {
            TaskState::Completed => state.totals.completed += 1,
            TaskState::Cancelled => state.totals.cancelled += 1,
            other => debug_assert!(false, "retiring a live task in state {other:?}"),
        }
        state.history.push_back(view);
        while state.history.len() > self.inner.history_limit {
            state.history.pop_front();
        }
    }

    fn schedule_ticks(&self, key: TaskKey, stamp: TickStamp, task: &Task) -> CancelToken {
        let registry = self.downgrade();
        self.inner.clock.schedule(
            task.tick_interval(),
            Arc::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.advance(key.as_str(), Some(stamp), None);
                }
            }),
        )
    }

    fn flush(&self, outbox: Outbox) {
        let Outbox {
            events,
            notices,
            hook,
            abandoned,
        } = outbox;

        for (listeners, event) in events {
            for listener in &listeners {
                listener(&event);
            }
        }
        for (message, level) in notices {
            self.notify(&message, level);
        }
        if let Some((hook, view)) = hook {
            hook(&view);
        }
        drop(abandoned);
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("TaskRegistry")
            .field("live", &state.tasks.len())
            .field("history", &state.history.len())
            .finish_non_exhaustive()
    }
}

/// Handle returned by [`TaskRegistry::subscribe`].
#[derive(Clone)]
pub struct Subscription {
    registry: WeakRegistry,
    key: TaskKey,
    id: u64,
}

impl Subscription {
    /// Stop receiving events. Idempotent, and harmless once the task is gone.
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut state = registry.lock();
        if let Some(live) = state.tasks.get_mut(self.key.as_str()) {
            live.listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Wiring for a [`TaskRegistry`].
///
/// ```ignore
/// let registry = TaskRegistry::builder(TokioClock::current())
///     .notifier(TracingNotifier)
///     .with_config(&config)
///     .build();
/// ```
pub struct RegistryBuilder {
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSink>,
    steps: Box<dyn StepSource>,
    ids: Option<Box<dyn IdGenerator>>,
    policies: HashMap<TaskKind, CollisionPolicy>,
    history_limit: usize,
}

impl RegistryBuilder {
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
            notifier: Arc::new(NoopNotifier),
            steps: Box::new(RandomSteps::new()),
            ids: None,
            policies: HashMap::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn notifier(mut self, notifier: impl NotificationSink + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn steps(mut self, steps: impl StepSource + 'static) -> Self {
        self.steps = Box::new(steps);
        self
    }

    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Box::new(ids));
        self
    }

    pub fn policy(mut self, kind: TaskKind, policy: CollisionPolicy) -> Self {
        self.policies.insert(kind, policy);
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// Apply `history_limit` and the per-kind policy overrides.
    pub fn with_config(mut self, config: &SimulatorConfig) -> Self {
        self = self.history_limit(config.history_limit);
        for kind in TaskKind::ALL {
            if let Some(policy) = config.preset(kind).policy {
                self = self.policy(kind, policy);
            }
        }
        self
    }

    pub fn build(self) -> TaskRegistry {
        let ids = self
            .ids
            .unwrap_or_else(|| Box::new(UlidGenerator::new(Arc::clone(&self.clock))));
        TaskRegistry {
            inner: Arc::new(Inner {
                clock: self.clock,
                notifier: self.notifier,
                ids,
                policies: self.policies,
                history_limit: self.history_limit,
                state: Mutex::new(RegistryState {
                    tasks: HashMap::new(),
                    history: VecDeque::new(),
                    totals: Totals::default(),
                    next_listener_id: 0,
                    steps: self.steps,
                }),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{FixedSteps, ManualClock, RecordingNotifier};
    use crate::domain::NotifyError;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Fixture {
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
        registry: TaskRegistry,
    }

    fn fixture(steps: FixedSteps) -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let registry = TaskRegistry::builder(Arc::clone(&clock))
            .notifier(Arc::clone(&notifier))
            .steps(steps)
            .build();
        Fixture {
            clock,
            notifier,
            registry,
        }
    }

    fn config(max_step: f64) -> TaskConfig {
        TaskConfig::new(Duration::from_millis(100), max_step)
    }

    #[test]
    fn start_runs_and_schedules() {
        let f = fixture(FixedSteps::constant(10.0));
        let handle = f.registry.start("host-1", TaskKind::Scan, config(15.0)).unwrap();

        assert_eq!(handle.key.as_str(), "host-1");
        let view = f.registry.snapshot("host-1").unwrap();
        assert_eq!(view.state, TaskState::Running);
        assert_eq!(view.progress, 0.0);
        assert_eq!(f.clock.active_schedules(), 1);
        assert_eq!(f.notifier.messages(), vec!["Scan started: host-1"]);
    }

    #[test]
    fn clock_drives_progress_to_completion() {
        let f = fixture(FixedSteps::constant(30.0));
        let completions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completions);
        f.registry
            .start(
                "10.0.0.5",
                TaskKind::FocusedScan,
                config(30.0).on_complete(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        f.clock.advance(Duration::from_millis(300));
        assert_eq!(f.registry.snapshot("10.0.0.5").unwrap().progress, 90.0);

        f.clock.advance(Duration::from_millis(100));
        assert!(f.registry.snapshot("10.0.0.5").is_none());
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(f.clock.active_schedules(), 0);

        // No more ticks arrive once completed.
        f.clock.advance(Duration::from_secs(5));
        assert_eq!(completions.load(Ordering::SeqCst), 1);

        let history = f.registry.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].state, TaskState::Completed);
        assert_eq!(history[0].progress, 100.0);
        assert_eq!(
            f.notifier.messages().last().map(String::as_str),
            Some("Focused scan completed: 10.0.0.5")
        );
    }

    #[test]
    fn listener_order_is_progress_then_state_then_hook() {
        let f = fixture(FixedSteps::constant(0.0));
        let log = Arc::new(Mutex::new(Vec::<String>::new()));

        let hook_log = Arc::clone(&log);
        f.registry
            .start(
                "exp-1",
                TaskKind::Exploit,
                config(100.0).on_complete(move |_| hook_log.lock().unwrap().push("hook".into())),
            )
            .unwrap();

        let listener_log = Arc::clone(&log);
        f.registry
            .subscribe("exp-1", move |event| {
                let entry = match event {
                    TaskEvent::Progress(view) => format!("progress {}", view.progress),
                    TaskEvent::StateChanged { from, view } => {
                        format!("{from:?} -> {:?}", view.state)
                    }
                };
                listener_log.lock().unwrap().push(entry);
            })
            .unwrap();

        f.registry.tick_by("exp-1", 40.0);
        f.registry.tick_by("exp-1", 100.0);

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "progress 40",
                "progress 100",
                "Running -> Completed",
                "hook",
            ]
        );
    }

    #[test]
    fn pause_detaches_clock_and_resume_continues() {
        let f = fixture(FixedSteps::constant(10.0));
        f.registry.start("cred-3", TaskKind::Crack, config(10.0)).unwrap();
        f.clock.advance(Duration::from_millis(100));

        assert!(f.registry.pause("cred-3"));
        assert!(!f.registry.pause("cred-3"));
        assert_eq!(f.clock.active_schedules(), 0);

        f.clock.advance(Duration::from_secs(2));
        assert_eq!(f.registry.tick("cred-3"), None);
        let paused = f.registry.snapshot("cred-3").unwrap();
        assert_eq!(paused.state, TaskState::Paused);
        assert_eq!(paused.progress, 10.0);

        assert!(f.registry.resume("cred-3"));
        assert!(!f.registry.resume("cred-3"));
        // No catch-up burst: one interval, one tick.
        f.clock.advance(Duration::from_millis(100));
        assert_eq!(f.registry.snapshot("cred-3").unwrap().progress, 20.0);
    }

    #[test]
    fn missing_keys_are_no_ops() {
        let f = fixture(FixedSteps::constant(10.0));
        assert!(!f.registry.pause("nope"));
        assert!(!f.registry.resume("nope"));
        assert!(!f.registry.cancel("nope"));
        assert_eq!(f.registry.tick("nope"), None);
        assert!(f.registry.snapshot("nope").is_none());
        assert!(f.registry.subscribe("nope", |_| {}).is_none());
    }

    #[rstest]
    #[case(TaskKind::Scan)]
    #[case(TaskKind::FocusedScan)]
    #[case(TaskKind::Exploit)]
    #[case(TaskKind::Crack)]
    fn single_flight_kinds_reject_duplicates(#[case] kind: TaskKind) {
        let f = fixture(FixedSteps::constant(10.0));
        let first = f.registry.start("target", kind, config(10.0)).unwrap();

        let err = f.registry.start("target", kind, config(10.0)).unwrap_err();
        assert_eq!(
            err,
            RegistryError::AlreadyRunning {
                key: TaskKey::from("target"),
                kind
            }
        );
        assert_eq!(f.registry.live_tasks().len(), 1);
        assert_eq!(f.registry.snapshot("target").unwrap().id, first.id);
        assert_eq!(
            f.notifier.entries().last().unwrap().0,
            NotifyLevel::Warning
        );
    }

    #[test]
    fn sessions_never_collide() {
        let f = fixture(FixedSteps::constant(10.0));
        let first = f.registry.start("sess", TaskKind::Session, config(5.0)).unwrap();
        let second = f.registry.start("sess", TaskKind::Session, config(5.0)).unwrap();

        assert_eq!(first.key.as_str(), "sess");
        assert_ne!(second.key, first.key);
        assert!(second.key.as_str().starts_with("sess-task-"));
        assert_eq!(f.registry.live_tasks().len(), 2);
    }

    #[test]
    fn supersede_cancels_the_old_task() {
        let clock = Arc::new(ManualClock::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let registry = TaskRegistry::builder(Arc::clone(&clock))
            .notifier(Arc::clone(&notifier))
            .steps(FixedSteps::constant(10.0))
            .policy(TaskKind::Scan, CollisionPolicy::Supersede)
            .build();

        let old_hook = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&old_hook);
        let old = registry
            .start(
                "10.0.0.0/24",
                TaskKind::Scan,
                config(10.0).on_complete(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        registry.tick_by("10.0.0.0/24", 50.0);

        let new = registry.start("10.0.0.0/24", TaskKind::Scan, config(10.0)).unwrap();
        assert_ne!(old.id, new.id);
        let view = registry.snapshot("10.0.0.0/24").unwrap();
        assert_eq!(view.id, new.id);
        assert_eq!(view.progress, 0.0);
        assert_eq!(registry.history()[0].state, TaskState::Cancelled);
        assert_eq!(clock.active_schedules(), 1);

        // The old task's stale schedule is gone; only the new one ticks.
        clock.advance(Duration::from_millis(100));
        assert_eq!(registry.snapshot("10.0.0.0/24").unwrap().progress, 10.0);
        assert_eq!(old_hook.load(Ordering::SeqCst), 0);

        assert_eq!(
            notifier.entries(),
            vec![
                (NotifyLevel::Info, "Scan started: 10.0.0.0/24".to_string()),
                (NotifyLevel::Warning, "Scan cancelled: 10.0.0.0/24".to_string()),
                (NotifyLevel::Info, "Scan started: 10.0.0.0/24".to_string()),
            ]
        );
    }

    #[test]
    fn stale_tick_for_previous_task_is_ignored() {
        let f = fixture(FixedSteps::constant(10.0));
        let old = f.registry.start("exp-1", TaskKind::Exploit, config(10.0)).unwrap();
        f.registry.cancel("exp-1");
        f.registry.start("exp-1", TaskKind::Exploit, config(10.0)).unwrap();

        let stale = TickStamp {
            id: old.id,
            generation: 0,
        };
        assert_eq!(f.registry.advance("exp-1", Some(stale), Some(50.0)), None);
        assert_eq!(f.registry.snapshot("exp-1").unwrap().progress, 0.0);
    }

    #[test]
    fn tick_from_schedule_replaced_by_resume_is_ignored() {
        let f = fixture(FixedSteps::constant(10.0));
        let handle = f.registry.start("cred-2", TaskKind::Crack, config(10.0)).unwrap();
        let first = TickStamp {
            id: handle.id,
            generation: 0,
        };
        assert!(f.registry.advance("cred-2", Some(first), None).is_some());

        assert!(f.registry.pause("cred-2"));
        assert!(f.registry.resume("cred-2"));

        // Same task, but the pre-pause subscription is no longer current.
        assert_eq!(f.registry.advance("cred-2", Some(first), Some(50.0)), None);
        assert_eq!(f.registry.snapshot("cred-2").unwrap().progress, 10.0);

        let current = TickStamp {
            id: handle.id,
            generation: 1,
        };
        let view = f.registry.advance("cred-2", Some(current), Some(50.0)).unwrap();
        assert_eq!(view.progress, 60.0);
    }

    #[test]
    fn unsubscribe_stops_events() {
        let f = fixture(FixedSteps::constant(10.0));
        f.registry.start("host-1", TaskKind::Scan, config(10.0)).unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let subscription = f
            .registry
            .subscribe("host-1", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        f.registry.tick("host-1");
        subscription.unsubscribe();
        subscription.unsubscribe();
        f.registry.tick("host-1");

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn counts_and_history_limit() {
        let clock = Arc::new(ManualClock::default());
        let registry = TaskRegistry::builder(Arc::clone(&clock))
            .steps(FixedSteps::constant(100.0))
            .history_limit(2)
            .build();

        for key in ["a", "b", "c"] {
            registry.start(key, TaskKind::Exploit, config(100.0)).unwrap();
            registry.tick(key);
        }
        registry.start("d", TaskKind::Exploit, config(100.0)).unwrap();
        registry.start("e", TaskKind::Exploit, config(100.0)).unwrap();
        registry.pause("e");
        registry.start("f", TaskKind::Exploit, config(100.0)).unwrap();
        registry.cancel("f");

        let counts = registry.counts();
        assert_eq!(
            counts,
            RegistryCounts {
                pending: 0,
                running: 1,
                paused: 1,
                completed: 3,
                cancelled: 1,
            }
        );
        let keys: Vec<String> = registry.history().iter().map(|v| v.key.to_string()).collect();
        assert_eq!(keys, vec!["c", "f"]);
    }

    #[test]
    fn cancel_all_clears_live_tasks() {
        let f = fixture(FixedSteps::constant(10.0));
        f.registry.start("a", TaskKind::Scan, config(10.0)).unwrap();
        f.registry.start("b", TaskKind::Crack, config(10.0)).unwrap();
        f.registry.pause("b");

        assert_eq!(f.registry.cancel_all(), 2);
        assert!(f.registry.is_idle());
        assert_eq!(f.clock.active_schedules(), 0);
    }

    struct BrokenSink;

    impl NotificationSink for BrokenSink {
        fn notify(&self, _message: &str, _level: NotifyLevel) -> Result<(), NotifyError> {
            Err(NotifyError::Unavailable)
        }
    }

    #[test]
    fn failing_sink_does_not_affect_tasks() {
        let clock = Arc::new(ManualClock::default());
        let registry = TaskRegistry::builder(Arc::clone(&clock))
            .notifier(BrokenSink)
            .steps(FixedSteps::constant(50.0))
            .build();

        registry.start("host-1", TaskKind::Scan, config(50.0)).unwrap();
        clock.advance(Duration::from_millis(200));

        assert!(registry.is_idle());
        assert_eq!(registry.history()[0].state, TaskState::Completed);
    }

    #[test]
    fn hook_may_call_back_into_registry() {
        let f = fixture(FixedSteps::constant(100.0));
        let registry = f.registry.clone();
        f.registry
            .start(
                "exp-1",
                TaskKind::Exploit,
                config(100.0).on_complete(move |_| {
                    registry.start("exp-1", TaskKind::Exploit, config(100.0)).unwrap();
                }),
            )
            .unwrap();

        f.registry.tick("exp-1");
        assert_eq!(f.registry.snapshot("exp-1").unwrap().state, TaskState::Running);
        assert_eq!(f.registry.counts().completed, 1);
    }
}
