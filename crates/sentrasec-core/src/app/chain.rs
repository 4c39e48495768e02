//! Sequential operation chains ("Exploit All").
//!
//! Each link starts from the completion hook of the one before it, so a chain
//! never has more than one live task. A link that is cancelled or refused by
//! the registry halts the rest of the chain.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use super::registry::{TaskRegistry, WeakRegistry};
use crate::domain::{TaskConfig, TaskKey, TaskKind};
use crate::ports::NotifyLevel;

/// One step of a chain.
#[derive(Debug)]
pub struct ChainLink {
    pub key: TaskKey,
    pub kind: TaskKind,
    pub config: TaskConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    Running,
    Finished,
    Halted,
}

#[derive(Debug)]
struct ChainProgress {
    status: ChainStatus,
    current: Option<TaskKey>,
    completed: usize,
    total: usize,
}

type Shared = Arc<Mutex<ChainProgress>>;

fn lock(shared: &Shared) -> MutexGuard<'_, ChainProgress> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builder for a chain of operations run one after another.
#[derive(Debug, Default)]
pub struct ExploitChain {
    links: Vec<ChainLink>,
}

impl ExploitChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(mut self, key: impl Into<TaskKey>, kind: TaskKind, config: TaskConfig) -> Self {
        self.links.push(ChainLink {
            key: key.into(),
            kind,
            config,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Start the first link. An empty chain is finished on return.
    pub fn start(self, registry: &TaskRegistry) -> ChainHandle {
        let total = self.links.len();
        let shared = Arc::new(Mutex::new(ChainProgress {
            status: ChainStatus::Running,
            current: None,
            completed: 0,
            total,
        }));

        if total == 0 {
            lock(&shared).status = ChainStatus::Finished;
        } else {
            info!(links = total, "chain started");
            registry.notify(&format!("Starting {total} chained operations"), NotifyLevel::Info);
            run_next(registry, Arc::clone(&shared), self.links.into());
        }

        ChainHandle { shared }
    }
}

fn run_next(registry: &TaskRegistry, shared: Shared, mut rest: VecDeque<ChainLink>) {
    let Some(link) = rest.pop_front() else {
        let total = {
            let mut progress = lock(&shared);
            progress.status = ChainStatus::Finished;
            progress.current = None;
            progress.total
        };
        info!(links = total, "chain finished");
        registry.notify(
            &format!("All {total} chained operations completed"),
            NotifyLevel::Success,
        );
        return;
    };

    lock(&shared).current = Some(link.key.clone());

    let mut guard = LinkGuard {
        shared: Arc::clone(&shared),
        registry: registry.downgrade(),
        key: link.key.clone(),
        armed: true,
    };
    let config = link.config.then_on_complete(move |view| {
        let Some(registry) = guard.registry.upgrade() else {
            return;
        };
        guard.armed = false;
        lock(&guard.shared).completed += 1;
        registry.notify(
            &format!("{} successful: {}", view.kind.display_name(), view.key),
            NotifyLevel::Success,
        );
        run_next(&registry, Arc::clone(&guard.shared), rest);
    });

    match registry.start(link.key, link.kind, config) {
        Ok(handle) => lock(&shared).current = Some(handle.key),
        // The refused config, and its guard, are already dropped.
        Err(err) => warn!(error = %err, "chain link refused"),
    }
}

/// Travels inside a link's completion hook. Dropped without being disarmed
/// means the link will never complete.
struct LinkGuard {
    shared: Shared,
    registry: WeakRegistry,
    key: TaskKey,
    armed: bool,
}

impl Drop for LinkGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut progress = lock(&self.shared);
            if progress.status != ChainStatus::Running {
                return;
            }
            progress.status = ChainStatus::Halted;
            progress.current = Some(self.key.clone());
        }
        warn!(key = %self.key, "chain halted");
        if let Some(registry) = self.registry.upgrade() {
            registry.notify(&format!("Chain halted at {}", self.key), NotifyLevel::Error);
        }
    }
}

/// Read-side view of a running chain.
#[derive(Debug, Clone)]
pub struct ChainHandle {
    shared: Shared,
}

impl ChainHandle {
    pub fn status(&self) -> ChainStatus {
        lock(&self.shared).status
    }

    /// Key of the live link, or of the link the chain halted at.
    pub fn current_key(&self) -> Option<TaskKey> {
        lock(&self.shared).current.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.status() == ChainStatus::Finished
    }

    pub fn is_halted(&self) -> bool {
        self.status() == ChainStatus::Halted
    }

    pub fn completed_links(&self) -> usize {
        lock(&self.shared).completed
    }

    pub fn total_links(&self) -> usize {
        lock(&self.shared).total
    }
}
