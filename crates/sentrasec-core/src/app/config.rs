//! Simulator configuration.
//!
//! Defaults, then `sentrasec.toml`, then `SENTRASEC_`-prefixed environment
//! variables (nested keys separated by `__`, e.g.
//! `SENTRASEC_PRESETS__CRACK__MAX_STEP=12`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CollisionPolicy, TaskConfig, TaskKind};

pub const DEFAULT_CONFIG_FILE: &str = "sentrasec.toml";
pub const ENV_PREFIX: &str = "SENTRASEC_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid preset for {kind}: {reason}")]
    InvalidPreset { kind: TaskKind, reason: &'static str },

    #[error("history_limit must be at least 1")]
    EmptyHistory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// How many finished tasks the registry keeps for display.
    pub history_limit: usize,

    /// Where the console persists its mock collections.
    pub store_path: PathBuf,

    pub presets: Presets,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            store_path: PathBuf::from("sentrasec-state.json"),
            presets: Presets::default(),
        }
    }
}

impl SimulatorConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// A missing file is fine; defaults and env still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::EmptyHistory);
        }
        for kind in TaskKind::ALL {
            self.presets.get(kind).validate(kind)?;
        }
        self.presets.chain.validate(TaskKind::Exploit)?;
        Ok(())
    }

    pub fn preset(&self, kind: TaskKind) -> &KindPreset {
        self.presets.get(kind)
    }
}

/// Tick presets per operation kind.
///
/// Defaults follow the console's timers: a focused host scan ticks every
/// 800 ms by up to 15%, a recon sweep every second by up to 8%, and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presets {
    pub scan: KindPreset,
    pub focused_scan: KindPreset,
    pub exploit: KindPreset,
    pub crack: KindPreset,
    pub session: KindPreset,
    /// Each link of an "Exploit All" chain. Faster than a single exploit.
    pub chain: KindPreset,
}

impl Default for Presets {
    fn default() -> Self {
        Self {
            scan: KindPreset::new(1000, 8.0),
            focused_scan: KindPreset::new(800, 15.0),
            exploit: KindPreset::new(600, 20.0),
            crack: KindPreset::new(1200, 6.0),
            session: KindPreset::new(1000, 5.0),
            chain: KindPreset::new(400, 25.0),
        }
    }
}

impl Presets {
    pub fn get(&self, kind: TaskKind) -> &KindPreset {
        match kind {
            TaskKind::Scan => &self.scan,
            TaskKind::FocusedScan => &self.focused_scan,
            TaskKind::Exploit => &self.exploit,
            TaskKind::Crack => &self.crack,
            TaskKind::Session => &self.session,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KindPreset {
    pub tick_interval_ms: u64,
    pub max_step: f64,
    /// Overrides `TaskKind::default_policy` when set.
    #[serde(default)]
    pub policy: Option<CollisionPolicy>,
}

impl KindPreset {
    pub fn new(tick_interval_ms: u64, max_step: f64) -> Self {
        Self {
            tick_interval_ms,
            max_step,
            policy: None,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Fresh task config from this preset.
    pub fn task_config(&self) -> TaskConfig {
        TaskConfig::new(self.tick_interval(), self.max_step)
    }

    fn validate(&self, kind: TaskKind) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidPreset {
                kind,
                reason: "tick_interval_ms must be positive",
            });
        }
        if !self.max_step.is_finite() || self.max_step <= 0.0 {
            return Err(ConfigError::InvalidPreset {
                kind,
                reason: "max_step must be a positive number",
            });
        }
        Ok(())
    }
}
