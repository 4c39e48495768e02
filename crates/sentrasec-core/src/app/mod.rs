//! App - the simulator proper.
//!
//! Combines the ports into the operations the console exposes.
//!
//! # Components
//! - **TaskRegistry**: live operations keyed by target, driven by a `Clock`
//! - **ExploitChain**: runs operations strictly one after another
//! - **CredentialVault / SessionLog**: persisted mock collections
//! - **EvidenceLocker / PolicyBook / IntegrationHub**: the same, for the
//!   evidence and settings views
//! - **SimulatorConfig**: layered settings (defaults, TOML file, environment)

pub mod chain;
mod collection;
pub mod config;
pub mod evidence;
pub mod registry;
pub mod settings;
pub mod status;
pub mod vault;

pub use self::chain::{ChainHandle, ChainLink, ChainStatus, ExploitChain};
pub use self::config::{ConfigError, KindPreset, Presets, SimulatorConfig};
pub use self::evidence::{EvidenceLocker, demo_evidence};
pub use self::registry::{
    Listener, RegistryBuilder, Subscription, TaskHandle, TaskRegistry, WeakRegistry,
};
pub use self::settings::{IntegrationHub, PolicyBook, demo_integrations, demo_policies};
pub use self::status::RegistryCounts;
pub use self::vault::{CredentialVault, SessionLog, crack_on_complete, demo_credentials};
