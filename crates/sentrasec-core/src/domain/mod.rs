//! Domain model: identifiers, the task state machine, read-side views,
//! errors, and the mock records behind the console views.

pub mod errors;
pub mod events;
pub mod ids;
pub mod kind;
pub mod records;
pub mod state;
pub mod task;

pub use errors::{NotifyError, RegistryError, StoreError};
pub use events::{TaskEvent, TaskView};
pub use ids::{TaskId, TaskKey};
pub use kind::{CollisionPolicy, TaskKind};
pub use records::{
    Credential, CredentialKind, EvidenceItem, EvidenceKind, HijackedSession, Integration,
    IntegrationConfig, IntegrationStatus, Protocol, ScanPolicy, SessionStatus, Severity, Strength,
};
pub use state::TaskState;
pub use task::{CompletionHook, MAX_PROGRESS, Step, Task, TaskConfig, Transition};
