//! Implementations of the ports.
//!
//! Everything here is in-process: virtual and tokio clocks, step sources,
//! notification sinks, key-value stores and fixed-answer prompts.

pub mod file_store;
pub mod manual_clock;
pub mod memory_store;
pub mod notifiers;
pub mod prompts;
pub mod steps;
pub mod tokio_clock;

pub use self::file_store::JsonFileStore;
pub use self::manual_clock::ManualClock;
pub use self::memory_store::MemoryStore;
pub use self::notifiers::{NoopNotifier, RecordingNotifier, TracingNotifier};
pub use self::prompts::{AlwaysConfirm, NeverConfirm};
pub use self::steps::{FixedSteps, RandomSteps};
pub use self::tokio_clock::TokioClock;
