//! Ports - traits at the seams of the simulator.
//!
//! Each trait stands for a capability the surrounding console provides
//! (timers, toasts, local storage, confirm dialogs) so the core can run and
//! be tested without any of them.

pub mod clock;
pub mod id_generator;
pub mod notification;
pub mod prompt;
pub mod steps;
pub mod store;

pub use self::clock::{CancelToken, Clock, MIN_INTERVAL, TickCallback};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::notification::{NotificationSink, NotifyLevel};
pub use self::prompt::ConfirmationPrompt;
pub use self::steps::StepSource;
pub use self::store::KeyValueStore;
