//! sentrasec-core
//!
//! Progress-driven task simulator behind the SentraSec console.
//!
//! Every long-running console action (subnet scan, exploit, password
//! cracking, session hijack) is a [`domain::Task`] whose progress grows by a
//! random step on each clock tick until it reaches 100%. A
//! [`app::TaskRegistry`] owns the live tasks, keyed by target, and fans
//! progress out to listeners and a [`ports::NotificationSink`].
//!
//! # Modules
//! - **domain**: ids, task state machine, views, errors, mock records
//! - **ports**: Clock, NotificationSink, StepSource, KeyValueStore and friends
//! - **app**: registry, chains, persisted collections, configuration
//! - **impls**: manual and tokio clocks, step sources, sinks, stores

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
