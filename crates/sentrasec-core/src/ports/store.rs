//! KeyValueStore port - persistence for the mock collections.
//!
//! Only collection owners (`app::vault`) use this. The simulator itself is
//! never persisted: a restart loses in-flight operations.

use serde_json::Value;

use crate::domain::StoreError;

/// String-keyed JSON storage, the stand-in for browser local storage.
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` when the key was never written.
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
