//! Shared plumbing for the persisted mock collections.
//!
//! Each collection is a JSON array under one store key, cached in memory and
//! written back after every mutation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::StoreError;
use crate::ports::{ConfirmationPrompt, KeyValueStore};

pub(crate) fn read_collection<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<Vec<T>>, StoreError> {
    match store.get(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub(crate) fn write_collection<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    items: &[T],
) -> Result<(), StoreError> {
    store.set(key, serde_json::to_value(items)?)
}

pub(crate) struct Collection<T> {
    store: Arc<dyn KeyValueStore>,
    key: &'static str,
    items: Mutex<Vec<T>>,
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Seeds with `defaults` when the store has nothing under `key`.
    pub(crate) fn load_or(
        store: Arc<dyn KeyValueStore>,
        key: &'static str,
        defaults: Vec<T>,
    ) -> Result<Self, StoreError> {
        let items = read_collection(store.as_ref(), key)?.unwrap_or(defaults);
        debug!(key, count = items.len(), "collection loaded");
        Ok(Self {
            store,
            key,
            items: Mutex::new(items),
        })
    }

    pub(crate) fn list(&self) -> Vec<T> {
        self.lock().clone()
    }

    pub(crate) fn find(&self, pick: impl Fn(&T) -> bool) -> Option<T> {
        self.lock().iter().find(|item| pick(*item)).cloned()
    }

    pub(crate) fn prepend(&self, item: T) -> Result<(), StoreError> {
        let mut items = self.lock();
        items.insert(0, item);
        self.persist(&items)
    }

    /// Apply `change` to the first item matching `pick`, then persist.
    /// `Ok(None)` when nothing matches.
    pub(crate) fn update<R>(
        &self,
        pick: impl Fn(&T) -> bool,
        change: impl FnOnce(&mut T) -> R,
    ) -> Result<Option<R>, StoreError> {
        let mut items = self.lock();
        let Some(index) = items.iter().position(&pick) else {
            return Ok(None);
        };
        let result = change(&mut items[index]);
        self.persist(&items)?;
        Ok(Some(result))
    }

    /// Remove every item matching `pick` once `prompt` agrees to `question`.
    ///
    /// The prompt is only asked when something would be removed, and never
    /// with the lock held.
    pub(crate) fn remove_confirmed(
        &self,
        pick: impl Fn(&T) -> bool,
        question: &str,
        prompt: &dyn ConfirmationPrompt,
    ) -> Result<bool, StoreError> {
        if !self.lock().iter().any(&pick) {
            return Ok(false);
        }
        if !prompt.confirm(question) {
            return Ok(false);
        }

        let mut items = self.lock();
        let before = items.len();
        items.retain(|item| !pick(item));
        if items.len() == before {
            return Ok(false);
        }
        self.persist(&items)?;
        Ok(true)
    }

    fn persist(&self, items: &[T]) -> Result<(), StoreError> {
        write_collection(self.store.as_ref(), self.key, items)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
