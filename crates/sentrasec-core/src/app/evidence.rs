//! Evidence locker: screenshots, documents and dumps collected during an
//! engagement.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::collection::Collection;
use crate::domain::{EvidenceItem, EvidenceKind, StoreError};
use crate::ports::{ConfirmationPrompt, KeyValueStore};

pub const EVIDENCE_KEY: &str = "sentrasec.evidence";

/// Evidence items, newest first.
pub struct EvidenceLocker {
    items: Collection<EvidenceItem>,
}

impl EvidenceLocker {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        Self::load_or(store, Vec::new())
    }

    pub fn load_or(
        store: Arc<dyn KeyValueStore>,
        defaults: Vec<EvidenceItem>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            items: Collection::load_or(store, EVIDENCE_KEY, defaults)?,
        })
    }

    pub fn list(&self) -> Vec<EvidenceItem> {
        self.items.list()
    }

    pub fn get(&self, id: u64) -> Option<EvidenceItem> {
        self.items.find(|item| item.id == id)
    }

    pub fn with_tag(&self, tag: &str) -> Vec<EvidenceItem> {
        self.list().into_iter().filter(|item| item.has_tag(tag)).collect()
    }

    /// File `item` at the top of the locker.
    pub fn add(&self, item: EvidenceItem) -> Result<(), StoreError> {
        let id = item.id;
        self.items.prepend(item)?;
        info!(id, "evidence filed");
        Ok(())
    }

    /// Drop evidence `id` once the operator confirms.
    ///
    /// `Ok(false)` when declined or when no such item exists.
    pub fn remove(&self, id: u64, prompt: &dyn ConfirmationPrompt) -> Result<bool, StoreError> {
        let removed = self.items.remove_confirmed(
            |item| item.id == id,
            &format!("Delete evidence #{id}?"),
            prompt,
        )?;
        if removed {
            info!(id, "evidence removed");
        }
        Ok(removed)
    }
}

/// Seed data shown on a fresh console.
pub fn demo_evidence() -> Vec<EvidenceItem> {
    let at = |s: &str| s.parse::<DateTime<Utc>>().unwrap_or_default();
    let tags = |names: &[&str]| -> Vec<String> { names.iter().map(|t| t.to_string()).collect() };

    vec![
        EvidenceItem {
            id: 1,
            kind: EvidenceKind::Screenshot,
            title: "Admin Panel Access".to_string(),
            description: "Successful login to administrative interface".to_string(),
            timestamp: at("2024-01-15T14:32:15Z"),
            source: "web-app-01.local".to_string(),
            size: "2.4 MB".to_string(),
            hash: "a1b2c3d4e5f6".to_string(),
            tags: tags(&["admin", "web", "authentication"]),
        },
        EvidenceItem {
            id: 2,
            kind: EvidenceKind::Document,
            title: "Database Schema".to_string(),
            description: "Complete database structure".to_string(),
            timestamp: at("2024-01-15T13:45:22Z"),
            source: "sql-server.local".to_string(),
            size: "156 KB".to_string(),
            hash: "f6e5d4c3b2a1".to_string(),
            tags: tags(&["database", "schema"]),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{AlwaysConfirm, MemoryStore, NeverConfirm};

    fn capture(id: u64) -> EvidenceItem {
        EvidenceItem {
            id,
            kind: EvidenceKind::Archive,
            title: "Exfiltrated share".to_string(),
            description: "Finance share archive".to_string(),
            timestamp: "2024-01-16T09:00:00Z".parse().unwrap(),
            source: "fs-01.corp.local".to_string(),
            size: "48 MB".to_string(),
            hash: "0badc0ffee00".to_string(),
            tags: vec!["finance".to_string()],
        }
    }

    #[test]
    fn fresh_store_gets_seed_data() {
        let locker = EvidenceLocker::load_or(Arc::new(MemoryStore::new()), demo_evidence()).unwrap();
        assert_eq!(locker.list().len(), 2);
        assert_eq!(locker.get(2).map(|e| e.kind), Some(EvidenceKind::Document));
        assert_eq!(locker.with_tag("WEB").len(), 1);
    }

    #[test]
    fn added_evidence_survives_reload() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let locker = EvidenceLocker::load_or(Arc::clone(&store), demo_evidence()).unwrap();
        locker.add(capture(3)).unwrap();

        let reloaded = EvidenceLocker::load_or(store, Vec::new()).unwrap();
        let ids: Vec<u64> = reloaded.list().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(reloaded.with_tag("finance")[0].size, "48 MB");
    }

    #[test]
    fn remove_requires_confirmation() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let locker = EvidenceLocker::load_or(Arc::clone(&store), demo_evidence()).unwrap();

        assert!(!locker.remove(1, &NeverConfirm).unwrap());
        assert!(locker.get(1).is_some());
        assert!(locker.remove(1, &AlwaysConfirm).unwrap());
        assert!(!locker.remove(1, &AlwaysConfirm).unwrap());

        let reloaded = EvidenceLocker::load(store).unwrap();
        assert_eq!(reloaded.list().len(), 1);
    }
}
