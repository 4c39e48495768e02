//! Persisted mock collections: harvested credentials and hijacked sessions.
//!
//! Both are small JSON arrays written through a [`KeyValueStore`] after every
//! mutation. Completion hooks of crack and session tasks are their only
//! writers besides the operator.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};
use ulid::Ulid;

use super::collection::{read_collection, write_collection};
use crate::domain::{
    Credential, CredentialKind, HijackedSession, Protocol, SessionStatus, StoreError, Strength,
    TaskView,
};
use crate::ports::{ConfirmationPrompt, KeyValueStore};

pub const CREDENTIALS_KEY: &str = "sentrasec.credentials";
pub const SESSIONS_KEY: &str = "sentrasec.sessions";

/// Password written into a credential the cracker "recovered".
pub const RECOVERED_PASSWORD: &str = "Recovered!23";

pub struct CredentialVault {
    store: Arc<dyn KeyValueStore>,
    credentials: Mutex<Vec<Credential>>,
}

impl CredentialVault {
    /// Load the vault; a store without the key starts empty.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        Self::load_or(store, Vec::new())
    }

    /// Load the vault, seeding it with `defaults` when the store has nothing.
    pub fn load_or(
        store: Arc<dyn KeyValueStore>,
        defaults: Vec<Credential>,
    ) -> Result<Self, StoreError> {
        let credentials = match read_collection(store.as_ref(), CREDENTIALS_KEY)? {
            Some(credentials) => credentials,
            None => defaults,
        };
        debug!(count = credentials.len(), "credential vault loaded");
        Ok(Self {
            store,
            credentials: Mutex::new(credentials),
        })
    }

    pub fn list(&self) -> Vec<Credential> {
        self.lock().clone()
    }

    /// Newest first.
    pub fn add(&self, credential: Credential) -> Result<(), StoreError> {
        let mut credentials = self.lock();
        credentials.insert(0, credential);
        self.persist(&credentials)
    }

    /// Remove credential `id` once the operator confirms.
    ///
    /// `Ok(false)` when declined or when no such credential exists.
    pub fn remove(&self, id: u64, prompt: &dyn ConfirmationPrompt) -> Result<bool, StoreError> {
        if !self.lock().iter().any(|c| c.id == id) {
            return Ok(false);
        }
        if !prompt.confirm(&format!("Delete credential #{id}?")) {
            return Ok(false);
        }

        let mut credentials = self.lock();
        let before = credentials.len();
        credentials.retain(|c| c.id != id);
        if credentials.len() == before {
            return Ok(false);
        }
        self.persist(&credentials)?;
        info!(id, "credential removed");
        Ok(true)
    }

    /// Flip the `revealed` flag of credential `id`; returns the new value.
    pub fn toggle_reveal(&self, id: u64) -> Result<Option<bool>, StoreError> {
        let mut credentials = self.lock();
        let Some(credential) = credentials.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        credential.revealed = !credential.revealed;
        let revealed = credential.revealed;
        self.persist(&credentials)?;
        Ok(Some(revealed))
    }

    /// Mark the first uncracked credential as cracked.
    pub fn mark_next_cracked(&self) -> Result<Option<u64>, StoreError> {
        let mut credentials = self.lock();
        let Some(credential) = credentials.iter_mut().find(|c| !c.cracked) else {
            return Ok(None);
        };
        credential.cracked = true;
        credential.password = RECOVERED_PASSWORD.to_string();
        credential.strength = Strength::Weak;
        let id = credential.id;
        self.persist(&credentials)?;
        info!(id, "credential cracked");
        Ok(Some(id))
    }

    pub fn search(&self, term: &str) -> Vec<Credential> {
        self.lock().iter().filter(|c| c.matches(term)).cloned().collect()
    }

    fn persist(&self, credentials: &[Credential]) -> Result<(), StoreError> {
        write_collection(self.store.as_ref(), CREDENTIALS_KEY, credentials)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Credential>> {
        self.credentials.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Completion hook for crack tasks: one more credential gets cracked.
pub fn crack_on_complete(vault: Arc<CredentialVault>) -> impl FnOnce(&TaskView) + Send + 'static {
    move |view| match vault.mark_next_cracked() {
        Ok(Some(id)) => info!(task = %view.key, id, "crack run recovered a password"),
        Ok(None) => info!(task = %view.key, "crack run found nothing left to crack"),
        Err(err) => warn!(task = %view.key, error = %err, "could not record cracked credential"),
    }
}

/// Seed data shown on a fresh console.
pub fn demo_credentials() -> Vec<Credential> {
    let at = |s: &str| s.parse::<DateTime<Utc>>().unwrap_or_default();
    let credential = |id, username: &str, password: &str, domain: &str, source: &str| Credential {
        id,
        username: username.to_string(),
        password: password.to_string(),
        domain: domain.to_string(),
        source: source.to_string(),
        kind: CredentialKind::Cleartext,
        access_level: "user".to_string(),
        last_used: DateTime::<Utc>::default(),
        cracked: true,
        strength: Strength::Weak,
        revealed: false,
    };

    vec![
        Credential {
            access_level: "administrator".to_string(),
            last_used: at("2024-01-15T14:32:00Z"),
            ..credential(1, "admin", "P@ssw0rd123", "corp.local", "web-app-01.local")
        },
        Credential {
            kind: CredentialKind::Ntlm,
            access_level: "database admin".to_string(),
            last_used: at("2024-01-15T12:15:00Z"),
            strength: Strength::Strong,
            ..credential(2, "dbadmin", "DatabaseP@ss2024!", "sql-server.local", "memory dump")
        },
        Credential {
            kind: CredentialKind::Encrypted,
            access_level: "service".to_string(),
            last_used: at("2024-01-15T10:45:00Z"),
            cracked: false,
            strength: Strength::Unknown,
            ..credential(3, "service_account", "[ENCRYPTED]", "corp.local", "registry")
        },
        Credential {
            last_used: at("2024-01-15T16:20:00Z"),
            strength: Strength::VeryWeak,
            ..credential(4, "john.doe", "password123", "corp.local", "network sniff")
        },
    ]
}

const SESSION_USERS: [&str; 3] = ["admin@corp.local", "john.doe@corp.local", "dbadmin@sql.local"];

/// Hijacked sessions, newest first.
pub struct SessionLog {
    store: Arc<dyn KeyValueStore>,
    sessions: Mutex<Vec<HijackedSession>>,
}

impl SessionLog {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let sessions = read_collection(store.as_ref(), SESSIONS_KEY)?.unwrap_or_default();
        Ok(Self {
            store,
            sessions: Mutex::new(sessions),
        })
    }

    pub fn list(&self) -> Vec<HijackedSession> {
        self.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<HijackedSession> {
        self.lock().iter().find(|s| s.id == id).cloned()
    }

    /// Record a new active session.
    pub fn begin(
        &self,
        target: impl Into<String>,
        user: impl Into<String>,
        protocol: Protocol,
        now: DateTime<Utc>,
    ) -> Result<HijackedSession, StoreError> {
        let timestamp_ms = now.timestamp_millis().max(0) as u64;
        let session = HijackedSession {
            id: Ulid::from_parts(timestamp_ms, rand::random()).to_string(),
            target: target.into(),
            user: user.into(),
            protocol,
            status: SessionStatus::Active,
            started_at: now,
            ended_at: None,
            last_activity: "Session started".to_string(),
        };

        let mut sessions = self.lock();
        sessions.insert(0, session.clone());
        self.persist(&sessions)?;
        info!(id = %session.id, target = %session.target, "session started");
        Ok(session)
    }

    /// Record a session against a random lab host.
    pub fn begin_simulated(
        &self,
        rng: &mut impl Rng,
        now: DateTime<Utc>,
    ) -> Result<HijackedSession, StoreError> {
        let target = format!("192.168.1.{}", rng.gen_range(100..200));
        let user = SESSION_USERS.choose(rng).copied().unwrap_or(SESSION_USERS[0]);
        let protocol = Protocol::ALL.choose(rng).copied().unwrap_or(Protocol::Rdp);
        self.begin(target, user, protocol, now)
    }

    /// Move session `id` to `status`. Terminated sessions are final.
    ///
    /// Returns the updated record, or `None` if there is no such session or
    /// it has already been terminated.
    pub fn update_status(
        &self,
        id: &str,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<HijackedSession>, StoreError> {
        let mut sessions = self.lock();
        let Some(session) = sessions.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if session.status == SessionStatus::Terminated {
            return Ok(None);
        }

        session.status = status;
        session.last_activity = match status {
            SessionStatus::Active => "Resumed",
            SessionStatus::Monitoring => "Monitoring traffic",
            SessionStatus::Paused => "Paused by operator",
            SessionStatus::Terminated => "Terminated",
        }
        .to_string();
        if status == SessionStatus::Terminated {
            session.ended_at = Some(now);
        }
        let updated = session.clone();
        self.persist(&sessions)?;
        Ok(Some(updated))
    }

    fn persist(&self, sessions: &[HijackedSession]) -> Result<(), StoreError> {
        write_collection(self.store.as_ref(), SESSIONS_KEY, sessions)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HijackedSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{AlwaysConfirm, MemoryStore, NeverConfirm};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn store() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn missing_key_loads_empty() {
        let vault = CredentialVault::load(store()).unwrap();
        assert!(vault.list().is_empty());
        assert_eq!(vault.mark_next_cracked().unwrap(), None);
    }

    #[test]
    fn mark_next_cracked_takes_first_uncracked() {
        let store = store();
        let vault = CredentialVault::load_or(Arc::clone(&store), demo_credentials()).unwrap();

        assert_eq!(vault.mark_next_cracked().unwrap(), Some(3));
        let cracked = vault.list().into_iter().find(|c| c.id == 3).unwrap();
        assert!(cracked.cracked);
        assert_eq!(cracked.password, RECOVERED_PASSWORD);
        assert_eq!(cracked.strength, Strength::Weak);
        assert_eq!(vault.mark_next_cracked().unwrap(), None);

        // The change went through the store.
        let reloaded = CredentialVault::load(store).unwrap();
        assert!(reloaded.list().iter().all(|c| c.cracked));
    }

    #[test]
    fn remove_requires_confirmation() {
        let vault = CredentialVault::load_or(store(), demo_credentials()).unwrap();

        assert!(!vault.remove(1, &NeverConfirm).unwrap());
        assert_eq!(vault.list().len(), 4);
        assert!(vault.remove(1, &AlwaysConfirm).unwrap());
        assert_eq!(vault.list().len(), 3);
        assert!(!vault.remove(1, &AlwaysConfirm).unwrap());
    }

    #[test]
    fn add_prepends_and_search_filters() {
        let vault = CredentialVault::load_or(store(), demo_credentials()).unwrap();
        let mut extra = demo_credentials().remove(0);
        extra.id = 9;
        extra.username = "svc_backup".to_string();
        extra.domain = "backup.local".to_string();
        vault.add(extra).unwrap();

        assert_eq!(vault.list()[0].id, 9);
        let hits: Vec<u64> = vault.search("BACKUP").iter().map(|c| c.id).collect();
        assert_eq!(hits, vec![9]);
        assert_eq!(vault.search("corp.local").len(), 3);
    }

    #[test]
    fn toggle_reveal_flips_flag() {
        let vault = CredentialVault::load_or(store(), demo_credentials()).unwrap();
        assert_eq!(vault.toggle_reveal(2).unwrap(), Some(true));
        assert_eq!(vault.toggle_reveal(2).unwrap(), Some(false));
        assert_eq!(vault.toggle_reveal(42).unwrap(), None);
    }

    #[test]
    fn session_lifecycle_is_persisted() {
        let store = store();
        let log = SessionLog::load(Arc::clone(&store)).unwrap();
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(7);

        let session = log.begin_simulated(&mut rng, now).unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.target.starts_with("192.168.1."));

        let paused = log
            .update_status(&session.id, SessionStatus::Paused, now)
            .unwrap()
            .unwrap();
        assert_eq!(paused.last_activity, "Paused by operator");

        let ended = log
            .update_status(&session.id, SessionStatus::Terminated, now)
            .unwrap()
            .unwrap();
        assert_eq!(ended.ended_at, Some(now));
        assert_eq!(
            log.update_status(&session.id, SessionStatus::Active, now).unwrap(),
            None
        );

        let reloaded = SessionLog::load(store).unwrap();
        assert_eq!(reloaded.list(), vec![ended]);
    }

    #[test]
    fn monitoring_session_stays_open() {
        let log = SessionLog::load(store()).unwrap();
        let now = Utc::now();
        let session = log.begin("10.0.0.12", "john.doe@corp.local", Protocol::Smb, now).unwrap();

        let watched = log
            .update_status(&session.id, SessionStatus::Monitoring, now)
            .unwrap()
            .unwrap();
        assert_eq!(watched.status, SessionStatus::Monitoring);
        assert_eq!(watched.last_activity, "Monitoring traffic");
        assert_eq!(watched.ended_at, None);
        assert!(watched.status.is_live());

        let resumed = log
            .update_status(&session.id, SessionStatus::Active, now)
            .unwrap()
            .unwrap();
        assert_eq!(resumed.last_activity, "Resumed");
    }
}
