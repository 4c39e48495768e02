//! Settings collections: scheduled scan policies and third-party integrations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{info, warn};

use super::collection::Collection;
use crate::domain::{
    Integration, IntegrationConfig, IntegrationStatus, ScanPolicy, Severity, StoreError,
};
use crate::ports::{ConfirmationPrompt, KeyValueStore};

pub const POLICIES_KEY: &str = "sentrasec.policies";
pub const INTEGRATIONS_KEY: &str = "sentrasec.integrations";

/// Share of integration tests that fail.
pub const INTEGRATION_TEST_FAILURE_RATE: f64 = 0.15;

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap_or_default()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub struct PolicyBook {
    policies: Collection<ScanPolicy>,
}

impl PolicyBook {
    pub fn load_or(
        store: Arc<dyn KeyValueStore>,
        defaults: Vec<ScanPolicy>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            policies: Collection::load_or(store, POLICIES_KEY, defaults)?,
        })
    }

    pub fn list(&self) -> Vec<ScanPolicy> {
        self.policies.list()
    }

    pub fn get(&self, id: u64) -> Option<ScanPolicy> {
        self.policies.find(|p| p.id == id)
    }

    /// Flip `active`; returns the new value, or `None` for an unknown id.
    pub fn toggle_active(&self, id: u64) -> Result<Option<bool>, StoreError> {
        self.policies.update(
            |p| p.id == id,
            |policy| {
                policy.active = !policy.active;
                policy.active
            },
        )
    }

    /// Record a manual run at `now`.
    pub fn run_now(&self, id: u64, now: DateTime<Utc>) -> Result<Option<ScanPolicy>, StoreError> {
        let run = self.policies.update(
            |p| p.id == id,
            |policy| {
                policy.last_run = Some(now);
                policy.clone()
            },
        )?;
        if run.is_some() {
            info!(id, "policy run scheduled");
        }
        Ok(run)
    }

    /// Replace the stored policy with the same id. The id itself is fixed.
    pub fn save(&self, edited: ScanPolicy) -> Result<bool, StoreError> {
        let id = edited.id;
        Ok(self
            .policies
            .update(|p| p.id == id, move |policy| *policy = edited)?
            .is_some())
    }

    pub fn remove(&self, id: u64, prompt: &dyn ConfirmationPrompt) -> Result<bool, StoreError> {
        self.policies
            .remove_confirmed(|p| p.id == id, "Delete this policy?", prompt)
    }
}

pub fn demo_policies() -> Vec<ScanPolicy> {
    vec![
        ScanPolicy {
            id: 1,
            name: "Standard Web Application Scan".to_string(),
            description: "Comprehensive web application vulnerability assessment".to_string(),
            targets: strings(&["*.company.com", "api.company.com"]),
            schedule: "Weekly".to_string(),
            severity_threshold: Severity::Medium,
            active: true,
            last_run: Some(at("2024-01-15T14:00:00Z")),
        },
        ScanPolicy {
            id: 2,
            name: "Critical Infrastructure Scan".to_string(),
            description: "Network infrastructure and server vulnerability scan".to_string(),
            targets: strings(&["192.168.1.0/24", "10.0.0.0/16"]),
            schedule: "Daily".to_string(),
            severity_threshold: Severity::Low,
            active: true,
            last_run: Some(at("2024-01-15T06:00:00Z")),
        },
        ScanPolicy {
            id: 3,
            name: "Compliance Validation Scan".to_string(),
            description: "PCI DSS and SOX compliance verification".to_string(),
            targets: strings(&["payment.company.com", "db-server.local"]),
            schedule: "Monthly".to_string(),
            severity_threshold: Severity::Critical,
            active: false,
            last_run: Some(at("2024-01-01T12:00:00Z")),
        },
    ]
}

pub struct IntegrationHub {
    integrations: Collection<Integration>,
}

impl IntegrationHub {
    pub fn load_or(
        store: Arc<dyn KeyValueStore>,
        defaults: Vec<Integration>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            integrations: Collection::load_or(store, INTEGRATIONS_KEY, defaults)?,
        })
    }

    pub fn list(&self) -> Vec<Integration> {
        self.integrations.list()
    }

    pub fn get(&self, id: u64) -> Option<Integration> {
        self.integrations.find(|i| i.id == id)
    }

    /// Connected <-> disconnected; returns the new status.
    pub fn toggle_connection(&self, id: u64) -> Result<Option<IntegrationStatus>, StoreError> {
        self.integrations.update(
            |i| i.id == id,
            |integration| {
                integration.status = integration.status.toggled();
                integration.status
            },
        )
    }

    /// Simulated connection test.
    ///
    /// Succeeds unless the draw lands in [`INTEGRATION_TEST_FAILURE_RATE`].
    /// A success stamps `last_sync` with `now`; a failure clears it.
    /// `Ok(None)` for an unknown id.
    pub fn test(
        &self,
        id: u64,
        rng: &mut impl Rng,
        now: DateTime<Utc>,
    ) -> Result<Option<bool>, StoreError> {
        let ok = rng.gen_bool(1.0 - INTEGRATION_TEST_FAILURE_RATE);
        let outcome = self.integrations.update(
            |i| i.id == id,
            |integration| {
                integration.config.last_sync = ok.then_some(now);
                ok
            },
        )?;
        match outcome {
            Some(true) => info!(id, "integration test succeeded"),
            Some(false) => warn!(id, "integration test failed"),
            None => {}
        }
        Ok(outcome)
    }

    pub fn remove(&self, id: u64, prompt: &dyn ConfirmationPrompt) -> Result<bool, StoreError> {
        self.integrations
            .remove_confirmed(|i| i.id == id, &format!("Remove integration #{id}?"), prompt)
    }
}

pub fn demo_integrations() -> Vec<Integration> {
    let integration = |id: u64,
                       name: &str,
                       category: &str,
                       status: IntegrationStatus,
                       description: &str| Integration {
        id,
        name: name.to_string(),
        category: category.to_string(),
        status,
        description: description.to_string(),
        config: IntegrationConfig::default(),
    };
    let endpoint = |url: &str, last_sync: Option<&str>| IntegrationConfig {
        endpoint: Some(url.to_string()),
        channel: None,
        last_sync: last_sync.map(at),
    };

    vec![
        Integration {
            config: endpoint("https://splunk.company.com", Some("2024-01-15T14:30:00Z")),
            ..integration(
                1,
                "Splunk SIEM",
                "SIEM",
                IntegrationStatus::Connected,
                "Security information and event management",
            )
        },
        Integration {
            config: endpoint("https://sentinel.azure.com", None),
            ..integration(
                2,
                "Microsoft Sentinel",
                "SIEM",
                IntegrationStatus::Disconnected,
                "Cloud-native SIEM and SOAR solution",
            )
        },
        Integration {
            config: endpoint("https://company.atlassian.net", Some("2024-01-15T13:15:00Z")),
            ..integration(
                3,
                "Jira Service Management",
                "Ticketing",
                IntegrationStatus::Connected,
                "Incident and vulnerability tracking",
            )
        },
        Integration {
            config: IntegrationConfig {
                endpoint: None,
                channel: Some("#security-alerts".to_string()),
                last_sync: Some(at("2024-01-15T14:32:00Z")),
            },
            ..integration(
                4,
                "Slack",
                "Communication",
                IntegrationStatus::Connected,
                "Security team notifications and alerts",
            )
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{AlwaysConfirm, MemoryStore, NeverConfirm};
    use rand::SeedableRng;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;

    fn store() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn policy_toggle_and_run_are_persisted() {
        let store = store();
        let book = PolicyBook::load_or(Arc::clone(&store), demo_policies()).unwrap();
        let now = at("2024-02-01T08:00:00Z");

        assert_eq!(book.toggle_active(3).unwrap(), Some(true));
        assert_eq!(book.run_now(3, now).unwrap().and_then(|p| p.last_run), Some(now));
        assert_eq!(book.toggle_active(99).unwrap(), None);
        assert_eq!(book.run_now(99, now).unwrap(), None);

        let reloaded = PolicyBook::load_or(store, Vec::new()).unwrap();
        let policy = reloaded.get(3).unwrap();
        assert!(policy.active);
        assert_eq!(policy.last_run, Some(now));
    }

    #[test]
    fn policy_edit_replaces_fields() {
        let book = PolicyBook::load_or(store(), demo_policies()).unwrap();
        let mut edited = book.get(2).unwrap();
        edited.schedule = "Hourly".to_string();
        edited.severity_threshold = Severity::High;

        assert!(book.save(edited.clone()).unwrap());
        assert_eq!(book.get(2), Some(edited));

        let mut unknown = demo_policies().remove(0);
        unknown.id = 42;
        assert!(!book.save(unknown).unwrap());
        assert_eq!(book.list().len(), 3);
    }

    #[test]
    fn policy_remove_requires_confirmation() {
        let book = PolicyBook::load_or(store(), demo_policies()).unwrap();

        assert!(!book.remove(1, &NeverConfirm).unwrap());
        assert!(book.remove(1, &AlwaysConfirm).unwrap());
        assert!(book.get(1).is_none());
        assert!(!book.remove(1, &AlwaysConfirm).unwrap());
    }

    #[test]
    fn integration_toggle_flips_status() {
        let store = store();
        let hub = IntegrationHub::load_or(Arc::clone(&store), demo_integrations()).unwrap();

        assert_eq!(hub.toggle_connection(2).unwrap(), Some(IntegrationStatus::Connected));
        assert_eq!(hub.toggle_connection(2).unwrap(), Some(IntegrationStatus::Disconnected));
        assert_eq!(hub.toggle_connection(1).unwrap(), Some(IntegrationStatus::Disconnected));

        let reloaded = IntegrationHub::load_or(store, Vec::new()).unwrap();
        assert_eq!(reloaded.get(1).unwrap().status, IntegrationStatus::Disconnected);
    }

    #[test]
    fn integration_test_stamps_or_clears_last_sync() {
        let hub = IntegrationHub::load_or(store(), demo_integrations()).unwrap();
        let now = at("2024-02-01T08:00:00Z");

        // A zero draw always passes, an all-ones draw always fails.
        let mut pass = StepRng::new(0, 0);
        let mut fail = StepRng::new(u64::MAX, 0);

        assert_eq!(hub.test(2, &mut pass, now).unwrap(), Some(true));
        assert_eq!(hub.get(2).unwrap().config.last_sync, Some(now));

        assert_eq!(hub.test(1, &mut fail, now).unwrap(), Some(false));
        assert_eq!(hub.get(1).unwrap().config.last_sync, None);

        assert_eq!(hub.test(99, &mut pass, now).unwrap(), None);
    }

    #[test]
    fn integration_tests_mostly_succeed() {
        let hub = IntegrationHub::load_or(store(), demo_integrations()).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let now = at("2024-02-01T08:00:00Z");

        let passed = (0..200)
            .filter(|_| hub.test(3, &mut rng, now).unwrap() == Some(true))
            .count();
        assert!((140..=195).contains(&passed), "passed {passed} of 200");
    }

    #[test]
    fn integration_remove_requires_confirmation() {
        let hub = IntegrationHub::load_or(store(), demo_integrations()).unwrap();

        assert!(!hub.remove(4, &NeverConfirm).unwrap());
        assert!(hub.remove(4, &AlwaysConfirm).unwrap());
        assert_eq!(hub.list().len(), 3);
    }
}
