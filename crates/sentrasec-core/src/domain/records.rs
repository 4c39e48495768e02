//! Mock domain records behind the console views.
//!
//! These are fixtures, not simulator state: the registry never reads them.
//! Completion hooks and operator commands mutate them through the collections
//! in `app::vault`, `app::evidence` and `app::settings`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    Cleartext,
    #[serde(rename = "NTLM")]
    Ntlm,
    Encrypted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    #[serde(rename = "very weak")]
    VeryWeak,
    Weak,
    Medium,
    Strong,
    Unknown,
}

/// A harvested credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub domain: String,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: CredentialKind,
    pub access_level: String,
    pub last_used: DateTime<Utc>,
    pub cracked: bool,
    pub strength: Strength,
    #[serde(default)]
    pub revealed: bool,
}

impl Credential {
    /// Case-insensitive match over username, domain and source.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        [&self.username, &self.domain, &self.source]
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Rdp,
    Smb,
    Sql,
    Ssh,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [Protocol::Rdp, Protocol::Smb, Protocol::Sql, Protocol::Ssh];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    /// Passive capture; the session keeps running.
    Monitoring,
    Paused,
    Terminated,
}

impl SessionStatus {
    /// Whether the session's elapsed timer is running.
    pub fn is_live(self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Monitoring)
    }
}

/// A hijacked session as shown in the sessions table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HijackedSession {
    pub id: String,
    pub target: String,
    pub user: String,
    pub protocol: Protocol,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_activity: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    Screenshot,
    Document,
    Video,
    Archive,
}

/// A piece of collected evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    /// Human-readable, e.g. `2.4 MB`.
    pub size: String,
    pub hash: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EvidenceItem {
    /// Plain-text export offered by the evidence download action.
    pub fn export_text(&self) -> String {
        format!(
            "Evidence: {}\nSource: {}\nTimestamp: {}\nHash: {}\n\nDescription:\n{}",
            self.title,
            self.source,
            self.timestamp.to_rfc3339(),
            self.hash,
            self.description
        )
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A scheduled scan policy from the settings view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPolicy {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub targets: Vec<String>,
    pub schedule: String,
    pub severity_threshold: Severity,
    pub active: bool,
    pub last_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    Connected,
    Disconnected,
}

impl IntegrationStatus {
    pub fn toggled(self) -> Self {
        match self {
            IntegrationStatus::Connected => IntegrationStatus::Disconnected,
            IntegrationStatus::Disconnected => IntegrationStatus::Connected,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Cleared by a failed connection test.
    pub last_sync: Option<DateTime<Utc>>,
}

/// A third-party integration (SIEM, ticketing, chat).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub category: String,
    pub status: IntegrationStatus,
    pub description: String,
    pub config: IntegrationConfig,
}
