//! # Wire Types
//!
//! Request and response payloads exchanged with the signup endpoints.
//! All server-sent types are read-only inputs to the tracker.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::progress::steps::StepId;

/// Opaque identifier of a provisioning job.
///
/// The server may send it as a JSON string or a number; both are kept as
/// their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CreationId(String);

impl CreationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CreationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CreationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for CreationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CreationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Text(text) if text.trim().is_empty() => {
                Err(serde::de::Error::custom("creation id must not be empty"))
            }
            RawId::Text(text) => Ok(Self(text)),
            RawId::Number(number) => Ok(Self(number.to_string())),
        }
    }
}

/// Server-side lifecycle of a provisioning job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Started,
    Running,
    Completed,
    Failed,
}

impl JobState {
    /// Check if the job will not change state again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Final tenant access information returned once provisioning completes.
///
/// The payload shape is owned by the server, so it is kept as JSON with
/// accessors for the fields the CLI knows how to display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantAccess(pub Value);

impl TenantAccess {
    fn string_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn url(&self) -> Option<&str> {
        self.string_field("url")
            .or_else(|| self.string_field("tenant_url"))
    }

    pub fn domain(&self) -> Option<&str> {
        self.string_field("domain")
    }

    pub fn login_url(&self) -> Option<&str> {
        self.string_field("login_url")
    }

    pub fn slug(&self) -> Option<&str> {
        self.string_field("slug")
    }
}

/// Status of a provisioning job as reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: CreationId,
    pub status: JobState,
    #[serde(default)]
    pub current_step: Option<StepId>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<TenantAccess>,
    #[serde(default)]
    pub slug: Option<String>,
}

impl JobStatus {
    /// The step to feed into the progress mapper, if the job is running
    pub fn reported_step(&self) -> Option<&StepId> {
        match self.status {
            JobState::Running => self.current_step.as_ref(),
            _ => None,
        }
    }
}

/// Body of `POST /signup/start-creation`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartCreationResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub creation_id: Option<CreationId>,
    #[serde(default)]
    pub redirect: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_success() -> bool {
    true
}

/// Body of `GET /signup/creation-status/{creation_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreationStatusResponse {
    pub success: bool,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `GET /api/tenant-creation-result/{creation_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreationResultResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Option<TenantAccess>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_creation_id_accepts_string_and_number() {
        let from_text: CreationId = serde_json::from_value(json!("job-42")).unwrap();
        let from_number: CreationId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(from_text.as_str(), "job-42");
        assert_eq!(from_number.as_str(), "42");
    }

    #[test]
    fn test_creation_id_rejects_blank() {
        assert!(serde_json::from_value::<CreationId>(json!("  ")).is_err());
    }

    #[test]
    fn test_job_status_parses_running_payload() {
        let status: JobStatus = serde_json::from_value(json!({
            "id": 7,
            "status": "running",
            "current_step": "running_migrations"
        }))
        .unwrap();

        assert_eq!(status.status, JobState::Running);
        assert_eq!(
            status.reported_step().map(StepId::as_str),
            Some("running_migrations")
        );
        assert!(status.result.is_none());
    }

    #[test]
    fn test_reported_step_ignored_unless_running() {
        let status: JobStatus = serde_json::from_value(json!({
            "id": "abc",
            "status": "started",
            "current_step": "validating"
        }))
        .unwrap();
        assert!(status.reported_step().is_none());
    }

    #[test]
    fn test_tenant_access_accessors() {
        let access = TenantAccess(json!({
            "tenant_url": "https://acme.example.com",
            "login_url": "https://acme.example.com/login",
            "slug": "acme"
        }));
        assert_eq!(access.url(), Some("https://acme.example.com"));
        assert_eq!(access.login_url(), Some("https://acme.example.com/login"));
        assert_eq!(access.slug(), Some("acme"));
        assert!(access.domain().is_none());
    }

    #[test]
    fn test_unknown_job_state_is_rejected() {
        let parsed = serde_json::from_value::<JobStatus>(json!({
            "id": "abc",
            "status": "paused"
        }));
        assert!(parsed.is_err());
    }
}
