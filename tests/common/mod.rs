//! Shared helpers for integration tests

#![allow(dead_code)]

pub mod scripted_transport;

use serde_json::json;
use tenant_provisioning::progress::StepId;
use tenant_provisioning::{CreationId, JobState, JobStatus, PollingConfig, TenantAccess};

pub fn running(id: &str, step: &str) -> JobStatus {
    JobStatus {
        id: CreationId::new(id),
        status: JobState::Running,
        current_step: Some(StepId::new(step)),
        message: None,
        result: None,
        slug: None,
    }
}

pub fn started(id: &str) -> JobStatus {
    JobStatus {
        id: CreationId::new(id),
        status: JobState::Started,
        current_step: None,
        message: None,
        result: None,
        slug: None,
    }
}

pub fn completed(id: &str, result: Option<TenantAccess>) -> JobStatus {
    JobStatus {
        id: CreationId::new(id),
        status: JobState::Completed,
        current_step: None,
        message: None,
        result,
        slug: Some("acme".to_string()),
    }
}

pub fn failed(id: &str, message: &str) -> JobStatus {
    JobStatus {
        id: CreationId::new(id),
        status: JobState::Failed,
        current_step: None,
        message: Some(message.to_string()),
        result: None,
        slug: None,
    }
}

pub fn tenant_access() -> TenantAccess {
    TenantAccess(json!({
        "url": "https://acme.example.com",
        "login_url": "https://acme.example.com/login",
        "slug": "acme"
    }))
}

/// Cadence and timeout used by the shorter controller tests
pub fn fast_polling() -> PollingConfig {
    PollingConfig {
        interval_ms: 100,
        timeout_ms: 1000,
    }
}
