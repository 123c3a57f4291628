//! # Progress Tracker State Machine
//!
//! Pure state machine behind the provisioning progress view. It performs no
//! I/O and owns no timers: the async driver in [`super::controller`] feeds it
//! responses and acts on the [`TrackerAction`] it returns.
//!
//! ```text
//! Idle -> Polling -> { Completed, Failed, TimedOut }
//! ```

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use super::steps::{StepDescriptor, StepPlan, StepStatusMap};
use crate::error::{ClientError, FailureKind};
use crate::logging::log_tracker_transition;
use crate::types::{CreationId, JobState, JobStatus, TenantAccess};

/// Lifecycle of a tracked provisioning job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    /// No job id yet (including while the job-start request is in flight)
    #[default]
    Idle,
    Polling,
    Completed,
    Failed,
    /// Gave up waiting; the job may still finish server-side
    TimedOut,
}

impl TrackerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }

    /// States from which a user-initiated retry is allowed
    pub fn can_retry(&self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Polling => write!(f, "polling"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// What the driver should do after the tracker consumed an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerAction {
    /// Issue a status request right away
    PollNow,
    /// Issue the next status request after the poll interval
    PollAfterInterval,
    /// Fetch the final result from the fallback endpoint
    FetchResult,
    /// Nothing further to schedule
    Stop,
}

const TIMED_OUT_MESSAGE: &str =
    "Tenant creation is taking longer than expected. It may still be running; check back shortly.";

/// Point-in-time view of tracker state for renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub state: TrackerState,
    pub creation_id: Option<CreationId>,
    pub steps: Vec<StepDescriptor>,
    pub message: Option<String>,
    pub failure: Option<FailureKind>,
    pub result: Option<TenantAccess>,
    /// Completed without an in-band result; the fallback fetch is running
    pub awaiting_result: bool,
    /// Set when the server reported a step outside the known order
    pub step_warning: Option<String>,
    pub recovery_url: Option<String>,
    pub polls: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressSnapshot {
    /// Whether the snapshot will not change without a retry
    pub fn is_settled(&self) -> bool {
        self.state.is_terminal() && !self.awaiting_result
    }

    /// Guidance for the user, distinguishing timeouts from failures
    pub fn guidance(&self) -> Option<&'static str> {
        match self.state {
            TrackerState::TimedOut => {
                Some("The job may still be running on the server. Check back before retrying.")
            }
            TrackerState::Failed => self.failure.map(|kind| kind.guidance()),
            _ => None,
        }
    }
}

/// State machine that mirrors a server-side provisioning job
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    plan: StepPlan,
    state: TrackerState,
    creation_id: Option<CreationId>,
    statuses: StepStatusMap,
    message: Option<String>,
    failure: Option<FailureKind>,
    result: Option<TenantAccess>,
    awaiting_result: bool,
    step_warning: Option<String>,
    slug: Option<String>,
    recovery_base_url: Option<String>,
    recovery_url: Option<String>,
    polls: u32,
    started_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl ProgressTracker {
    pub fn new(plan: StepPlan) -> Self {
        let statuses = plan.pending_statuses();
        Self {
            plan,
            state: TrackerState::Idle,
            creation_id: None,
            statuses,
            message: None,
            failure: None,
            result: None,
            awaiting_result: false,
            step_warning: None,
            slug: None,
            recovery_base_url: None,
            recovery_url: None,
            polls: 0,
            started_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Base URL used to build a recovery link when the final result is lost
    pub fn with_recovery_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.recovery_base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn creation_id(&self) -> Option<&CreationId> {
        self.creation_id.as_ref()
    }

    pub fn plan(&self) -> &StepPlan {
        &self.plan
    }

    pub fn statuses(&self) -> &StepStatusMap {
        &self.statuses
    }

    pub fn is_awaiting_result(&self) -> bool {
        self.awaiting_result
    }

    fn transition(&mut self, to: TrackerState, details: Option<&str>) {
        let from = self.state;
        self.state = to;
        self.updated_at = Utc::now();
        log_tracker_transition(from, to, self.creation_id.as_ref(), details);
    }

    /// Enter `Polling` for a freshly obtained job id
    pub fn begin(&mut self, creation_id: CreationId) -> Result<TrackerAction, ClientError> {
        if self.state != TrackerState::Idle {
            return Err(ClientError::InvalidInput(format!(
                "cannot begin tracking job {} while {}",
                creation_id, self.state
            )));
        }
        self.creation_id = Some(creation_id);
        self.started_at = Some(Utc::now());
        self.transition(TrackerState::Polling, None);
        Ok(TrackerAction::PollNow)
    }

    /// Consume one status response
    pub fn apply_status(&mut self, status: JobStatus) -> TrackerAction {
        if self.state != TrackerState::Polling {
            debug!(
                state = %self.state,
                job_state = %status.status,
                "Ignoring status response outside of polling"
            );
            return TrackerAction::Stop;
        }
        if self.creation_id.as_ref() != Some(&status.id) {
            warn!(
                expected = ?self.creation_id,
                received = %status.id,
                "Status response carries a different creation id"
            );
        }

        self.polls += 1;
        self.updated_at = Utc::now();
        if status.slug.is_some() {
            self.slug = status.slug.clone();
        }

        match status.status {
            JobState::Started | JobState::Running => {
                match self.plan.map_status(status.reported_step(), &self.statuses) {
                    Ok(next) => self.statuses = next,
                    Err(e) => {
                        warn!(step = %e.step, "Server reported a step outside the known order");
                        self.step_warning = Some(e.to_string());
                    }
                }
                TrackerAction::PollAfterInterval
            }
            JobState::Completed => {
                self.statuses = self.plan.completed_statuses();
                if let Some(slug) = status.result.as_ref().and_then(TenantAccess::slug) {
                    self.slug = Some(slug.to_string());
                }
                match status.result {
                    Some(result) => {
                        self.result = Some(result);
                        self.transition(TrackerState::Completed, None);
                        TrackerAction::Stop
                    }
                    None => {
                        self.awaiting_result = true;
                        self.transition(
                            TrackerState::Completed,
                            Some("result missing from status; fetching from fallback endpoint"),
                        );
                        TrackerAction::FetchResult
                    }
                }
            }
            JobState::Failed => {
                let message = status
                    .message
                    .unwrap_or_else(|| "Tenant creation failed".to_string());
                self.failure = Some(FailureKind::JobFailed);
                self.message = Some(message.clone());
                self.transition(TrackerState::Failed, Some(&message));
                TrackerAction::Stop
            }
        }
    }

    /// Consume the outcome of the fallback result fetch
    pub fn apply_result(&mut self, outcome: Result<TenantAccess, ClientError>) {
        if self.state != TrackerState::Completed || !self.awaiting_result {
            debug!(state = %self.state, "Ignoring result fetch outside of completion");
            return;
        }
        self.awaiting_result = false;
        self.updated_at = Utc::now();

        match outcome {
            Ok(result) => {
                if let Some(slug) = result.slug() {
                    self.slug = Some(slug.to_string());
                }
                self.result = Some(result);
            }
            Err(e) => {
                warn!(error = %e, "Fallback result fetch failed after completion");
                self.message = Some(format!(
                    "Your tenant was created but its access details could not be loaded: {}",
                    e
                ));
                self.recovery_url = self.build_recovery_url();
            }
        }
    }

    fn build_recovery_url(&self) -> Option<String> {
        let (Some(base), Some(slug)) = (&self.recovery_base_url, &self.slug) else {
            return None;
        };
        let mut url = match Url::parse(base) {
            Ok(url) => url,
            Err(e) => {
                warn!(base_url = %base, error = %e, "Cannot build recovery link from base URL");
                return None;
            }
        };
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(["signup", "complete"]);
        url.query_pairs_mut().clear().append_pair("slug", slug);
        Some(url.into())
    }

    /// Record a client-side failure (transport, auth, server or job-start)
    pub fn fail(&mut self, error: &ClientError) {
        if self.state.is_terminal() {
            debug!(state = %self.state, error = %error, "Ignoring failure in terminal state");
            return;
        }
        let kind = error.failure_kind();
        let message = match kind {
            FailureKind::Transport => format!("Network error while provisioning: {}", error),
            FailureKind::Auth => format!("Session expired or invalid: {}", error),
            FailureKind::Server => format!("Unexpected server response: {}", error),
            FailureKind::UnknownStep => format!("Unrecognized provisioning step: {}", error),
            FailureKind::JobFailed => error.to_string(),
        };
        self.failure = Some(kind);
        self.message = Some(message.clone());
        self.transition(TrackerState::Failed, Some(&message));
    }

    /// Force `TimedOut` if still polling; returns whether the state changed
    pub fn time_out(&mut self) -> bool {
        if self.state != TrackerState::Polling {
            return false;
        }
        self.message = Some(TIMED_OUT_MESSAGE.to_string());
        self.transition(TrackerState::TimedOut, None);
        true
    }

    /// Return to `Idle` with every step pending and all job data cleared
    pub fn reset(&mut self) {
        self.statuses = self.plan.pending_statuses();
        self.creation_id = None;
        self.message = None;
        self.failure = None;
        self.result = None;
        self.awaiting_result = false;
        self.step_warning = None;
        self.slug = None;
        self.recovery_url = None;
        self.polls = 0;
        self.started_at = None;
        if self.state != TrackerState::Idle {
            self.transition(TrackerState::Idle, Some("reset"));
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            state: self.state,
            creation_id: self.creation_id.clone(),
            steps: self.plan.describe(&self.statuses),
            message: self.message.clone(),
            failure: self.failure,
            result: self.result.clone(),
            awaiting_result: self.awaiting_result,
            step_warning: self.step_warning.clone(),
            recovery_url: self.recovery_url.clone(),
            polls: self.polls,
            started_at: self.started_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::steps::{StepId, StepStatus};
    use serde_json::json;

    fn running(id: &str, step: &str) -> JobStatus {
        JobStatus {
            id: CreationId::new(id),
            status: JobState::Running,
            current_step: Some(StepId::new(step)),
            message: None,
            result: None,
            slug: None,
        }
    }

    fn completed(id: &str, result: Option<TenantAccess>) -> JobStatus {
        JobStatus {
            id: CreationId::new(id),
            status: JobState::Completed,
            current_step: None,
            message: None,
            result,
            slug: Some("acme".to_string()),
        }
    }

    fn polling_tracker() -> ProgressTracker {
        let mut tracker = ProgressTracker::new(StepPlan::provisioning());
        assert_eq!(
            tracker.begin(CreationId::new("job-1")).unwrap(),
            TrackerAction::PollNow
        );
        tracker
    }

    fn status_of(snapshot: &ProgressSnapshot, id: &str) -> StepStatus {
        snapshot
            .steps
            .iter()
            .find(|s| s.id.as_str() == id)
            .map(|s| s.status)
            .unwrap()
    }

    #[test]
    fn test_begin_only_from_idle() {
        let mut tracker = polling_tracker();
        assert!(tracker.begin(CreationId::new("job-2")).is_err());
        assert_eq!(tracker.creation_id().unwrap().as_str(), "job-1");
    }

    #[test]
    fn test_running_updates_steps_and_keeps_polling() {
        let mut tracker = polling_tracker();
        let action = tracker.apply_status(running("job-1", "configuring_domain"));
        assert_eq!(action, TrackerAction::PollAfterInterval);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackerState::Polling);
        assert_eq!(status_of(&snapshot, "creating_database"), StepStatus::Completed);
        assert_eq!(status_of(&snapshot, "configuring_domain"), StepStatus::Processing);
        assert_eq!(status_of(&snapshot, "health_check"), StepStatus::Pending);
        assert_eq!(snapshot.polls, 1);
    }

    #[test]
    fn test_unknown_step_is_reported_without_stopping() {
        let mut tracker = polling_tracker();
        tracker.apply_status(running("job-1", "validating"));
        let action = tracker.apply_status(running("job-1", "warming_cache"));

        assert_eq!(action, TrackerAction::PollAfterInterval);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackerState::Polling);
        assert!(snapshot.step_warning.as_ref().unwrap().contains("warming_cache"));
        assert_eq!(status_of(&snapshot, "validating"), StepStatus::Processing);
    }

    #[test]
    fn test_completed_with_result_stops() {
        let mut tracker = polling_tracker();
        let access = TenantAccess(json!({"url": "https://acme.example.com"}));
        let action = tracker.apply_status(completed("job-1", Some(access.clone())));

        assert_eq!(action, TrackerAction::Stop);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackerState::Completed);
        assert_eq!(snapshot.result, Some(access));
        assert!(snapshot
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Completed));
        assert!(snapshot.is_settled());
    }

    #[test]
    fn test_completed_without_result_requests_fallback() {
        let mut tracker = polling_tracker();
        assert_eq!(
            tracker.apply_status(completed("job-1", None)),
            TrackerAction::FetchResult
        );
        assert!(tracker.is_awaiting_result());
        assert!(!tracker.snapshot().is_settled());

        let access = TenantAccess(json!({"url": "https://acme.example.com"}));
        tracker.apply_result(Ok(access.clone()));
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.result, Some(access));
        assert!(snapshot.is_settled());
    }

    #[test]
    fn test_failed_fallback_exposes_recovery_url() {
        let mut tracker = ProgressTracker::new(StepPlan::provisioning())
            .with_recovery_base_url("https://app.example.com/");
        tracker.begin(CreationId::new("job-1")).unwrap();
        tracker.apply_status(completed("job-1", None));
        tracker.apply_result(Err(ClientError::server(Some(404), "not found")));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackerState::Completed);
        assert!(snapshot.result.is_none());
        assert_eq!(
            snapshot.recovery_url.as_deref(),
            Some("https://app.example.com/signup/complete?slug=acme")
        );
        assert!(snapshot.message.unwrap().contains("could not be loaded"));
    }

    #[test]
    fn test_recovery_url_encodes_slug() {
        let mut tracker = ProgressTracker::new(StepPlan::provisioning())
            .with_recovery_base_url("https://app.example.com/portal");
        tracker.begin(CreationId::new("job-1")).unwrap();
        let mut status = completed("job-1", None);
        status.slug = Some("acme & co#1".to_string());
        tracker.apply_status(status);
        tracker.apply_result(Err(ClientError::server(Some(404), "not found")));

        assert_eq!(
            tracker.snapshot().recovery_url.as_deref(),
            Some("https://app.example.com/portal/signup/complete?slug=acme+%26+co%231")
        );
    }

    #[test]
    fn test_job_failure_stores_message() {
        let mut tracker = polling_tracker();
        let action = tracker.apply_status(JobStatus {
            id: CreationId::new("job-1"),
            status: JobState::Failed,
            current_step: None,
            message: Some("disk full".to_string()),
            result: None,
            slug: None,
        });

        assert_eq!(action, TrackerAction::Stop);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackerState::Failed);
        assert_eq!(snapshot.message.as_deref(), Some("disk full"));
        assert_eq!(snapshot.failure, Some(FailureKind::JobFailed));
    }

    #[test]
    fn test_client_errors_have_distinct_messages() {
        let cases = [
            (ClientError::Transport("refused".into()), FailureKind::Transport),
            (ClientError::auth(419, "token mismatch"), FailureKind::Auth),
            (ClientError::server(Some(502), "bad gateway"), FailureKind::Server),
        ];
        let mut messages = Vec::new();
        for (error, kind) in cases {
            let mut tracker = polling_tracker();
            tracker.fail(&error);
            let snapshot = tracker.snapshot();
            assert_eq!(snapshot.state, TrackerState::Failed);
            assert_eq!(snapshot.failure, Some(kind));
            messages.push(snapshot.message.unwrap());
        }
        messages.dedup();
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn test_time_out_only_while_polling() {
        let mut tracker = ProgressTracker::new(StepPlan::provisioning());
        assert!(!tracker.time_out());

        tracker.begin(CreationId::new("job-1")).unwrap();
        assert!(tracker.time_out());
        assert_eq!(tracker.state(), TrackerState::TimedOut);

        // Late responses after the timeout are ignored
        let action = tracker.apply_status(completed("job-1", None));
        assert_eq!(action, TrackerAction::Stop);
        assert_eq!(tracker.state(), TrackerState::TimedOut);
    }

    #[test]
    fn test_guidance_distinguishes_timeout_from_failure() {
        let mut timed_out = polling_tracker();
        timed_out.time_out();
        let mut failed = polling_tracker();
        failed.fail(&ClientError::JobFailed {
            message: "boom".into(),
        });

        let timeout_hint = timed_out.snapshot().guidance().unwrap();
        let failure_hint = failed.snapshot().guidance().unwrap();
        assert!(timeout_hint.contains("still be running"));
        assert!(failure_hint.contains("safe to retry"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut tracker = polling_tracker();
        tracker.apply_status(running("job-1", "seeding_data"));
        tracker.fail(&ClientError::Transport("reset by peer".into()));
        tracker.reset();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackerState::Idle);
        assert!(snapshot.creation_id.is_none());
        assert!(snapshot.message.is_none());
        assert!(snapshot.failure.is_none());
        assert!(snapshot.result.is_none());
        assert_eq!(snapshot.polls, 0);
        assert!(snapshot
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Pending));
    }
}
