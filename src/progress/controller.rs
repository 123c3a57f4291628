//! # Progress Controller
//!
//! Async driver for [`ProgressTracker`]. A single tokio task owns the tracker
//! and multiplexes four inputs in one `select!` loop:
//!
//! - consumer commands (`start`, `track`, `retry`, `dispose`)
//! - completions of spawned requests, tagged with a session generation
//! - the poll delay, armed only after the previous response resolved
//! - the overall timeout deadline, armed on entry to `Polling`
//!
//! At most one request is in flight. Requests are spawned rather than
//! awaited inline so a timeout never aborts them; their late completions are
//! dropped because the generation or the tracker state no longer matches.
//! Time comes from the tokio clock, so tests can run on paused time.

use std::future::pending;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::steps::StepPlan;
use super::tracker::{ProgressSnapshot, ProgressTracker, TrackerAction, TrackerState};
use crate::config::PollingConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::SignupTransport;
use crate::types::{CreationId, JobStatus, TenantAccess};

#[derive(Debug)]
enum Command {
    Start,
    Track(CreationId),
    Retry,
    Dispose,
}

#[derive(Debug)]
enum Outcome {
    Started(ClientResult<CreationId>),
    Status(ClientResult<JobStatus>),
    Result(ClientResult<TenantAccess>),
}

#[derive(Debug)]
struct Completion {
    generation: u64,
    outcome: Outcome,
}

/// Builder and event loop for a tracked provisioning job
pub struct ProgressController {
    transport: Arc<dyn SignupTransport>,
    polling: PollingConfig,
    tracker: ProgressTracker,
}

impl std::fmt::Debug for ProgressController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressController")
            .field("transport", &self.transport.transport_name())
            .field("polling", &self.polling)
            .field("state", &self.tracker.state())
            .finish()
    }
}

impl ProgressController {
    pub fn new(transport: Arc<dyn SignupTransport>, polling: PollingConfig) -> Self {
        Self {
            transport,
            polling,
            tracker: ProgressTracker::new(StepPlan::provisioning()),
        }
    }

    /// Use a different fixed step order
    pub fn with_plan(mut self, plan: StepPlan) -> Self {
        self.tracker = ProgressTracker::new(plan);
        self
    }

    /// Base URL for the recovery link offered when the final result is lost
    pub fn with_recovery_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.tracker = self.tracker.with_recovery_base_url(base_url);
        self
    }

    /// Spawn the event loop on the current tokio runtime
    pub fn spawn(self) -> ProgressHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(self.tracker.snapshot());

        info!(
            transport = self.transport.transport_name(),
            interval_ms = self.polling.interval_ms,
            timeout_ms = self.polling.timeout_ms,
            "Spawning provisioning progress controller"
        );

        let event_loop = EventLoop {
            transport: self.transport,
            polling: self.polling,
            tracker: self.tracker,
            commands: command_rx,
            completion_tx,
            completions: completion_rx,
            snapshots: snapshot_tx,
            generation: 0,
            start_in_flight: false,
            status_in_flight: false,
            next_poll_at: None,
            deadline: None,
        };
        let task = tokio::spawn(event_loop.run());

        ProgressHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            task: Arc::new(task),
        }
    }
}

/// Consumer-side handle to a running controller.
///
/// Dropping every clone of the handle disposes the controller.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<ProgressSnapshot>,
    task: Arc<JoinHandle<()>>,
}

impl ProgressHandle {
    fn send(&self, command: Command) -> ClientResult<()> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::InvalidInput("progress controller has been disposed".into()))
    }

    /// Start a new provisioning job and track it
    pub fn start(&self) -> ClientResult<()> {
        self.send(Command::Start)
    }

    /// Track a job that was started elsewhere
    pub fn track(&self, creation_id: CreationId) -> ClientResult<()> {
        self.send(Command::Track(creation_id))
    }

    /// Reset and start a fresh job; only honored from `Failed` or `TimedOut`
    pub fn retry(&self) -> ClientResult<()> {
        self.send(Command::Retry)
    }

    /// Cancel pending timers and stop emitting snapshots
    pub fn dispose(&self) {
        // Already gone is fine
        let _ = self.commands.send(Command::Dispose);
    }

    /// Whether the event loop has exited
    pub fn is_disposed(&self) -> bool {
        self.task.is_finished()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until the tracked job settles in a terminal state
    pub async fn wait_for_terminal(&self) -> ClientResult<ProgressSnapshot> {
        let mut receiver = self.snapshots.clone();
        let snapshot = receiver
            .wait_for(ProgressSnapshot::is_settled)
            .await
            .map_err(|_| {
                ClientError::InvalidInput(
                    "progress controller was disposed before the job settled".into(),
                )
            })?;
        Ok(snapshot.clone())
    }
}

struct EventLoop {
    transport: Arc<dyn SignupTransport>,
    polling: PollingConfig,
    tracker: ProgressTracker,
    commands: mpsc::UnboundedReceiver<Command>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    snapshots: watch::Sender<ProgressSnapshot>,
    generation: u64,
    start_in_flight: bool,
    status_in_flight: bool,
    next_poll_at: Option<Instant>,
    deadline: Option<Instant>,
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            let next_poll_at = self.next_poll_at;
            let deadline = self.deadline;

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Dispose) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(completion) = self.completions.recv() => self.handle_completion(completion),
                () = sleep_until_opt(deadline) => self.handle_deadline(),
                () = sleep_until_opt(next_poll_at) => {
                    self.next_poll_at = None;
                    self.issue_status_request();
                }
            }
        }

        info!(
            state = %self.tracker.state(),
            creation_id = ?self.tracker.creation_id(),
            "Provisioning progress controller disposed"
        );
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.tracker.snapshot());
    }

    /// Drop timers and start a new session; older completions become stale
    fn new_session(&mut self) {
        self.generation += 1;
        self.start_in_flight = false;
        self.status_in_flight = false;
        self.next_poll_at = None;
        self.deadline = None;
        self.tracker.reset();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start => {
                if self.start_in_flight {
                    warn!("Ignoring start while a job-start request is outstanding");
                    return;
                }
                if self.tracker.state() != TrackerState::Idle {
                    warn!(state = %self.tracker.state(), "Ignoring start while a job is tracked");
                    return;
                }
                self.new_session();
                self.publish();
                self.issue_start_request();
            }
            Command::Track(creation_id) => {
                if self.start_in_flight {
                    warn!("Ignoring track while a job-start request is outstanding");
                    return;
                }
                if self.tracker.state() != TrackerState::Idle {
                    warn!(state = %self.tracker.state(), "Ignoring track while a job is tracked");
                    return;
                }
                self.new_session();
                self.begin_polling(creation_id);
            }
            Command::Retry => {
                if !self.tracker.state().can_retry() {
                    warn!(state = %self.tracker.state(), "Ignoring retry outside Failed/TimedOut");
                    return;
                }
                info!(
                    previous_creation_id = ?self.tracker.creation_id(),
                    "Retrying tenant provisioning"
                );
                self.new_session();
                self.publish();
                self.issue_start_request();
            }
            Command::Dispose => {}
        }
    }

    fn begin_polling(&mut self, creation_id: CreationId) {
        match self.tracker.begin(creation_id) {
            Ok(action) => {
                self.deadline = Some(Instant::now() + self.polling.timeout());
                self.apply_action(action);
            }
            Err(e) => self.tracker.fail(&e),
        }
        self.publish();
    }

    fn apply_action(&mut self, action: TrackerAction) {
        match action {
            TrackerAction::PollNow => self.issue_status_request(),
            TrackerAction::PollAfterInterval => {
                self.next_poll_at = Some(Instant::now() + self.polling.interval());
            }
            TrackerAction::FetchResult => {
                self.deadline = None;
                self.issue_result_request();
            }
            TrackerAction::Stop => {
                self.deadline = None;
                self.next_poll_at = None;
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        if completion.generation != self.generation {
            debug!(
                stale_generation = completion.generation,
                current_generation = self.generation,
                "Dropping completion from a previous session"
            );
            return;
        }

        match completion.outcome {
            Outcome::Started(outcome) => {
                self.start_in_flight = false;
                match outcome {
                    Ok(creation_id) => self.begin_polling(creation_id),
                    Err(e) => {
                        self.tracker.fail(&e);
                        self.publish();
                    }
                }
            }
            Outcome::Status(outcome) => {
                self.status_in_flight = false;
                if self.tracker.state() != TrackerState::Polling {
                    debug!(state = %self.tracker.state(), "Dropping late status response");
                    return;
                }
                match outcome {
                    Ok(status) => {
                        let action = self.tracker.apply_status(status);
                        self.apply_action(action);
                    }
                    Err(e) => {
                        self.tracker.fail(&e);
                        self.apply_action(TrackerAction::Stop);
                    }
                }
                self.publish();
            }
            Outcome::Result(outcome) => {
                self.tracker.apply_result(outcome);
                self.publish();
            }
        }
    }

    fn handle_deadline(&mut self) {
        self.deadline = None;
        if self.tracker.time_out() {
            // An in-flight request is left to finish; its response is dropped
            self.next_poll_at = None;
            self.publish();
        }
    }

    fn spawn_request<F>(&self, request: F)
    where
        F: std::future::Future<Output = Outcome> + Send + 'static,
    {
        let generation = self.generation;
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let outcome = request.await;
            // The loop may have been disposed; nothing to report to then
            let _ = completion_tx.send(Completion {
                generation,
                outcome,
            });
        });
    }

    fn issue_start_request(&mut self) {
        self.start_in_flight = true;
        debug!(generation = self.generation, "Requesting a new provisioning job");
        let transport = Arc::clone(&self.transport);
        self.spawn_request(async move { Outcome::Started(transport.start_creation().await) });
    }

    fn issue_status_request(&mut self) {
        if self.status_in_flight || self.tracker.state() != TrackerState::Polling {
            return;
        }
        let Some(creation_id) = self.tracker.creation_id().cloned() else {
            return;
        };
        self.status_in_flight = true;
        debug!(creation_id = %creation_id, "Polling creation status");
        let transport = Arc::clone(&self.transport);
        self.spawn_request(async move {
            Outcome::Status(transport.creation_status(&creation_id).await)
        });
    }

    fn issue_result_request(&mut self) {
        let Some(creation_id) = self.tracker.creation_id().cloned() else {
            return;
        };
        debug!(creation_id = %creation_id, "Fetching final result from fallback endpoint");
        let transport = Arc::clone(&self.transport);
        self.spawn_request(async move {
            Outcome::Result(transport.creation_result(&creation_id).await)
        });
    }
}
