//! Scripted SignupTransport for driving the progress controller in tests
//!
//! Responses are consumed in order; every call is counted so tests can assert
//! how many requests the controller issued.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tenant_provisioning::{
    ClientError, ClientResult, CreationId, JobStatus, SignupTransport, TenantAccess,
};

struct Scripted<T> {
    delay: Duration,
    response: ClientResult<T>,
}

/// Transport that replays scripted responses with optional delays
#[derive(Default)]
pub struct ScriptedTransport {
    starts: Mutex<VecDeque<Scripted<CreationId>>>,
    statuses: Mutex<VecDeque<Scripted<JobStatus>>>,
    results: Mutex<VecDeque<Scripted<TenantAccess>>>,
    /// Returned once the status script is exhausted
    fallback_status: Mutex<Option<JobStatus>>,
    start_calls: AtomicUsize,
    status_calls: AtomicUsize,
    result_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_with(self, id: &str) -> Self {
        self.start_after(Duration::ZERO, Ok(CreationId::new(id)))
    }

    pub fn start_after(self, delay: Duration, response: ClientResult<CreationId>) -> Self {
        self.starts
            .lock()
            .unwrap()
            .push_back(Scripted { delay, response });
        self
    }

    pub fn status(self, status: JobStatus) -> Self {
        self.status_after(Duration::ZERO, Ok(status))
    }

    pub fn status_error(self, error: ClientError) -> Self {
        self.status_after(Duration::ZERO, Err(error))
    }

    pub fn status_after(self, delay: Duration, response: ClientResult<JobStatus>) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .push_back(Scripted { delay, response });
        self
    }

    pub fn then_forever(self, status: JobStatus) -> Self {
        *self.fallback_status.lock().unwrap() = Some(status);
        self
    }

    pub fn result(self, response: ClientResult<TenantAccess>) -> Self {
        self.results.lock().unwrap().push_back(Scripted {
            delay: Duration::ZERO,
            response,
        });
        self
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn result_calls(&self) -> usize {
        self.result_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn replay<T>(&self, next: Option<Scripted<T>>, missing: &str) -> ClientResult<T> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let response = match next {
            Some(scripted) => {
                if !scripted.delay.is_zero() {
                    tokio::time::sleep(scripted.delay).await;
                }
                scripted.response
            }
            None => Err(ClientError::server(None, format!("{} script exhausted", missing))),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

#[async_trait]
impl SignupTransport for ScriptedTransport {
    fn transport_name(&self) -> &'static str {
        "scripted"
    }

    async fn start_creation(&self) -> ClientResult<CreationId> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.starts.lock().unwrap().pop_front();
        self.replay(next, "start").await
    }

    async fn creation_status(&self, _creation_id: &CreationId) -> ClientResult<JobStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front().or_else(|| {
            self.fallback_status
                .lock()
                .unwrap()
                .clone()
                .map(|status| Scripted {
                    delay: Duration::ZERO,
                    response: Ok(status),
                })
        });
        self.replay(next, "status").await
    }

    async fn creation_result(&self, _creation_id: &CreationId) -> ClientResult<TenantAccess> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.results.lock().unwrap().pop_front();
        self.replay(next, "result").await
    }
}
