use crate::constants::jobs::{
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS, STATUS_FAILED, STATUS_SUCCEEDED,
};
use crate::constants::platform::{JOB_ID_PARAM, JOB_STATUS_COMMAND};
use crate::errors::MoldError;
use crate::services::client::MoldClient;
use crate::services::logger::Logger;
use crate::utils::params::FlatParams;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(STATUS_SUCCEEDED) => JobStatus::Succeeded,
            Some(STATUS_FAILED) => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AsyncJobHandle {
    pub job_id: String,
    pub status: JobStatus,
    pub raw_result: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

fn read_millis(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(num) => num
            .as_u64()
            .or_else(|| num.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64),
        _ => None,
    }
}

impl PollOptions {
    /// Accepts numbers or numeric strings. Missing, unparsable or zero values
    /// fall back to the defaults.
    pub fn from_values(timeout: Option<&Value>, interval: Option<&Value>) -> Self {
        let defaults = Self::default();
        Self {
            timeout_ms: read_millis(timeout)
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.timeout_ms),
            interval_ms: read_millis(interval)
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.interval_ms),
        }
    }
}

/// Shared cancellation flag. Clones observe the same signal.
#[derive(Clone)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// True when both handles observe the same signal.
    pub fn same_channel(&self, other: &CancelSignal) -> bool {
        Arc::ptr_eq(&self.sender, &other.sender)
    }

    pub fn is_canceled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn canceled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Envelope keys for the job-status response, tried in order. `None` is the
/// bare payload.
const STATUS_ENVELOPES: &[Option<&str>] = &[
    Some("queryasyncjobresultresponse"),
    Some("queryAsyncJobResultResponse"),
    Some("queryasyncjobresult"),
    None,
];

const JOB_ID_FIELDS: &[&str] = &["jobid", "jobId"];

fn envelope<'a>(payload: &'a Value, key: Option<&str>) -> Option<&'a Value> {
    match key {
        Some(key) => payload.get(key),
        None => Some(payload),
    }
}

fn read_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(num) => num.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Numeric `jobstatus` from the first envelope that carries one.
pub fn extract_job_status(payload: &Value) -> Option<i64> {
    STATUS_ENVELOPES
        .iter()
        .filter_map(|key| envelope(payload, *key))
        .find_map(|env| env.get("jobstatus").and_then(read_code))
}

fn read_job_id(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}

/// Job id from `<command>response` or the bare payload, either casing.
pub fn extract_job_id(command: &str, payload: &Value) -> Option<String> {
    let command_envelope = format!("{}response", command.to_lowercase());
    let found = [Some(command_envelope.as_str()), None]
        .into_iter()
        .filter_map(|key| envelope(payload, key))
        .find_map(|env| {
            JOB_ID_FIELDS
                .iter()
                .find_map(|field| env.get(*field).and_then(read_job_id))
        });
    found
}

#[derive(Default)]
struct WaitEntry {
    signal: CancelSignal,
    waiters: usize,
}

type WaitMap = Arc<Mutex<HashMap<String, WaitEntry>>>;

/// One tracked waiter. Dropping it releases the waiter slot; the entry goes
/// away with the last waiter unless `cancel` already removed it.
struct WaitRegistration {
    waits: WaitMap,
    job_id: String,
    signal: CancelSignal,
}

impl Drop for WaitRegistration {
    fn drop(&mut self) {
        let mut guard = self.waits.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = guard.get_mut(&self.job_id) else {
            return;
        };
        // A newer entry (after a cancel) is not ours to release.
        if !entry.signal.same_channel(&self.signal) {
            return;
        }
        entry.waiters = entry.waiters.saturating_sub(1);
        if entry.waiters == 0 {
            guard.remove(&self.job_id);
        }
    }
}

#[derive(Clone)]
pub struct JobPoller {
    logger: Logger,
    client: MoldClient,
    waits: WaitMap,
}

impl JobPoller {
    pub fn new(logger: Logger, client: MoldClient) -> Self {
        Self {
            logger: logger.child("jobs"),
            client,
            waits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn poll_once(&self, job_id: &str) -> Result<Value, MoldError> {
        let mut params = FlatParams::new();
        params.insert(JOB_ID_PARAM.to_string(), job_id.to_string());
        self.client.call_flat(JOB_STATUS_COMMAND, &params).await
    }

    /// Polls until status 1 or 2, the timeout, or cancellation. No lock is
    /// held while waiting.
    pub async fn wait(
        &self,
        job_id: &str,
        options: PollOptions,
        cancel: &CancelSignal,
    ) -> Result<AsyncJobHandle, MoldError> {
        let canceled = || MoldError::JobCanceled {
            job_id: job_id.to_string(),
        };
        let started = Instant::now();
        let mut attempts: u64 = 0;
        self.logger.debug(
            "waiting for job",
            Some(&serde_json::json!({
                "job_id": job_id,
                "interval_ms": options.interval_ms,
                "timeout_ms": options.timeout_ms,
            })),
        );

        loop {
            if cancel.is_canceled() {
                return Err(canceled());
            }
            let response = tokio::select! {
                biased;
                _ = cancel.canceled() => return Err(canceled()),
                response = self.poll_once(job_id) => response?,
            };
            attempts += 1;

            let status = JobStatus::from_code(extract_job_status(&response));
            if status.is_terminal() {
                self.logger.info(
                    "job finished",
                    Some(&serde_json::json!({
                        "job_id": job_id,
                        "status": status,
                        "attempts": attempts,
                        "elapsed_ms": started.elapsed().as_millis() as u64,
                    })),
                );
                return Ok(AsyncJobHandle {
                    job_id: job_id.to_string(),
                    status,
                    raw_result: response,
                });
            }

            if started.elapsed() > Duration::from_millis(options.timeout_ms) {
                self.logger.warn(
                    "job wait timed out",
                    Some(&serde_json::json!({"job_id": job_id, "attempts": attempts})),
                );
                return Err(MoldError::JobTimeout {
                    job_id: job_id.to_string(),
                    timeout_ms: options.timeout_ms,
                });
            }

            tokio::select! {
                biased;
                _ = cancel.canceled() => return Err(canceled()),
                _ = tokio::time::sleep(Duration::from_millis(options.interval_ms)) => {}
            }
        }
    }

    fn register_wait(&self, job_id: &str) -> WaitRegistration {
        let mut guard = self.waits.lock().unwrap_or_else(|e| e.into_inner());
        let entry = guard.entry(job_id.to_string()).or_default();
        entry.waiters += 1;
        WaitRegistration {
            waits: Arc::clone(&self.waits),
            job_id: job_id.to_string(),
            signal: entry.signal.clone(),
        }
    }

    /// `wait` registered under the job id so that [`JobPoller::cancel`] can
    /// abort it from another call. The registration is released even when the
    /// future is dropped mid-wait.
    pub async fn wait_tracked(
        &self,
        job_id: &str,
        options: PollOptions,
    ) -> Result<AsyncJobHandle, MoldError> {
        let registration = self.register_wait(job_id);
        self.wait(job_id, options, &registration.signal).await
    }

    /// Cancels every in-flight tracked wait for `job_id` and forgets them, so a
    /// later wait on the same id starts with a fresh signal. Returns false when
    /// nothing was waiting.
    pub fn cancel(&self, job_id: &str) -> bool {
        let removed = self
            .waits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(job_id);
        match removed {
            Some(entry) => {
                entry.signal.cancel();
                self.logger
                    .info("job wait canceled", Some(&serde_json::json!({"job_id": job_id})));
                true
            }
            None => false,
        }
    }

    pub fn active_waits(&self) -> Vec<String> {
        let guard = self.waits.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = guard.keys().cloned().collect();
        ids.sort();
        ids
    }
}
