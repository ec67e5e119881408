//! Worker loop: claim, dispatch, acknowledge or retry.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, info_span, warn};

use gympoint_core::{ClaimToken, JobError, JobId};

use super::registry::JobRegistry;
use super::types::{Job, RetryOutcome};
use crate::job_store::{JobStore, JobStoreError};

/// Shortest idle wait between polls of an empty queue.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Shortest wait after a store error.
const MIN_STORE_BACKOFF: Duration = Duration::from_millis(50);

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name prefix for threads and logs
    pub name: String,
    /// Number of worker threads
    pub workers: usize,
    /// How long to idle when no job is available
    pub poll_interval: Duration,
    /// Upper bound for the back-off applied while the store is unreachable
    pub max_store_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "job-worker".to_string(),
            workers: 1,
            poll_interval: Duration::from_millis(500),
            max_store_backoff: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Final state of one processing step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Handler succeeded; the job was removed from the store.
    Completed,
    /// Handler failed; the job is pending again from `run_at`.
    Retrying { run_at: DateTime<Utc> },
    /// Unknown type or attempts exhausted; the job is in the dead-letter queue.
    DeadLettered { reason: String },
    /// The claim expired and another worker took the job over before this
    /// one settled it; the result was discarded.
    ClaimLost,
}

/// Report of one claimed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedJob {
    pub job_id: JobId,
    pub job_type: String,
    pub attempt: u32,
    pub outcome: JobOutcome,
}

/// Runtime statistics shared by all threads of a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct WorkerStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_dead_lettered: u64,
    pub claims_lost: u64,
    pub store_errors: u64,
}

impl WorkerStats {
    fn record(&mut self, processed: &ProcessedJob) {
        self.jobs_processed += 1;
        match processed.outcome {
            JobOutcome::Completed => self.jobs_succeeded += 1,
            JobOutcome::Retrying { .. } => self.jobs_failed += 1,
            JobOutcome::DeadLettered { .. } => {
                self.jobs_failed += 1;
                self.jobs_dead_lettered += 1;
            }
            JobOutcome::ClaimLost => self.claims_lost += 1,
        }
    }
}

/// A single consumer of the queue store.
///
/// `process_next` runs one claim → dispatch → ack/retry cycle. Handler errors
/// and panics are absorbed into the job's outcome; only store errors escape.
pub struct JobWorker<S> {
    name: String,
    store: S,
    registry: Arc<JobRegistry>,
}

impl<S: JobStore> JobWorker<S> {
    pub fn new(name: impl Into<String>, store: S, registry: Arc<JobRegistry>) -> Self {
        Self {
            name: name.into(),
            store,
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Claim and process the next available job, if any.
    pub fn process_next(&self) -> Result<Option<ProcessedJob>, JobStoreError> {
        let Some(job) = self.store.claim_next(&self.name)? else {
            return Ok(None);
        };

        let span = info_span!(
            "job",
            worker = %self.name,
            job_id = %job.id,
            job_type = %job.job_type,
            attempt = job.attempts
        );
        let _enter = span.enter();
        debug!("claimed job");

        let outcome = self.dispatch(&job)?;
        Ok(Some(ProcessedJob {
            job_id: job.id,
            job_type: job.job_type,
            attempt: job.attempts,
            outcome,
        }))
    }

    /// Process jobs until none is available. Returns how many were handled.
    pub fn drain(&self) -> Result<usize, JobStoreError> {
        let mut count = 0;
        while self.process_next()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    fn dispatch(&self, job: &Job) -> Result<JobOutcome, JobStoreError> {
        let Some(token) = job.claim_token() else {
            warn!("claimed job carries no claim token; dropping");
            return Ok(JobOutcome::ClaimLost);
        };

        match self.run_and_settle(job, token) {
            Err(e) if e.is_claim_lost() => {
                warn!(error = %e, "claim lost before settling; result dropped");
                Ok(JobOutcome::ClaimLost)
            }
            settled => settled,
        }
    }

    fn run_and_settle(&self, job: &Job, token: ClaimToken) -> Result<JobOutcome, JobStoreError> {
        let handler = match self.registry.resolve(&job.job_type) {
            Ok(handler) => handler,
            Err(err) => {
                let reason = err.to_string();
                warn!(error = %reason, "no handler for job; dead-lettering");
                self.store.dead_letter(job.id, token, &reason)?;
                return Ok(JobOutcome::DeadLettered { reason });
            }
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&job.payload)));

        let error = match result {
            Ok(Ok(())) => {
                self.store.ack(job.id, token)?;
                debug!("job completed");
                return Ok(JobOutcome::Completed);
            }
            Ok(Err(e)) => JobError::handler_failed(format!("{e:#}")),
            Err(panic) => JobError::handler_failed(format!("panicked: {}", panic_message(&*panic))),
        };

        let message = error.to_string();
        match self.store.retry(job.id, token, &message)? {
            RetryOutcome::Rescheduled { run_at } => {
                warn!(error = %message, %run_at, "job failed; rescheduled");
                Ok(JobOutcome::Retrying { run_at })
            }
            RetryOutcome::DeadLettered => {
                warn!(error = %message, "job failed on final attempt; dead-lettered");
                Ok(JobOutcome::DeadLettered { reason: message })
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

/// Handle to control a running worker pool.
#[derive(Debug)]
pub struct WorkerPoolHandle {
    shutdown: Vec<mpsc::Sender<()>>,
    joins: Vec<thread::JoinHandle<()>>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerPoolHandle {
    /// Request graceful shutdown and wait for all workers to stop.
    ///
    /// A worker finishes the job it is running; unclaimed jobs stay queued.
    /// Returns the final statistics.
    pub fn shutdown(self) -> WorkerStats {
        for tx in &self.shutdown {
            let _ = tx.send(());
        }
        for join in self.joins {
            let _ = join.join();
        }
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get current pool statistics.
    pub fn stats(&self) -> WorkerStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn worker_count(&self) -> usize {
        self.joins.len()
    }
}

/// A fixed set of worker threads sharing one store and one registry.
///
/// Workers coordinate only through the store's claim operation.
pub struct WorkerPool;

impl WorkerPool {
    pub fn spawn<S>(store: S, registry: Arc<JobRegistry>, config: WorkerConfig) -> WorkerPoolHandle
    where
        S: JobStore + Clone + 'static,
    {
        let stats = Arc::new(Mutex::new(WorkerStats::default()));
        let mut shutdown = Vec::new();
        let mut joins = Vec::new();

        for index in 0..config.workers.max(1) {
            let (tx, rx) = mpsc::channel::<()>();
            let name = format!("{}-{}", config.name, index + 1);
            let worker = JobWorker::new(name.clone(), store.clone(), registry.clone());
            let config = config.clone();
            let stats = stats.clone();

            let join = thread::Builder::new()
                .name(name)
                .spawn(move || worker_loop(worker, config, rx, stats))
                .expect("failed to spawn job worker thread");

            shutdown.push(tx);
            joins.push(join);
        }

        WorkerPoolHandle {
            shutdown,
            joins,
            stats,
        }
    }
}

fn worker_loop<S: JobStore>(
    worker: JobWorker<S>,
    config: WorkerConfig,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<WorkerStats>>,
) {
    info!(worker = %worker.name(), "job worker started");
    let poll_interval = config.poll_interval.max(MIN_POLL_INTERVAL);
    let backoff_floor = poll_interval.max(MIN_STORE_BACKOFF);
    let backoff_cap = config.max_store_backoff.max(backoff_floor);
    let mut store_backoff = backoff_floor;

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let idle = match worker.process_next() {
            Ok(Some(processed)) => {
                store_backoff = backoff_floor;
                stats
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record(&processed);
                continue;
            }
            Ok(None) => {
                store_backoff = backoff_floor;
                poll_interval
            }
            Err(e) => {
                stats.lock().unwrap_or_else(PoisonError::into_inner).store_errors += 1;
                let e = JobError::from(e);
                error!(
                    worker = %worker.name(),
                    error = %e,
                    retry_in_ms = store_backoff.as_millis() as u64,
                    "queue store error; backing off"
                );
                let wait = store_backoff;
                store_backoff = next_store_backoff(store_backoff, backoff_cap);
                wait
            }
        };

        // Idle until the next poll, waking early on shutdown.
        match shutdown_rx.recv_timeout(idle) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
    }

    info!(worker = %worker.name(), "job worker stopped");
}

fn next_store_backoff(current: Duration, cap: Duration) -> Duration {
    current.saturating_mul(2).min(cap)
}
