//! Producer side: durable, fire-and-forget enqueue.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, error};

use gympoint_core::{JobError, JobId, JobResult};

use super::types::Job;
use crate::job_store::JobStore;

/// Enqueue handle used by request handlers.
///
/// `enqueue` returns as soon as the store has durably recorded the job. It
/// never waits for, or reports on, handler execution. The job type does not
/// need to be registered in this process.
#[derive(Debug, Clone)]
pub struct JobQueue<S> {
    store: S,
}

impl<S: JobStore> JobQueue<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Enqueue a job whose payload is any serializable value.
    ///
    /// Pass plain data only; the payload crosses a process boundary.
    pub fn enqueue<P>(&self, job_type: &str, payload: &P) -> JobResult<JobId>
    where
        P: Serialize + ?Sized,
    {
        let payload = serde_json::to_value(payload)
            .map_err(|e| JobError::enqueue_failed(format!("payload not serializable: {e}")))?;
        self.enqueue_value(job_type, payload)
    }

    /// Enqueue a job with an already-built JSON payload.
    pub fn enqueue_value(&self, job_type: &str, payload: JsonValue) -> JobResult<JobId> {
        self.append(Job::new(job_type, payload))
    }

    /// Enqueue a job that may not run before `delay` has passed.
    pub fn enqueue_delayed<P>(
        &self,
        job_type: &str,
        payload: &P,
        delay: Duration,
    ) -> JobResult<JobId>
    where
        P: Serialize + ?Sized,
    {
        let payload = serde_json::to_value(payload)
            .map_err(|e| JobError::enqueue_failed(format!("payload not serializable: {e}")))?;
        self.append(Job::new(job_type, payload).delayed(delay))
    }

    fn append(&self, job: Job) -> JobResult<JobId> {
        let job_type = job.job_type.clone();
        match self.store.append(job) {
            Ok(job_id) => {
                debug!(job_id = %job_id, job_type = %job_type, "job enqueued");
                Ok(job_id)
            }
            Err(e) => {
                error!(job_type = %job_type, error = %e, "failed to enqueue job");
                Err(JobError::enqueue_failed(e.to_string()))
            }
        }
    }
}
