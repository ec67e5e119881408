use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use gympoint_core::{ClaimToken, JobError, JobId};

use crate::jobs::types::{DeadLetterEntry, Job, RetryOutcome};

/// Durable, shared queue of pending and in-flight jobs.
///
/// Implementations must make `claim_next` exclusive: a job is handed to at
/// most one worker per claim window. A claim that is neither acknowledged nor
/// retried before its window expires makes the job claimable again.
///
/// `ack`, `retry` and `dead_letter` are fenced by the [`ClaimToken`] minted by
/// `claim_next`. Once a job has been reclaimed, calls carrying an older token
/// fail with [`JobStoreError::StaleClaim`] and leave the job untouched.
pub trait JobStore: Send + Sync {
    /// Durably append a new job. Returns only once the job is recorded.
    fn append(&self, job: Job) -> Result<JobId, JobStoreError>;

    /// Claim the next job that is due, counting one attempt.
    ///
    /// The returned job is `InFlight` and carries the claim's token.
    /// Returns `None` when nothing is available.
    fn claim_next(&self, worker: &str) -> Result<Option<Job>, JobStoreError>;

    /// Remove a successfully processed job. Acknowledging a job that is no
    /// longer in the store is a no-op.
    fn ack(&self, job_id: JobId, token: ClaimToken) -> Result<(), JobStoreError>;

    /// Record a failed attempt; reschedules or dead-letters per the store's
    /// retry policy.
    fn retry(
        &self,
        job_id: JobId,
        token: ClaimToken,
        error: &str,
    ) -> Result<RetryOutcome, JobStoreError>;

    /// Move a job to the dead-letter queue regardless of attempts left.
    fn dead_letter(
        &self,
        job_id: JobId,
        token: ClaimToken,
        reason: &str,
    ) -> Result<(), JobStoreError>;

    /// Get a live (pending or in-flight) job by ID.
    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// List dead-lettered jobs, oldest first.
    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError>;

    /// Move a dead-lettered job back to pending with a fresh set of attempts.
    fn requeue_dead_letter(&self, job_id: JobId) -> Result<Job, JobStoreError>;

    /// Drop a dead-lettered job for good.
    fn delete_dead_letter(&self, job_id: JobId) -> Result<(), JobStoreError>;

    fn stats(&self) -> Result<QueueStats, JobStoreError>;
}

/// Queue store error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    /// The caller's claim expired and the job was handed to another worker.
    #[error("claim on job {0} is no longer held")]
    StaleClaim(JobId),
    /// The backing medium could not be reached; callers may retry later.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl JobStoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, JobStoreError::Unavailable(_))
    }

    /// The job is no longer ours to settle: reclaimed by another worker, or
    /// already gone from the store.
    pub fn is_claim_lost(&self) -> bool {
        matches!(self, JobStoreError::StaleClaim(_) | JobStoreError::NotFound(_))
    }
}

/// Store errors seen by a consumer. Anything but an outage is reported as the
/// store being unusable as well; the worker loop treats both the same way.
impl From<JobStoreError> for JobError {
    fn from(e: JobStoreError) -> Self {
        match e {
            JobStoreError::Unavailable(msg) => JobError::store_unavailable(msg),
            other => JobError::store_unavailable(other.to_string()),
        }
    }
}

/// Queue statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
    pub completed: u64,
    pub dead_lettered: usize,
}

impl<S> JobStore for Arc<S>
where
    S: JobStore + ?Sized,
{
    fn append(&self, job: Job) -> Result<JobId, JobStoreError> {
        (**self).append(job)
    }

    fn claim_next(&self, worker: &str) -> Result<Option<Job>, JobStoreError> {
        (**self).claim_next(worker)
    }

    fn ack(&self, job_id: JobId, token: ClaimToken) -> Result<(), JobStoreError> {
        (**self).ack(job_id, token)
    }

    fn retry(
        &self,
        job_id: JobId,
        token: ClaimToken,
        error: &str,
    ) -> Result<RetryOutcome, JobStoreError> {
        (**self).retry(job_id, token, error)
    }

    fn dead_letter(
        &self,
        job_id: JobId,
        token: ClaimToken,
        reason: &str,
    ) -> Result<(), JobStoreError> {
        (**self).dead_letter(job_id, token, reason)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        (**self).get(job_id)
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        (**self).list_dead_letters(limit)
    }

    fn requeue_dead_letter(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        (**self).requeue_dead_letter(job_id)
    }

    fn delete_dead_letter(&self, job_id: JobId) -> Result<(), JobStoreError> {
        (**self).delete_dead_letter(job_id)
    }

    fn stats(&self) -> Result<QueueStats, JobStoreError> {
        (**self).stats()
    }
}
