use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use gympoint_core::{ClaimToken, JobId};

use super::r#trait::{JobStore, JobStoreError, QueueStats};
use crate::jobs::types::{DeadLetterEntry, Job, RetryOutcome, RetryPolicy, to_chrono};

/// Default claim visibility window.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Reason recorded when a crashed worker's claim expires on the final attempt.
pub const CLAIM_EXPIRED_REASON: &str = "claim expired after final attempt";

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    dead_letters: HashMap<JobId, DeadLetterEntry>,
    completed: u64,
}

/// In-memory job store for tests/dev.
///
/// Everything lives behind one mutex, which is what makes `claim_next`
/// exclusive across worker threads. Nothing survives a process restart.
#[derive(Debug)]
pub struct InMemoryJobStore {
    inner: Mutex<Inner>,
    policy: RetryPolicy,
    visibility_timeout: Duration,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::with_policy(RetryPolicy::default(), DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_policy(policy: RetryPolicy, visibility_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            policy,
            visibility_timeout,
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn move_to_dead_letters(&mut self, job_id: JobId, reason: &str) -> Result<(), JobStoreError> {
        let mut job = self
            .jobs
            .remove(&job_id)
            .ok_or(JobStoreError::NotFound(job_id))?;
        job.mark_dead_lettered(reason, Utc::now());
        self.dead_letters
            .insert(job_id, DeadLetterEntry::new(job, reason.to_string()));
        Ok(())
    }

    /// The job, if `token` is the claim currently holding it.
    fn held_mut(&mut self, job_id: JobId, token: ClaimToken) -> Result<&mut Job, JobStoreError> {
        let job = self
            .jobs
            .get_mut(&job_id)
            .ok_or(JobStoreError::NotFound(job_id))?;
        if !job.is_held_by(token) {
            return Err(JobStoreError::StaleClaim(job_id));
        }
        Ok(job)
    }

    /// Oldest expired claim first, then the oldest due pending job.
    fn next_candidate(&self) -> Option<(JobId, bool)> {
        let now = Utc::now();

        let expired = self
            .jobs
            .values()
            .filter(|j| j.claim_expired(now))
            .min_by_key(|j| (j.run_at, j.id))
            .map(|j| (j.id, true));

        expired.or_else(|| {
            self.jobs
                .values()
                .filter(|j| j.is_ready(now))
                .min_by_key(|j| (j.run_at, j.enqueued_at, j.id))
                .map(|j| (j.id, false))
        })
    }
}

impl JobStore for InMemoryJobStore {
    fn append(&self, job: Job) -> Result<JobId, JobStoreError> {
        let mut inner = self.lock();
        if inner.jobs.contains_key(&job.id) || inner.dead_letters.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        inner.jobs.insert(id, job);
        Ok(id)
    }

    fn claim_next(&self, worker: &str) -> Result<Option<Job>, JobStoreError> {
        let mut inner = self.lock();

        while let Some((job_id, reclaimed)) = inner.next_candidate() {
            let attempts = inner.jobs.get(&job_id).map_or(0, |j| j.attempts);

            if reclaimed && !self.policy.should_retry(attempts) {
                warn!(job_id = %job_id, attempts, "claim expired on final attempt; dead-lettering");
                inner.move_to_dead_letters(job_id, CLAIM_EXPIRED_REASON)?;
                continue;
            }

            let visible_at = Utc::now() + to_chrono(self.visibility_timeout);
            if let Some(job) = inner.jobs.get_mut(&job_id) {
                if reclaimed {
                    warn!(job_id = %job_id, attempts, "reclaiming job whose claim expired");
                }
                job.claim(worker, visible_at);
                return Ok(Some(job.clone()));
            }
        }

        Ok(None)
    }

    fn ack(&self, job_id: JobId, token: ClaimToken) -> Result<(), JobStoreError> {
        let mut inner = self.lock();
        let held = match inner.held_mut(job_id, token) {
            Ok(_) => true,
            Err(JobStoreError::NotFound(_)) => false,
            Err(e) => return Err(e),
        };
        if held {
            inner.jobs.remove(&job_id);
            inner.completed += 1;
        }
        Ok(())
    }

    fn retry(
        &self,
        job_id: JobId,
        token: ClaimToken,
        error: &str,
    ) -> Result<RetryOutcome, JobStoreError> {
        let mut inner = self.lock();
        let job = inner.held_mut(job_id, token)?;

        let outcome = job.record_failure(error, &self.policy, Utc::now());
        if outcome == RetryOutcome::DeadLettered {
            if let Some(job) = inner.jobs.remove(&job_id) {
                inner
                    .dead_letters
                    .insert(job_id, DeadLetterEntry::new(job, error.to_string()));
            }
        }
        Ok(outcome)
    }

    fn dead_letter(
        &self,
        job_id: JobId,
        token: ClaimToken,
        reason: &str,
    ) -> Result<(), JobStoreError> {
        let mut inner = self.lock();
        inner.held_mut(job_id, token)?;
        inner.move_to_dead_letters(job_id, reason)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        Ok(self.lock().jobs.get(&job_id).cloned())
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        let inner = self.lock();
        let mut result: Vec<_> = inner.dead_letters.values().cloned().collect();

        result.sort_by_key(|e| (e.dead_lettered_at, e.job.id));
        result.truncate(limit);
        Ok(result)
    }

    fn requeue_dead_letter(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        let mut inner = self.lock();
        let entry = inner
            .dead_letters
            .remove(&job_id)
            .ok_or(JobStoreError::NotFound(job_id))?;

        let mut job = entry.job;
        job.requeue(Utc::now());
        inner.jobs.insert(job_id, job.clone());
        Ok(job)
    }

    fn delete_dead_letter(&self, job_id: JobId) -> Result<(), JobStoreError> {
        self.lock()
            .dead_letters
            .remove(&job_id)
            .map(|_| ())
            .ok_or(JobStoreError::NotFound(job_id))
    }

    fn stats(&self) -> Result<QueueStats, JobStoreError> {
        let inner = self.lock();
        let in_flight = inner.jobs.values().filter(|j| j.is_in_flight()).count();

        Ok(QueueStats {
            pending: inner.jobs.len() - in_flight,
            in_flight,
            completed: inner.completed,
            dead_lettered: inner.dead_letters.len(),
        })
    }
}
