//! Job descriptor and retry policy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use gympoint_core::{ClaimToken, JobId};

/// Maximum number of failed attempts kept in a job's history.
pub const MAX_HISTORY: usize = 10;

/// Where a job currently sits in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum JobStatus {
    /// Waiting to be claimed once `run_at` has passed.
    Pending,
    /// Claimed by a worker until `visible_at`; after that it may be reclaimed.
    InFlight {
        worker: String,
        visible_at: DateTime<Utc>,
        token: ClaimToken,
    },
    /// Terminal: moved to the dead-letter queue.
    DeadLettered,
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff: base * 2^(attempt - 1)
    #[default]
    Exponential,
    /// Linear backoff: base * attempt
    Linear,
}

impl std::str::FromStr for BackoffStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "exponential" => Ok(Self::Exponential),
            "linear" => Ok(Self::Linear),
            other => Err(format!(
                "unknown backoff strategy {other:?} (expected fixed, linear or exponential)"
            )),
        }
    }
}

/// Retry policy applied by the queue store when a handler fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of handler attempts a job gets before it is dead-lettered.
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
    /// Jitter factor (0.0-1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Exponential,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// A single attempt; the first failure dead-letters the job.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Create a policy with fixed delays.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
            jitter: 0.0,
        }
    }

    /// Create a policy with exponential backoff.
    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            strategy: BackoffStrategy::Exponential,
            jitter: 0.1,
        }
    }

    /// Delay before the next attempt, after `attempt` (1-indexed) failed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;

        let delay_ms = match self.strategy {
            BackoffStrategy::Fixed => base_ms,
            BackoffStrategy::Exponential => {
                let exp = 2_f64.powi(attempt.saturating_sub(1).min(62) as i32);
                (base_ms * exp).min(max_ms)
            }
            BackoffStrategy::Linear => (base_ms * attempt as f64).min(max_ms),
        };

        // Deterministic spread so retries of jobs failing together drift apart.
        let jitter_range = delay_ms * self.jitter.clamp(0.0, 1.0);
        let jitter = if jitter_range > 0.0 {
            let pseudo_random = ((attempt as f64 * 17.0) % 100.0) / 100.0;
            jitter_range * (pseudo_random - 0.5) * 2.0
        } else {
            0.0
        };

        Duration::from_millis((delay_ms + jitter).max(0.0) as u64)
    }

    /// Whether a job that has used `attempts` attempts may run again.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// One failed execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub worker: Option<String>,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// What the store decided after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Back to pending; claimable again from `run_at`.
    Rescheduled { run_at: DateTime<Utc> },
    /// Attempts exhausted; the job is in the dead-letter queue.
    DeadLettered,
}

/// A queued unit of deferred work.
///
/// `job_type`, `payload` and `enqueued_at` never change after creation.
/// `attempts`, `last_error` and the scheduling fields are only touched by the
/// queue store on behalf of a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: String,
    pub payload: JsonValue,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub status: JobStatus,
    /// Earliest time the job may be claimed.
    pub run_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<AttemptRecord>,
}

impl Job {
    /// Create a new pending job, ready to run immediately.
    pub fn new(job_type: impl Into<String>, payload: JsonValue) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            job_type: job_type.into(),
            payload,
            enqueued_at: now,
            attempts: 0,
            last_error: None,
            status: JobStatus::Pending,
            run_at: now,
            history: Vec::new(),
        }
    }

    /// Delay the first attempt.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.run_at = self.enqueued_at + to_chrono(delay);
        self
    }

    /// Pending and due.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, JobStatus::Pending) && self.run_at <= now
    }

    /// In flight, but the claim window has passed.
    pub fn claim_expired(&self, now: DateTime<Utc>) -> bool {
        match &self.status {
            JobStatus::InFlight { visible_at, .. } => *visible_at <= now,
            _ => false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.status, JobStatus::InFlight { .. })
    }

    /// The worker currently holding the claim, if any.
    pub fn claimed_by(&self) -> Option<&str> {
        match &self.status {
            JobStatus::InFlight { worker, .. } => Some(worker),
            _ => None,
        }
    }

    /// Token of the current claim, if the job is in flight.
    pub fn claim_token(&self) -> Option<ClaimToken> {
        match &self.status {
            JobStatus::InFlight { token, .. } => Some(*token),
            _ => None,
        }
    }

    /// Whether `token` is the claim currently holding this job.
    pub fn is_held_by(&self, token: ClaimToken) -> bool {
        self.claim_token() == Some(token)
    }

    /// Hand the job to `worker` until `visible_at`, counting one attempt.
    pub fn claim(&mut self, worker: &str, visible_at: DateTime<Utc>) -> ClaimToken {
        let token = ClaimToken::new();
        self.attempts += 1;
        self.status = JobStatus::InFlight {
            worker: worker.to_string(),
            visible_at,
            token,
        };
        token
    }

    /// Record a failed attempt and let `policy` decide what happens next.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> RetryOutcome {
        let error = error.into();
        self.push_history(error.clone(), now);
        self.last_error = Some(error);

        if policy.should_retry(self.attempts) {
            let run_at = now + to_chrono(policy.delay_for_attempt(self.attempts));
            self.status = JobStatus::Pending;
            self.run_at = run_at;
            RetryOutcome::Rescheduled { run_at }
        } else {
            self.status = JobStatus::DeadLettered;
            RetryOutcome::DeadLettered
        }
    }

    /// Move straight to the dead-letter state, without consulting any policy.
    pub fn mark_dead_lettered(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        let reason = reason.into();
        if self.is_in_flight() {
            self.push_history(reason.clone(), now);
        }
        self.last_error = Some(reason);
        self.status = JobStatus::DeadLettered;
    }

    /// Give a dead-lettered job a fresh set of attempts.
    ///
    /// `last_error` and the history are kept for inspection.
    pub fn requeue(&mut self, now: DateTime<Utc>) {
        self.attempts = 0;
        self.status = JobStatus::Pending;
        self.run_at = now;
    }

    fn push_history(&mut self, error: String, failed_at: DateTime<Utc>) {
        if self.history.len() >= MAX_HISTORY {
            self.history.remove(0);
        }
        self.history.push(AttemptRecord {
            attempt: self.attempts,
            worker: self.claimed_by().map(str::to_string),
            error,
            failed_at,
        });
    }
}

/// Entry in the dead-letter queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub job: Job,
    pub dead_lettered_at: DateTime<Utc>,
    pub reason: String,
}

impl DeadLetterEntry {
    pub fn new(job: Job, reason: String) -> Self {
        Self {
            job,
            dead_lettered_at: Utc::now(),
            reason,
        }
    }
}

pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exponential_backoff_calculates_correctly() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            strategy: BackoffStrategy::Exponential,
            jitter: 0.0,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(800));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(500));

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
    }

    #[test]
    fn linear_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 50,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
            strategy: BackoffStrategy::Linear,
            jitter: 0.0,
        };

        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(250));
    }

    #[test]
    fn should_retry_counts_total_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..Default::default()
        };

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!RetryPolicy::no_retry().should_retry(1));
    }

    #[test]
    fn backoff_strategy_parses_case_insensitively() {
        assert_eq!("Linear".parse::<BackoffStrategy>(), Ok(BackoffStrategy::Linear));
        assert!("random".parse::<BackoffStrategy>().is_err());
    }

    #[test]
    fn failing_until_exhausted_dead_letters() {
        let policy = RetryPolicy::fixed(2, Duration::from_millis(10));
        let mut job = Job::new("RegistrationMail", serde_json::json!({}));
        let now = Utc::now();

        job.claim("w1", now);
        let outcome = job.record_failure("smtp down", &policy, now);
        assert_eq!(
            outcome,
            RetryOutcome::Rescheduled {
                run_at: now + chrono::Duration::milliseconds(10)
            }
        );
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.last_error.as_deref(), Some("smtp down"));

        job.claim("w2", now);
        assert_eq!(job.record_failure("smtp down", &policy, now), RetryOutcome::DeadLettered);
        assert_eq!(job.status, JobStatus::DeadLettered);
        assert_eq!(job.history.len(), 2);
        assert_eq!(job.history[1].worker.as_deref(), Some("w2"));
    }

    #[test]
    fn each_claim_supersedes_the_previous_token() {
        let mut job = Job::new("AnswerMail", serde_json::json!({}));
        let first = job.claim("w1", Utc::now());
        assert!(job.is_held_by(first));

        let second = job.claim("w2", Utc::now());
        assert!(!job.is_held_by(first));
        assert!(job.is_held_by(second));
        assert_eq!(job.claimed_by(), Some("w2"));
    }

    #[test]
    fn history_is_bounded() {
        let policy = RetryPolicy::fixed(100, Duration::ZERO);
        let mut job = Job::new("AnswerMail", serde_json::json!({}));
        for i in 0..(MAX_HISTORY as u32 + 5) {
            job.claim("w", Utc::now());
            job.record_failure(format!("error {i}"), &policy, Utc::now());
        }
        assert_eq!(job.history.len(), MAX_HISTORY);
        assert_eq!(job.history[0].attempt, 6);
    }

    #[test]
    fn requeue_resets_attempts_but_keeps_last_error() {
        let mut job = Job::new("AnswerMail", serde_json::json!({}));
        job.claim("w", Utc::now());
        job.mark_dead_lettered("unknown job type", Utc::now());

        job.requeue(Utc::now());
        assert_eq!(job.attempts, 0);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.last_error.as_deref(), Some("unknown job type"));
    }

    #[test]
    fn descriptor_serializes_type_field() {
        let job = Job::new("AnswerMail", serde_json::json!({"question": "Q"}));
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["type"], "AnswerMail");
        assert_eq!(value["status"]["state"], "pending");
    }

    proptest! {
        #[test]
        fn delay_never_exceeds_cap_plus_jitter(
            attempt in 1u32..200,
            base_ms in 0u64..10_000,
            extra_ms in 0u64..100_000,
            jitter in 0.0f64..1.0,
        ) {
            let policy = RetryPolicy {
                max_attempts: 200,
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_millis(base_ms + extra_ms),
                strategy: BackoffStrategy::Exponential,
                jitter,
            };
            let cap = (base_ms + extra_ms) as f64 * (1.0 + jitter);
            prop_assert!(policy.delay_for_attempt(attempt).as_millis() as f64 <= cap + 1.0);
        }

        #[test]
        fn exponential_without_jitter_is_monotonic(attempt in 1u32..100, base_ms in 1u64..1_000) {
            let policy = RetryPolicy {
                max_attempts: 100,
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_secs(3_600),
                strategy: BackoffStrategy::Exponential,
                jitter: 0.0,
            };
            prop_assert!(
                policy.delay_for_attempt(attempt) <= policy.delay_for_attempt(attempt + 1)
            );
        }
    }
}
