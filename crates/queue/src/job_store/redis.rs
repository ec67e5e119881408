//! Redis-backed job store (durable, at-least-once delivery).
//!
//! ## Layout
//!
//! - `{prefix}:job:{id}`: hash with `job` (JSON descriptor), `attempts`
//!   (authoritative attempt counter), and while claimed `worker` and `claim`
//!   (the claim token)
//! - `{prefix}:pending`: sorted set of job IDs scored by `run_at` (ms)
//! - `{prefix}:inflight`: sorted set of job IDs scored by claim expiry (ms)
//! - `{prefix}:dead`: hash of job ID → dead-letter entry (JSON)
//! - `{prefix}:completed`: counter of acknowledged jobs
//!
//! Every write that moves a job between sets runs as a Lua script. Scripts
//! that settle a claim compare the caller's token with the stored `claim`
//! field first, so a worker whose claim was superseded cannot change the job.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{instrument, warn};

use gympoint_core::{ClaimToken, JobId};

use super::in_memory::{CLAIM_EXPIRED_REASON, DEFAULT_VISIBILITY_TIMEOUT};
use super::r#trait::{JobStore, JobStoreError, QueueStats};
use crate::jobs::types::{DeadLetterEntry, Job, JobStatus, RetryOutcome, RetryPolicy, to_chrono};

/// Default key prefix
pub const DEFAULT_KEY_PREFIX: &str = "gympoint:jobs";

/// Creates the job hash and schedules it, unless the ID is already taken.
const APPEND_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
redis.call('HSET', KEYS[1], 'job', ARGV[1], 'attempts', ARGV[2])
redis.call('ZADD', KEYS[2], ARGV[3], ARGV[4])
return 1
"#;

/// Moves the next due job into the in-flight set under a new claim token and
/// counts an attempt.
///
/// Expired claims come first. An expired claim whose attempts are already used
/// up is re-claimed without counting and flagged so the caller dead-letters it.
/// An ID whose descriptor is gone is dropped from every key and reported with
/// an empty body.
const CLAIM_SCRIPT: &str = r#"
local now = ARGV[1]
local id = nil
local exhausted = 0

local expired = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', now, 'LIMIT', 0, 1)
if #expired > 0 then
  id = expired[1]
  local used = tonumber(redis.call('HGET', ARGV[3] .. id, 'attempts') or '0')
  if used >= tonumber(ARGV[5]) then
    exhausted = 1
  end
else
  local ready = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', now, 'LIMIT', 0, 1)
  if #ready == 0 then
    return false
  end
  id = ready[1]
  redis.call('ZREM', KEYS[1], id)
end

local key = ARGV[3] .. id
if redis.call('HEXISTS', key, 'job') == 0 then
  redis.call('ZREM', KEYS[2], id)
  redis.call('DEL', key)
  return {id, '', 0, 0}
end

redis.call('ZADD', KEYS[2], ARGV[2], id)
redis.call('HSET', key, 'worker', ARGV[4], 'claim', ARGV[6])

local attempts
if exhausted == 1 then
  attempts = tonumber(redis.call('HGET', key, 'attempts') or '0')
else
  attempts = redis.call('HINCRBY', key, 'attempts', 1)
end

return {id, redis.call('HGET', key, 'job'), attempts, exhausted}
"#;

/// Removes an in-flight job held by `ARGV[2]`.
///
/// Returns 1 when removed, 0 when the job is already gone (duplicate ack) and
/// -1 when another claim holds it.
const ACK_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[2]) == 0 then
  return 0
end
if redis.call('HGET', KEYS[2], 'claim') ~= ARGV[2] then
  return -1
end
redis.call('ZREM', KEYS[1], ARGV[1])
redis.call('DEL', KEYS[2])
redis.call('INCR', KEYS[3])
return 1
"#;

/// Settles a failed claim held by `ARGV[2]`: back to pending (`ARGV[3]` =
/// `requeue`, `ARGV[4]` = descriptor, `ARGV[5]` = run_at) or into the
/// dead-letter hash (`ARGV[4]` = entry). The attempt counter is left alone.
///
/// Returns 1 when settled, 0 when the job is gone and -1 on a stale claim.
const SETTLE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return 0
end
if redis.call('HGET', KEYS[1], 'claim') ~= ARGV[2] then
  return -1
end
redis.call('ZREM', KEYS[2], ARGV[1])
if ARGV[3] == 'requeue' then
  redis.call('HSET', KEYS[1], 'job', ARGV[4])
  redis.call('HDEL', KEYS[1], 'claim', 'worker')
  redis.call('ZADD', KEYS[3], ARGV[5], ARGV[1])
else
  redis.call('ZREM', KEYS[3], ARGV[1])
  redis.call('HSET', KEYS[4], ARGV[1], ARGV[4])
  redis.call('DEL', KEYS[1])
end
return 1
"#;

/// Moves a dead-lettered job back to pending with a fresh attempt counter.
const REVIVE_SCRIPT: &str = r#"
if redis.call('HDEL', KEYS[1], ARGV[1]) == 0 then
  return 0
end
redis.call('DEL', KEYS[2])
redis.call('HSET', KEYS[2], 'job', ARGV[2], 'attempts', 0)
redis.call('ZADD', KEYS[3], ARGV[3], ARGV[1])
return 1
"#;

/// Raw claim result: (id, job JSON, attempts, exhausted flag).
type ClaimReply = Option<(String, String, u32, u8)>;

/// Where a failed claim goes.
enum Settlement {
    Requeue { job: String, run_at_ms: i64 },
    DeadLetter { entry: String },
}

#[derive(Debug, Clone)]
pub struct RedisJobStore {
    client: Arc<redis::Client>,
    prefix: String,
    policy: RetryPolicy,
    visibility_timeout: Duration,
    scripts: Arc<Scripts>,
}

#[derive(Debug)]
struct Scripts {
    append: redis::Script,
    claim: redis::Script,
    ack: redis::Script,
    settle: redis::Script,
    revive: redis::Script,
}

impl RedisJobStore {
    /// Create a store against `redis_url` (e.g. "redis://localhost:6379").
    ///
    /// Opening the client does not connect; an unreachable server shows up
    /// as `JobStoreError::Unavailable` on first use.
    pub fn new(redis_url: impl AsRef<str>, prefix: Option<String>) -> Result<Self, JobStoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| JobStoreError::Storage(format!("invalid redis url: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            prefix: prefix.unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            policy: RetryPolicy::default(),
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            scripts: Arc::new(Scripts {
                append: redis::Script::new(APPEND_SCRIPT),
                claim: redis::Script::new(CLAIM_SCRIPT),
                ack: redis::Script::new(ACK_SCRIPT),
                settle: redis::Script::new(SETTLE_SCRIPT),
                revive: redis::Script::new(REVIVE_SCRIPT),
            }),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn connection(&self) -> Result<redis::Connection, JobStoreError> {
        self.client.get_connection().map_err(map_redis_error)
    }

    fn job_key_prefix(&self) -> String {
        format!("{}:job:", self.prefix)
    }

    fn job_key(&self, job_id: JobId) -> String {
        format!("{}{}", self.job_key_prefix(), job_id)
    }

    fn pending_key(&self) -> String {
        format!("{}:pending", self.prefix)
    }

    fn inflight_key(&self) -> String {
        format!("{}:inflight", self.prefix)
    }

    fn dead_key(&self) -> String {
        format!("{}:dead", self.prefix)
    }

    fn completed_key(&self) -> String {
        format!("{}:completed", self.prefix)
    }

    /// Load a live job, folding in the authoritative attempt counter and the
    /// current claim.
    fn load(
        &self,
        conn: &mut redis::Connection,
        job_id: JobId,
    ) -> Result<Option<Job>, JobStoreError> {
        let (raw, attempts, worker, claim): (
            Option<String>,
            Option<u32>,
            Option<String>,
            Option<String>,
        ) = redis::cmd("HMGET")
            .arg(self.job_key(job_id))
            .arg("job")
            .arg("attempts")
            .arg("worker")
            .arg("claim")
            .query(conn)
            .map_err(map_redis_error)?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let mut job = decode_job(&raw)?;
        job.attempts = attempts.unwrap_or(0);

        let visible_at: Option<f64> = redis::cmd("ZSCORE")
            .arg(self.inflight_key())
            .arg(job_id.to_string())
            .query(conn)
            .map_err(map_redis_error)?;
        let token = claim.and_then(|c| ClaimToken::from_str(&c).ok());

        job.status = match (visible_at, token) {
            (Some(ms), Some(token)) => JobStatus::InFlight {
                worker: worker.unwrap_or_default(),
                visible_at: from_millis(ms as i64),
                token,
            },
            _ => JobStatus::Pending,
        };
        Ok(Some(job))
    }

    /// Load a job and make sure `token` still holds it.
    fn load_held(
        &self,
        conn: &mut redis::Connection,
        job_id: JobId,
        token: ClaimToken,
    ) -> Result<Job, JobStoreError> {
        let job = self
            .load(conn, job_id)?
            .ok_or(JobStoreError::NotFound(job_id))?;
        if !job.is_held_by(token) {
            return Err(JobStoreError::StaleClaim(job_id));
        }
        Ok(job)
    }

    /// Apply `settlement` if `token` still holds the job.
    fn settle(
        &self,
        conn: &mut redis::Connection,
        job_id: JobId,
        token: ClaimToken,
        settlement: Settlement,
    ) -> Result<(), JobStoreError> {
        let mut invocation = self.scripts.settle.prepare_invoke();
        invocation
            .key(self.job_key(job_id))
            .key(self.inflight_key())
            .key(self.pending_key())
            .key(self.dead_key())
            .arg(job_id.to_string())
            .arg(token.to_string());
        match &settlement {
            Settlement::Requeue { job, run_at_ms } => {
                invocation.arg("requeue").arg(job).arg(*run_at_ms);
            }
            Settlement::DeadLetter { entry } => {
                invocation.arg("dead").arg(entry).arg(0);
            }
        }

        let settled: i64 = invocation.invoke(conn).map_err(map_redis_error)?;
        match settled {
            1 => Ok(()),
            0 => Err(JobStoreError::NotFound(job_id)),
            _ => Err(JobStoreError::StaleClaim(job_id)),
        }
    }

    fn dead_letter_held(
        &self,
        conn: &mut redis::Connection,
        job: Job,
        token: ClaimToken,
        reason: &str,
    ) -> Result<(), JobStoreError> {
        let job_id = job.id;
        let entry = encode(&DeadLetterEntry::new(job, reason.to_string()))?;
        self.settle(conn, job_id, token, Settlement::DeadLetter { entry })?;

        warn!(job_id = %job_id, reason = %reason, "job sent to dead-letter queue");
        Ok(())
    }
}

impl JobStore for RedisJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.id, job_type = %job.job_type), err)]
    fn append(&self, job: Job) -> Result<JobId, JobStoreError> {
        let mut conn = self.connection()?;
        let job_id = job.id;

        let created: i64 = self
            .scripts
            .append
            .key(self.job_key(job_id))
            .key(self.pending_key())
            .arg(encode(&job)?)
            .arg(job.attempts)
            .arg(job.run_at.timestamp_millis())
            .arg(job_id.to_string())
            .invoke(&mut conn)
            .map_err(map_redis_error)?;

        if created == 0 {
            return Err(JobStoreError::AlreadyExists(job_id));
        }
        Ok(job_id)
    }

    fn claim_next(&self, worker: &str) -> Result<Option<Job>, JobStoreError> {
        let mut conn = self.connection()?;

        loop {
            let now = Utc::now();
            let visible_at = now + to_chrono(self.visibility_timeout);
            let token = ClaimToken::new();

            let reply: ClaimReply = self
                .scripts
                .claim
                .key(self.pending_key())
                .key(self.inflight_key())
                .arg(now.timestamp_millis())
                .arg(visible_at.timestamp_millis())
                .arg(self.job_key_prefix())
                .arg(worker)
                .arg(self.policy.max_attempts)
                .arg(token.to_string())
                .invoke(&mut conn)
                .map_err(map_redis_error)?;

            let Some((id, raw, attempts, exhausted)) = reply else {
                return Ok(None);
            };

            if raw.is_empty() {
                warn!(job_id = %id, "queued job without descriptor; discarded");
                continue;
            }

            let job_id = JobId::from_str(&id)
                .map_err(|e| JobStoreError::Serialization(format!("bad job id {id:?}: {e}")))?;

            let mut job = decode_job(&raw)?;
            job.attempts = attempts;
            job.status = JobStatus::InFlight {
                worker: worker.to_string(),
                visible_at,
                token,
            };

            if exhausted == 1 {
                warn!(job_id = %job_id, attempts, "claim expired on final attempt; dead-lettering");
                job.mark_dead_lettered(CLAIM_EXPIRED_REASON, now);
                self.dead_letter_held(&mut conn, job, token, CLAIM_EXPIRED_REASON)?;
                continue;
            }

            return Ok(Some(job));
        }
    }

    fn ack(&self, job_id: JobId, token: ClaimToken) -> Result<(), JobStoreError> {
        let mut conn = self.connection()?;
        let acked: i64 = self
            .scripts
            .ack
            .key(self.inflight_key())
            .key(self.job_key(job_id))
            .key(self.completed_key())
            .arg(job_id.to_string())
            .arg(token.to_string())
            .invoke(&mut conn)
            .map_err(map_redis_error)?;

        if acked < 0 {
            return Err(JobStoreError::StaleClaim(job_id));
        }
        Ok(())
    }

    fn retry(
        &self,
        job_id: JobId,
        token: ClaimToken,
        error: &str,
    ) -> Result<RetryOutcome, JobStoreError> {
        let mut conn = self.connection()?;
        let mut job = self.load_held(&mut conn, job_id, token)?;

        let outcome = job.record_failure(error, &self.policy, Utc::now());
        match outcome {
            RetryOutcome::Rescheduled { run_at } => {
                let settlement = Settlement::Requeue {
                    job: encode(&job)?,
                    run_at_ms: run_at.timestamp_millis(),
                };
                self.settle(&mut conn, job_id, token, settlement)?;
            }
            RetryOutcome::DeadLettered => self.dead_letter_held(&mut conn, job, token, error)?,
        }
        Ok(outcome)
    }

    fn dead_letter(
        &self,
        job_id: JobId,
        token: ClaimToken,
        reason: &str,
    ) -> Result<(), JobStoreError> {
        let mut conn = self.connection()?;
        let mut job = self.load_held(&mut conn, job_id, token)?;

        job.mark_dead_lettered(reason, Utc::now());
        self.dead_letter_held(&mut conn, job, token, reason)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let mut conn = self.connection()?;
        self.load(&mut conn, job_id)
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        let mut conn = self.connection()?;
        let raw: Vec<String> = redis::cmd("HVALS")
            .arg(self.dead_key())
            .query(&mut conn)
            .map_err(map_redis_error)?;

        let mut entries = raw
            .iter()
            .map(|s| decode::<DeadLetterEntry>(s))
            .collect::<Result<Vec<_>, _>>()?;

        entries.sort_by_key(|e| (e.dead_lettered_at, e.job.id));
        entries.truncate(limit);
        Ok(entries)
    }

    fn requeue_dead_letter(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        let mut conn = self.connection()?;
        let raw: Option<String> = redis::cmd("HGET")
            .arg(self.dead_key())
            .arg(job_id.to_string())
            .query(&mut conn)
            .map_err(map_redis_error)?;

        let entry: DeadLetterEntry = decode(&raw.ok_or(JobStoreError::NotFound(job_id))?)?;
        let mut job = entry.job;
        job.requeue(Utc::now());

        let revived: i64 = self
            .scripts
            .revive
            .key(self.dead_key())
            .key(self.job_key(job_id))
            .key(self.pending_key())
            .arg(job_id.to_string())
            .arg(encode(&job)?)
            .arg(job.run_at.timestamp_millis())
            .invoke(&mut conn)
            .map_err(map_redis_error)?;

        if revived == 0 {
            return Err(JobStoreError::NotFound(job_id));
        }
        Ok(job)
    }

    fn delete_dead_letter(&self, job_id: JobId) -> Result<(), JobStoreError> {
        let mut conn = self.connection()?;
        let removed: u32 = redis::cmd("HDEL")
            .arg(self.dead_key())
            .arg(job_id.to_string())
            .query(&mut conn)
            .map_err(map_redis_error)?;

        if removed == 0 {
            return Err(JobStoreError::NotFound(job_id));
        }
        Ok(())
    }

    fn stats(&self) -> Result<QueueStats, JobStoreError> {
        let mut conn = self.connection()?;
        let (pending, in_flight, completed, dead_lettered): (usize, usize, Option<u64>, usize) =
            redis::pipe()
                .cmd("ZCARD")
                .arg(self.pending_key())
                .cmd("ZCARD")
                .arg(self.inflight_key())
                .cmd("GET")
                .arg(self.completed_key())
                .cmd("HLEN")
                .arg(self.dead_key())
                .query(&mut conn)
                .map_err(map_redis_error)?;

        Ok(QueueStats {
            pending,
            in_flight,
            completed: completed.unwrap_or(0),
            dead_lettered,
        })
    }
}

/// Connection-level failures are `Unavailable` (the worker backs off and
/// retries); everything else is a storage error.
fn map_redis_error(e: redis::RedisError) -> JobStoreError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
        JobStoreError::Unavailable(e.to_string())
    } else {
        JobStoreError::Storage(e.to_string())
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, JobStoreError> {
    serde_json::to_string(value).map_err(|e| JobStoreError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, JobStoreError> {
    serde_json::from_str(raw).map_err(|e| JobStoreError::Serialization(e.to_string()))
}

fn decode_job(raw: &str) -> Result<Job, JobStoreError> {
    decode(raw)
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> Option<RedisJobStore> {
        let url = std::env::var("GYMPOINT_TEST_REDIS_URL").ok()?;
        let prefix = format!("gympoint:test:{}", JobId::new());
        Some(
            RedisJobStore::new(url, Some(prefix))
                .unwrap()
                .with_retry_policy(RetryPolicy::fixed(2, Duration::ZERO)),
        )
    }

    #[test]
    fn keys_are_namespaced_by_prefix() {
        let store = RedisJobStore::new("redis://127.0.0.1:6379", Some("gym".into())).unwrap();
        let job_id = JobId::new();

        assert_eq!(store.pending_key(), "gym:pending");
        assert_eq!(store.inflight_key(), "gym:inflight");
        assert_eq!(store.dead_key(), "gym:dead");
        assert_eq!(store.job_key(job_id), format!("gym:job:{job_id}"));
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            RedisJobStore::new("not a url", None),
            Err(JobStoreError::Storage(_))
        ));
    }

    #[test]
    fn unreachable_server_is_unavailable() {
        // Port 1 is never a redis server.
        let store = RedisJobStore::new("redis://127.0.0.1:1", None).unwrap();
        let err = store.append(Job::new("AnswerMail", serde_json::json!({}))).unwrap_err();
        assert!(err.is_unavailable(), "unexpected error: {err:?}");
    }

    #[test]
    #[ignore = "requires a running redis (GYMPOINT_TEST_REDIS_URL)"]
    fn claim_retry_and_dead_letter_round_trip() {
        let Some(store) = test_store() else { return };

        let job_id = store
            .append(Job::new("RegistrationMail", serde_json::json!({"plan": "Gold"})))
            .unwrap();

        let claimed = store.claim_next("w1").unwrap().unwrap();
        assert_eq!(claimed.id, job_id);
        assert_eq!(claimed.attempts, 1);
        assert!(store.claim_next("w2").unwrap().is_none());
        let token = claimed.claim_token().unwrap();

        assert!(matches!(
            store.retry(job_id, token, "smtp down").unwrap(),
            RetryOutcome::Rescheduled { .. }
        ));
        let job = store.get(job_id).unwrap().unwrap();
        assert_eq!(job.last_error.as_deref(), Some("smtp down"));

        let claimed = store.claim_next("w2").unwrap().unwrap();
        assert_eq!(claimed.attempts, 2);
        let token = claimed.claim_token().unwrap();
        assert_eq!(
            store.retry(job_id, token, "smtp down").unwrap(),
            RetryOutcome::DeadLettered
        );

        let dead = store.list_dead_letters(10).unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].job.attempts, 2);
        assert_eq!(store.stats().unwrap().dead_lettered, 1);

        store.delete_dead_letter(job_id).unwrap();
    }

    #[test]
    #[ignore = "requires a running redis (GYMPOINT_TEST_REDIS_URL)"]
    fn ack_is_idempotent() {
        let Some(store) = test_store() else { return };

        let job_id = store.append(Job::new("AnswerMail", serde_json::json!({}))).unwrap();
        let token = store.claim_next("w1").unwrap().unwrap().claim_token().unwrap();

        store.ack(job_id, token).unwrap();
        store.ack(job_id, token).unwrap();

        assert!(store.get(job_id).unwrap().is_none());
        assert_eq!(store.stats().unwrap().completed, 1);
    }

    #[test]
    #[ignore = "requires a running redis (GYMPOINT_TEST_REDIS_URL)"]
    fn superseded_claim_cannot_settle_a_reclaimed_job() {
        let Some(store) = test_store() else { return };
        let store = store.with_visibility_timeout(Duration::from_millis(10));

        let job_id = store.append(Job::new("AnswerMail", serde_json::json!({}))).unwrap();
        let stale = store.claim_next("w1").unwrap().unwrap().claim_token().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        let fresh = store.claim_next("w2").unwrap().unwrap().claim_token().unwrap();

        assert!(matches!(
            store.retry(job_id, stale, "late failure"),
            Err(JobStoreError::StaleClaim(id)) if id == job_id
        ));
        assert!(matches!(store.ack(job_id, stale), Err(JobStoreError::StaleClaim(_))));
        assert!(matches!(
            store.dead_letter(job_id, stale, "late"),
            Err(JobStoreError::StaleClaim(_))
        ));
        assert_eq!(store.stats().unwrap().in_flight, 1);

        store.ack(job_id, fresh).unwrap();
        assert_eq!(store.stats().unwrap().completed, 1);
    }

    #[test]
    #[ignore = "requires a running redis (GYMPOINT_TEST_REDIS_URL)"]
    fn duplicate_append_leaves_the_original_untouched() {
        let Some(store) = test_store() else { return };

        let job = Job::new("AnswerMail", serde_json::json!({"n": 1}));
        let mut duplicate = job.clone();
        duplicate.payload = serde_json::json!({"n": 2});

        store.append(job.clone()).unwrap();
        assert!(matches!(
            store.append(duplicate),
            Err(JobStoreError::AlreadyExists(_))
        ));
        assert_eq!(store.get(job.id).unwrap().unwrap().payload, job.payload);
        assert_eq!(store.stats().unwrap().pending, 1);
    }
}
