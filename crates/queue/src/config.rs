//! Queue configuration loaded from the environment.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::job_store::InMemoryJobStore;
use crate::jobs::types::{BackoffStrategy, RetryPolicy};
use crate::jobs::worker::WorkerConfig;

pub const ENV_REDIS_URL: &str = "GYMPOINT_REDIS_URL";
pub const ENV_PREFIX: &str = "GYMPOINT_QUEUE_PREFIX";
pub const ENV_WORKERS: &str = "GYMPOINT_QUEUE_WORKERS";
pub const ENV_MAX_ATTEMPTS: &str = "GYMPOINT_QUEUE_MAX_ATTEMPTS";
pub const ENV_BACKOFF: &str = "GYMPOINT_QUEUE_BACKOFF";
pub const ENV_BASE_DELAY_MS: &str = "GYMPOINT_QUEUE_BASE_DELAY_MS";
pub const ENV_MAX_DELAY_MS: &str = "GYMPOINT_QUEUE_MAX_DELAY_MS";
pub const ENV_VISIBILITY_TIMEOUT_MS: &str = "GYMPOINT_QUEUE_VISIBILITY_TIMEOUT_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "GYMPOINT_QUEUE_POLL_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Everything a producer or worker process needs to reach and run the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// Redis URL; `None` selects the in-memory store.
    pub redis_url: Option<String>,
    pub key_prefix: String,
    pub workers: usize,
    pub retry: RetryPolicy,
    pub visibility_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: "gympoint:jobs".to_string(),
            workers: 2,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1_000),
                max_delay: Duration::from_millis(60_000),
                strategy: BackoffStrategy::Exponential,
                jitter: 0.1,
            },
            visibility_timeout: Duration::from_millis(30_000),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl QueueConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable lookup; unset variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config = Self {
            redis_url: get(ENV_REDIS_URL),
            key_prefix: get(ENV_PREFIX).unwrap_or(defaults.key_prefix),
            workers: parse::<usize>(ENV_WORKERS, get(ENV_WORKERS))?.unwrap_or(defaults.workers),
            retry: RetryPolicy {
                max_attempts: parse::<u32>(ENV_MAX_ATTEMPTS, get(ENV_MAX_ATTEMPTS))?
                    .unwrap_or(defaults.retry.max_attempts),
                base_delay: millis(ENV_BASE_DELAY_MS, get(ENV_BASE_DELAY_MS))?
                    .unwrap_or(defaults.retry.base_delay),
                max_delay: millis(ENV_MAX_DELAY_MS, get(ENV_MAX_DELAY_MS))?
                    .unwrap_or(defaults.retry.max_delay),
                strategy: match get(ENV_BACKOFF) {
                    Some(v) => BackoffStrategy::from_str(&v)
                        .map_err(|reason| ConfigError::invalid(ENV_BACKOFF, v, reason))?,
                    None => defaults.retry.strategy,
                },
                jitter: defaults.retry.jitter,
            },
            visibility_timeout: millis(ENV_VISIBILITY_TIMEOUT_MS, get(ENV_VISIBILITY_TIMEOUT_MS))?
                .unwrap_or(defaults.visibility_timeout),
            poll_interval: millis(ENV_POLL_INTERVAL_MS, get(ENV_POLL_INTERVAL_MS))?
                .unwrap_or(defaults.poll_interval),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::invalid(ENV_WORKERS, "0", "at least one worker is required"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid(
                ENV_MAX_ATTEMPTS,
                "0",
                "a job needs at least one attempt",
            ));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(ConfigError::invalid(
                ENV_MAX_DELAY_MS,
                self.retry.max_delay.as_millis().to_string(),
                "must not be smaller than the base delay",
            ));
        }
        if self.visibility_timeout.is_zero() {
            return Err(ConfigError::invalid(
                ENV_VISIBILITY_TIMEOUT_MS,
                "0",
                "claims need a non-zero visibility window",
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::invalid(
                ENV_POLL_INTERVAL_MS,
                "0",
                "idle polling needs a non-zero interval",
            ));
        }
        Ok(())
    }

    pub fn worker_config(&self, name: impl Into<String>) -> WorkerConfig {
        WorkerConfig {
            name: name.into(),
            workers: self.workers,
            poll_interval: self.poll_interval,
            max_store_backoff: Duration::from_secs(30).max(self.poll_interval),
        }
    }

    pub fn in_memory_store(&self) -> InMemoryJobStore {
        InMemoryJobStore::with_policy(self.retry.clone(), self.visibility_timeout)
    }

    /// Build the Redis store, if a URL is configured.
    #[cfg(feature = "redis")]
    pub fn redis_store(
        &self,
    ) -> Option<Result<crate::job_store::RedisJobStore, crate::job_store::JobStoreError>> {
        let url = self.redis_url.as_ref()?;
        Some(
            crate::job_store::RedisJobStore::new(url, Some(self.key_prefix.clone())).map(|s| {
                s.with_retry_policy(self.retry.clone())
                    .with_visibility_timeout(self.visibility_timeout)
            }),
        )
    }
}

fn parse<T>(var: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| ConfigError::invalid(var, v.clone(), e.to_string()))
        })
        .transpose()
}

fn millis(var: &'static str, value: Option<String>) -> Result<Option<Duration>, ConfigError> {
    Ok(parse::<u64>(var, value)?.map(Duration::from_millis))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = QueueConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, QueueConfig::default());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.redis_url, None);
    }

    #[test]
    fn values_are_read_from_environment() {
        let config = QueueConfig::from_lookup(lookup(&[
            (ENV_REDIS_URL, "redis://cache:6379"),
            (ENV_WORKERS, "4"),
            (ENV_MAX_ATTEMPTS, "5"),
            (ENV_BACKOFF, "linear"),
            (ENV_BASE_DELAY_MS, "250"),
            (ENV_MAX_DELAY_MS, "5000"),
            (ENV_VISIBILITY_TIMEOUT_MS, "10000"),
            (ENV_POLL_INTERVAL_MS, "100"),
        ]))
        .unwrap();

        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.workers, 4);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.strategy, BackoffStrategy::Linear);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.visibility_timeout, Duration::from_secs(10));

        let worker = config.worker_config("gympoint");
        assert_eq!(worker.workers, 4);
        assert_eq!(worker.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn blank_values_are_treated_as_unset() {
        let config = QueueConfig::from_lookup(lookup(&[(ENV_REDIS_URL, "  ")])).unwrap();
        assert_eq!(config.redis_url, None);
    }

    #[test]
    fn unparsable_number_is_rejected() {
        let err = QueueConfig::from_lookup(lookup(&[(ENV_WORKERS, "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_WORKERS, .. }));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let err = QueueConfig::from_lookup(lookup(&[(ENV_MAX_ATTEMPTS, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_MAX_ATTEMPTS, .. }));
    }

    #[test]
    fn max_delay_below_base_is_rejected() {
        let err = QueueConfig::from_lookup(lookup(&[
            (ENV_BASE_DELAY_MS, "5000"),
            (ENV_MAX_DELAY_MS, "100"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_MAX_DELAY_MS, .. }));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = QueueConfig::from_lookup(lookup(&[(ENV_POLL_INTERVAL_MS, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_POLL_INTERVAL_MS, .. }));

        let config = QueueConfig::from_lookup(lookup(&[(ENV_POLL_INTERVAL_MS, "1")])).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn unknown_backoff_is_rejected() {
        let err = QueueConfig::from_lookup(lookup(&[(ENV_BACKOFF, "random")])).unwrap_err();
        assert!(err.to_string().contains("unknown backoff strategy"));
    }
}
