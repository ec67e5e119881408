//! Worker process wiring: registry construction and store selection.

use std::sync::Arc;

use tracing::{info, warn};

use gympoint_core::JobResult;
use gympoint_mail::{Mailer, register_mail_jobs};
use gympoint_queue::{JobRegistry, QueueConfig, WorkerPool, WorkerPoolHandle};

pub const POOL_NAME: &str = "gympoint-worker";

/// Every job type this process knows how to run.
pub fn build_registry(mailer: Arc<dyn Mailer>) -> JobResult<Arc<JobRegistry>> {
    let mut registry = JobRegistry::new();
    register_mail_jobs(&mut registry, mailer)?;
    Ok(registry.into_shared())
}

/// Start the pool against the configured store.
///
/// Without `GYMPOINT_REDIS_URL` the jobs live in this process only, which is
/// useful for local runs but loses everything on exit.
pub fn spawn_pool(
    config: &QueueConfig,
    registry: Arc<JobRegistry>,
) -> anyhow::Result<WorkerPoolHandle> {
    let worker_config = config.worker_config(POOL_NAME);

    let handle = match config.redis_store() {
        Some(store) => {
            let store = store?;
            info!(
                prefix = %config.key_prefix,
                workers = config.workers,
                "starting workers against redis"
            );
            WorkerPool::spawn(store, registry, worker_config)
        }
        None => {
            warn!("GYMPOINT_REDIS_URL not set; using in-memory queue store");
            WorkerPool::spawn(Arc::new(config.in_memory_store()), registry, worker_config)
        }
    };

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gympoint_mail::InMemoryMailer;

    #[test]
    fn registry_holds_the_mail_jobs() {
        let registry = build_registry(Arc::new(InMemoryMailer::new())).unwrap();
        assert!(registry.contains("AnswerMail"));
        assert!(registry.contains("RegistrationMail"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn in_memory_pool_starts_and_stops() {
        let config = QueueConfig {
            workers: 3,
            ..QueueConfig::default()
        };
        let registry = build_registry(Arc::new(InMemoryMailer::new())).unwrap();

        let handle = spawn_pool(&config, registry).unwrap();
        assert_eq!(handle.worker_count(), 3);

        let stats = handle.shutdown();
        assert_eq!(stats.jobs_processed, 0);
    }

    #[test]
    fn malformed_redis_url_fails_startup() {
        let config = QueueConfig {
            redis_url: Some("not a url".into()),
            ..QueueConfig::default()
        };
        let registry = build_registry(Arc::new(InMemoryMailer::new())).unwrap();

        assert!(spawn_pool(&config, registry).is_err());
    }
}
