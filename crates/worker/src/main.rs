use std::sync::Arc;

use gympoint_mail::LogMailer;
use gympoint_queue::QueueConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    gympoint_observability::init();

    let config = QueueConfig::from_env()?;
    let registry = gympoint_worker::build_registry(Arc::new(LogMailer))?;
    let pool = gympoint_worker::spawn_pool(&config, registry)?;

    tracing::info!(workers = pool.worker_count(), "worker pool running");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested; waiting for in-flight jobs");

    let stats = tokio::task::spawn_blocking(move || pool.shutdown()).await?;
    tracing::info!(
        processed = stats.jobs_processed,
        succeeded = stats.jobs_succeeded,
        failed = stats.jobs_failed,
        dead_lettered = stats.jobs_dead_lettered,
        claims_lost = stats.claims_lost,
        store_errors = stats.store_errors,
        "worker pool stopped"
    );

    Ok(())
}
