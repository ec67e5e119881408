//! Job queue infrastructure: descriptors, stores, producer and workers.

pub mod config;
pub mod job_store;
pub mod jobs;

pub use config::{ConfigError, QueueConfig};
pub use job_store::{InMemoryJobStore, JobStore, JobStoreError, QueueStats};
pub use jobs::{
    Job, JobHandler, JobOutcome, JobQueue, JobRegistry, JobWorker, RetryPolicy, WorkerConfig,
    WorkerPool, WorkerPoolHandle,
};
