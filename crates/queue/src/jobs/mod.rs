//! Background job dispatch with retry, backoff and dead-letter handling.
//!
//! ## Flow
//!
//! request handler → `JobQueue::enqueue` → `JobStore` → `JobWorker` →
//! `JobRegistry` → handler → `JobStore::ack` / `JobStore::retry`
//!
//! - Enqueue returns once the job is durable; it never waits for execution
//! - Delivery is at-least-once: a crash between a handler's side effect and
//!   the acknowledgment re-runs the job after its claim expires
//! - Failed attempts are retried per `RetryPolicy`, then dead-lettered
//! - Unknown job types are dead-lettered immediately

pub mod producer;
pub mod registry;
pub mod types;
pub mod worker;

pub use producer::JobQueue;
pub use registry::{JobHandler, JobRegistry};
pub use types::{
    AttemptRecord, BackoffStrategy, DeadLetterEntry, Job, JobStatus, RetryOutcome, RetryPolicy,
};
pub use worker::{
    JobOutcome, JobWorker, ProcessedJob, WorkerConfig, WorkerPool, WorkerPoolHandle, WorkerStats,
};
