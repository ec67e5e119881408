//! Job-type → handler registry.
//!
//! Built once at process start and shared read-only (behind an `Arc`) with
//! every worker, so lookups need no locking.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::info;

use gympoint_core::{JobError, JobResult};

/// Executes one kind of job.
///
/// A handler performs a single externally visible effect and succeeds or
/// fails as a whole. It must not keep state between invocations; the same
/// payload may be delivered more than once.
pub trait JobHandler: Send + Sync {
    fn handle(&self, payload: &JsonValue) -> anyhow::Result<()>;
}

impl<F> JobHandler for F
where
    F: Fn(&JsonValue) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, payload: &JsonValue) -> anyhow::Result<()> {
        self(payload)
    }
}

/// Maps job type names to their handlers.
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `job_type`.
    ///
    /// Registering the same type twice is a configuration error.
    pub fn register<H>(&mut self, job_type: impl Into<String>, handler: H) -> JobResult<()>
    where
        H: JobHandler + 'static,
    {
        let job_type = job_type.into();
        if self.handlers.contains_key(&job_type) {
            return Err(JobError::AlreadyRegistered(job_type));
        }

        info!(job_type = %job_type, "registered job handler");
        self.handlers.insert(job_type, Arc::new(handler));
        Ok(())
    }

    /// Look up the handler for `job_type`.
    pub fn resolve(&self, job_type: &str) -> JobResult<Arc<dyn JobHandler>> {
        self.handlers
            .get(job_type)
            .cloned()
            .ok_or_else(|| JobError::unknown_job_type(job_type))
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Registered job types, sorted.
    pub fn job_types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Freeze the registry for sharing with workers.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("job_types", &self.job_types())
            .finish()
    }
}
