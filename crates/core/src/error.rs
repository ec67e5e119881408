//! Job subsystem error model.

use thiserror::Error;

/// Result type used across the job subsystem.
pub type JobResult<T> = Result<T, JobError>;

/// Job subsystem error.
///
/// Producer-side errors (`EnqueueFailed`) surface to the enqueuing request.
/// Consumer-side errors are absorbed by the worker loop and only show up in
/// logs and the dead-letter queue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The job could not be durably recorded in the queue store.
    #[error("enqueue failed: {0}")]
    EnqueueFailed(String),

    /// No handler is registered under the job's type.
    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    /// A handler was registered twice under the same type (startup error).
    #[error("job type already registered: {0}")]
    AlreadyRegistered(String),

    /// The handler returned an error or panicked.
    #[error("handler failed: {0}")]
    HandlerFailed(String),

    /// The queue store could not be reached.
    #[error("queue store unavailable: {0}")]
    QueueStoreUnavailable(String),
}

impl JobError {
    pub fn enqueue_failed(msg: impl Into<String>) -> Self {
        Self::EnqueueFailed(msg.into())
    }

    pub fn unknown_job_type(job_type: impl Into<String>) -> Self {
        Self::UnknownJobType(job_type.into())
    }

    pub fn handler_failed(msg: impl Into<String>) -> Self {
        Self::HandlerFailed(msg.into())
    }

    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::QueueStoreUnavailable(msg.into())
    }

    /// Whether retrying the same job later can succeed.
    ///
    /// Unknown job types are permanent: no registration happens at runtime.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JobError::HandlerFailed(_) | JobError::QueueStoreUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_job_type_is_permanent() {
        assert!(!JobError::unknown_job_type("Bogus").is_retryable());
        assert!(JobError::handler_failed("smtp timeout").is_retryable());
        assert!(JobError::store_unavailable("connection refused").is_retryable());
    }

    #[test]
    fn messages_name_the_cause() {
        let err = JobError::unknown_job_type("Bogus");
        assert_eq!(err.to_string(), "unknown job type: Bogus");
    }
}
