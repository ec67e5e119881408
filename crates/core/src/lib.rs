//! Shared building blocks for the gympoint background job subsystem.
//!
//! This crate has no infrastructure concerns: identifiers and the error
//! taxonomy used by producers, queue stores and workers.

pub mod error;
pub mod id;

pub use error::{JobError, JobResult};
pub use id::{ClaimToken, JobId};
