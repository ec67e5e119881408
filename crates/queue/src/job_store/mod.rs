//! Queue store boundary.
//!
//! The store is the only shared mutable resource of the job subsystem: claiming,
//! retry bookkeeping and dead-lettering are all atomic operations against it.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod r#trait;

pub use in_memory::InMemoryJobStore;
#[cfg(feature = "redis")]
pub use redis::RedisJobStore;
pub use r#trait::{JobStore, JobStoreError, QueueStats};
