//! Process-wide tracing setup shared by the gympoint binaries.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{LogFormat, init, init_with};
