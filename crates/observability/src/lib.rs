//! Tracing/logging setup shared by the binaries.

/// Initialize process-wide tracing with the defaults (JSON, `RUST_LOG`,
/// falling back to `info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::{LogFormat, TracingConfig};
