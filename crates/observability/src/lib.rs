//! Tracing and logging (shared setup for every farmops binary).

pub use crate::tracing::LogFormat;

/// Initialize process-wide tracing with JSON output and an `info` default filter.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

/// Initialize with an explicit output format.
pub fn init_with(format: LogFormat) {
    tracing::init(format);
}

/// Subscriber configuration (filters, formats).
pub mod tracing;
