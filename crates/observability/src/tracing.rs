//! Tracing/logging initialization.
//!
//! `RUST_LOG` overrides the default `info` filter, e.g.
//! `RUST_LOG=farmops_infra=debug` to see conflict retries.

use tracing_subscriber::EnvFilter;

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event (deployments, log shippers).
    #[default]
    Json,
    /// Human-readable single lines (local development).
    Compact,
}

impl LogFormat {
    /// Compact output for `development`, JSON everywhere else.
    pub fn for_environment(environment: &str) -> Self {
        if environment.eq_ignore_ascii_case("development") {
            LogFormat::Compact
        } else {
            LogFormat::Json
        }
    }
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true);

    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}
