//! Tracing/logging initialization.
//!
//! JSON lines on stdout, filtered by `RUST_LOG` when set.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is absent or unparsable.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global subscriber. Later calls are no-ops.
pub fn init(default_directive: &str) {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), default_directive);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_current_span(true)
        .try_init();
}

fn build_filter(env_value: Option<&str>, default_directive: &str) -> EnvFilter {
    env_value
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive))
}
