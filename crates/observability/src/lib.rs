//! Process-wide tracing setup shared by the binaries and tests.

/// Tracing subscriber configuration (filters, formatting).
pub mod tracing;

/// Initialize process-wide logging with the default `info` level.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::DEFAULT_DIRECTIVE);
}
