use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "CUWRAP_LOG";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize structured logging with environment filter.
/// Set CUWRAP_LOG=debug (or trace, info, warn, error) for verbosity control.
///
/// Panics if a global subscriber is already installed.
pub fn init_logging() {
    fmt()
        .with_env_filter(filter())
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Like [`init_logging`], but leaves an already installed subscriber in place.
/// Returns whether this call installed the subscriber.
pub fn try_init_logging() -> bool {
    fmt()
        .with_env_filter(filter())
        .with_target(true)
        .with_thread_ids(true)
        .with_test_writer()
        .try_init()
        .is_ok()
}
