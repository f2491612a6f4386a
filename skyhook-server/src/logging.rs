//! Logging setup for the `skyhook` binary.
//!
//! stdout carries the protocol, so every log line goes to stderr.

use tracing_subscriber::EnvFilter;

use skyhook_core::config::DEFAULT_LOG_FILTER;

/// Install the global subscriber with the given filter directive.
///
/// An unparsable directive falls back to the default filter. Calling this
/// more than once is harmless; later calls are ignored.
pub fn init(filter: &str) {
    let (filter, invalid) = match EnvFilter::try_new(filter) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(DEFAULT_LOG_FILTER), Some(e)),
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok();

    if let (true, Some(e)) = (installed, invalid) {
        tracing::warn!(error = %e, "invalid log filter, using '{}'", DEFAULT_LOG_FILTER);
    }
}
