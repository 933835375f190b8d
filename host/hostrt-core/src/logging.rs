///
/// Logging bootstrap.
///
/// Diagnostics go to stderr through a `tracing_subscriber::fmt` subscriber.
/// The embedding runtime may already own a global subscriber, so installing
/// ours is best effort: a second call, or a call after someone else installed
/// one, leaves the existing subscriber in place.
///

use crate::config::{ConfigError, LogConfig};

/// Returns `Ok(true)` if this call installed the subscriber.
pub fn init_logging(config: &LogConfig) -> Result<bool, ConfigError> {
    let level = config.tracing_level()?;
    let installed = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(level)
        .with_thread_names(true)
        .try_init()
        .is_ok();
    Ok(installed)
}
