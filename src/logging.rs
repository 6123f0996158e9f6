//! Logging and tracing setup.
//!
//! Logs go to **stderr**; stdout belongs to the plugin host. Filtering follows
//! `RUST_LOG` (e.g. `info`, `backup_provider=debug`). Per-query task status
//! lines are emitted at `debug` level by [`crate::poller`].
//!
//! ```bash
//! # Watch task polling
//! RUST_LOG=backup_provider::poller=debug ./my-host
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn subscriber(default_level: &str) -> impl tracing::Subscriber + Send + Sync {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Initialize the global subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize the global subscriber with a custom default level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Try to initialize logging, returning false if a subscriber is already set.
pub fn try_init_logging() -> bool {
    subscriber("info").try_init().is_ok()
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only
    // try_init is exercised here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("backup_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,backup_provider::poller=debug").is_ok());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
