//! Logging setup for the provider process.
//!
//! Logs go to **stderr**; stdout belongs to the orchestrator. Filtering follows
//! `RUST_LOG`, and without it the provider logs at `info` while the HTTP stack
//! is held at `warn`.
//!
//! # Example
//!
//! ```no_run
//! use jenkins_credential_provider::init_logging;
//!
//! init_logging();
//! tracing::info!("Provider starting");
//! ```
//!
//! ```bash
//! # Trace every request sent to Jenkins
//! RUST_LOG=jenkins_credential_provider=debug ./provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose output is reduced unless `RUST_LOG` asks for it.
const NOISY_DEPENDENCIES: [&str; 3] = ["hyper", "hyper_util", "reqwest"];

/// Build the filter used when `RUST_LOG` is not set.
fn default_filter(default_level: &str) -> EnvFilter {
    let directives = NOISY_DEPENDENCIES
        .iter()
        .fold(default_level.to_string(), |acc, krate| {
            format!("{},{}=warn", acc, krate)
        });
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the global subscriber at `info` level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize the global subscriber, using `default_level` when `RUST_LOG`
/// is not set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Useful in tests, where several cases may race to install a subscriber.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}
