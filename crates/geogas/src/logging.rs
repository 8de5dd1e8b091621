//! Logging setup
//!
//! Logs go to stderr so that stdout stays reserved for render operations.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Default filter used when `RUST_LOG` is not set
pub fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Initialize the global tracing subscriber.
///
/// - If RUST_LOG is not set, set a helpful default.
/// - With the `profiling` feature, profiling scopes are emitted as tracing spans.
pub fn setup_logging() {
    let defaulted = std::env::var("RUST_LOG").is_err();
    if defaulted {
        // Safety: single-threaded at startup, before the runtime is built
        unsafe {
            std::env::set_var("RUST_LOG", default_filter());
        }
    }

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env());

    if let Err(e) = tracing_subscriber::registry().with(fmt_layer).try_init() {
        eprintln!("Failed to initialize logging: {e}");
        return;
    }

    if defaulted {
        tracing::info!("RUST_LOG set to default: {}", default_filter());
    }
}
