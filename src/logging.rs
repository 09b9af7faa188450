//! Logging setup for the provider binary.
//!
//! Everything goes to **stderr**: stdout carries the handshake line and must
//! stay clean. Filtering follows `RUST_LOG` and defaults to `info`.
//!
//! ```bash
//! # GraphQL request and response bodies
//! RUST_LOG=ghostwriter_provider=debug ./ghostwriter-provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LEVEL: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
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

/// Install the global stderr subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer())
        .init();
}

/// Install the global stderr subscriber, returning `false` if one is already set.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer())
        .try_init()
        .is_ok()
}
