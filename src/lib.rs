//! Decade database builder - shared modules for all binaries.

pub mod fields;
pub mod grouping;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod reader;
pub mod safety;
pub mod storage;

/// Install the stderr `tracing` subscriber used by every binary.
/// `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
