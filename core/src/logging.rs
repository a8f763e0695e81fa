//! Logging setup.
//!
//! Library code only emits `tracing` events. Binaries, benches and tests call
//! [`init`] (or [`try_init`]) once to install a formatting subscriber filtered
//! by `RUST_LOG` (default `info`).

use tracing_subscriber::EnvFilter;

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Panics if one is already installed.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(true)
        .with_thread_names(true)
        .init();
}

/// Installs the global subscriber unless one is already present.
///
/// Output goes through the test writer so it is captured per test.
pub fn try_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_thread_names(true)
        .with_test_writer()
        .try_init();
}
