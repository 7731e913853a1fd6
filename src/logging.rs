//! Optional tracing bootstrap for binaries and examples.
//!
//! Library code only emits through `tracing`; installing a subscriber is the
//! host's call. This helper wires up the common case.

use tracing_subscriber::EnvFilter;

/// Installs a formatted `tracing` subscriber honoring `RUST_LOG`, defaulting
/// to `info` when unset. Safe to call once per process; later calls are
/// no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
