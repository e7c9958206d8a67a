//! Tracing Setup
//!
//! Subscriber initialization for binaries and tests embedding this crate.
//! Library code only emits `tracing` events; installing a subscriber is the
//! caller's choice.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a fmt subscriber honoring `RUST_LOG`, defaulting to `info` for
/// this crate. Safe to call once per process; later calls are ignored.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "geolens=info".into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
