//! Tracing initialization for binaries embedding the service.
//!
//! Level control via `RUST_LOG` (e.g. `RUST_LOG=bazaar_service=debug`);
//! defaults to `info`.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. Call once at process start;
/// a second call is a no-op.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
