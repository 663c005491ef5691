//! Tracing setup for binaries. The library only emits events.

use tracing_subscriber::EnvFilter;

/// Filter directives read before `RUST_LOG`.
pub const LOG_ENV: &str = "GPT_CLIENT_LOG";

const DEFAULT_DIRECTIVES: &str = "warn";

/// Install a compact stderr subscriber. Later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
