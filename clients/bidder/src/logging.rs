//! Tracing subscriber setup for binaries and tests embedding the client.

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter: this crate at `info`, everything else at `warn`.
pub const DEFAULT_FILTER: &str = "warn,bidder_client=info";

/// Installs a global fmt subscriber writing to stderr.
///
/// `filter` uses `EnvFilter` syntax (e.g. `"bidder_client=debug"`); `RUST_LOG` wins when set.
/// The subscriber is global; repeated calls are ignored.
pub fn init(filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
