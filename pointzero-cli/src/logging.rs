//! Log subscriber installation.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter directives.
pub(crate) const LOG_ENV: &str = "POINTZERO_LOG";

const DEFAULT_FILTER: &str = "info";

/// Install a stderr fmt subscriber filtered by [`LOG_ENV`].
///
/// `log` records emitted by the library crates are forwarded to the same
/// subscriber. A second call is a no-op.
pub(crate) fn init() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
    if installed.is_err() {
        log::debug!("log subscriber already installed");
    }
}
