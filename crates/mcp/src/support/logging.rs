#![forbid(unsafe_code)]

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub(crate) const LOG_ENV: &str = "SYZYGY_LOG";

/// Installs the stderr subscriber. Stdout is the protocol channel and must stay clean.
///
/// Filter directives come from `SYZYGY_LOG`, then `RUST_LOG`, default `warn`.
pub(crate) fn init_logging() {
    let directives = std::env::var(LOG_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| std::env::var("RUST_LOG").ok());
    let filter = directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .compact(),
        )
        .try_init();
}
