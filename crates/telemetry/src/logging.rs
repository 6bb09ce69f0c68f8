//! Structured logging setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when neither an explicit level nor `RUST_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn";

/// Initialize structured JSON logging on stderr with environment-based filtering.
///
/// # Arguments
/// * `log_level` - Optional filter override (e.g., "info", "debug", "wdi_db=trace")
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(log_level: Option<&str>) -> anyhow::Result<()> {
    let filter = build_filter(log_level)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .with_current_span(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    Ok(())
}

fn build_filter(log_level: Option<&str>) -> anyhow::Result<EnvFilter> {
    match log_level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| anyhow::anyhow!("Invalid log filter `{}`: {}", level, e)),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))),
    }
}
