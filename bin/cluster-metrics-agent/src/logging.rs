//! Logging.

use metrics_publisher::GenericError;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter, Layer as _};

const LOG_LEVEL_ENV_VAR: &str = "PUBLISHER_LOG_LEVEL";
const LOG_FORMAT_JSON_ENV_VAR: &str = "PUBLISHER_LOG_FORMAT_JSON";

/// Initializes the logging subsystem for `tracing`.
///
/// Filtering directives are read from the `PUBLISHER_LOG_LEVEL` environment variable, falling back to `INFO` when it
/// isn't set. When `PUBLISHER_LOG_FORMAT_JSON` is set to `true` or `1` (case insensitive), logs are formatted as JSON.
/// Otherwise, a human-readable format is used.
///
/// # Errors
///
/// If the logging subsystem was already initialized, an error will be returned.
pub fn initialize_logging() -> Result<(), GenericError> {
    let level_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(LOG_LEVEL_ENV_VAR)
        .from_env_lossy();

    let fmt_layer = if is_json_enabled(std::env::var(LOG_FORMAT_JSON_ENV_VAR).ok().as_deref()) {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(level_filter))
        .try_init()?;

    Ok(())
}

fn is_json_enabled(value: Option<&str>) -> bool {
    value
        .map(|s| s.trim().to_lowercase())
        .map(|s| s == "true" || s == "1")
        .unwrap_or(false)
}
