use tracing_subscriber::EnvFilter;

use super::config::LoggerFormat;

const DEFAULT_FILTER: &str = "backend_base=debug,tower_http=info,axum=info,sqlx=warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Safe to call more than once; later calls
/// leave the first subscriber in place.
pub fn init(format: &LoggerFormat) {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter());
    let result = match format {
        LoggerFormat::Default => builder
            .with_target(true)
            .with_line_number(true)
            .try_init(),
        LoggerFormat::Cloud => builder
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .try_init(),
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "logger_already_initialized");
    }
}
