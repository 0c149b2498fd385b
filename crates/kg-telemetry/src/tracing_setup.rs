//! Global subscriber: env filter plus one fmt layer chosen by [`LogFormat`].

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{LogFormat, TelemetryConfig, TelemetryError};

fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_filter).map_err(|e| TelemetryError::Config(e.to_string()))
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true).compact()).try_init(),
        LogFormat::Off => registry.try_init(),
    };
    installed.map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        environment = %config.environment,
        format = ?config.log_format,
        "Logging initialized"
    );
    Ok(())
}
