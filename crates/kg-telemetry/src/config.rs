//! Telemetry configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::TelemetryError;

/// How log lines reach stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, with file and thread metadata.
    Json,
    /// Human-readable, colored.
    Pretty,
    /// Filter installed, nothing written.
    Off,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            "off" | "none" => Ok(Self::Off),
            other => Err(TelemetryError::Config(format!("unknown log format {other:?}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Attached to every log line and used as the metrics namespace.
    pub service_name: String,
    /// Level (`info`) or full filter directive (`kg_03_action_pipeline=debug`).
    pub log_filter: String,
    pub log_format: LogFormat,
    pub environment: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "keygraph".to_string(),
            log_filter: "info".to_string(),
            log_format: LogFormat::Pretty,
            environment: "development".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Read `KG_SERVICE_NAME`, `KG_LOG_LEVEL` (falling back to `RUST_LOG`),
    /// `KG_LOG_FORMAT` and `KG_ENVIRONMENT`.
    ///
    /// Without `KG_LOG_FORMAT`, containers get JSON and everything else gets
    /// pretty output. An unparseable format falls back the same way.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let in_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();
        let fallback_format = if in_container {
            LogFormat::Json
        } else {
            defaults.log_format
        };

        Self {
            service_name: env::var("KG_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_filter: env::var("KG_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_filter),
            log_format: env::var("KG_LOG_FORMAT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(fallback_format),
            environment: env::var("KG_ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Silent configuration for tests.
    pub fn quiet() -> Self {
        Self {
            log_format: LogFormat::Off,
            ..Self::default()
        }
    }
}
