//! Tracing Initialization
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either a
//! JSON or a human-readable `fmt` layer.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

const DEFAULT_FILTER: &str = "tessera_api=debug,tower_http=debug,info";

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "tessera-gateway".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl TelemetryConfig {
    /// Create TelemetryConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TESSERA_LOG_FORMAT`: "json" or "pretty" (default: json)
    /// - `TESSERA_SERVICE_NAME`: Service name (default: tessera-gateway)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let log_format = match std::env::var("TESSERA_LOG_FORMAT")
            .ok()
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Some("pretty") | Some("text") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        Self {
            service_name: std::env::var("TESSERA_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_format,
        }
    }
}

/// Install the global subscriber. Call once at startup.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        log_format = ?config.log_format,
        "Telemetry initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_logs_json() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.service_name, "tessera-gateway");
    }

    #[test]
    fn test_second_init_is_an_error() {
        let config = TelemetryConfig::default();
        // The first call may already have happened in another test.
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
