//! Gateway Configuration Module
//!
//! Gateway keys, the token signing secret, rate limiting and the bind
//! address. Configuration is loaded from environment variables with
//! defaults suitable for development.

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::error::{ApiError, ApiResult};
use crate::token::SigningSecret;

/// Minimum signing secret length accepted in production.
pub const MIN_SECRET_LEN: usize = 32;

// ============================================================================
// GATEWAY CONFIGURATION
// ============================================================================

/// Gateway configuration.
#[derive(Clone)]
pub struct GatewayConfig {
    // ========================================================================
    // Authentication
    // ========================================================================
    /// Static gateway keys accepted as `Authorization: Bearer <key>`.
    /// Empty means every request is refused.
    pub gateway_keys: HashSet<String>,

    /// Secret used to sign and verify capability tokens.
    pub token_secret: SigningSecret,

    // ========================================================================
    // Rate Limiting
    // ========================================================================
    /// Whether rate limiting is enabled.
    pub rate_limit_enabled: bool,

    /// Requests per minute per logical database.
    pub rate_limit_per_minute: u32,

    /// Burst capacity.
    pub rate_limit_burst: u32,

    // ========================================================================
    // Listener
    // ========================================================================
    pub bind_host: String,
    pub port: String,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("gateway_keys", &format!("[REDACTED, {} keys]", self.gateway_keys.len()))
            .field("token_secret", &self.token_secret)
            .field("rate_limit_enabled", &self.rate_limit_enabled)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .field("bind_host", &self.bind_host)
            .field("port", &self.port)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_keys: HashSet::new(),
            token_secret: SigningSecret::insecure_default(),
            rate_limit_enabled: true,
            rate_limit_per_minute: 1000,
            rate_limit_burst: 50,
            bind_host: "0.0.0.0".to_string(),
            port: "3000".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Create GatewayConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TESSERA_GATEWAY_KEYS`: Comma-separated gateway keys
    /// - `TESSERA_TOKEN_SECRET`: Capability token signing secret
    /// - `TESSERA_RATE_LIMIT_ENABLED`: "true" or "false" (default: true)
    /// - `TESSERA_RATE_LIMIT_PER_MINUTE`: Requests per minute per database (default: 1000)
    /// - `TESSERA_RATE_LIMIT_BURST`: Burst capacity (default: 50)
    /// - `TESSERA_API_BIND`: Listen host (default: 0.0.0.0)
    /// - `TESSERA_API_PORT`: Listen port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let gateway_keys = std::env::var("TESSERA_GATEWAY_KEYS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let token_secret = std::env::var("TESSERA_TOKEN_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| SigningSecret::new(s).ok())
            .unwrap_or_else(SigningSecret::insecure_default);

        let rate_limit_enabled = std::env::var("TESSERA_RATE_LIMIT_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(defaults.rate_limit_enabled);

        let rate_limit_per_minute = std::env::var("TESSERA_RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.rate_limit_per_minute);

        let rate_limit_burst = std::env::var("TESSERA_RATE_LIMIT_BURST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.rate_limit_burst);

        Self {
            gateway_keys,
            token_secret,
            rate_limit_enabled,
            rate_limit_per_minute,
            rate_limit_burst,
            bind_host: std::env::var("TESSERA_API_BIND").unwrap_or(defaults.bind_host),
            port: std::env::var("TESSERA_API_PORT").unwrap_or(defaults.port),
        }
    }

    /// Add a gateway key to the accepted set.
    pub fn add_gateway_key(&mut self, key: impl Into<String>) {
        self.gateway_keys.insert(key.into());
    }

    /// Resolve the listen address.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let port = self
            .port
            .parse::<u16>()
            .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", self.port)))?;

        let addr = format!("{}:{}", self.bind_host, port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
    }

    /// Refuse insecure settings in production; warn about them otherwise.
    ///
    /// Production is `TESSERA_ENVIRONMENT=production` (or `prod`).
    pub fn validate_for_production(&self) -> ApiResult<()> {
        let environment = std::env::var("TESSERA_ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase();
        self.validate_for(&environment)
    }

    fn validate_for(&self, environment: &str) -> ApiResult<()> {
        let is_production = environment == "production" || environment == "prod";

        if self.token_secret.is_insecure_default() {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "Cannot start gateway in production with the insecure default token secret. \
                     Set TESSERA_TOKEN_SECRET. TESSERA_ENVIRONMENT={}",
                    environment
                )));
            }
            tracing::warn!(
                "Using insecure default token secret. Set TESSERA_TOKEN_SECRET \
                 to a random value of at least {} characters before deploying.",
                MIN_SECRET_LEN
            );
        } else if self.token_secret.len() < MIN_SECRET_LEN {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "Token secret is too short for production use ({} chars). \
                     It must be at least {} characters long.",
                    self.token_secret.len(),
                    MIN_SECRET_LEN
                )));
            }
            tracing::warn!(
                secret_len = self.token_secret.len(),
                "Token secret is short; use at least {} characters in production",
                MIN_SECRET_LEN
            );
        }

        if self.gateway_keys.is_empty() {
            if is_production {
                return Err(ApiError::invalid_input(
                    "No gateway keys configured. Set TESSERA_GATEWAY_KEYS.",
                ));
            }
            tracing::warn!("No gateway keys configured; every request will be refused");
        }

        Ok(())
    }
}
