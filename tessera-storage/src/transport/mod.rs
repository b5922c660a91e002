//! SQL transports.
//!
//! Every caller talks to a logical database through [`SqlClient`]. Which
//! implementation backs it is an explicit [`TransportStrategy`], chosen once
//! at startup and injected, never detected from the environment at call
//! time.

mod direct;
mod http;

pub use direct::DirectClient;
pub use http::HttpClient;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tessera_core::{Envelope, Statement, StorageError};

use crate::registry::InstanceRegistry;

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Which transport a client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Direct,
    Http,
}

/// Uniform query surface over a single logical database.
///
/// Query failures never cross this boundary as errors: they come back as
/// `Envelope { success: false, error }`. Check `success` before reading
/// `data` or `results`.
#[async_trait]
pub trait SqlClient: Send + Sync {
    /// Parameterized execute-and-collect.
    async fn query(&self, sql: &str, params: Vec<Value>) -> Envelope;

    /// Raw DDL, no parameters.
    async fn exec(&self, sql: &str) -> Envelope;

    /// All statements in one transaction.
    async fn batch(&self, statements: Vec<Statement>) -> Envelope;

    /// Rows as arrays, optionally headed by column names.
    async fn raw(&self, sql: &str, params: Vec<Value>, column_names: bool) -> Envelope;

    /// Zero or one row; `column_name` projects a scalar.
    async fn first(&self, sql: &str, params: Vec<Value>, column_name: Option<&str>) -> Envelope;

    /// Last consistency point this client has seen, if any.
    fn bookmark(&self) -> Option<String>;

    fn kind(&self) -> TransportKind;

    /// Logical database this client is bound to.
    fn db_name(&self) -> &str;
}

/// Transport selection.
#[derive(Clone, PartialEq, Eq)]
pub enum TransportStrategy {
    /// In-process calls on an instance from the registry.
    Direct,
    /// Remote calls through the gateway.
    Http {
        base_url: String,
        gateway_key: String,
        timeout: Duration,
    },
}

impl std::fmt::Debug for TransportStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportStrategy::Direct => f.write_str("Direct"),
            TransportStrategy::Http {
                base_url, timeout, ..
            } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("gateway_key", &"[REDACTED]")
                .field("timeout", timeout)
                .finish(),
        }
    }
}

impl TransportStrategy {
    pub fn http(base_url: impl Into<String>, gateway_key: impl Into<String>) -> Self {
        TransportStrategy::Http {
            base_url: base_url.into(),
            gateway_key: gateway_key.into(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            TransportStrategy::Direct => TransportKind::Direct,
            TransportStrategy::Http { .. } => TransportKind::Http,
        }
    }
}

/// Build a client for `db_name` using the given strategy.
///
/// The direct strategy needs the name bound in `registry`; the HTTP strategy
/// only needs the capability token.
pub fn connect(
    strategy: &TransportStrategy,
    registry: &InstanceRegistry,
    db_name: &str,
    token: &str,
) -> Result<Arc<dyn SqlClient>, StorageError> {
    match strategy {
        TransportStrategy::Direct => {
            let instance = registry
                .get(db_name)
                .ok_or_else(|| StorageError::InstanceNotFound {
                    name: db_name.to_string(),
                })?;
            Ok(Arc::new(DirectClient::new(instance)))
        }
        TransportStrategy::Http {
            base_url,
            gateway_key,
            timeout,
        } => Ok(Arc::new(HttpClient::new(
            base_url,
            gateway_key,
            db_name,
            token,
            *timeout,
        )?)),
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Transport configuration loaded from the environment.
#[derive(Clone)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub gateway_url: String,
    pub gateway_key: String,
    pub http_timeout: Duration,
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("kind", &self.kind)
            .field("gateway_url", &self.gateway_url)
            .field("gateway_key", &"[REDACTED]")
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Direct,
            gateway_url: "http://127.0.0.1:3000".to_string(),
            gateway_key: String::new(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// Create TransportConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TESSERA_TRANSPORT`: "direct" or "http" (default: direct)
    /// - `TESSERA_GATEWAY_URL`: Gateway base URL (default: http://127.0.0.1:3000)
    /// - `TESSERA_GATEWAY_KEY`: Static gateway key sent as a bearer token
    /// - `TESSERA_HTTP_TIMEOUT_MS`: Request timeout (default: 30000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let kind = match std::env::var("TESSERA_TRANSPORT")
            .ok()
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Some("http") => TransportKind::Http,
            _ => TransportKind::Direct,
        };

        let gateway_url = std::env::var("TESSERA_GATEWAY_URL").unwrap_or(defaults.gateway_url);

        let gateway_key = std::env::var("TESSERA_GATEWAY_KEY").unwrap_or_default();

        let http_timeout = std::env::var("TESSERA_HTTP_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.http_timeout);

        Self {
            kind,
            gateway_url,
            gateway_key,
            http_timeout,
        }
    }

    pub fn strategy(&self) -> TransportStrategy {
        match self.kind {
            TransportKind::Direct => TransportStrategy::Direct,
            TransportKind::Http => TransportStrategy::Http {
                base_url: self.gateway_url.clone(),
                gateway_key: self.gateway_key.clone(),
                timeout: self.http_timeout,
            },
        }
    }
}
