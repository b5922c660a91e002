//! Rate Limiting Middleware
//!
//! Requests are counted per logical database. Counters live behind the
//! [`RateLimitStore`] trait; [`InMemoryRateLimitStore`] keeps them in this
//! process only, so several gateway processes each enforce their own limit.
//! Multi-process deployments need a shared store.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use governor::{clock::DefaultClock, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::middleware::auth::DbScope;

/// Type alias for the rate limiter we use.
type DirectRateLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, DefaultClock>;

// ============================================================================
// STORE
// ============================================================================

/// Keyed request counter.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one request against `key`.
    async fn check(&self, key: &str) -> Result<(), RateLimitError>;

    /// Requests per minute allowed for `key`.
    fn limit(&self, key: &str) -> u32;
}

/// Single-process store: one `governor` limiter per key.
pub struct InMemoryRateLimitStore {
    per_minute: u32,
    burst: u32,
    limiters: DashMap<String, Arc<DirectRateLimiter>>,
}

impl std::fmt::Debug for InMemoryRateLimitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRateLimitStore")
            .field("per_minute", &self.per_minute)
            .field("burst", &self.burst)
            .field("keys", &self.limiters.len())
            .finish()
    }
}

impl InMemoryRateLimitStore {
    pub fn new(per_minute: u32, burst: u32) -> Self {
        Self {
            per_minute,
            burst,
            limiters: DashMap::new(),
        }
    }

    fn limiter(&self, key: &str) -> Arc<DirectRateLimiter> {
        self.limiters
            .entry(key.to_string())
            .or_insert_with(|| {
                let quota =
                    Quota::per_minute(NonZeroU32::new(self.per_minute).unwrap_or(NonZeroU32::MIN))
                        .allow_burst(NonZeroU32::new(self.burst).unwrap_or(NonZeroU32::MIN));
                Arc::new(RateLimiter::direct(quota))
            })
            .clone()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn check(&self, key: &str) -> Result<(), RateLimitError> {
        self.limiter(key).check().map_err(|not_until| {
            let retry_after = not_until
                .wait_time_from(governor::clock::Clock::now(&DefaultClock::default()))
                .as_secs()
                .max(1);
            RateLimitError { retry_after }
        })
    }

    fn limit(&self, _key: &str) -> u32 {
        self.per_minute
    }
}

// ============================================================================
// MIDDLEWARE
// ============================================================================

/// State for rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    enabled: bool,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimitState {
    pub fn new(enabled: bool, store: Arc<dyn RateLimitStore>) -> Self {
        Self { enabled, store }
    }

    /// In-memory limiting configured from the gateway config.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.rate_limit_enabled,
            Arc::new(InMemoryRateLimitStore::new(
                config.rate_limit_per_minute,
                config.rate_limit_burst,
            )),
        )
    }

    pub fn disabled() -> Self {
        Self::new(false, Arc::new(InMemoryRateLimitStore::new(0, 0)))
    }
}

/// Error type for rate limit middleware.
#[derive(Debug)]
pub struct RateLimitError {
    /// Seconds until a request would be allowed
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut response = ApiError::too_many_requests(Some(self.retry_after)).into_response();
        response.headers_mut().insert(
            HeaderName::from_static("retry-after"),
            HeaderValue::from_str(&self.retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );
        response
    }
}

/// Rate limiting middleware, keyed by the request's [`DbScope`].
///
/// Must run after `auth_middleware`; unscoped requests pass through.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    if !state.enabled {
        return Ok(next.run(request).await);
    }

    let Some(db_name) = request
        .extensions()
        .get::<DbScope>()
        .map(|scope| scope.db_name.clone())
    else {
        return Ok(next.run(request).await);
    };

    if let Err(e) = state.store.check(&db_name).await {
        debug!(db = %db_name, retry_after = e.retry_after, "Rate limited");
        return Err(e);
    }

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&state.store.limit(&db_name).to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("x-ratelimit-limit"), value);
    }
    Ok(response)
}

// ============================================================================
// TESTS
// ============================================================================
