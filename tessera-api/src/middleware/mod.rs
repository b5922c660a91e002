//! Axum middleware for the gateway: authentication and rate limiting.

pub mod auth;
pub mod rate_limit;

pub use auth::{
    auth_middleware, authenticate, AuthMiddlewareError, AuthMiddlewareState, DbScope, GatewayKeys,
};
pub use rate_limit::{
    rate_limit_middleware, InMemoryRateLimitStore, RateLimitError, RateLimitState, RateLimitStore,
};
