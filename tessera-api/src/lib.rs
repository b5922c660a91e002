//! Tessera API - Gateway, Capability Tokens and Orchestration
//!
//! - [`token`]: HMAC-signed capability tokens scoping a request to one database
//! - [`routes`]: the HTTP gateway (`/api/run|exec|batch|raw|first`, `/health`)
//! - [`middleware`]: gateway-key and token authentication, rate limiting
//! - [`orchestrator`]: provisioning, token issue and initial migration

pub mod config;
pub mod error;
pub mod middleware;
pub mod orchestrator;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod token;

pub use config::GatewayConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{
    auth_middleware, rate_limit_middleware, AuthMiddlewareState, DbScope, InMemoryRateLimitStore,
    RateLimitState, RateLimitStore,
};
pub use orchestrator::{
    BackendRef, DeprovisionMode, MigrationStatus, Orchestrator, OrchestratorConfig,
    ProvisionOptions, ProvisionedDatabase,
};
pub use routes::{create_gateway_router, create_router};
pub use state::GatewayState;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
pub use token::{
    mint, mint_at, validate, validate_at, FixedClock, SigningSecret, SystemClock, TokenClock,
    TokenService,
};
