//! Gateway Router
//!
//! Assembles the query endpoints, the health check and the middleware stack.
//!
//! # Middleware Order (outer to inner)
//! 1. CORS and request tracing
//! 2. Auth (only on `/api/*` routes) - gateway key and capability token
//! 3. Rate Limiting - keyed by the authenticated database name
//!
//! Unknown paths fall through to a JSON 404 without touching auth.

pub mod gateway;
pub mod health;

use axum::{
    http::{header, HeaderName, Method, Uri},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tessera_core::{
    HEADER_BOOKMARK, HEADER_DB_NAME, HEADER_DB_TOKEN, PATH_BATCH, PATH_EXEC, PATH_FIRST, PATH_RAW,
    PATH_RUN,
};
use tessera_storage::InstanceRegistry;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::middleware::{auth_middleware, rate_limit_middleware, AuthMiddlewareState, RateLimitState};
use crate::state::GatewayState;

/// Build the gateway from its configuration.
pub fn create_gateway_router(registry: InstanceRegistry, config: &GatewayConfig) -> Router {
    create_router(
        GatewayState::new(registry),
        AuthMiddlewareState::from_config(config),
        RateLimitState::from_config(config),
    )
}

/// Build the gateway from explicit middleware state.
pub fn create_router(
    state: GatewayState,
    auth_state: AuthMiddlewareState,
    rate_limit_state: RateLimitState,
) -> Router {
    let api_routes = Router::new()
        .route(PATH_RUN, post(gateway::run))
        .route(PATH_EXEC, post(gateway::exec))
        .route(PATH_BATCH, post(gateway::batch))
        .route(PATH_RAW, post(gateway::raw))
        .route(PATH_FIRST, post(gateway::first))
        // Layers added later run first: auth, then rate limiting.
        .route_layer(from_fn_with_state(rate_limit_state, rate_limit_middleware))
        .route_layer(from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .route("/health", get(health::health))
        .merge(api_routes)
        .fallback(route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer()),
        )
        .with_state(state)
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::route_not_found(uri.path())
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(HEADER_DB_NAME),
            HeaderName::from_static(HEADER_DB_TOKEN),
            HeaderName::from_static(HEADER_BOOKMARK),
        ])
        .expose_headers([
            HeaderName::from_static(HEADER_BOOKMARK),
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("retry-after"),
        ])
}
