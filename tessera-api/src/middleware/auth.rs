//! Gateway Authentication Middleware
//!
//! Every gateway request carries two credentials:
//! - `Authorization: Bearer <gatewayKey>`: static key shared by trusted callers
//! - `x-db-token: <capabilityToken>`: scopes the request to one database
//!
//! Checks run in a fixed order so clients can tell failures apart:
//! 1. Gateway key (401 `UNAUTHORIZED`)
//! 2. `x-db-name` present (400 `MISSING_FIELD`)
//! 3. `x-db-token` present (401 `INVALID_TOKEN`, reason `malformed`)
//! 4. Capability token valid for that name (401 `INVALID_TOKEN` with reason)
//!
//! On success a [`DbScope`] is inserted into the request extensions.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashSet;
use std::sync::Arc;
use tessera_core::{TokenRejection, HEADER_DB_NAME, HEADER_DB_TOKEN};
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::token::TokenService;

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Accepted gateway keys.
///
/// Keys are held as HMAC tags under a per-process random key. A lookup
/// verifies the presented key against every tag in constant time.
#[derive(Clone)]
pub struct GatewayKeys {
    mac_key: [u8; 32],
    tags: Vec<Vec<u8>>,
}

type HmacSha256 = Hmac<Sha256>;

impl GatewayKeys {
    pub fn new(keys: &HashSet<String>) -> Self {
        let mac_key: [u8; 32] = rand::random();
        let tags = keys
            .iter()
            .filter_map(|key| keyed_mac(&mac_key, key))
            .map(|mac| mac.finalize().into_bytes().to_vec())
            .collect();
        Self { mac_key, tags }
    }

    pub fn contains(&self, key: &str) -> bool {
        let Some(mac) = keyed_mac(&self.mac_key, key) else {
            return false;
        };
        self.tags
            .iter()
            .fold(false, |found, tag| found | mac.clone().verify_slice(tag).is_ok())
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl std::fmt::Debug for GatewayKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GatewayKeys([REDACTED, {} keys])", self.tags.len())
    }
}

fn keyed_mac(mac_key: &[u8], value: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(mac_key).ok()?;
    mac.update(value.as_bytes());
    Some(mac)
}

/// Shared state for the authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    gateway_keys: Arc<GatewayKeys>,
    tokens: TokenService,
}

impl AuthMiddlewareState {
    pub fn new(gateway_keys: HashSet<String>, tokens: TokenService) -> Self {
        Self {
            gateway_keys: Arc::new(GatewayKeys::new(&gateway_keys)),
            tokens,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.gateway_keys.clone(),
            TokenService::new(config.token_secret.clone()),
        )
    }

    fn is_valid_gateway_key(&self, key: &str) -> bool {
        self.gateway_keys.contains(key)
    }
}

/// The logical database an authenticated request is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbScope {
    pub db_name: String,
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Authenticate a request and scope it to one database.
pub fn authenticate(state: &AuthMiddlewareState, headers: &HeaderMap) -> Result<DbScope, ApiError> {
    let gateway_key = header(headers, AUTHORIZATION.as_str())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);
    match gateway_key {
        Some(key) if state.is_valid_gateway_key(key) => {}
        Some(_) => return Err(ApiError::unauthorized("Invalid gateway key")),
        None => {
            return Err(ApiError::unauthorized(
                "Authentication required: provide Authorization: Bearer <gateway key>",
            ))
        }
    }

    let db_name = header(headers, HEADER_DB_NAME)
        .ok_or_else(|| ApiError::missing_field(HEADER_DB_NAME))?;

    let token = header(headers, HEADER_DB_TOKEN)
        .ok_or_else(|| ApiError::invalid_token(TokenRejection::Malformed))?;

    state.tokens.validate(db_name, token).map_err(|rejection| {
        debug!(db = %db_name, reason = rejection.reason(), "Capability token rejected");
        ApiError::invalid_token(rejection)
    })?;

    Ok(DbScope {
        db_name: db_name.to_string(),
    })
}

/// Axum middleware for gateway authentication.
///
/// ```ignore
/// let app = Router::new()
///     .route("/api/run", post(run))
///     .route_layer(middleware::from_fn_with_state(auth_state, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let scope = authenticate(&state, request.headers()).map_err(AuthMiddlewareError)?;
    request.extensions_mut().insert(scope);
    Ok(next.run(request).await)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error wrapper for middleware that implements IntoResponse.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

#[async_trait]
impl<S> FromRequestParts<S> for DbScope
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<DbScope>().cloned().ok_or_else(|| {
            AuthMiddlewareError(ApiError::internal_error(
                "DbScope not found in request extensions. \
                 Ensure auth_middleware is applied to this route.",
            ))
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{FixedClock, SigningSecret};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt; // for `oneshot`

    const NOW: i64 = 1_704_067_200_000;

    fn tokens() -> TokenService {
        TokenService::with_clock(
            SigningSecret::new("middleware-test-secret").unwrap(),
            Arc::new(FixedClock(NOW)),
        )
    }

    fn test_app() -> Router {
        let keys = HashSet::from(["gw-key".to_string()]);
        let state = AuthMiddlewareState::new(keys, tokens());

        async fn handler(scope: DbScope) -> String {
            scope.db_name
        }

        Router::new()
            .route("/protected", get(handler))
            .layer(middleware::from_fn_with_state(state, auth_middleware))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_gateway_keys_match_exactly() {
        let keys = GatewayKeys::new(&HashSet::from(["alpha".to_string(), "beta".to_string()]));
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("alpha"));
        assert!(keys.contains("beta"));
        assert!(!keys.contains("alph"));
        assert!(!keys.contains("alphabet"));
        assert!(!keys.contains(""));
        assert!(!format!("{:?}", keys).contains("alpha"));

        let none = GatewayKeys::new(&HashSet::new());
        assert!(none.is_empty());
        assert!(!none.contains("alpha"));
    }

    #[tokio::test]
    async fn test_valid_credentials_inject_scope() {
        let token = tokens().mint("tenant-1", 60_000).unwrap();
        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "Bearer gw-key")
            .header("x-db-name", "tenant-1")
            .header("x-db-token", token)
            .body(Body::empty())
            .unwrap();

        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"tenant-1");
    }

    #[tokio::test]
    async fn test_bad_gateway_key_wins_over_everything() {
        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "Bearer wrong")
            .body(Body::empty())
            .unwrap();

        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_unauthorized() {
        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "Basic gw-key")
            .header("x-db-name", "tenant-1")
            .body(Body::empty())
            .unwrap();

        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_name_is_bad_request() {
        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "Bearer gw-key")
            .header("x-db-token", "a.b.c.d")
            .body(Body::empty())
            .unwrap();

        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "MISSING_FIELD");
    }

    #[tokio::test]
    async fn test_missing_token_is_malformed() {
        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "Bearer gw-key")
            .header("x-db-name", "tenant-1")
            .body(Body::empty())
            .unwrap();

        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["reason"], "malformed");
    }

    #[tokio::test]
    async fn test_token_for_other_database_is_refused() {
        let token = tokens().mint("tenant-1", 60_000).unwrap();
        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "Bearer gw-key")
            .header("x-db-name", "tenant-2")
            .header("x-db-token", token)
            .body(Body::empty())
            .unwrap();

        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["reason"], "dbname_mismatch");
    }

    #[tokio::test]
    async fn test_empty_key_set_refuses_everyone() {
        let state = AuthMiddlewareState::new(HashSet::new(), tokens());
        let app = Router::new()
            .route("/protected", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state, auth_middleware));

        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "Bearer ")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_scope_extractor_without_middleware() {
        async fn handler(_scope: DbScope) -> &'static str {
            "unreachable"
        }

        let app = Router::new().route("/open", get(handler));
        let request = Request::builder().uri("/open").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
