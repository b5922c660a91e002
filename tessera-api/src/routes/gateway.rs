//! Gateway Query Endpoints
//!
//! Five POST endpoints forward a parsed body to the matching instance
//! operation. Authentication has already happened in middleware; each
//! handler resolves the scoped name to a bound instance (404 if none),
//! honours the caller's bookmark and runs the statement on the blocking
//! pool.
//!
//! Statement failures are still HTTP 200 with `{success:false, error}`.
//! Every instance-backed response carries the instance's current bookmark
//! in `x-d1-bookmark`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tessera_core::{BatchRequest, Bookmark, Envelope, QueryRequest, HEADER_BOOKMARK};
use tessera_storage::SqliteInstance;
use tracing::{debug, error};

use crate::error::{ApiError, ApiResult};
use crate::middleware::DbScope;
use crate::state::GatewayState;

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::invalid_input(rejection.body_text()))
}

/// Bookmark the caller last saw, if it sent a well-formed one.
fn requested_bookmark(headers: &HeaderMap) -> Option<Bookmark> {
    let value = headers.get(HEADER_BOOKMARK)?.to_str().ok()?;
    match value.parse() {
        Ok(bookmark) => Some(bookmark),
        Err(e) => {
            debug!(error = %e, "Ignoring invalid bookmark header");
            None
        }
    }
}

/// Resolve, check the bookmark, run `op` off the async runtime and wrap the
/// envelope with the bookmark header.
async fn dispatch<F>(state: &GatewayState, scope: &DbScope, headers: &HeaderMap, op: F) -> ApiResult<Response>
where
    F: FnOnce(&SqliteInstance) -> Envelope + Send + 'static,
{
    let instance = state
        .registry
        .get(&scope.db_name)
        .ok_or_else(|| ApiError::database_not_found(&scope.db_name))?;

    let observed = match requested_bookmark(headers) {
        Some(bookmark) => instance.observe(bookmark),
        None => Ok(()),
    };

    let envelope = match observed {
        Ok(()) => {
            let worker = Arc::clone(&instance);
            tokio::task::spawn_blocking(move || op(worker.as_ref()))
                .await
                .map_err(|e| {
                    error!(db = %scope.db_name, error = %e, "Statement task failed");
                    ApiError::internal_error("Statement execution was aborted")
                })?
        }
        Err(e) => {
            debug!(db = %scope.db_name, error = %e, "Bookmark ahead of instance");
            Envelope::failure(e.to_string())
        }
    };

    let mut response = Json(envelope).into_response();
    if let Ok(value) = HeaderValue::from_str(&instance.bookmark().to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(HEADER_BOOKMARK), value);
    }
    Ok(response)
}

/// POST /api/run
pub async fn run(
    State(state): State<GatewayState>,
    scope: DbScope,
    headers: HeaderMap,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let statement = parse_body(body)?.statement();
    dispatch(&state, &scope, &headers, move |instance| instance.run(&statement)).await
}

/// POST /api/exec
pub async fn exec(
    State(state): State<GatewayState>,
    scope: DbScope,
    headers: HeaderMap,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let sql = parse_body(body)?.query;
    dispatch(&state, &scope, &headers, move |instance| instance.exec(&sql)).await
}

/// POST /api/batch
pub async fn batch(
    State(state): State<GatewayState>,
    scope: DbScope,
    headers: HeaderMap,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let statements = parse_body(body)?.batch;
    dispatch(&state, &scope, &headers, move |instance| instance.batch(&statements)).await
}

/// POST /api/raw
pub async fn raw(
    State(state): State<GatewayState>,
    scope: DbScope,
    headers: HeaderMap,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let request = parse_body(body)?;
    let column_names = request.column_names.unwrap_or(false);
    let statement = request.statement();
    dispatch(&state, &scope, &headers, move |instance| {
        instance.raw(&statement, column_names)
    })
    .await
}

/// POST /api/first
pub async fn first(
    State(state): State<GatewayState>,
    scope: DbScope,
    headers: HeaderMap,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let request = parse_body(body)?;
    let statement = request.statement();
    let column_name = request.column_name;
    dispatch(&state, &scope, &headers, move |instance| {
        instance.first(&statement, column_name.as_deref())
    })
    .await
}
