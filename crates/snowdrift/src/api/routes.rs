use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use chrono::{DateTime, Utc};
use snafu::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AppState;
use super::error::{ApiError, CatalogSnafu, SessionSnafu};
use super::types::{FileResource, FilesQuery, FilesResponse, LoginResponse};
use crate::error::EngineError;

const SESSION_HEADER: &str = "mu-session-id";
const KEY_HEADER: &str = "key";
const ALLOWED_GROUPS_HEADER: &str = "mu-auth-allowed-groups";

/// Build the API router.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/delta", post(receive_delta))
        .route("/files", get(list_files))
        .route("/login", post(login))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Whether the request declares an `application/json` body.
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// `POST /delta`: buffer a JSON array of delta records.
///
/// Bodies not declared as `application/json` are not parsed and count as an
/// empty delta.
async fn receive_delta(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    if !is_json(&headers) {
        debug!(bytes = body.len(), "Ignoring delta without a JSON content type");
        return Ok(StatusCode::ACCEPTED);
    }

    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?;

    let serde_json::Value::Array(records) = value else {
        return Err(ApiError::bad_request("Delta body must be a JSON array"));
    };

    if records.is_empty() {
        return Ok(StatusCode::ACCEPTED);
    }

    if state.log_incoming_delta {
        info!(delta = %serde_json::Value::Array(records.clone()), "Receiving delta");
    }

    match state.cache.push(records) {
        Ok(count) => {
            debug!(count, "Delta buffered");
            Ok(StatusCode::ACCEPTED)
        }
        Err(EngineError::Closed) => Err(ApiError::ShuttingDown),
        Err(e) => {
            warn!(error = %e, "Delta rejected");
            Err(ApiError::ShuttingDown)
        }
    }
}

/// `GET /files?since=<ISO-8601>`: files published after `since`.
async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<FilesResponse>, ApiError> {
    let since = match query.since.as_deref() {
        None | Some("") => Utc::now(),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ApiError::bad_request(format!("Invalid 'since' timestamp '{raw}': {e}")))?,
    };

    let files = state.cache.list_since(since).await.context(CatalogSnafu)?;

    Ok(Json(FilesResponse {
        data: files.into_iter().map(FileResource::from).collect(),
    }))
}

/// `POST /login`: link the caller's session to the consumer account.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let Some(expected) = state.login_key.as_deref() else {
        return Err(ApiError::bad_request("No key configured in service"));
    };

    let provided = headers.get(KEY_HEADER).and_then(|v| v.to_str().ok());
    if provided != Some(expected) {
        return Err(ApiError::bad_request("Invalid key"));
    }

    let session = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing mu-session-id header"))?;

    state.sessions.grant(session).await.context(SessionSnafu)?;
    info!(session, "Consumer session granted");

    Ok((
        StatusCode::CREATED,
        [(ALLOWED_GROUPS_HEADER, "CLEAR")],
        Json(LoginResponse::new(Uuid::new_v4().to_string())),
    ))
}

async fn health() -> &'static str {
    "ok\n"
}
