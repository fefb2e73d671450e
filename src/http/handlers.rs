//! Route handlers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::geocoder::{CancellationToken, GeocodeError, Geocoder, SearchOptions};
use crate::http::server::AppState;

/// Non-standard "client closed request".
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn error_response(status: StatusCode, error: &'static str, message: Option<String>) -> Response {
    (status, Json(ErrorBody { error, message })).into_response()
}

/// Status code for a failed search.
pub fn status_for(error: &GeocodeError) -> StatusCode {
    match error {
        GeocodeError::Cancelled => {
            StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST)
        }
        GeocodeError::Provider(_) => StatusCode::BAD_GATEWAY,
        GeocodeError::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
        GeocodeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        GeocodeError::NoProviders | GeocodeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `GET /search?q=`
pub async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let query = params.q.trim();
    if query.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "missing_query",
            Some("query parameter 'q' must not be blank".to_string()),
        );
    }

    // Dropped with this future if the client goes away.
    let token = CancellationToken::new();
    let guard = token.drop_guard();
    let opts = SearchOptions::with_cancellation(token);
    let result = state.pipeline.search(query, &opts).await;
    guard.disarm();

    match result {
        Ok(Some(address)) => Json(address).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "not_found", None),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::warn!(query = %query, error = %e, status = status.as_u16(), "Search failed");
            }
            error_response(status, e.code(), Some(e.to_string()))
        }
    }
}

/// `GET /stats`
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.pipeline.stats())
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}
