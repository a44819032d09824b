//! HTTP request handlers for the lookup RPC and introspection endpoints.

use crate::introspection::StatusReport;
use crate::rpc::{LookupRequest, LookupResponse};
use crate::server::AppState;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hfserve_registry::LookupPair;
use std::sync::Arc;

/// Handle POST /rpc/HFileService.
///
/// Lookups may hit disk-resident collections, so they run on the blocking
/// pool. Results come back in request order, one per key.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a body that is not a valid lookup
/// request.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<LookupResponse>, AppError> {
    let request: LookupRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid lookup request: {e}")))?;

    tracing::debug!("Handling lookup request for {} keys", request.len());

    let service = state.service().clone();
    let outcomes = tokio::task::spawn_blocking(move || match request {
        LookupRequest::Batch { lookups } => {
            let pairs: Vec<LookupPair> = lookups.into_iter().map(LookupPair::from).collect();
            service.get_batch(&pairs)
        }
        LookupRequest::Collection { collection, keys } => service.get_many(&collection, &keys),
    })
    .await
    .map_err(|e| AppError::Internal(format!("lookup task failed: {e}")))?;

    Ok(Json(LookupResponse::from(outcomes)))
}

/// Handle GET / with a plain-text status page.
pub async fn handle_status_text(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        StatusReport::from_state(&state).render_text(),
    )
        .into_response()
}

/// Handle GET /collections with the status document as JSON.
pub async fn handle_status_json(State(state): State<Arc<AppState>>) -> Json<StatusReport> {
    Json(StatusReport::from_state(&state))
}

/// Handle GET /health.
pub async fn handle_health() -> &'static str {
    "ok"
}

/// Application-level error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Malformed request (400)
    BadRequest(String),
    /// Handler failure (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(msg) => {
                tracing::error!("{msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hfserve_registry::Registry;

    fn empty_state() -> Arc<AppState> {
        Arc::new(AppState::new(Registry::default()))
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let result = handle_rpc(State(empty_state()), Bytes::from_static(b"{nope")).await;
        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_collection_is_not_an_error() {
        let body = Bytes::from_static(br#"{"lookups":[{"collection":"x","key":"aw=="}]}"#);
        let Json(response) = handle_rpc(State(empty_state()), body).await.unwrap();
        assert_eq!(
            response.results,
            vec![crate::rpc::WireOutcome::UnknownCollection]
        );
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(handle_health().await, "ok");
    }
}
