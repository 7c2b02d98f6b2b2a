//! Query endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error_response;
use crate::error::PipelineError;
use crate::models::{QueryRequest, QueryResponse};
use crate::state::AppState;

type ApiError = (StatusCode, Json<serde_json::Value>);

/// POST /api/query — answer a question from the user's indexed documents.
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    if request.query_text.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Empty query"));
    }
    if request.user_id.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Missing user_id"));
    }

    let response = state
        .pipeline
        .answer(&request.user_id, &request.query_text)
        .await
        .map_err(|e| {
            tracing::error!("Query failed for user {}: {e}", request.user_id);
            match e {
                PipelineError::RetrievalUnavailable => error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Retrieval is temporarily unavailable",
                ),
                PipelineError::Generation(_) => error_response(
                    StatusCode::BAD_GATEWAY,
                    "Answer generation is temporarily unavailable",
                ),
                _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, "Query failed"),
            }
        })?;

    Ok(Json(response))
}
