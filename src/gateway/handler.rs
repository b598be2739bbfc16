use axum::{
    Json,
    extract::State,
    http::HeaderMap,
};
use tracing::instrument;

use crate::config::rag::is_valid_rag_id;
use crate::gateway::error::ApiError;
use crate::gateway::state::AppState;
use crate::pipeline::{ClientIdentity, QueryRequest, QueryResponse};

/// Extracts the client identity from proxy-supplied headers.
///
/// The reverse-proxy tier in front of the service sets `X-Forwarded-For`;
/// the first entry is the originating client. `X-User-Id` carries an
/// authenticated identity when a future auth layer provides one. Without
/// either, all clients share one bucket.
pub(crate) fn client_identity(headers: &HeaderMap) -> ClientIdentity {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "local".to_string());

    let user = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    ClientIdentity { ip, user }
}

/// Validates the request contract; the pipeline assumes these hold.
pub(crate) fn validate(request: &QueryRequest) -> Result<(), ApiError> {
    if !is_valid_rag_id(&request.rag_id) {
        return Err(ApiError::validation(
            "rag_id must be non-empty and match [A-Za-z0-9_]+",
        ));
    }

    if request.question.trim().is_empty() {
        return Err(ApiError::validation("question must not be empty"));
    }

    if request.top_k == Some(0) {
        return Err(ApiError::validation("top_k must be at least 1"));
    }

    Ok(())
}

/// `POST /query`.
#[instrument(skip(state, headers, body), fields(rag_id = tracing::field::Empty))]
pub async fn query_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<QueryResponse>, ApiError> {
    let request: QueryRequest = serde_json::from_value(body)
        .map_err(|e| ApiError::validation(format!("invalid request body: {e}")))?;
    tracing::Span::current().record("rag_id", tracing::field::display(&request.rag_id));

    validate(&request)?;
    let client = client_identity(&headers);

    let response = state.service.query(request, &client).await?;
    Ok(Json(response))
}
