use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::pipeline::QueryError;

/// Structured error body: machine-readable code plus human-readable
/// message. Stack traces never leave the process.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Taxonomy code (e.g. `RAGNotFound`).
    pub code: &'static str,
    /// Human-readable description.
    pub message: String,
}

/// HTTP-mapped gateway error.
#[derive(Debug)]
pub struct ApiError {
    /// Response status.
    pub status: StatusCode,
    /// Response body.
    pub body: ErrorBody,
}

impl ApiError {
    /// Builds a 400 validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                code: "ValidationError",
                message: message.into(),
            },
        }
    }

    /// Builds a 503 overload rejection (load shed above the in-flight cap).
    pub fn overloaded() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: ErrorBody {
                code: "Overloaded",
                message: "service is at capacity, retry shortly".to_string(),
            },
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        let status = match &e {
            QueryError::Validation(_) => StatusCode::BAD_REQUEST,
            QueryError::RagNotFound { .. } => StatusCode::NOT_FOUND,
            QueryError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            QueryError::EmbeddingMisconfigured { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            QueryError::DependencyDown { .. } => StatusCode::SERVICE_UNAVAILABLE,
            QueryError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            QueryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            status,
            body: ErrorBody {
                code: e.code(),
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_to_status_mapping() {
        let cases: Vec<(QueryError, StatusCode, &str)> = vec![
            (
                QueryError::Validation("bad".into()),
                StatusCode::BAD_REQUEST,
                "ValidationError",
            ),
            (
                QueryError::RagNotFound {
                    rag_id: "nope".into(),
                },
                StatusCode::NOT_FOUND,
                "RAGNotFound",
            ),
            (
                QueryError::RateLimited {
                    rag_id: "demo".into(),
                },
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimited",
            ),
            (
                QueryError::EmbeddingMisconfigured {
                    expected: 1536,
                    actual: 384,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
                "EmbeddingMisconfigured",
            ),
            (
                QueryError::DependencyDown {
                    component: "vectordb",
                    message: "down".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
                "DependencyDown",
            ),
            (QueryError::Timeout, StatusCode::GATEWAY_TIMEOUT, "Timeout"),
            (
                QueryError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal",
            ),
        ];

        for (error, status, code) in cases {
            let api: ApiError = error.into();
            assert_eq!(api.status, status);
            assert_eq!(api.body.code, code);
        }
    }
}
