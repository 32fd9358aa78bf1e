//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::ItemError;
use projections::ProjectionError;
use saga::{FailureKind, SagaError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// No caller identity was forwarded with the request.
    Unauthenticated(String),
    Saga(SagaError),
    Projection(ProjectionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Saga(err) => (saga_status(&err), err.to_string()),
            ApiError::Projection(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn saga_status(err: &SagaError) -> StatusCode {
    match err {
        SagaError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SagaError::Unauthorized { .. } | SagaError::NotOwner { .. } => StatusCode::FORBIDDEN,
        SagaError::InsufficientBudget { .. } | SagaError::BudgetOverflow => {
            StatusCode::PAYMENT_REQUIRED
        }
        SagaError::AlreadyOracle(_) | SagaError::NotOracle(_) | SagaError::InvalidState { .. } => {
            StatusCode::CONFLICT
        }
        _ => match err.kind() {
            FailureKind::LedgerRejection
            | FailureKind::MetadataRejection
            | FailureKind::RollbackRejection => StatusCode::CONFLICT,
            FailureKind::Validation => StatusCode::BAD_REQUEST,
            FailureKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<ItemError> for ApiError {
    fn from(err: ItemError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}
