//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use journal::JournalError;
use projections::ProjectionError;
use saga::SagaError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Saga(#[from] SagaError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Saga(err) => saga_status(err),
            ApiError::Projection(ProjectionError::OrderNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Projection(ProjectionError::AlreadyAssigned(_)) => StatusCode::CONFLICT,
            ApiError::Projection(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn saga_status(err: &SagaError) -> StatusCode {
    match err {
        SagaError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        SagaError::AlreadyAssigned(_)
        | SagaError::InvalidState { .. }
        | SagaError::Cancelled(_)
        | SagaError::Domain(DomainError::Journal(JournalError::ConcurrencyConflict { .. })) => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;
    use domain::OrderState;

    #[test]
    fn test_status_mapping() {
        let id = OrderId::new();
        assert_eq!(
            ApiError::from(SagaError::OrderNotFound(id)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(SagaError::AlreadyAssigned(id)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(SagaError::InvalidState {
                order_id: id,
                state: OrderState::Created,
                action: "assign driver",
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::BadRequest("bad id".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SagaError::OperationalFailure {
                order_id: id,
                step: "lookup_pizza".to_string(),
                attempts: 5,
                reason: "Unavailable".to_string(),
            })
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
