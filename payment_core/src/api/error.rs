use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::error::TransactionError;

pub struct ApiError(pub TransactionError);

impl From<TransactionError> for ApiError {
    fn from(err: TransactionError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.0 {
            TransactionError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            TransactionError::ValidationError(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            TransactionError::InvalidState(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            TransactionError::IdempotencyConflict(_) => (StatusCode::CONFLICT, self.0.to_string()),
            // Fraud-blocked admission is persisted as a terminal FAILED
            // transaction and returned 202 by the initiate handler, so
            // this arm is never reached from that path; kept for
            // completeness since the error variant can still surface
            // from other callers.
            TransactionError::FraudBlocked(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.0.to_string()),
            TransactionError::ProviderError { .. } | TransactionError::ProviderTimeout => {
                (StatusCode::BAD_GATEWAY, self.0.to_string())
            }
            TransactionError::WebhookDeliveryError(_) => {
                (StatusCode::BAD_GATEWAY, self.0.to_string())
            }
            TransactionError::RepositoryError(ref e) => {
                tracing::error!("transaction store error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
            TransactionError::TransientInfraError(ref e) => {
                tracing::error!("transient infrastructure error: {e}");
                (StatusCode::SERVICE_UNAVAILABLE, "service temporarily unavailable".to_string())
            }
        };

        let body = Json(json!({
            "status": "error",
            "message": error_message,
        }));

        (status, body).into_response()
    }
}
