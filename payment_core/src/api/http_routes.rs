use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::dto::{InitiatePaymentRequest, PaymentResponse};
use crate::api::error::ApiError;
use crate::api::response::ApiResponse;
use crate::use_cases::get_payment_status::GetPaymentStatusUseCase;
use crate::use_cases::initiate_payment::InitiatePaymentUseCase;

pub struct AppState {
    pub initiate_payment_use_case: InitiatePaymentUseCase,
    pub get_payment_status_use_case: GetPaymentStatusUseCase,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/payments/initiate", post(initiate_payment))
        .route("/api/v1/payments/status/{id}", get(get_payment_status))
        .route("/api/v1/payments/health", get(health))
        .with_state(state)
}

/// Admits a payment request: scores it for fraud, resolves idempotency
/// and either persists it as `PENDING` or as a fraud-blocked `FAILED`
/// record. The provider charge itself happens asynchronously once the
/// event consumer picks up the `PaymentInitiated` event.
#[utoipa::path(
    post,
    path = "/api/v1/payments/initiate",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 202, description = "Payment admitted", body = ApiResponse<PaymentResponse>),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Idempotency key conflict"),
    )
)]
pub async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentResponse>>), ApiError> {
    let request = payload.try_into()?;
    let transaction = state.initiate_payment_use_case.execute(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(PaymentResponse::from(&transaction))),
    ))
}

/// Looks a transaction up by id or by reference id, accepting either
/// in the same path parameter.
#[utoipa::path(
    get,
    path = "/api/v1/payments/status/{id}",
    params(("id" = String, Path, description = "Transaction id or reference id")),
    responses(
        (status = 200, description = "Transaction found", body = ApiResponse<PaymentResponse>),
        (status = 404, description = "Transaction not found"),
    )
)]
pub async fn get_payment_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PaymentResponse>>, ApiError> {
    let transaction = state.get_payment_status_use_case.execute(&id).await?;
    Ok(Json(ApiResponse::success(PaymentResponse::from(&transaction))))
}

#[utoipa::path(
    get,
    path = "/api/v1/payments/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health() -> &'static str {
    "ok"
}
