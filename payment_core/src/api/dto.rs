use common::{Currency, Money, PaymentMethod};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::entities::{PaymentRequest, Transaction};
use crate::domain::error::TransactionError;

/// Wire shape for `POST /api/v1/payments/initiate`. Kept distinct from
/// `domain::entities::PaymentRequest` so the OpenAPI schema never has
/// to reach into a path dependency's types.
#[derive(Debug, Deserialize, ToSchema)]
pub struct InitiatePaymentRequest {
    pub idempotency_key: Option<String>,
    pub user_id: Uuid,
    pub merchant_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub payment_provider: String,
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub metadata: Json,
    pub card_pan: Option<String>,
    pub card_cvv: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_routing_number: Option<String>,
    pub wallet_id: Option<String>,
}

impl TryFrom<InitiatePaymentRequest> for PaymentRequest {
    type Error = TransactionError;

    fn try_from(dto: InitiatePaymentRequest) -> Result<Self, Self::Error> {
        let currency = Currency::parse(&dto.currency)
            .map_err(|e| TransactionError::ValidationError(e.to_string()))?;
        let payment_method = parse_payment_method(&dto.payment_method)?;

        Ok(PaymentRequest {
            idempotency_key: dto.idempotency_key,
            user_id: dto.user_id,
            merchant_id: dto.merchant_id,
            amount: Money::new(dto.amount, currency),
            payment_method,
            payment_provider: dto.payment_provider,
            webhook_url: dto.webhook_url,
            metadata: dto.metadata,
            card_pan: dto.card_pan,
            card_cvv: dto.card_cvv,
            bank_account_number: dto.bank_account_number,
            bank_routing_number: dto.bank_routing_number,
            wallet_id: dto.wallet_id,
        })
    }
}

fn parse_payment_method(raw: &str) -> Result<PaymentMethod, TransactionError> {
    match raw.to_uppercase().as_str() {
        "CARD" => Ok(PaymentMethod::CARD),
        "WALLET" => Ok(PaymentMethod::WALLET),
        "BANK" => Ok(PaymentMethod::BANK),
        other => Err(TransactionError::ValidationError(format!(
            "unknown payment_method: {other}"
        ))),
    }
}

/// Response shape for both `initiate` and `status` endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub reference_id: String,
    pub status: String,
    pub amount: Decimal,
    pub currency: String,
    pub fraud_score: Decimal,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Transaction> for PaymentResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id(),
            reference_id: tx.reference_id().to_string(),
            status: format!("{:?}", tx.status()),
            amount: tx.amount().amount,
            currency: tx.amount().currency.as_str().to_string(),
            fraud_score: tx.fraud_score(),
            error_code: tx.error_code().map(str::to_string),
            error_message: tx.error_message().map(str::to_string),
            created_at: tx.created_at(),
            updated_at: tx.updated_at(),
        }
    }
}
