use chrono::{DateTime, Utc};
use common::{Currency, Money, PaymentMethod};
use rust_decimal::Decimal;
use serde_json::Value as Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::entities::{AuditEventType, AuditLogEntry, Transaction, TransactionStatus, WebhookEvent};

#[derive(Debug, FromRow)]
pub struct TransactionModel {
    pub id: Uuid,
    pub reference_id: String,
    pub idempotency_key: Option<String>,
    pub user_id: Uuid,
    pub merchant_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_provider: String,
    pub status: TransactionStatus,
    pub fraud_score: Decimal,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_attempts: i32,
    pub webhook_last_attempt: Option<DateTime<Utc>>,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Transaction> for TransactionModel {
    fn from(t: &Transaction) -> Self {
        Self {
            id: t.id(),
            reference_id: t.reference_id().to_string(),
            idempotency_key: t.idempotency_key().map(str::to_string),
            user_id: t.user_id(),
            merchant_id: t.merchant_id(),
            amount: t.amount().amount,
            currency: t.amount().currency.as_str().to_string(),
            payment_method: t.payment_method(),
            payment_provider: t.payment_provider().to_string(),
            status: t.status(),
            fraud_score: t.fraud_score(),
            error_code: t.error_code().map(str::to_string),
            error_message: t.error_message().map(str::to_string),
            webhook_url: t.webhook_url().map(str::to_string),
            webhook_attempts: t.webhook_attempts(),
            webhook_last_attempt: None,
            metadata: t.metadata().clone(),
            created_at: t.created_at(),
            updated_at: t.updated_at(),
        }
    }
}

impl TryFrom<TransactionModel> for Transaction {
    type Error = String;

    fn try_from(m: TransactionModel) -> Result<Self, Self::Error> {
        let currency = Currency::parse(&m.currency).map_err(|e| e.to_string())?;
        Ok(Transaction::reconstitute(
            m.id,
            m.reference_id,
            m.idempotency_key,
            m.user_id,
            m.merchant_id,
            Money::new(m.amount, currency),
            m.payment_method,
            m.payment_provider,
            m.status,
            m.fraud_score,
            m.error_code,
            m.error_message,
            m.webhook_url,
            m.webhook_attempts,
            m.webhook_last_attempt,
            m.metadata,
            m.created_at,
            m.updated_at,
        ))
    }
}

#[derive(Debug, FromRow)]
pub struct AuditLogModel {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub event_type: AuditEventType,
    pub event_data: Json,
    pub user_id: Option<Uuid>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&AuditLogEntry> for AuditLogModel {
    fn from(e: &AuditLogEntry) -> Self {
        Self {
            id: e.id(),
            transaction_id: e.transaction_id(),
            event_type: e.event_type(),
            event_data: e.event_data().clone(),
            user_id: e.user_id(),
            ip: e.ip().map(str::to_string),
            user_agent: e.user_agent().map(str::to_string),
            created_at: e.created_at(),
        }
    }
}

impl From<AuditLogModel> for AuditLogEntry {
    fn from(m: AuditLogModel) -> Self {
        AuditLogEntry::reconstitute(
            m.id,
            m.transaction_id,
            m.event_type,
            m.event_data,
            m.user_id,
            m.ip,
            m.user_agent,
            m.created_at,
        )
    }
}

#[derive(Debug, FromRow)]
pub struct WebhookEventModel {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub url: String,
    pub payload: Json,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&WebhookEvent> for WebhookEventModel {
    fn from(w: &WebhookEvent) -> Self {
        Self {
            id: w.id(),
            transaction_id: w.transaction_id(),
            url: w.url().to_string(),
            payload: w.payload().clone(),
            response_status: None,
            response_body: None,
            attempts: w.attempts(),
            max_attempts: w.max_attempts(),
            next_retry_at: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }
}

impl From<WebhookEventModel> for WebhookEvent {
    fn from(m: WebhookEventModel) -> Self {
        WebhookEvent::reconstitute(
            m.id,
            m.transaction_id,
            m.url,
            m.payload,
            m.response_status,
            m.response_body,
            m.attempts,
            m.max_attempts,
            m.next_retry_at,
            m.created_at,
            m.updated_at,
        )
    }
}
