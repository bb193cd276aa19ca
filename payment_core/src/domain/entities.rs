use chrono::{DateTime, Utc};
use common::{Money, PaymentMethod};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::domain::error::TransactionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    PENDING,
    PROCESSING,
    SUCCESS,
    FAILED,
    CANCELLED,
}

impl TransactionStatus {
    /// Legal forward transitions per the state machine. No status ever
    /// moves backwards, and all three terminal states are dead ends.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (PENDING, PROCESSING)
                | (PENDING, CANCELLED)
                | (PROCESSING, SUCCESS)
                | (PROCESSING, FAILED)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::SUCCESS | TransactionStatus::FAILED | TransactionStatus::CANCELLED
        )
    }
}

/// Raw inbound intent-to-pay. Carries the method-specific fields the
/// fraud scorer inspects (PAN/CVV shape, not their values beyond
/// regex/format checks) but that are never persisted onto a
/// `Transaction` — the entity only keeps the provider-routing tag and
/// whatever token the provider hands back.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub idempotency_key: Option<String>,
    pub user_id: Uuid,
    pub merchant_id: Uuid,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_provider: String,
    pub webhook_url: Option<String>,
    #[serde(default = "default_metadata")]
    pub metadata: Json,
    pub card_pan: Option<String>,
    pub card_cvv: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_routing_number: Option<String>,
    pub wallet_id: Option<String>,
}

fn default_metadata() -> Json {
    Json::Object(Default::default())
}

impl PaymentRequest {
    /// Method-specific field presence required by admission (spec §4.4
    /// step 3). Does not check amount positivity — that is a separate
    /// check so validation failures are distinguishable in logs.
    pub fn validate_method_fields(&self) -> Result<(), TransactionError> {
        match self.payment_method {
            PaymentMethod::CARD => {
                if self.card_pan.is_none() || self.card_cvv.is_none() {
                    return Err(TransactionError::ValidationError(
                        "card payments require card_pan and card_cvv".to_string(),
                    ));
                }
            }
            PaymentMethod::BANK => {
                if self.bank_account_number.is_none() || self.bank_routing_number.is_none() {
                    return Err(TransactionError::ValidationError(
                        "bank payments require bank_account_number and bank_routing_number"
                            .to_string(),
                    ));
                }
            }
            PaymentMethod::WALLET => {
                if self.wallet_id.is_none() {
                    return Err(TransactionError::ValidationError(
                        "wallet payments require wallet_id".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// The unit of work the orchestrator moves through its state machine.
///
/// Fields are private; construction goes through `new` (fresh intents)
/// or `reconstitute` (hydrating from the store), both of which enforce
/// the same invariants so a `Transaction` value is never observed in
/// an invalid shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    id: Uuid,
    reference_id: String,
    idempotency_key: Option<String>,
    user_id: Uuid,
    merchant_id: Uuid,
    amount: Money,
    payment_method: PaymentMethod,
    payment_provider: String,
    status: TransactionStatus,
    fraud_score: Decimal,
    error_code: Option<String>,
    error_message: Option<String>,
    webhook_url: Option<String>,
    webhook_attempts: i32,
    webhook_last_attempt: Option<DateTime<Utc>>,
    metadata: Json,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Builds a fresh `PENDING` transaction from an admitted request.
    /// Caller (the orchestrator) is responsible for running
    /// `PaymentRequest::validate_method_fields` and fraud scoring
    /// first; this constructor only enforces the amount invariant
    /// since that one can never be waived by any admission policy.
    pub fn new(request: &PaymentRequest, fraud_score: Decimal) -> Result<Self, TransactionError> {
        if !request.amount.is_positive() {
            return Err(TransactionError::ValidationError(
                "amount must be greater than zero".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            reference_id: generate_reference_id(),
            idempotency_key: request.idempotency_key.clone(),
            user_id: request.user_id,
            merchant_id: request.merchant_id,
            amount: request.amount.clone(),
            payment_method: request.payment_method,
            payment_provider: request.payment_provider.clone(),
            status: TransactionStatus::PENDING,
            fraud_score,
            error_code: None,
            error_message: None,
            webhook_url: request.webhook_url.clone(),
            webhook_attempts: 0,
            webhook_last_attempt: None,
            metadata: request.metadata.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Builds a transaction that is born already in a terminal state.
    /// Used only by admission-time rejection (fraud block), which never
    /// observes a persisted `PENDING` row — the normal `PENDING ->
    /// PROCESSING -> ...` path goes through `new` + `with_status`
    /// instead.
    pub fn new_rejected(
        request: &PaymentRequest,
        fraud_score: Decimal,
        error_code: String,
        error_message: String,
    ) -> Result<Self, TransactionError> {
        let mut tx = Self::new(request, fraud_score)?;
        tx.status = TransactionStatus::FAILED;
        tx.error_code = Some(error_code);
        tx.error_message = Some(error_message);
        Ok(tx)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: Uuid,
        reference_id: String,
        idempotency_key: Option<String>,
        user_id: Uuid,
        merchant_id: Uuid,
        amount: Money,
        payment_method: PaymentMethod,
        payment_provider: String,
        status: TransactionStatus,
        fraud_score: Decimal,
        error_code: Option<String>,
        error_message: Option<String>,
        webhook_url: Option<String>,
        webhook_attempts: i32,
        webhook_last_attempt: Option<DateTime<Utc>>,
        metadata: Json,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            reference_id,
            idempotency_key,
            user_id,
            merchant_id,
            amount,
            payment_method,
            payment_provider,
            status,
            fraud_score,
            error_code,
            error_message,
            webhook_url,
            webhook_attempts,
            webhook_last_attempt,
            metadata,
            created_at,
            updated_at,
        }
    }

    /// Returns a copy with `status` moved forward and failure details
    /// attached, or an error if the transition is not legal from the
    /// current state. Never mutates in place — the store's CAS is the
    /// only thing allowed to make a transition durable.
    pub fn with_status(
        &self,
        next: TransactionStatus,
        error_code: Option<String>,
        error_message: Option<String>,
    ) -> Result<Self, TransactionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransactionError::InvalidState(format!(
                "cannot transition from {:?} to {:?}",
                self.status, next
            )));
        }
        let mut next_tx = self.clone();
        next_tx.status = next;
        next_tx.error_code = error_code;
        next_tx.error_message = error_message;
        next_tx.updated_at = Utc::now();
        Ok(next_tx)
    }

    pub fn record_webhook_attempt(&mut self, attempted_at: DateTime<Utc>) {
        self.webhook_attempts += 1;
        self.webhook_last_attempt = Some(attempted_at);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn reference_id(&self) -> &str {
        &self.reference_id
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn merchant_id(&self) -> Uuid {
        self.merchant_id
    }

    pub fn amount(&self) -> &Money {
        &self.amount
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn payment_provider(&self) -> &str {
        &self.payment_provider
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn fraud_score(&self) -> Decimal {
        self.fraud_score
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    pub fn webhook_attempts(&self) -> i32 {
        self.webhook_attempts
    }

    pub fn metadata(&self) -> &Json {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// `TXN<epoch-ms><rand8>` per the data model — human-visible, safe to
/// log, never reused.
fn generate_reference_id() -> String {
    let epoch_ms = Utc::now().timestamp_millis();
    let suffix: String = {
        const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        let mut rng = rand::thread_rng();
        (0..8)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    };
    format!("TXN{epoch_ms}{suffix}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_event_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    PaymentInitiated,
    PaymentProcessed,
    PaymentSuccess,
    PaymentFailed,
    WebhookSent,
    WebhookFailed,
    FraudCheck,
    IdempotencyCheck,
}

/// Append-only audit trail entry. Rows are never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    id: Uuid,
    transaction_id: Uuid,
    event_type: AuditEventType,
    event_data: Json,
    user_id: Option<Uuid>,
    ip: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        transaction_id: Uuid,
        event_type: AuditEventType,
        event_data: Json,
        user_id: Option<Uuid>,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            event_type,
            event_data,
            user_id,
            ip,
            user_agent,
            created_at: Utc::now(),
        }
    }

    pub fn reconstitute(
        id: Uuid,
        transaction_id: Uuid,
        event_type: AuditEventType,
        event_data: Json,
        user_id: Option<Uuid>,
        ip: Option<String>,
        user_agent: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            transaction_id,
            event_type,
            event_data,
            user_id,
            ip,
            user_agent,
            created_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transaction_id(&self) -> Uuid {
        self.transaction_id
    }

    pub fn event_type(&self) -> AuditEventType {
        self.event_type
    }

    pub fn event_data(&self) -> &Json {
        &self.event_data
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// One outbound-notification batch for a terminal transaction.
/// Terminal when `response_status` lands in `[200, 300)` or
/// `attempts >= max_attempts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    id: Uuid,
    transaction_id: Uuid,
    url: String,
    payload: Json,
    response_status: Option<i32>,
    response_body: Option<String>,
    attempts: i32,
    max_attempts: i32,
    next_retry_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn new(transaction_id: Uuid, url: String, payload: Json, max_attempts: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            url,
            payload,
            response_status: None,
            response_body: None,
            attempts: 0,
            max_attempts,
            next_retry_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: Uuid,
        transaction_id: Uuid,
        url: String,
        payload: Json,
        response_status: Option<i32>,
        response_body: Option<String>,
        attempts: i32,
        max_attempts: i32,
        next_retry_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            transaction_id,
            url,
            payload,
            response_status,
            response_body,
            attempts,
            max_attempts,
            next_retry_at,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transaction_id(&self) -> Uuid {
        self.transaction_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn payload(&self) -> &Json {
        &self.payload
    }

    pub fn attempts(&self) -> i32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> i32 {
        self.max_attempts
    }

    pub fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        self.next_retry_at
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Currency;

    fn sample_request() -> PaymentRequest {
        PaymentRequest {
            idempotency_key: Some("key-1".to_string()),
            user_id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            amount: Money::new(Decimal::new(4999, 2), Currency::parse("USD").unwrap()),
            payment_method: PaymentMethod::CARD,
            payment_provider: "stripe".to_string(),
            webhook_url: None,
            metadata: default_metadata(),
            card_pan: Some("4242424242424242".to_string()),
            card_cvv: Some("123".to_string()),
            bank_account_number: None,
            bank_routing_number: None,
            wallet_id: None,
        }
    }

    #[test]
    fn new_transaction_is_pending_with_fresh_reference() {
        let tx = Transaction::new(&sample_request(), Decimal::new(10, 2)).unwrap();
        assert_eq!(tx.status(), TransactionStatus::PENDING);
        assert!(tx.reference_id().starts_with("TXN"));
    }

    #[test]
    fn rejects_non_positive_amount() {
        let mut req = sample_request();
        req.amount = Money::new(Decimal::ZERO, Currency::parse("USD").unwrap());
        assert!(Transaction::new(&req, Decimal::ZERO).is_err());
    }

    #[test]
    fn state_machine_forbids_illegal_jumps() {
        let tx = Transaction::new(&sample_request(), Decimal::new(10, 2)).unwrap();
        assert!(tx.with_status(TransactionStatus::SUCCESS, None, None).is_err());
        let processing = tx.with_status(TransactionStatus::PROCESSING, None, None).unwrap();
        assert!(processing
            .with_status(TransactionStatus::PENDING, None, None)
            .is_err());
        let success = processing
            .with_status(TransactionStatus::SUCCESS, None, None)
            .unwrap();
        assert!(success
            .with_status(TransactionStatus::FAILED, None, None)
            .is_err());
    }

    #[test]
    fn card_requires_pan_and_cvv() {
        let mut req = sample_request();
        req.card_pan = None;
        assert!(req.validate_method_fields().is_err());
    }
}
