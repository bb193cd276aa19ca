use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::{Currency, Money, PaymentMethod};
use mockall::mock;
use mockall::predicate::*;
use payment_core::api::dto::InitiatePaymentRequest;
use payment_core::api::http_routes::{get_payment_status, initiate_payment, AppState};
use payment_core::domain::entities::{AuditLogEntry, Transaction, TransactionStatus, WebhookEvent};
use payment_core::domain::error::TransactionError;
use payment_core::domain::event_bus::{EventBus, PaymentEvent};
use payment_core::domain::fraud::FraudScorer;
use payment_core::domain::idempotency::IdempotencyGate;
use payment_core::domain::repository::TransactionStore;
use payment_core::use_cases::get_payment_status::GetPaymentStatusUseCase;
use payment_core::use_cases::initiate_payment::InitiatePaymentUseCase;
use rust_decimal::Decimal;
use uuid::Uuid;

mock! {
    pub StoreImpl {}

    #[async_trait]
    impl TransactionStore for StoreImpl {
        async fn insert(&self, transaction: Transaction) -> Result<Transaction, TransactionError>;
        async fn by_id(&self, id: Uuid) -> Result<Option<Transaction>, TransactionError>;
        async fn by_reference(&self, reference_id: &str) -> Result<Option<Transaction>, TransactionError>;
        async fn by_idempotency(&self, key: &str) -> Result<Option<Transaction>, TransactionError>;
        async fn update_status(&self, id: Uuid, from: TransactionStatus, to: TransactionStatus, error_code: Option<String>, error_message: Option<String>) -> Result<Option<Transaction>, TransactionError>;
        async fn append_audit(&self, entry: AuditLogEntry);
        async fn list_audit_for_transaction(&self, transaction_id: Uuid) -> Result<Vec<AuditLogEntry>, TransactionError>;
        async fn insert_webhook(&self, event: WebhookEvent) -> Result<WebhookEvent, TransactionError>;
        async fn find_pending_webhooks(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<WebhookEvent>, TransactionError>;
        async fn record_webhook_attempt(&self, id: Uuid, response_status: Option<i32>, response_body: Option<String>, next_retry_at: Option<DateTime<Utc>>) -> Result<WebhookEvent, TransactionError>;
    }
}

mock! {
    pub GateImpl {}

    #[async_trait]
    impl IdempotencyGate for GateImpl {
        async fn lookup(&self, key: &str) -> Result<Option<Uuid>, TransactionError>;
        async fn reserve(&self, key: &str, tx_id: Uuid) -> Result<bool, TransactionError>;
        async fn release(&self, key: &str);
        fn generate(&self) -> String;
    }
}

mock! {
    pub BusImpl {}

    #[async_trait]
    impl EventBus for BusImpl {
        async fn publish(&self, key: Uuid, event: PaymentEvent) -> Result<(), TransactionError>;
    }
}

fn sample_payload() -> InitiatePaymentRequest {
    InitiatePaymentRequest {
        idempotency_key: Some("idem-key-1".to_string()),
        user_id: Uuid::new_v4(),
        merchant_id: Uuid::new_v4(),
        amount: Decimal::new(4999, 2),
        currency: "USD".to_string(),
        payment_method: "CARD".to_string(),
        payment_provider: "stripe".to_string(),
        webhook_url: None,
        metadata: serde_json::json!({}),
        card_pan: Some("4242424242424242".to_string()),
        card_cvv: Some("123".to_string()),
        bank_account_number: None,
        bank_routing_number: None,
        wallet_id: None,
    }
}

#[tokio::test]
async fn initiating_a_fresh_payment_returns_a_pending_transaction() {
    let mut store = MockStoreImpl::new();
    let mut gate = MockGateImpl::new();
    let mut bus = MockBusImpl::new();

    gate.expect_lookup().returning(|_| Ok(None));
    store.expect_by_idempotency().returning(|_| Ok(None));
    store.expect_append_audit().returning(|_| ());
    gate.expect_reserve().returning(|_, _| Ok(true));
    store.expect_insert().times(1).returning(|tx| Ok(tx));
    bus.expect_publish().times(1).returning(|_, _| Ok(()));

    let initiate_payment_use_case = InitiatePaymentUseCase::new(
        Arc::new(store),
        Arc::new(gate),
        Arc::new(FraudScorer::new(true, Decimal::new(70, 2))),
        Arc::new(bus),
    );
    let get_payment_status_use_case =
        GetPaymentStatusUseCase::new(Arc::new(MockStoreImpl::new()));

    let state = Arc::new(AppState {
        initiate_payment_use_case,
        get_payment_status_use_case,
    });

    let result = initiate_payment(State(state), axum::Json(sample_payload())).await;

    let response = result.expect("initiate_payment should succeed").0;
    assert_eq!(response.status, "success");
    assert_eq!(response.data.status, "PENDING");
}

#[tokio::test]
async fn fetching_status_by_reference_id_finds_the_transaction() {
    let mut store = MockStoreImpl::new();

    let request = payment_core::domain::entities::PaymentRequest {
        idempotency_key: None,
        user_id: Uuid::new_v4(),
        merchant_id: Uuid::new_v4(),
        amount: Money::new(Decimal::new(4999, 2), Currency::parse("USD").unwrap()),
        payment_method: PaymentMethod::CARD,
        payment_provider: "stripe".to_string(),
        webhook_url: None,
        metadata: serde_json::json!({}),
        card_pan: Some("4242424242424242".to_string()),
        card_cvv: Some("123".to_string()),
        bank_account_number: None,
        bank_routing_number: None,
        wallet_id: None,
    };
    let tx = Transaction::new(&request, Decimal::ZERO).unwrap();
    let reference_id = tx.reference_id().to_string();
    let tx_clone = tx.clone();

    store
        .expect_by_reference()
        .with(eq(reference_id.clone()))
        .times(1)
        .returning(move |_| Ok(Some(tx_clone.clone())));

    let get_payment_status_use_case = GetPaymentStatusUseCase::new(Arc::new(store));
    let initiate_payment_use_case = InitiatePaymentUseCase::new(
        Arc::new(MockStoreImpl::new()),
        Arc::new(MockGateImpl::new()),
        Arc::new(FraudScorer::new(true, Decimal::new(70, 2))),
        Arc::new(MockBusImpl::new()),
    );

    let state = Arc::new(AppState {
        initiate_payment_use_case,
        get_payment_status_use_case,
    });

    let result = get_payment_status(State(state), Path(reference_id)).await;
    let response = result.expect("lookup should succeed").0;
    assert_eq!(response.data.id, tx.id());
}
