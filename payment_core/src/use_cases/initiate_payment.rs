use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use crate::domain::entities::{AuditEventType, AuditLogEntry, PaymentRequest, Transaction, TransactionStatus};
use crate::domain::error::TransactionError;
use crate::domain::event_bus::{EventBus, PaymentEvent, PaymentEventType};
use crate::domain::fraud::FraudScorer;
use crate::domain::idempotency::IdempotencyGate;
use crate::domain::repository::TransactionStore;

const FRAUD_BLOCKED_CODE: &str = "FRAUD_BLOCKED";

/// Admission entry point (spec §4.4 `Initiate`). Owns the idempotency
/// gate composition, fraud-gated admission and the initial
/// `PAYMENT_INITIATED` publish; `ProcessPaymentUseCase` owns everything
/// that happens after.
pub struct InitiatePaymentUseCase {
    store: Arc<dyn TransactionStore>,
    idempotency_gate: Arc<dyn IdempotencyGate>,
    fraud_scorer: Arc<FraudScorer>,
    event_bus: Arc<dyn EventBus>,
}

impl InitiatePaymentUseCase {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        idempotency_gate: Arc<dyn IdempotencyGate>,
        fraud_scorer: Arc<FraudScorer>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            store,
            idempotency_gate,
            fraud_scorer,
            event_bus,
        }
    }

    #[tracing::instrument(name = "InitiatePaymentUseCase::execute", skip(self, request))]
    pub async fn execute(&self, request: PaymentRequest) -> Result<Transaction, TransactionError> {
        let key = request
            .idempotency_key
            .clone()
            .unwrap_or_else(|| self.idempotency_gate.generate());

        if let Some(existing) = self.resolve_existing(&key).await? {
            return Ok(existing);
        }

        request.validate_method_fields()?;

        let assessment = self.fraud_scorer.score(&request);
        let transaction = if assessment.blocked {
            Transaction::new_rejected(
                &request,
                assessment.score,
                FRAUD_BLOCKED_CODE.to_string(),
                "payment blocked by fraud control".to_string(),
            )?
        } else {
            Transaction::new(&request, assessment.score)?
        };

        if !self.idempotency_gate.reserve(&key, transaction.id()).await? {
            // Lost the race; someone else's row is authoritative.
            if let Some(existing) = self.resolve_existing(&key).await? {
                return Ok(existing);
            }
        }

        let inserted = match self.store.insert(transaction).await {
            Ok(tx) => tx,
            Err(TransactionError::IdempotencyConflict(_)) => {
                // Lost to a concurrent insert after winning the cache
                // reserve (e.g. the cache was bypassed or a stale
                // entry let two callers both through). The store's
                // UNIQUE constraint is the fallback of last resort:
                // whichever row it kept is authoritative.
                return match self.resolve_existing(&key).await? {
                    Some(existing) => Ok(existing),
                    None => Err(TransactionError::IdempotencyConflict(key)),
                };
            }
            Err(e) => return Err(e),
        };

        self.store
            .append_audit(AuditLogEntry::new(
                inserted.id(),
                AuditEventType::PaymentInitiated,
                serde_json::json!({ "reference_id": inserted.reference_id() }),
                Some(inserted.user_id()),
                None,
                None,
            ))
            .await;

        self.store
            .append_audit(AuditLogEntry::new(
                inserted.id(),
                AuditEventType::FraudCheck,
                serde_json::json!({ "score": assessment.score, "blocked": assessment.blocked }),
                Some(inserted.user_id()),
                None,
                None,
            ))
            .await;

        if inserted.status() == TransactionStatus::PENDING {
            self.event_bus
                .publish(
                    inserted.id(),
                    PaymentEvent::new(inserted.clone(), PaymentEventType::PaymentInitiated),
                )
                .await?;
        } else {
            // Fraud-blocked: already terminal, publish the terminal event directly.
            self.event_bus
                .publish(
                    inserted.id(),
                    PaymentEvent::new(inserted.clone(), PaymentEventType::PaymentFailed),
                )
                .await?;
        }

        info!(transaction_id = %inserted.id(), status = ?inserted.status(), "payment initiated");
        Ok(inserted)
    }

    async fn resolve_existing(&self, key: &str) -> Result<Option<Transaction>, TransactionError> {
        if let Some(tx_id) = self.idempotency_gate.lookup(key).await? {
            if let Some(tx) = self.store.by_id(tx_id).await? {
                self.log_idempotency_hit(&tx, "cache").await;
                return Ok(Some(tx));
            }
        }

        if let Some(tx) = self.store.by_idempotency(key).await? {
            // Cache missed or was never populated; repopulate best-effort.
            let _ = self.idempotency_gate.reserve(key, tx.id()).await;
            self.log_idempotency_hit(&tx, "database").await;
            return Ok(Some(tx));
        }

        Ok(None)
    }

    async fn log_idempotency_hit(&self, tx: &Transaction, source: &str) {
        self.store
            .append_audit(AuditLogEntry::new(
                tx.id(),
                AuditEventType::IdempotencyCheck,
                serde_json::json!({ "hit": true, "source": source }),
                Some(tx.user_id()),
                None,
                None,
            ))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::WebhookEvent;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use common::{Currency, Money, PaymentMethod};
    use mockall::mock;
    use mockall::predicate::*;
    use serde_json::Value as Json;
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

    fn sample_request() -> PaymentRequest {
        PaymentRequest {
            idempotency_key: Some("K1".to_string()),
            user_id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            amount: Money::new(Decimal::new(4999, 2), Currency::parse("USD").unwrap()),
            payment_method: PaymentMethod::CARD,
            payment_provider: "stripe".to_string(),
            webhook_url: None,
            metadata: Json::Object(Default::default()),
            card_pan: Some("4242424242424242".to_string()),
            card_cvv: Some("123".to_string()),
            bank_account_number: None,
            bank_routing_number: None,
            wallet_id: None,
        }
    }

    #[tokio::test]
    async fn duplicate_key_returns_existing_transaction_without_inserting() {
        let mut store = MockStoreImpl::new();
        let mut gate = MockGateImpl::new();
        let bus = MockBusImpl::new();

        let request = sample_request();
        let existing = Transaction::new(&request, Decimal::ZERO).unwrap();
        let existing_id = existing.id();
        let existing_clone = existing.clone();

        gate.expect_lookup()
            .with(eq("K1"))
            .times(1)
            .returning(move |_| Ok(Some(existing_id)));
        store
            .expect_by_id()
            .with(eq(existing_id))
            .times(1)
            .returning(move |_| Ok(Some(existing_clone.clone())));
        store.expect_append_audit().times(1).returning(|_| ());
        store.expect_insert().times(0);

        let use_case = InitiatePaymentUseCase::new(
            Arc::new(store),
            Arc::new(gate),
            Arc::new(FraudScorer::new(true, Decimal::new(70, 2))),
            Arc::new(bus),
        );

        let result = use_case.execute(request).await.unwrap();
        assert_eq!(result.id(), existing_id);
    }

    #[tokio::test]
    async fn fresh_request_is_scored_persisted_and_published() {
        let mut store = MockStoreImpl::new();
        let mut gate = MockGateImpl::new();
        let mut bus = MockBusImpl::new();

        gate.expect_lookup().returning(|_| Ok(None));
        store.expect_by_idempotency().returning(|_| Ok(None));
        store.expect_append_audit().returning(|_| ());
        gate.expect_reserve().returning(|_, _| Ok(true));
        store
            .expect_insert()
            .times(1)
            .returning(|tx| Ok(tx));
        bus.expect_publish().times(1).returning(|_, _| Ok(()));

        let use_case = InitiatePaymentUseCase::new(
            Arc::new(store),
            Arc::new(gate),
            Arc::new(FraudScorer::new(true, Decimal::new(70, 2))),
            Arc::new(bus),
        );

        let result = use_case.execute(sample_request()).await.unwrap();
        assert_eq!(result.status(), TransactionStatus::PENDING);
    }

    #[tokio::test]
    async fn high_risk_request_is_persisted_as_failed_fraud_blocked() {
        let mut store = MockStoreImpl::new();
        let mut gate = MockGateImpl::new();
        let mut bus = MockBusImpl::new();

        gate.expect_lookup().returning(|_| Ok(None));
        store.expect_by_idempotency().returning(|_| Ok(None));
        store.expect_append_audit().returning(|_| ());
        gate.expect_reserve().returning(|_, _| Ok(true));
        store.expect_insert().times(1).returning(|tx| Ok(tx));
        bus.expect_publish().times(1).returning(|_, _| Ok(()));

        let mut request = sample_request();
        request.amount = Money::new(Decimal::new(75_000, 0), Currency::parse("USD").unwrap());
        request.card_pan = Some("1234".to_string());

        let use_case = InitiatePaymentUseCase::new(
            Arc::new(store),
            Arc::new(gate),
            Arc::new(FraudScorer::new(true, Decimal::new(70, 2))),
            Arc::new(bus),
        );

        let result = use_case.execute(request).await.unwrap();
        assert_eq!(result.status(), TransactionStatus::FAILED);
        assert_eq!(result.error_code(), Some(FRAUD_BLOCKED_CODE));
    }

    #[tokio::test]
    async fn store_unique_violation_falls_back_to_the_winning_row() {
        let mut store = MockStoreImpl::new();
        let mut gate = MockGateImpl::new();
        let mut bus = MockBusImpl::new();

        let request = sample_request();
        let winner = Transaction::new(&request, Decimal::ZERO).unwrap();
        let winner_id = winner.id();
        let winner_clone = winner.clone();

        // Cache missed (bypassed or evicted), so the use case believes
        // it should insert; the store's UNIQUE constraint is what
        // actually catches the race. `by_idempotency` is consulted
        // twice: once on the way in (miss) and once after the
        // conflict (hit on the winner's row).
        let by_idempotency_calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls = by_idempotency_calls.clone();
        gate.expect_lookup().returning(|_| Ok(None));
        store.expect_by_idempotency().times(2).returning(move |_| {
            if calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                Ok(None)
            } else {
                Ok(Some(winner_clone.clone()))
            }
        });
        store.expect_append_audit().returning(|_| ());
        gate.expect_reserve().returning(|_, _| Ok(true));
        store
            .expect_insert()
            .times(1)
            .returning(|_| Err(TransactionError::IdempotencyConflict("K1".to_string())));
        bus.expect_publish().times(0);

        let use_case = InitiatePaymentUseCase::new(
            Arc::new(store),
            Arc::new(gate),
            Arc::new(FraudScorer::new(true, Decimal::new(70, 2))),
            Arc::new(bus),
        );

        let result = use_case.execute(request).await.unwrap();
        assert_eq!(result.id(), winner_id);
    }
}
