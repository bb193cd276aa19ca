use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::entities::{AuditEventType, AuditLogEntry, Transaction, TransactionStatus, WebhookEvent};
use crate::domain::error::TransactionError;
use crate::domain::event_bus::{EventBus, PaymentEvent, PaymentEventType};
use crate::domain::gateways::ProviderAdapter;
use crate::domain::repository::TransactionStore;

const PROCESSING_ERROR_CODE: &str = "PROCESSING_ERROR";
const PROVIDER_TIMEOUT_CODE: &str = "PROVIDER_TIMEOUT";

/// Asynchronous entry point triggered by a `PAYMENT_INITIATED`
/// consumer (spec §4.4 `Process`). The single consumer group that
/// calls this is the only thing allowed to advance the state machine
/// past `PENDING`.
pub struct ProcessPaymentUseCase {
    store: Arc<dyn TransactionStore>,
    provider: Arc<dyn ProviderAdapter>,
    event_bus: Arc<dyn EventBus>,
    webhook_max_attempts: i32,
}

impl ProcessPaymentUseCase {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        provider: Arc<dyn ProviderAdapter>,
        event_bus: Arc<dyn EventBus>,
        webhook_max_attempts: i32,
    ) -> Self {
        Self {
            store,
            provider,
            event_bus,
            webhook_max_attempts,
        }
    }

    #[tracing::instrument(name = "ProcessPaymentUseCase::execute", skip(self))]
    pub async fn execute(&self, transaction_id: Uuid) -> Result<(), TransactionError> {
        let transaction = match self.store.by_id(transaction_id).await? {
            Some(tx) => tx,
            None => {
                warn!(%transaction_id, "process called for unknown transaction");
                return Ok(());
            }
        };

        if transaction.status() != TransactionStatus::PENDING {
            // Either already in flight (lost the CAS race to another
            // consumer) or already terminal (redelivery). Both are
            // no-ops under at-least-once delivery.
            return Ok(());
        }

        let processing = self
            .store
            .update_status(transaction_id, TransactionStatus::PENDING, TransactionStatus::PROCESSING, None, None)
            .await?;

        let processing = match processing {
            Some(tx) => tx,
            None => return Ok(()),
        };

        self.store
            .append_audit(AuditLogEntry::new(
                transaction_id,
                AuditEventType::PaymentProcessed,
                serde_json::json!({ "reference_id": processing.reference_id() }),
                Some(processing.user_id()),
                None,
                None,
            ))
            .await;

        match self.provider.charge(&processing).await {
            Ok(_outcome) => self.finish_success(transaction_id).await,
            Err(err) => self.finish_failure(transaction_id, err).await,
        }
    }

    async fn finish_success(&self, transaction_id: Uuid) -> Result<(), TransactionError> {
        let updated = self
            .store
            .update_status(transaction_id, TransactionStatus::PROCESSING, TransactionStatus::SUCCESS, None, None)
            .await?;

        let Some(transaction) = updated else {
            return Ok(());
        };

        self.store
            .append_audit(AuditLogEntry::new(
                transaction_id,
                AuditEventType::PaymentSuccess,
                serde_json::json!({ "reference_id": transaction.reference_id() }),
                Some(transaction.user_id()),
                None,
                None,
            ))
            .await;

        self.event_bus
            .publish(
                transaction_id,
                PaymentEvent::new(transaction.clone(), PaymentEventType::PaymentSuccess),
            )
            .await?;

        self.enqueue_webhook_if_configured(&transaction).await;

        info!(%transaction_id, "payment succeeded");
        Ok(())
    }

    async fn finish_failure(&self, transaction_id: Uuid, err: TransactionError) -> Result<(), TransactionError> {
        let (code, message) = match &err {
            TransactionError::ProviderError { code, message } => (code.clone(), message.clone()),
            TransactionError::ProviderTimeout => {
                (PROVIDER_TIMEOUT_CODE.to_string(), "provider call timed out".to_string())
            }
            other => (PROCESSING_ERROR_CODE.to_string(), other.to_string()),
        };

        let updated = self
            .store
            .update_status(
                transaction_id,
                TransactionStatus::PROCESSING,
                TransactionStatus::FAILED,
                Some(code),
                Some(message),
            )
            .await?;

        let Some(transaction) = updated else {
            return Ok(());
        };

        self.store
            .append_audit(AuditLogEntry::new(
                transaction_id,
                AuditEventType::PaymentFailed,
                serde_json::json!({
                    "error_code": transaction.error_code(),
                    "error_message": transaction.error_message(),
                }),
                Some(transaction.user_id()),
                None,
                None,
            ))
            .await;

        self.event_bus
            .publish(
                transaction_id,
                PaymentEvent::new(transaction.clone(), PaymentEventType::PaymentFailed),
            )
            .await?;

        self.enqueue_webhook_if_configured(&transaction).await;

        warn!(%transaction_id, "payment failed");
        Ok(())
    }

    async fn enqueue_webhook_if_configured(&self, transaction: &Transaction) {
        let Some(url) = transaction.webhook_url() else {
            return;
        };

        let payload = serde_json::json!({
            "transaction_id": transaction.id(),
            "reference_id": transaction.reference_id(),
            "status": transaction.status(),
            "amount": transaction.amount().amount,
            "currency": transaction.amount().currency.as_str(),
            "timestamp": transaction.updated_at(),
        });

        let event = WebhookEvent::new(transaction.id(), url.to_string(), payload, self.webhook_max_attempts);
        if let Err(e) = self.store.insert_webhook(event).await {
            warn!(transaction_id = %transaction.id(), error = %e, "failed to enqueue webhook event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use common::{Currency, Money, PaymentMethod};
    use mockall::mock;
    use mockall::predicate::*;
    use rust_decimal::Decimal;
    use serde_json::Value as Json;

    use crate::domain::entities::PaymentRequest;
    use crate::domain::gateways::ChargeOutcome;

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
        pub ProviderImpl {}

        #[async_trait]
        impl ProviderAdapter for ProviderImpl {
            async fn charge(&self, transaction: &Transaction) -> Result<ChargeOutcome, TransactionError>;
        }
    }

    mock! {
        pub BusImpl {}

        #[async_trait]
        impl EventBus for BusImpl {
            async fn publish(&self, key: Uuid, event: PaymentEvent) -> Result<(), TransactionError>;
        }
    }

    fn pending_transaction() -> Transaction {
        let request = PaymentRequest {
            idempotency_key: None,
            user_id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            amount: Money::new(Decimal::new(4999, 2), Currency::parse("USD").unwrap()),
            payment_method: PaymentMethod::CARD,
            payment_provider: "stripe".to_string(),
            webhook_url: Some("https://merchant.example/hooks".to_string()),
            metadata: Json::Object(Default::default()),
            card_pan: Some("4242424242424242".to_string()),
            card_cvv: Some("123".to_string()),
            bank_account_number: None,
            bank_routing_number: None,
            wallet_id: None,
        };
        Transaction::new(&request, Decimal::ZERO).unwrap()
    }

    #[tokio::test]
    async fn redelivery_of_a_terminal_transaction_is_a_noop() {
        let mut store = MockStoreImpl::new();
        let provider = MockProviderImpl::new();
        let bus = MockBusImpl::new();

        let tx = pending_transaction().with_status(TransactionStatus::PROCESSING, None, None).unwrap();
        let tx = tx.with_status(TransactionStatus::SUCCESS, None, None).unwrap();
        let tx_id = tx.id();

        store.expect_by_id().with(eq(tx_id)).times(1).returning(move |_| Ok(Some(tx.clone())));
        store.expect_update_status().times(0);

        let use_case = ProcessPaymentUseCase::new(Arc::new(store), Arc::new(provider), Arc::new(bus), 3);
        use_case.execute(tx_id).await.unwrap();
    }

    #[tokio::test]
    async fn successful_charge_moves_to_success_and_enqueues_webhook() {
        let mut store = MockStoreImpl::new();
        let mut provider = MockProviderImpl::new();
        let mut bus = MockBusImpl::new();

        let pending = pending_transaction();
        let tx_id = pending.id();
        let processing = pending.clone().with_status(TransactionStatus::PROCESSING, None, None).unwrap();
        let success = processing.clone().with_status(TransactionStatus::SUCCESS, None, None).unwrap();

        store.expect_by_id().returning(move |_| Ok(Some(pending.clone())));
        store
            .expect_update_status()
            .with(eq(tx_id), eq(TransactionStatus::PENDING), eq(TransactionStatus::PROCESSING), eq(None), eq(None))
            .times(1)
            .returning(move |_, _, _, _, _| Ok(Some(processing.clone())));
        provider.expect_charge().times(1).returning(|_| {
            Ok(ChargeOutcome {
                provider_ref: "prov_1".to_string(),
                client_secret: None,
                redirect_url: None,
            })
        });
        store
            .expect_update_status()
            .with(eq(tx_id), eq(TransactionStatus::PROCESSING), eq(TransactionStatus::SUCCESS), eq(None), eq(None))
            .times(1)
            .returning(move |_, _, _, _, _| Ok(Some(success.clone())));
        store.expect_append_audit().returning(|_| ());
        bus.expect_publish().times(1).returning(|_, _| Ok(()));
        store.expect_insert_webhook().times(1).returning(|evt| Ok(evt));

        let use_case = ProcessPaymentUseCase::new(Arc::new(store), Arc::new(provider), Arc::new(bus), 3);
        use_case.execute(tx_id).await.unwrap();
    }
}
