use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::entities::{AuditLogEntry, Transaction, TransactionStatus, WebhookEvent};
use crate::domain::error::TransactionError;

/// Port for durable persistence of transactions, audit entries and
/// webhook delivery records. The orchestrator has exclusive write
/// authority for `Transaction` status; the dispatcher has exclusive
/// write authority for `WebhookEvent` attempt fields.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Fails if either `reference_id` or `idempotency_key` collides
    /// with an existing row.
    async fn insert(&self, transaction: Transaction) -> Result<Transaction, TransactionError>;

    async fn by_id(&self, id: Uuid) -> Result<Option<Transaction>, TransactionError>;

    async fn by_reference(&self, reference_id: &str) -> Result<Option<Transaction>, TransactionError>;

    async fn by_idempotency(&self, key: &str) -> Result<Option<Transaction>, TransactionError>;

    /// Compare-and-swap on `status`. Fails (returns `Ok(None)`) rather
    /// than erroring when the current status is not `from` — that is
    /// an expected race outcome under at-least-once redelivery, not a
    /// failure.
    async fn update_status(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
        error_code: Option<String>,
        error_message: Option<String>,
    ) -> Result<Option<Transaction>, TransactionError>;

    /// Never fails the caller's main flow; implementations log and
    /// swallow persistence errors here.
    async fn append_audit(&self, entry: AuditLogEntry);

    async fn list_audit_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, TransactionError>;

    async fn insert_webhook(&self, event: WebhookEvent) -> Result<WebhookEvent, TransactionError>;

    /// Webhooks where `next_retry_at <= now AND attempts < max_attempts`.
    async fn find_pending_webhooks(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>, TransactionError>;

    /// Atomic increment of `attempts` plus response fields.
    async fn record_webhook_attempt(
        &self,
        id: Uuid,
        response_status: Option<i32>,
        response_body: Option<String>,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<WebhookEvent, TransactionError>;
}
