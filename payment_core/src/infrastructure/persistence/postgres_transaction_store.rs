use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::error::DatabaseError;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::domain::entities::{AuditLogEntry, Transaction, TransactionStatus, WebhookEvent};
use crate::domain::error::TransactionError;
use crate::domain::repository::TransactionStore;
use crate::infrastructure::persistence::models::{AuditLogModel, TransactionModel, WebhookEventModel};

/// Postgres-backed `TransactionStore`. Direct parametrized SQL via
/// `sqlx::query_as`, no ORM — mirrors the rest of the workspace's
/// persistence style.
pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn insert(&self, transaction: Transaction) -> Result<Transaction, TransactionError> {
        let model = TransactionModel::from(&transaction);
        let idempotency_key = model.idempotency_key.clone();

        let saved = sqlx::query_as::<_, TransactionModel>(
            r#"
            INSERT INTO transactions (
                id, reference_id, idempotency_key, user_id, merchant_id, amount, currency,
                payment_method, payment_provider, status, fraud_score, error_code, error_message,
                webhook_url, webhook_attempts, webhook_last_attempt, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING *
            "#,
        )
        .bind(model.id)
        .bind(model.reference_id)
        .bind(model.idempotency_key)
        .bind(model.user_id)
        .bind(model.merchant_id)
        .bind(model.amount)
        .bind(model.currency)
        .bind(model.payment_method)
        .bind(model.payment_provider)
        .bind(model.status)
        .bind(model.fraud_score)
        .bind(model.error_code)
        .bind(model.error_message)
        .bind(model.webhook_url)
        .bind(model.webhook_attempts)
        .bind(model.webhook_last_attempt)
        .bind(model.metadata)
        .bind(model.created_at)
        .bind(model.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, idempotency_key.as_deref()))?;

        saved.try_into().map_err(TransactionError::RepositoryError)
    }

    async fn by_id(&self, id: Uuid) -> Result<Option<Transaction>, TransactionError> {
        let model = sqlx::query_as::<_, TransactionModel>(r#"SELECT * FROM transactions WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TransactionError::RepositoryError(e.to_string()))?;

        model
            .map(TryInto::try_into)
            .transpose()
            .map_err(TransactionError::RepositoryError)
    }

    async fn by_reference(&self, reference_id: &str) -> Result<Option<Transaction>, TransactionError> {
        let model = sqlx::query_as::<_, TransactionModel>(
            r#"SELECT * FROM transactions WHERE reference_id = $1"#,
        )
        .bind(reference_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TransactionError::RepositoryError(e.to_string()))?;

        model
            .map(TryInto::try_into)
            .transpose()
            .map_err(TransactionError::RepositoryError)
    }

    async fn by_idempotency(&self, key: &str) -> Result<Option<Transaction>, TransactionError> {
        let model = sqlx::query_as::<_, TransactionModel>(
            r#"SELECT * FROM transactions WHERE idempotency_key = $1"#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TransactionError::RepositoryError(e.to_string()))?;

        model
            .map(TryInto::try_into)
            .transpose()
            .map_err(TransactionError::RepositoryError)
    }

    /// The serialization point for the state machine: the `WHERE`
    /// clause only matches the row if it is still in `from`, so a
    /// concurrent winner's update is invisible to this one.
    async fn update_status(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
        error_code: Option<String>,
        error_message: Option<String>,
    ) -> Result<Option<Transaction>, TransactionError> {
        let model = sqlx::query_as::<_, TransactionModel>(
            r#"
            UPDATE transactions
            SET status = $1, error_code = $2, error_message = $3, updated_at = $4
            WHERE id = $5 AND status = $6
            RETURNING *
            "#,
        )
        .bind(to)
        .bind(error_code)
        .bind(error_message)
        .bind(Utc::now())
        .bind(id)
        .bind(from)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TransactionError::RepositoryError(e.to_string()))?;

        model
            .map(TryInto::try_into)
            .transpose()
            .map_err(TransactionError::RepositoryError)
    }

    async fn append_audit(&self, entry: AuditLogEntry) {
        let model = AuditLogModel::from(&entry);
        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs (id, transaction_id, event_type, event_data, user_id, ip, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(model.id)
        .bind(model.transaction_id)
        .bind(model.event_type)
        .bind(model.event_data)
        .bind(model.user_id)
        .bind(model.ip)
        .bind(model.user_agent)
        .bind(model.created_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!("failed to append audit log entry: {e}");
        }
    }

    async fn list_audit_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, TransactionError> {
        let models = sqlx::query_as::<_, AuditLogModel>(
            r#"SELECT * FROM audit_logs WHERE transaction_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TransactionError::RepositoryError(e.to_string()))?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn insert_webhook(&self, event: WebhookEvent) -> Result<WebhookEvent, TransactionError> {
        let model = WebhookEventModel::from(&event);

        let saved = sqlx::query_as::<_, WebhookEventModel>(
            r#"
            INSERT INTO webhook_events (
                id, transaction_id, url, payload, response_status, response_body,
                attempts, max_attempts, next_retry_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(model.id)
        .bind(model.transaction_id)
        .bind(model.url)
        .bind(model.payload)
        .bind(model.response_status)
        .bind(model.response_body)
        .bind(model.attempts)
        .bind(model.max_attempts)
        .bind(event.next_retry_at())
        .bind(model.created_at)
        .bind(model.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| TransactionError::RepositoryError(e.to_string()))?;

        Ok(saved.into())
    }

    async fn find_pending_webhooks(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>, TransactionError> {
        let models = sqlx::query_as::<_, WebhookEventModel>(
            r#"
            SELECT * FROM webhook_events
            WHERE next_retry_at <= $1 AND attempts < max_attempts
            ORDER BY next_retry_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TransactionError::RepositoryError(e.to_string()))?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn record_webhook_attempt(
        &self,
        id: Uuid,
        response_status: Option<i32>,
        response_body: Option<String>,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<WebhookEvent, TransactionError> {
        let now = Utc::now();
        let model = sqlx::query_as::<_, WebhookEventModel>(
            r#"
            UPDATE webhook_events
            SET attempts = attempts + 1,
                response_status = $1,
                response_body = $2,
                next_retry_at = $3,
                updated_at = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(response_status)
        .bind(response_body)
        .bind(next_retry_at)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TransactionError::RepositoryError(e.to_string()))?
        .ok_or(TransactionError::NotFound(id))?;

        // The Transaction row carries its own denormalized
        // `webhook_attempts`/`webhook_last_attempt` counters (spec §3
        // data model); invariant 4 permits only webhook counters to
        // mutate on an otherwise-terminal row, so keep them in sync
        // with the WebhookEvent this dispatcher owns.
        if let Err(e) = sqlx::query(
            r#"
            UPDATE transactions
            SET webhook_attempts = webhook_attempts + 1, webhook_last_attempt = $1
            WHERE id = $2
            "#,
        )
        .bind(now)
        .bind(model.transaction_id)
        .execute(&self.pool)
        .await
        {
            error!(transaction_id = %model.transaction_id, "failed to sync transaction webhook counters: {e}");
        }

        Ok(model.into())
    }
}

/// Postgres unique_violation is SQLSTATE 23505. A collision on
/// `idempotency_key` is the race spec §4.1 describes as the UNIQUE
/// constraint's fallback role — reported as `IdempotencyConflict` so
/// the caller can fall through to `by_idempotency` and return the
/// winner's row instead of failing admission. Any other constraint
/// (e.g. `reference_id`, vanishingly unlikely given its entropy) or
/// error class is reported as a plain repository error.
fn map_insert_error(err: sqlx::Error, idempotency_key: Option<&str>) -> TransactionError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some("23505") {
            if let Some(key) = idempotency_key {
                if db_err
                    .constraint()
                    .map(|c| c.contains("idempotency_key"))
                    .unwrap_or(false)
                {
                    return TransactionError::IdempotencyConflict(key.to_string());
                }
            }
        }
    }
    TransactionError::RepositoryError(err.to_string())
}
