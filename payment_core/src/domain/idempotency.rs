use tonic::async_trait;
use uuid::Uuid;

use crate::domain::error::TransactionError;

/// Port over the fast-cache layer of the idempotency gate (spec §4.1).
/// The durable store's `UNIQUE(idempotency_key)` column is the fallback
/// of last resort and is not part of this trait — it is enforced by
/// `TransactionStore::insert` and reconciled by the orchestrator.
#[async_trait]
pub trait IdempotencyGate: Send + Sync {
    /// `Some(tx_id)` if the key is mapped in the cache. On a miss the
    /// orchestrator is responsible for falling through to
    /// `TransactionStore::by_idempotency` and repopulating the cache —
    /// this port only ever sees the fast layer.
    async fn lookup(&self, key: &str) -> Result<Option<Uuid>, TransactionError>;

    /// Atomic set-if-absent. Returns `true` iff this caller won the
    /// race and should proceed to persist a new transaction; a losing
    /// caller MUST re-run `lookup` instead of creating a row.
    async fn reserve(&self, key: &str, tx_id: Uuid) -> Result<bool, TransactionError>;

    /// Deletes the cache entry. Callers must only invoke this when
    /// admission aborts before the store insert — once a transaction
    /// row exists, the key's lifetime is governed by cache TTL alone.
    async fn release(&self, key: &str);

    /// Fresh random 128-bit key for callers that omit one.
    fn generate(&self) -> String;
}
