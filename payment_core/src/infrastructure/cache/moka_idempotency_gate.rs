use std::time::Duration;

use moka::sync::Cache;
use tonic::async_trait;
use uuid::Uuid;

use crate::domain::error::TransactionError;
use crate::domain::idempotency::IdempotencyGate;

/// In-process fast-cache layer of the idempotency gate. `reserve` uses
/// `Cache::get_with`, whose initializing closure runs at most once per
/// key even under concurrent callers — that race-free property is the
/// atomic set-if-absent primitive the gate needs. The durable store's
/// `UNIQUE(idempotency_key)` constraint remains the fallback of last
/// resort if this cache is bypassed or evicted.
pub struct MokaIdempotencyGate {
    cache: Cache<String, Uuid>,
}

impl MokaIdempotencyGate {
    pub fn new(ttl_seconds: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_seconds))
            .build();
        Self { cache }
    }
}

#[async_trait]
impl IdempotencyGate for MokaIdempotencyGate {
    async fn lookup(&self, key: &str) -> Result<Option<Uuid>, TransactionError> {
        Ok(self.cache.get(key))
    }

    async fn reserve(&self, key: &str, tx_id: Uuid) -> Result<bool, TransactionError> {
        let winner = self.cache.get_with(key.to_string(), || tx_id);
        Ok(winner == tx_id)
    }

    async fn release(&self, key: &str) {
        self.cache.invalidate(key);
    }

    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_reserve_for_same_key_loses() {
        let gate = MokaIdempotencyGate::new(60);
        let key = "idem-1";
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(gate.reserve(key, first).await.unwrap());
        assert!(!gate.reserve(key, second).await.unwrap());
        assert_eq!(gate.lookup(key).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn release_clears_the_entry() {
        let gate = MokaIdempotencyGate::new(60);
        let key = "idem-2";
        let id = Uuid::new_v4();

        gate.reserve(key, id).await.unwrap();
        gate.release(key).await;
        assert_eq!(gate.lookup(key).await.unwrap(), None);
    }
}
