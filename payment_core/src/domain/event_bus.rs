use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tonic::async_trait;
use uuid::Uuid;

use crate::domain::entities::Transaction;
use crate::domain::error::TransactionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentEventType {
    PaymentInitiated,
    PaymentSuccess,
    PaymentFailed,
}

/// Transaction snapshot plus event metadata, published on every
/// transition. Encoding is JSON regardless of transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub transaction: Transaction,
    pub event_type: PaymentEventType,
    pub event_timestamp: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn new(transaction: Transaction, event_type: PaymentEventType) -> Self {
        Self {
            transaction,
            event_type,
            event_timestamp: Utc::now(),
        }
    }
}

/// Thin abstraction over a partitioned, at-least-once message bus keyed
/// by transaction id. Same key always lands in the same partition, so
/// delivery is in-order per transaction; no ordering is promised across
/// transactions.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, key: Uuid, event: PaymentEvent) -> Result<(), TransactionError>;
}
