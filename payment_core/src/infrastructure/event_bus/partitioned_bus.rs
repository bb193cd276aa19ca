use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tokio::sync::mpsc;
use tonic::async_trait;
use uuid::Uuid;

use crate::domain::error::TransactionError;
use crate::domain::event_bus::{EventBus, PaymentEvent};

/// In-process stand-in for a partitioned, at-least-once message bus.
/// `N` partitions, each an unbounded `mpsc` channel; the partition for
/// a publish is `hash(transaction_id) % N`, so events for the same
/// transaction always land on the same channel and are delivered in
/// order relative to each other. A production deployment swaps this
/// for a real broker (Kafka, NATS) behind the same `EventBus` trait
/// without touching orchestration logic.
pub struct PartitionedEventBus {
    senders: Vec<mpsc::UnboundedSender<PaymentEvent>>,
}

impl PartitionedEventBus {
    /// Returns the bus plus one receiver per partition, for the caller
    /// to hand off to consumer tasks (one per partition, to preserve
    /// per-partition ordering under concurrent consumption).
    pub fn new(partitions: usize) -> (Self, Vec<mpsc::UnboundedReceiver<PaymentEvent>>) {
        assert!(partitions > 0, "partitioned bus needs at least one partition");
        let mut senders = Vec::with_capacity(partitions);
        let mut receivers = Vec::with_capacity(partitions);
        for _ in 0..partitions {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            receivers.push(rx);
        }
        (Self { senders }, receivers)
    }

    fn partition_for(&self, key: Uuid) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.senders.len()
    }
}

#[async_trait]
impl EventBus for PartitionedEventBus {
    async fn publish(&self, key: Uuid, event: PaymentEvent) -> Result<(), TransactionError> {
        let idx = self.partition_for(key);
        self.senders[idx]
            .send(event)
            .map_err(|e| TransactionError::TransientInfraError(e.to_string()))
    }
}
