use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::domain::event_bus::{PaymentEvent, PaymentEventType};
use crate::use_cases::process_payment::ProcessPaymentUseCase;

/// Single consumer group responsible for advancing the state machine
/// past `PENDING` (spec §9 open question: exactly one consumer calls
/// `Process`, never a second group racing it). One instance is spawned
/// per event-bus partition so ordering within a transaction id is
/// preserved while different transactions process concurrently.
pub struct PaymentEventConsumer {
    process_payment: Arc<ProcessPaymentUseCase>,
}

impl PaymentEventConsumer {
    pub fn new(process_payment: Arc<ProcessPaymentUseCase>) -> Self {
        Self { process_payment }
    }

    pub async fn run(&self, mut receiver: mpsc::UnboundedReceiver<PaymentEvent>) {
        info!("payment event consumer started");
        while let Some(event) = receiver.recv().await {
            if event.event_type != PaymentEventType::PaymentInitiated {
                continue;
            }

            let transaction_id = event.transaction.id();
            if let Err(e) = self.process_payment.execute(transaction_id).await {
                error!(%transaction_id, "failed to process payment: {e}");
            }
        }
    }
}
