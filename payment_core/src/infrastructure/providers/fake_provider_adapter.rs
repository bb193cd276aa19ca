use tonic::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::domain::entities::Transaction;
use crate::domain::error::TransactionError;
use crate::domain::gateways::{ChargeOutcome, ProviderAdapter};

/// Always-approves stand-in for local development and use-case tests
/// that don't want a live gRPC dependency on `provider_gateway`.
pub struct FakeProviderAdapter;

impl FakeProviderAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FakeProviderAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for FakeProviderAdapter {
    async fn charge(&self, transaction: &Transaction) -> Result<ChargeOutcome, TransactionError> {
        info!(
            transaction_id = %transaction.id(),
            "FakeProviderAdapter approving charge"
        );
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        Ok(ChargeOutcome {
            provider_ref: format!("fake_{}", Uuid::new_v4()),
            client_secret: None,
            redirect_url: None,
        })
    }
}
