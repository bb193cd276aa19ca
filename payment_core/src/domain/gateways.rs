use tonic::async_trait;

use crate::domain::{entities::Transaction, error::TransactionError};

/// Outcome of a provider charge attempt. `client_secret`/`redirect_url`
/// are carried for provider flows that need a second client-side step
/// (3DS, bank redirect) — neither is interpreted by the orchestrator,
/// only passed through to the response/webhook payload.
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub provider_ref: String,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
}

/// Port for the external, pluggable payment processor. Implementations
/// own all provider-side idempotency using `transaction.reference_id()`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn charge(&self, transaction: &Transaction) -> Result<ChargeOutcome, TransactionError>;
}
