use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{entities::Transaction, error::TransactionError, repository::TransactionStore};

/// Fetch-status entry point (spec §4.4). No side effects: `{id}` is
/// tried first as the opaque transaction id, falling back to
/// `reference_id`.
#[derive(Clone)]
pub struct GetPaymentStatusUseCase {
    store: Arc<dyn TransactionStore>,
}

impl GetPaymentStatusUseCase {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(name = "GetPaymentStatusUseCase::execute", skip(self))]
    pub async fn execute(&self, id_or_reference: &str) -> Result<Transaction, TransactionError> {
        if let Ok(id) = Uuid::parse_str(id_or_reference) {
            if let Some(tx) = self.store.by_id(id).await? {
                return Ok(tx);
            }
        }

        self.store
            .by_reference(id_or_reference)
            .await?
            .ok_or_else(|| TransactionError::NotFound(Uuid::nil()))
    }
}
