use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction not found with ID: {0}")]
    NotFound(Uuid),

    #[error("Invalid transaction state: {0}")]
    InvalidState(String),

    #[error("Transaction repository error: {0}")]
    RepositoryError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// Same idempotency key reused with a materially different
    /// request body (spec §4.1 step 2b).
    #[error("idempotency key {0} was already used with a different request")]
    IdempotencyConflict(String),

    /// Admission blocked the payment outright (fraud score at or above
    /// the reject threshold).
    #[error("payment blocked by fraud control: {0}")]
    FraudBlocked(String),

    /// The provider responded, but with a decline/error rather than
    /// approval.
    #[error("provider declined charge: {code}: {message}")]
    ProviderError { code: String, message: String },

    /// The provider did not respond inside the orchestrator's deadline.
    /// Distinct from `ProviderError` because the outcome is genuinely
    /// unknown, not a decline.
    #[error("provider call timed out")]
    ProviderTimeout,

    /// A dependency (DB, cache, event bus) failed in a way that should
    /// be retried rather than surfaced as a payment failure.
    #[error("transient infrastructure failure: {0}")]
    TransientInfraError(String),

    #[error("webhook delivery failed: {0}")]
    WebhookDeliveryError(String),
}
