use std::time::Duration;

use tonic::async_trait;
use tracing::{error, info};

use crate::domain::entities::Transaction;
use crate::domain::error::TransactionError;
use crate::domain::gateways::{ChargeOutcome, ProviderAdapter};
use crate::proto::provider::provider_service_client::ProviderServiceClient;
use crate::proto::provider::ChargeRequest;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

pub struct GrpcProviderAdapter {
    provider_url: String,
    timeout: Duration,
}

impl GrpcProviderAdapter {
    pub fn new(provider_url: String) -> Self {
        Self::with_timeout(provider_url, DEFAULT_TIMEOUT_SECONDS)
    }

    pub fn with_timeout(provider_url: String, timeout_seconds: u64) -> Self {
        Self {
            provider_url,
            timeout: Duration::from_secs(timeout_seconds),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GrpcProviderAdapter {
    async fn charge(&self, transaction: &Transaction) -> Result<ChargeOutcome, TransactionError> {
        info!("connecting to provider gateway at {}", self.provider_url);

        let mut client = ProviderServiceClient::connect(self.provider_url.clone())
            .await
            .map_err(|e| {
                TransactionError::TransientInfraError(format!(
                    "failed to connect to provider gateway: {e}"
                ))
            })?;

        let mut request = tonic::Request::new(ChargeRequest {
            transaction_id: transaction.id().to_string(),
            reference_id: transaction.reference_id().to_string(),
            amount: transaction.amount().amount.to_string(),
            currency: transaction.amount().currency.as_str().to_string(),
            payment_method: transaction.payment_method().to_string(),
        });
        // spec §5: provider calls bound by a per-call timeout (default
        // 30s); tonic surfaces an expired deadline as
        // `Code::DeadlineExceeded`, mapped below to `ProviderTimeout`.
        request.set_timeout(self.timeout);

        match client.charge(request).await {
            Ok(response) => {
                let inner = response.into_inner();
                if inner.approved {
                    Ok(ChargeOutcome {
                        provider_ref: inner.provider_ref,
                        client_secret: None,
                        redirect_url: None,
                    })
                } else {
                    Err(TransactionError::ProviderError {
                        code: inner.error_code,
                        message: inner.error_message,
                    })
                }
            }
            Err(status) if status.code() == tonic::Code::DeadlineExceeded => {
                Err(TransactionError::ProviderTimeout)
            }
            Err(status) => {
                error!("provider gateway call failed: {status}");
                Err(TransactionError::ProviderError {
                    code: "PROCESSING_ERROR".to_string(),
                    message: status.to_string(),
                })
            }
        }
    }
}
