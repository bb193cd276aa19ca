use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use rust_decimal::Decimal;
use tonic::{Request, Response, Status};
use tracing::info;

use crate::proto::provider::provider_service_server::ProviderService;
use crate::proto::provider::{ChargeRequest, ChargeResponse};

/// Test PANs that real processors document as "always succeeds" /
/// "always declines" fixtures. Mirrored here so integration tests can
/// drive both charge outcomes deterministically.
const ALWAYS_DECLINE_SUFFIX: &str = "0002";

/// Simulated processor. Approves everything except amounts that
/// overflow a sane ledger and the reserved "always decline" test PAN
/// suffix encoded in the reference id by callers that want to exercise
/// the failure path deterministically.
pub struct SimulatedProviderService;

impl SimulatedProviderService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SimulatedProviderService {
    fn default() -> Self {
        Self::new()
    }
}

#[tonic::async_trait]
impl ProviderService for SimulatedProviderService {
    async fn charge(
        &self,
        request: Request<ChargeRequest>,
    ) -> Result<Response<ChargeResponse>, Status> {
        let req = request.into_inner();

        info!(
            transaction_id = %req.transaction_id,
            reference_id = %req.reference_id,
            amount = %req.amount,
            currency = %req.currency,
            "simulating processor charge"
        );

        let amount = Decimal::from_str(&req.amount)
            .map_err(|e| Status::invalid_argument(format!("bad amount: {e}")))?;

        // Simulated network + authorization latency.
        let latency_ms = rand::thread_rng().gen_range(50..250);
        tokio::time::sleep(Duration::from_millis(latency_ms)).await;

        if req.reference_id.ends_with(ALWAYS_DECLINE_SUFFIX) {
            return Ok(Response::new(ChargeResponse {
                approved: false,
                provider_ref: String::new(),
                error_code: "DECLINED".to_string(),
                error_message: "Processor declined the charge".to_string(),
            }));
        }

        if amount > Decimal::new(100_000_000, 2) {
            return Ok(Response::new(ChargeResponse {
                approved: false,
                provider_ref: String::new(),
                error_code: "LIMIT_EXCEEDED".to_string(),
                error_message: "Amount exceeds processor limit".to_string(),
            }));
        }

        Ok(Response::new(ChargeResponse {
            approved: true,
            provider_ref: format!("sim_{}", uuid::Uuid::new_v4()),
            error_code: String::new(),
            error_message: String::new(),
        }))
    }
}
