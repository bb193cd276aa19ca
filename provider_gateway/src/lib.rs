//! Provider Gateway
//!
//! Stands in for the real external payment processor that a
//! `payment_core::domain::gateways::ProviderAdapter` implementation
//! calls in production. Deliberately stateless: no ledger, no
//! settlement, no PAN/CVV storage — those all belong to the actual
//! processor, never to this simulator or to the core.

pub mod grpc_service;

pub mod proto {
    pub mod provider {
        tonic::include_proto!("provider");
    }
}
