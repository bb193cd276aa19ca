pub mod fake_provider_adapter;
pub mod grpc_provider_adapter;
