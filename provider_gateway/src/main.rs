use std::env;

use tracing::info;
use tracing_subscriber::FmtSubscriber;

use provider_gateway::grpc_service::SimulatedProviderService;
use provider_gateway::proto::provider::provider_service_server::ProviderServiceServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting Provider Gateway (simulated processor)...");

    let grpc_host = env::var("GRPC_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let grpc_port = env::var("GRPC_PORT").unwrap_or_else(|_| "50052".to_string());
    let grpc_addr = format!("{}:{}", grpc_host, grpc_port).parse()?;

    let service = SimulatedProviderService::new();

    info!("gRPC server listening on {}", grpc_addr);

    tonic::transport::Server::builder()
        .add_service(ProviderServiceServer::new(service))
        .serve(grpc_addr)
        .await?;

    Ok(())
}
