use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use payment_core::api::http_routes::{routes, AppState};
use payment_core::config::Config;
use payment_core::domain::fraud::FraudScorer;
use payment_core::infrastructure::cache::moka_idempotency_gate::MokaIdempotencyGate;
use payment_core::infrastructure::event_bus::partitioned_bus::PartitionedEventBus;
use payment_core::infrastructure::persistence::postgres_transaction_store::PostgresTransactionStore;
use payment_core::infrastructure::providers::grpc_provider_adapter::GrpcProviderAdapter;
use payment_core::jobs::payment_event_consumer::PaymentEventConsumer;
use payment_core::jobs::webhook_dispatcher::WebhookDispatcher;
use payment_core::use_cases::get_payment_status::GetPaymentStatusUseCase;
use payment_core::use_cases::initiate_payment::InitiatePaymentUseCase;
use payment_core::use_cases::process_payment::ProcessPaymentUseCase;

#[derive(OpenApi)]
#[openapi(
    paths(
        payment_core::api::http_routes::initiate_payment,
        payment_core::api::http_routes::get_payment_status,
        payment_core::api::http_routes::health,
    ),
    components(schemas(
        payment_core::api::dto::InitiatePaymentRequest,
        payment_core::api::dto::PaymentResponse,
        payment_core::api::response::ApiResponse<payment_core::api::dto::PaymentResponse>,
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("starting payment core");

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("connected to database and applied migrations");

    let store = Arc::new(PostgresTransactionStore::new(pool));
    let idempotency_gate = Arc::new(MokaIdempotencyGate::new(config.idempotency_ttl_seconds));
    let fraud_scorer = Arc::new(FraudScorer::new(config.fraud_enabled, config.fraud_score_threshold));
    let provider = Arc::new(GrpcProviderAdapter::with_timeout(
        config.provider_url.clone(),
        config.provider_timeout_seconds,
    ));

    let (event_bus, receivers) = PartitionedEventBus::new(config.event_bus_partitions);
    let event_bus = Arc::new(event_bus);

    let initiate_payment_use_case = InitiatePaymentUseCase::new(
        store.clone(),
        idempotency_gate.clone(),
        fraud_scorer.clone(),
        event_bus.clone(),
    );
    let get_payment_status_use_case = GetPaymentStatusUseCase::new(store.clone());
    let process_payment_use_case = Arc::new(ProcessPaymentUseCase::new(
        store.clone(),
        provider.clone(),
        event_bus.clone(),
        config.webhook_retry_attempts,
    ));

    for receiver in receivers {
        let process_payment = process_payment_use_case.clone();
        tokio::spawn(async move {
            let consumer = PaymentEventConsumer::new(process_payment);
            consumer.run(receiver).await;
        });
    }

    let webhook_store = store.clone();
    let webhook_base_delay_ms = config.webhook_retry_base_delay_ms;
    let webhook_batch_size = config.webhook_batch_size;
    let webhook_poll_interval = config.webhook_poll_interval_seconds;
    tokio::spawn(async move {
        let dispatcher = WebhookDispatcher::new(webhook_store, webhook_base_delay_ms, webhook_batch_size);
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(webhook_poll_interval));
        info!("webhook dispatcher started");
        loop {
            interval.tick().await;
            dispatcher.run().await;
        }
    });

    let app_state = Arc::new(AppState {
        initiate_payment_use_case,
        get_payment_status_use_case,
    });

    let app = routes(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let addr = format!("{}:{}", config.host, config.port);
    info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
