use std::env;

use rust_decimal::Decimal;

/// Recognized configuration keys (spec §6), read the same way
/// `main.rs` already reads `HOST`/`PORT`/`DATABASE_URL`: `env::var`
/// with a documented fallback, no config file format.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub provider_url: String,
    pub provider_timeout_seconds: u64,
    pub idempotency_ttl_seconds: u64,
    pub fraud_enabled: bool,
    pub fraud_score_threshold: Decimal,
    pub webhook_retry_attempts: i32,
    pub webhook_retry_base_delay_ms: i64,
    pub webhook_poll_interval_seconds: u64,
    pub webhook_batch_size: i64,
    pub event_bus_partitions: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_env_or("PORT", 3000),
            provider_url: env::var("PROVIDER_URL").unwrap_or_else(|_| "http://127.0.0.1:50052".to_string()),
            provider_timeout_seconds: parse_env_or("PROVIDER_TIMEOUT_SECONDS", 30),
            idempotency_ttl_seconds: parse_env_or("IDEMPOTENCY_TTL_SECONDS", 86_400),
            fraud_enabled: parse_env_or("FRAUD_ENABLED", true),
            fraud_score_threshold: env::var("FRAUD_SCORE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(Decimal::new(70, 2)),
            webhook_retry_attempts: parse_env_or("WEBHOOK_RETRY_ATTEMPTS", 3),
            webhook_retry_base_delay_ms: parse_env_or("WEBHOOK_RETRY_BASE_DELAY_MS", 1_000),
            webhook_poll_interval_seconds: parse_env_or("WEBHOOK_POLL_INTERVAL_SECONDS", 1),
            webhook_batch_size: parse_env_or("WEBHOOK_BATCH_SIZE", 50),
            event_bus_partitions: parse_env_or("EVENT_BUS_PARTITIONS", 4),
        }
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
