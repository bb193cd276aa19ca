use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use rand::Rng;
use reqwest::Client;
use tracing::{error, info, warn};

use crate::domain::entities::{AuditEventType, AuditLogEntry, WebhookEvent};
use crate::domain::repository::TransactionStore;

/// Scheduled retry engine for outbound webhook notifications (spec
/// §4.5). Polled by a `tokio::time::interval` loop in `main.rs`, the
/// same shape the teacher uses for its background retry job.
pub struct WebhookDispatcher {
    store: Arc<dyn TransactionStore>,
    http_client: Client,
    base_delay_ms: i64,
    batch_size: i64,
}

impl WebhookDispatcher {
    pub fn new(store: Arc<dyn TransactionStore>, base_delay_ms: i64, batch_size: i64) -> Self {
        let http_client = Client::builder()
            .timeout(StdDuration::from_secs(5))
            .build()
            .expect("failed to build webhook HTTP client");
        Self {
            store,
            http_client,
            base_delay_ms,
            batch_size,
        }
    }

    pub async fn run(&self) {
        let now = Utc::now();
        let pending = match self.store.find_pending_webhooks(now, self.batch_size).await {
            Ok(events) => events,
            Err(e) => {
                error!("failed to fetch pending webhooks: {e}");
                return;
            }
        };

        if pending.is_empty() {
            return;
        }

        info!("dispatching {} pending webhook(s)", pending.len());
        for event in pending {
            self.dispatch_one(event).await;
        }
    }

    async fn dispatch_one(&self, event: WebhookEvent) {
        let response = self
            .http_client
            .post(event.url())
            .json(event.payload())
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                let status = resp.status().as_u16() as i32;
                let body = resp.text().await.unwrap_or_default();
                // next_retry_at = NULL terminates the row: it will
                // never again satisfy `next_retry_at <= now`.
                if let Err(e) = self
                    .store
                    .record_webhook_attempt(event.id(), Some(status), Some(body), None)
                    .await
                {
                    error!(webhook_id = %event.id(), "failed to record successful webhook attempt: {e}");
                    return;
                }
                self.store
                    .append_audit(AuditLogEntry::new(
                        event.transaction_id(),
                        AuditEventType::WebhookSent,
                        serde_json::json!({ "webhook_id": event.id(), "status": status }),
                        None,
                        None,
                        None,
                    ))
                    .await;
            }
            Ok(resp) => {
                let status = resp.status().as_u16() as i32;
                let body = resp.text().await.ok();
                self.handle_failure(event, Some(status), body).await;
            }
            Err(e) => {
                self.handle_failure(event, None, Some(e.to_string())).await;
            }
        }
    }

    async fn handle_failure(&self, event: WebhookEvent, response_status: Option<i32>, response_body: Option<String>) {
        let next_attempts = event.attempts() + 1;
        let exhausted = next_attempts >= event.max_attempts();
        let next_retry_at = if exhausted {
            None
        } else {
            Some(Utc::now() + Duration::milliseconds(self.jittered_delay(next_attempts)))
        };

        if let Err(e) = self
            .store
            .record_webhook_attempt(event.id(), response_status, response_body, next_retry_at)
            .await
        {
            error!(webhook_id = %event.id(), "failed to record failed webhook attempt: {e}");
            return;
        }

        if exhausted {
            warn!(webhook_id = %event.id(), "webhook delivery exhausted retries");
            self.store
                .append_audit(AuditLogEntry::new(
                    event.transaction_id(),
                    AuditEventType::WebhookFailed,
                    serde_json::json!({ "webhook_id": event.id(), "attempts": next_attempts }),
                    None,
                    None,
                    None,
                ))
                .await;
        }
    }

    /// `base * 2^(attempts-1)` with +-20% jitter.
    fn jittered_delay(&self, attempts: i32) -> i64 {
        let exponent = (attempts - 1).max(0) as u32;
        let base = self.base_delay_ms.saturating_mul(2i64.saturating_pow(exponent));
        let factor = rand::thread_rng().gen_range(0.8..1.2);
        (base as f64 * factor) as i64
    }
}
