//! Customer notifications for order and license events.
//!
//! Delivery is fire-and-forget: callers notify only after their transaction has
//! committed, and a failed delivery is logged, never propagated. Two modes:
//! 1. POST a signed JSON payload to a webhook URL (DIY email/SMS delivery)
//! 2. Log only (no webhook configured)

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    /// Admin rejected the payment proof; payload carries the reason
    PaymentRejected,
    /// Order approved and fulfilled
    OrderCompleted,
    /// Licenses were created for an order
    LicensesIssued,
    /// Unpaid order was cancelled after its deadline
    OrderExpired,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::PaymentRejected => "payment_rejected",
            NotificationEvent::OrderCompleted => "order_completed",
            NotificationEvent::LicensesIssued => "licenses_issued",
            NotificationEvent::OrderExpired => "order_expired",
        }
    }
}

/// Sink for customer notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, user_id: &str, event: NotificationEvent, payload: Value);
}

/// Body POSTed to the notification webhook.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub event: NotificationEvent,
    pub user_id: &'a str,
    pub sent_at: i64,
    pub data: &'a Value,
}

/// Notification service backed by an optional webhook.
#[derive(Clone)]
pub struct NotificationService {
    webhook_url: Option<String>,
    /// HMAC-SHA256 key; the hex signature goes in `X-Storefront-Signature`
    webhook_secret: Option<String>,
    http_client: Client,
}

impl NotificationService {
    pub fn new(webhook_url: Option<String>, webhook_secret: Option<String>) -> Self {
        Self {
            webhook_url,
            webhook_secret,
            http_client: Client::new(),
        }
    }

    /// Log-only notifier.
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    async fn call_webhook(
        http_client: Client,
        webhook_url: String,
        webhook_secret: Option<String>,
        event: NotificationEvent,
        body: Vec<u8>,
    ) {
        let mut request = http_client
            .post(&webhook_url)
            .header("Content-Type", "application/json")
            .header("X-Storefront-Event", event.as_str());

        if let Some(secret) = webhook_secret {
            match sign_payload(&secret, &body) {
                Some(signature) => request = request.header("X-Storefront-Signature", signature),
                None => tracing::warn!("Notification webhook secret is unusable, sending unsigned"),
            }
        }

        match request.body(body).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(event = event.as_str(), "Notification webhook delivered");
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(
                    status = %status,
                    body = %body,
                    webhook_url = %webhook_url,
                    event = event.as_str(),
                    "Notification webhook returned error"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    webhook_url = %webhook_url,
                    event = event.as_str(),
                    "Failed to call notification webhook"
                );
            }
        }
    }
}

impl Notifier for NotificationService {
    fn notify(&self, user_id: &str, event: NotificationEvent, payload: Value) {
        let Some(webhook_url) = self.webhook_url.clone() else {
            tracing::info!(user_id = %user_id, event = event.as_str(), data = %payload, "Notification (log only)");
            return;
        };

        let body = match serde_json::to_vec(&WebhookPayload {
            event,
            user_id,
            sent_at: chrono::Utc::now().timestamp(),
            data: &payload,
        }) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize notification payload");
                return;
            }
        };

        // Called from request handlers; outside a runtime (CLI, sync tests) we log instead.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(Self::call_webhook(
                    self.http_client.clone(),
                    webhook_url,
                    self.webhook_secret.clone(),
                    event,
                    body,
                ));
            }
            Err(_) => {
                tracing::warn!(
                    event = event.as_str(),
                    "No async runtime available, notification not delivered"
                );
            }
        }
    }
}

/// Hex HMAC-SHA256 of `body`, the same scheme receivers use to verify it.
pub fn sign_payload(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}
