//! Webhook delivery execution.
//!
//! The dispatcher matches an event to its subscribers, builds and signs the
//! payload envelope, performs the HTTP POST, and records one delivery log
//! entry per invocation. Failures schedule the first retry; the sweep in
//! [`crate::scheduler`] drives subsequent attempts.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use tokio::task::JoinSet;

use crate::config::WebhookConfig;
use crate::crypto;
use crate::error::WebhookError;
use crate::matcher::SubscriptionMatcher;
use crate::models::{
    DeliveryOutcome, NewDeliveryLog, ResourceEvent, WebhookDeliveryLog, WebhookEnvelope,
    WebhookSubscription,
};
use crate::store::DeliveryLogStore;

/// Maximum response body length kept in the delivery log.
const MAX_RESPONSE_BODY_CHARS: usize = 4096;

/// Service that executes webhook deliveries.
#[derive(Clone)]
pub struct Dispatcher {
    matcher: SubscriptionMatcher,
    logs: Arc<dyn DeliveryLogStore>,
    http_client: Client,
    encryption_key: Vec<u8>,
}

impl Dispatcher {
    /// Create a dispatcher with a shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Internal` if the HTTP client cannot be built.
    pub fn new(
        matcher: SubscriptionMatcher,
        logs: Arc<dyn DeliveryLogStore>,
        config: &WebhookConfig,
    ) -> Result<Self, WebhookError> {
        let http_client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent("resgrid-webhooks/1.0")
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            matcher,
            logs,
            http_client,
            encryption_key: config.encryption_key.clone(),
        })
    }

    /// Deliver an event to every matching subscription.
    ///
    /// Each subscriber's delivery runs as an independent task; a failure in
    /// one never blocks or fails the others.
    pub async fn dispatch_event(&self, event: &ResourceEvent) {
        let subscriptions = match self
            .matcher
            .find_relevant(event.resource_id, event.event_type)
            .await
        {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    resource_id = %event.resource_id,
                    error = %e,
                    "Failed to match subscriptions for event"
                );
                return;
            }
        };

        if subscriptions.is_empty() {
            tracing::debug!(
                target: "webhook_delivery",
                event_id = %event.event_id,
                event_type = %event.event_type,
                resource_id = %event.resource_id,
                "No enabled subscriptions match event"
            );
            return;
        }

        tracing::info!(
            target: "webhook_delivery",
            event_id = %event.event_id,
            event_type = %event.event_type,
            resource_id = %event.resource_id,
            subscription_count = subscriptions.len(),
            "Delivering event to matching subscriptions"
        );

        let mut tasks = JoinSet::new();
        for sub in subscriptions {
            let dispatcher = self.clone();
            let event = event.clone();
            tasks.spawn(async move {
                if let Err(e) = dispatcher.send(&sub, &event).await {
                    tracing::error!(
                        target: "webhook_delivery",
                        subscription_id = %sub.id,
                        event_id = %event.event_id,
                        error = %e,
                        "Delivery bookkeeping failed"
                    );
                }
            });
        }
        while tasks.join_next().await.is_some() {}
    }

    /// Perform the initial delivery of an event to one subscription.
    ///
    /// Writes exactly one delivery log entry; on failure the first retry is
    /// scheduled per the subscription's policy (unless `max_retries == 0`).
    pub async fn send(
        &self,
        subscription: &WebhookSubscription,
        event: &ResourceEvent,
    ) -> Result<DeliveryOutcome, WebhookError> {
        let payload = self.build_payload(subscription, event);

        let log = self
            .logs
            .insert(NewDeliveryLog {
                subscription_id: subscription.id,
                site_id: subscription.site_id,
                event_type: event.event_type.as_str().to_string(),
                payload,
                resource_id: Some(event.resource_id),
                status_code: None,
                response_body: None,
                success: false,
                retry_count: 0,
                max_retries: subscription.max_retries,
                next_retry_at: None,
            })
            .await?;

        self.execute(&log, subscription).await
    }

    /// Re-send a previously persisted delivery, used by the retry sweep.
    /// The stored payload bytes are resent verbatim.
    pub async fn resend(
        &self,
        log: &WebhookDeliveryLog,
        subscription: &WebhookSubscription,
    ) -> Result<DeliveryOutcome, WebhookError> {
        self.execute(log, subscription).await
    }

    /// Serialize the payload envelope, degrading to a minimal fallback if
    /// the event data cannot be serialized. A serialization problem never
    /// aborts the delivery.
    fn build_payload(&self, subscription: &WebhookSubscription, event: &ResourceEvent) -> String {
        let envelope = WebhookEnvelope {
            event_type: event.event_type.as_str().to_string(),
            timestamp: event.timestamp,
            webhook_id: subscription.id,
            data: event.data.clone(),
        };

        match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    target: "webhook_delivery",
                    subscription_id = %subscription.id,
                    event_id = %event.event_id,
                    error = %e,
                    "Payload serialization failed; sending fallback envelope"
                );
                serde_json::json!({
                    "eventType": event.event_type.as_str(),
                    "timestamp": event.timestamp.to_rfc3339(),
                    "webhookId": subscription.id,
                    "data": { "note": "payload serialization failed" },
                })
                .to_string()
            }
        }
    }

    /// Execute one HTTP attempt for a delivery log entry and record the
    /// outcome, scheduling the next retry on failure.
    async fn execute(
        &self,
        log: &WebhookDeliveryLog,
        subscription: &WebhookSubscription,
    ) -> Result<DeliveryOutcome, WebhookError> {
        let body = log.payload.clone().into_bytes();

        let mut request = self
            .http_client
            .post(&subscription.url)
            .header("Content-Type", "application/json");

        // Sign only when the subscription has a secret configured.
        if let Some(ref secret_encrypted) = subscription.secret_encrypted {
            match crypto::decrypt_secret(secret_encrypted, &self.encryption_key) {
                Ok(secret) => {
                    let signature = crypto::sign_payload(&secret, &body);
                    request = request.header("X-Webhook-Signature", signature);
                }
                Err(e) => {
                    tracing::warn!(
                        target: "webhook_delivery",
                        delivery_id = %log.id,
                        subscription_id = %subscription.id,
                        error = %e,
                        "Failed to decrypt subscription secret; delivering without signature"
                    );
                }
            }
        }

        let outcome = match request.body(body).send().await {
            Ok(response) => {
                let status_code = response.status().as_u16() as i16;
                let body = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(MAX_RESPONSE_BODY_CHARS)
                    .collect::<String>();

                if (200..300).contains(&(status_code as u16)) {
                    DeliveryOutcome::success(status_code, Some(body))
                } else {
                    DeliveryOutcome::http_failure(status_code, Some(body))
                }
            }
            Err(e) => {
                let error_msg = if e.is_timeout() {
                    "Request timeout".to_string()
                } else if e.is_connect() {
                    format!("Connection failed: {e}")
                } else {
                    format!("Request error: {e}")
                };
                DeliveryOutcome::transport_failure(error_msg)
            }
        };

        let next_retry_at = if outcome.success {
            None
        } else {
            calculate_next_retry_at(
                log.retry_count,
                log.max_retries,
                subscription.retry_delay_seconds,
                Utc::now(),
            )
        };

        if outcome.success {
            tracing::info!(
                target: "webhook_delivery",
                delivery_id = %log.id,
                subscription_id = %subscription.id,
                site_id = %subscription.site_id,
                event_type = %log.event_type,
                status_code = outcome.status_code,
                retry_count = log.retry_count,
                "Webhook delivery succeeded"
            );
        } else {
            tracing::warn!(
                target: "webhook_delivery",
                delivery_id = %log.id,
                subscription_id = %subscription.id,
                site_id = %subscription.site_id,
                event_type = %log.event_type,
                status_code = outcome.status_code,
                retry_count = log.retry_count,
                has_next_retry = next_retry_at.is_some(),
                "Webhook delivery failed"
            );
        }

        self.logs
            .record_outcome(log.id, outcome.clone(), next_retry_at)
            .await?;

        Ok(outcome)
    }
}

/// Upper bound on a single computed backoff delay (30 days). Exponential
/// growth caps here instead of overflowing `chrono`'s duration range.
pub const MAX_BACKOFF_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Calculate when a failed delivery should next be retried.
///
/// The delay grows exponentially from the subscription's base delay:
/// `base * 2^retry_count`, clamped to [`MAX_BACKOFF_SECONDS`]. Returns None
/// once `retry_count` has reached `max_retries`; the entry is then terminal.
#[must_use]
pub fn calculate_next_retry_at(
    retry_count: i32,
    max_retries: i32,
    base_delay_seconds: i64,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if retry_count >= max_retries {
        return None;
    }

    let exponent = retry_count.clamp(0, 32) as u32;
    let delay_secs = base_delay_seconds
        .saturating_mul(2_i64.saturating_pow(exponent))
        .clamp(1, MAX_BACKOFF_SECONDS);

    let delay = TimeDelta::try_seconds(delay_secs)?;
    now.checked_add_signed(delay)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
