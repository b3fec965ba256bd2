//! Inbound verification gateway.
//!
//! Federation partners push notifications and delivery reports back into the
//! platform. Every inbound request is authenticated against the signing
//! secret of the subscription named in its body: the signature must be a
//! base64 HMAC-SHA256 over the exact raw body bytes. Verification fails
//! closed: a missing subscription, a disabled one, a missing secret, or a
//! decryption problem all reject the request the same way as a bad
//! signature.

use std::sync::Arc;

use uuid::Uuid;

use crate::crypto;
use crate::error::WebhookError;
use crate::models::{
    CreateDeliveryLogRequest, CreateNotificationRequest, NewDeliveryLog, WebhookDeliveryLog,
    WebhookSubscription,
};
use crate::store::{DeliveryLogStore, NotificationSink, SubscriptionStore};

const DEFAULT_NOTIFICATION_KIND: &str = "INFO";

/// Gateway for partner-originated webhook callbacks.
#[derive(Clone)]
pub struct InboundGateway {
    subscriptions: Arc<dyn SubscriptionStore>,
    logs: Arc<dyn DeliveryLogStore>,
    notifications: Arc<dyn NotificationSink>,
    encryption_key: Vec<u8>,
}

impl InboundGateway {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        logs: Arc<dyn DeliveryLogStore>,
        notifications: Arc<dyn NotificationSink>,
        config: &crate::config::WebhookConfig,
    ) -> Self {
        Self {
            subscriptions,
            logs,
            notifications,
            encryption_key: config.encryption_key.clone(),
        }
    }

    /// Verify an inbound request signature against a subscription's secret.
    ///
    /// Returns the subscription only when every check passes; any missing
    /// precondition yields None (fail closed). Store errors still propagate.
    async fn authenticate(
        &self,
        subscription_id: Uuid,
        signature: &str,
        raw_body: &[u8],
    ) -> Result<Option<WebhookSubscription>, WebhookError> {
        let Some(sub) = self.subscriptions.find_by_id(subscription_id).await? else {
            tracing::warn!(
                target: "webhook_delivery",
                %subscription_id,
                "Inbound request for unknown subscription"
            );
            return Ok(None);
        };

        if !sub.enabled {
            tracing::warn!(
                target: "webhook_delivery",
                %subscription_id,
                "Inbound request for disabled subscription"
            );
            return Ok(None);
        }

        let Some(ref secret_encrypted) = sub.secret_encrypted else {
            tracing::warn!(
                target: "webhook_delivery",
                %subscription_id,
                "Inbound request for subscription without a secret"
            );
            return Ok(None);
        };

        let secret = match crypto::decrypt_secret(secret_encrypted, &self.encryption_key) {
            Ok(secret) => secret,
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    %subscription_id,
                    error = %e,
                    "Failed to decrypt subscription secret for inbound verification"
                );
                return Ok(None);
            }
        };

        if crypto::verify_payload(signature, &secret, raw_body) {
            Ok(Some(sub))
        } else {
            tracing::warn!(
                target: "webhook_delivery",
                %subscription_id,
                "Inbound request signature mismatch"
            );
            Ok(None)
        }
    }

    /// Accept a partner-pushed notification and forward it to the addressed
    /// user's inbox. The raw body bytes are what the signature covers; the
    /// JSON is parsed only after basic decoding.
    pub async fn accept_notification(
        &self,
        signature: &str,
        raw_body: &[u8],
    ) -> Result<(), WebhookError> {
        let request: CreateNotificationRequest = serde_json::from_slice(raw_body)
            .map_err(|e| WebhookError::Validation(format!("Invalid notification body: {e}")))?;

        if request.webhook_id.trim().is_empty()
            || request.user_id.trim().is_empty()
            || request.message.trim().is_empty()
        {
            return Err(WebhookError::Validation(
                "webhookId, userId and message are required".to_string(),
            ));
        }

        let subscription_id = parse_uuid(&request.webhook_id, "webhookId")?;
        let user_id = parse_uuid(&request.user_id, "userId")?;

        if self
            .authenticate(subscription_id, signature, raw_body)
            .await?
            .is_none()
        {
            return Err(WebhookError::SignatureRejected);
        }

        let kind = request
            .kind
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or(DEFAULT_NOTIFICATION_KIND);

        self.notifications
            .notify(user_id, request.message.trim(), kind)
            .await?;

        tracing::info!(
            target: "webhook_delivery",
            %subscription_id,
            %user_id,
            kind,
            "Inbound notification accepted"
        );

        Ok(())
    }

    /// Accept a partner-reported delivery outcome and record it in the
    /// delivery history. Ingested entries are never picked up by the retry
    /// sweep; the partner performed the delivery itself.
    pub async fn accept_delivery_log(
        &self,
        signature: &str,
        raw_body: &[u8],
    ) -> Result<WebhookDeliveryLog, WebhookError> {
        let request: CreateDeliveryLogRequest = serde_json::from_slice(raw_body)
            .map_err(|e| WebhookError::Validation(format!("Invalid delivery log body: {e}")))?;

        if request.webhook_id.trim().is_empty()
            || request.event_type.trim().is_empty()
            || request.payload.trim().is_empty()
        {
            return Err(WebhookError::Validation(
                "webhookId, eventType and payload are required".to_string(),
            ));
        }

        let subscription_id = parse_uuid(&request.webhook_id, "webhookId")?;
        let resource_id = request
            .resource_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_uuid(s, "resourceId"))
            .transpose()?;

        let Some(sub) = self
            .authenticate(subscription_id, signature, raw_body)
            .await?
        else {
            return Err(WebhookError::SignatureRejected);
        };

        let retry_count = request.retry_count.unwrap_or(0).max(0);

        let log = self
            .logs
            .insert(NewDeliveryLog {
                subscription_id: sub.id,
                site_id: sub.site_id,
                event_type: request.event_type.trim().to_string(),
                payload: request.payload,
                resource_id,
                status_code: request.status_code,
                response_body: request.response,
                success: request.success,
                retry_count,
                // Keep the retry invariant intact even when the partner
                // reports more attempts than the subscription's policy.
                max_retries: sub.max_retries.max(retry_count),
                next_retry_at: None,
            })
            .await?;

        tracing::info!(
            target: "webhook_delivery",
            %subscription_id,
            delivery_id = %log.id,
            success = log.success,
            "Inbound delivery log recorded"
        );

        Ok(log)
    }
}

fn parse_uuid(value: &str, field: &str) -> Result<Uuid, WebhookError> {
    Uuid::parse_str(value.trim())
        .map_err(|_| WebhookError::Validation(format!("{field} is not a valid UUID")))
}
