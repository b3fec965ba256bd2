//! Subscription lifecycle management: create, list, update, delete, with
//! site-admin authorization, per-site limits, and audit trail.

use std::sync::Arc;

use uuid::Uuid;

use crate::crypto;
use crate::error::WebhookError;
use crate::models::{
    CreateSubscriptionRequest, NewSubscription, SubscriptionResponse, SubscriptionUpdate,
    UpdateSubscriptionRequest, WebhookSubscription,
};
use crate::store::{AccessControl, AuditSink, DeliveryLogStore, SubscriptionStore};
use crate::validation;

/// Service for managing webhook subscriptions.
#[derive(Clone)]
pub struct SubscriptionService {
    subscriptions: Arc<dyn SubscriptionStore>,
    logs: Arc<dyn DeliveryLogStore>,
    access: Arc<dyn AccessControl>,
    audit: Arc<dyn AuditSink>,
    encryption_key: Vec<u8>,
    max_subscriptions: i64,
    allow_http: bool,
}

impl SubscriptionService {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        logs: Arc<dyn DeliveryLogStore>,
        access: Arc<dyn AccessControl>,
        audit: Arc<dyn AuditSink>,
        config: &crate::config::WebhookConfig,
    ) -> Self {
        Self {
            subscriptions,
            logs,
            access,
            audit,
            encryption_key: config.encryption_key.clone(),
            max_subscriptions: config.max_subscriptions_per_site,
            allow_http: config.allow_http,
        }
    }

    /// Ensure the user administers the site (or is a global admin).
    async fn authorize(&self, user_id: Uuid, site_id: Uuid) -> Result<(), WebhookError> {
        if self.access.is_admin_of(user_id, site_id).await?
            || self.access.is_global_admin(user_id).await?
        {
            Ok(())
        } else {
            Err(WebhookError::Forbidden)
        }
    }

    /// Create a subscription and return it with the one-time plaintext secret.
    pub async fn create(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        request: CreateSubscriptionRequest,
    ) -> Result<SubscriptionResponse, WebhookError> {
        self.authorize(user_id, site_id).await?;

        validation::validate_webhook_url(&request.url, self.allow_http)?;
        validation::validate_event_filter(&request.event_filter)?;
        validation::validate_scope(
            request.resource_id,
            request.resource_type_id,
            &request.event_filter,
        )?;
        validation::validate_retry_policy(request.max_retries, request.retry_delay_seconds)?;

        let active = self.subscriptions.count_by_site(site_id, None).await?;
        if active >= self.max_subscriptions {
            return Err(WebhookError::SubscriptionLimitExceeded {
                limit: self.max_subscriptions,
            });
        }

        let secret = crypto::generate_secret();
        let secret_encrypted = crypto::encrypt_secret(&secret, &self.encryption_key)?;

        let created = self
            .subscriptions
            .insert(NewSubscription {
                site_id,
                name: request.name,
                url: request.url,
                resource_id: request.resource_id,
                resource_type_id: request.resource_type_id,
                include_sub_resources: request.include_sub_resources,
                event_filter: request.event_filter,
                secret_encrypted: Some(secret_encrypted),
                max_retries: request.max_retries,
                retry_delay_seconds: request.retry_delay_seconds,
                created_by: Some(user_id),
            })
            .await?;

        tracing::info!(
            target: "webhook_delivery",
            subscription_id = %created.id,
            %site_id,
            %user_id,
            "Webhook subscription created"
        );
        self.audit
            .record(
                "webhook.subscription.created",
                &created.id.to_string(),
                serde_json::json!({
                    "site_id": site_id,
                    "name": created.name,
                    "url": created.url,
                    "event_filter": created.event_filter,
                }),
            )
            .await?;

        let mut response = SubscriptionResponse::from_subscription(created);
        response.secret = Some(secret);
        Ok(response)
    }

    /// List a site's subscriptions with pagination and an optional enabled
    /// filter. Returns the page and the total matching count.
    pub async fn list(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        limit: i64,
        offset: i64,
        enabled: Option<bool>,
    ) -> Result<(Vec<WebhookSubscription>, i64), WebhookError> {
        self.authorize(user_id, site_id).await?;

        let limit = limit.clamp(1, 200);
        let offset = offset.max(0);
        let items = self
            .subscriptions
            .list_by_site(site_id, limit, offset, enabled)
            .await?;
        let total = self.subscriptions.count_by_site(site_id, enabled).await?;
        Ok((items, total))
    }

    /// Fetch one subscription, enforcing site ownership.
    pub async fn get(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<WebhookSubscription, WebhookError> {
        self.authorize(user_id, site_id).await?;
        self.find_owned(site_id, subscription_id).await
    }

    /// Apply a partial update. Scope fields are immutable; requests touching
    /// them are rejected outright rather than silently ignored.
    pub async fn update(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        subscription_id: Uuid,
        request: UpdateSubscriptionRequest,
    ) -> Result<WebhookSubscription, WebhookError> {
        self.authorize(user_id, site_id).await?;

        if request.touches_scope() {
            return Err(WebhookError::ScopeImmutable);
        }

        let existing = self.find_owned(site_id, subscription_id).await?;

        if let Some(ref url) = request.url {
            validation::validate_webhook_url(url, self.allow_http)?;
        }
        if let Some(ref filter) = request.event_filter {
            validation::validate_event_filter(filter)?;
            // The new filter must still satisfy the scope invariant of the
            // frozen resource/type scope.
            validation::validate_scope(existing.resource_id, existing.resource_type_id, filter)?;
        }
        validation::validate_retry_policy(
            request.max_retries.unwrap_or(existing.max_retries),
            request
                .retry_delay_seconds
                .unwrap_or(existing.retry_delay_seconds),
        )?;

        let updated = self
            .subscriptions
            .update(
                subscription_id,
                SubscriptionUpdate {
                    name: request.name,
                    url: request.url,
                    event_filter: request.event_filter,
                    enabled: request.enabled,
                    max_retries: request.max_retries,
                    retry_delay_seconds: request.retry_delay_seconds,
                },
            )
            .await?
            .ok_or(WebhookError::SubscriptionNotFound)?;

        self.audit
            .record(
                "webhook.subscription.updated",
                &updated.id.to_string(),
                serde_json::json!({ "site_id": site_id }),
            )
            .await?;

        Ok(updated)
    }

    /// Delete a subscription and its delivery history.
    pub async fn delete(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<(), WebhookError> {
        self.authorize(user_id, site_id).await?;
        let existing = self.find_owned(site_id, subscription_id).await?;

        let removed_logs = self.logs.delete_for_subscription(existing.id).await?;
        if !self.subscriptions.delete(existing.id).await? {
            return Err(WebhookError::SubscriptionNotFound);
        }

        tracing::info!(
            target: "webhook_delivery",
            subscription_id = %existing.id,
            %site_id,
            removed_logs,
            "Webhook subscription deleted"
        );
        self.audit
            .record(
                "webhook.subscription.deleted",
                &existing.id.to_string(),
                serde_json::json!({ "site_id": site_id, "removed_logs": removed_logs }),
            )
            .await?;

        Ok(())
    }

    /// Load a subscription and verify it belongs to the site. Cross-site ids
    /// are indistinguishable from missing ones.
    async fn find_owned(
        &self,
        site_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<WebhookSubscription, WebhookError> {
        let sub = self
            .subscriptions
            .find_by_id(subscription_id)
            .await?
            .ok_or(WebhookError::SubscriptionNotFound)?;
        if sub.site_id != site_id {
            return Err(WebhookError::SubscriptionNotFound);
        }
        Ok(sub)
    }
}
