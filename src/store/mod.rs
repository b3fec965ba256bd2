//! Storage traits for the webhook engine, plus collaborator interfaces to
//! the rest of the platform.
//!
//! Two backends ship in-crate: [`memory`] for tests and embedding, and
//! [`postgres`] for production.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    DeliveryOutcome, NewDeliveryLog, NewSubscription, ResourceRef, SubscriptionUpdate,
    WebhookDeliveryLog, WebhookSubscription,
};

/// Storage operation errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Data integrity error: {0}")]
    Integrity(String),
}

// ---------------------------------------------------------------------------
// Engine-owned stores
// ---------------------------------------------------------------------------

/// Persistence for webhook subscription records.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn insert(&self, sub: NewSubscription) -> Result<WebhookSubscription, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WebhookSubscription>, StoreError>;

    async fn list_by_site(
        &self,
        site_id: Uuid,
        limit: i64,
        offset: i64,
        enabled: Option<bool>,
    ) -> Result<Vec<WebhookSubscription>, StoreError>;

    async fn count_by_site(&self, site_id: Uuid, enabled: Option<bool>)
        -> Result<i64, StoreError>;

    /// All enabled subscriptions of a site; the matcher's candidate set.
    async fn list_enabled_by_site(
        &self,
        site_id: Uuid,
    ) -> Result<Vec<WebhookSubscription>, StoreError>;

    /// Apply a partial update. Returns None when the subscription does not
    /// exist. Scope and secret are not updatable by design.
    async fn update(
        &self,
        id: Uuid,
        update: SubscriptionUpdate,
    ) -> Result<Option<WebhookSubscription>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Persistence for delivery attempt records and retry bookkeeping.
#[async_trait]
pub trait DeliveryLogStore: Send + Sync {
    async fn insert(&self, log: NewDeliveryLog) -> Result<WebhookDeliveryLog, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WebhookDeliveryLog>, StoreError>;

    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookDeliveryLog>, StoreError>;

    async fn count_by_subscription(&self, subscription_id: Uuid) -> Result<i64, StoreError>;

    /// Record the outcome of an attempt and the next retry time, if any.
    async fn record_outcome(
        &self,
        id: Uuid,
        outcome: DeliveryOutcome,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Atomically claim entries due for retry: bump `retry_count` and clear
    /// `next_retry_at` before any network attempt, so a slow HTTP call
    /// cannot be double-fired by the next sweep. Returns post-claim state.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookDeliveryLog>, StoreError>;

    /// Cascade used when a subscription is deleted.
    async fn delete_for_subscription(&self, subscription_id: Uuid) -> Result<u64, StoreError>;
}

// ---------------------------------------------------------------------------
// Collaborator interfaces (owned elsewhere in the platform)
// ---------------------------------------------------------------------------

/// Resource lookup, including the parent chain used for sub-resource scope.
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<ResourceRef>, StoreError>;
}

/// Site/role authorization checks.
#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn is_admin_of(&self, user_id: Uuid, site_id: Uuid) -> Result<bool, StoreError>;

    async fn is_global_admin(&self, user_id: Uuid) -> Result<bool, StoreError>;
}

/// User-inbox notification delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, user_id: Uuid, message: &str, kind: &str) -> Result<(), StoreError>;
}

/// Audit log sink for administrative actions.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(
        &self,
        action: &str,
        entity: &str,
        details: serde_json::Value,
    ) -> Result<(), StoreError>;
}
