//! Webhook subscription entity model.
//!
//! A subscription registers an external URL for resource lifecycle events,
//! scoped to a specific resource (optionally including its descendants), a
//! resource type, or a whole site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::event::{WebhookEventType, EVENT_FILTER_ALL};

/// A registered webhook subscription.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebhookSubscription {
    /// Internal unique identifier, also the `webhookId` on the wire.
    pub id: Uuid,

    /// Site (federation) owning this subscription.
    pub site_id: Uuid,

    /// Human-readable name.
    pub name: String,

    /// Target URL for HTTP callbacks.
    pub url: String,

    /// Scope: a specific resource (None together with `resource_type_id`
    /// means site-wide).
    pub resource_id: Option<Uuid>,

    /// Scope: a resource type.
    pub resource_type_id: Option<Uuid>,

    /// When true and `resource_id` is set, events on descendant resources
    /// also match.
    pub include_sub_resources: bool,

    /// One event type wire string, or `ALL`.
    pub event_filter: String,

    /// Disabled subscriptions never match.
    pub enabled: bool,

    /// AES-256-GCM-at-rest encoding of the signing secret. Immutable after
    /// creation; rotation requires delete + recreate.
    pub secret_encrypted: Option<String>,

    /// Maximum retry attempts after the initial delivery (>= 0).
    pub max_retries: i32,

    /// Base backoff delay in seconds (> 0); doubles on each retry.
    pub retry_delay_seconds: i64,

    /// Administrator who created the subscription.
    pub created_by: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookSubscription {
    /// Whether this subscription's event filter matches the given event type.
    #[must_use]
    pub fn matches_event(&self, event_type: WebhookEventType) -> bool {
        self.event_filter == EVENT_FILTER_ALL || self.event_filter == event_type.as_str()
    }

    /// Whether this subscription is site-wide (no resource or type scope).
    #[must_use]
    pub fn is_site_wide(&self) -> bool {
        self.resource_id.is_none() && self.resource_type_id.is_none()
    }
}

/// Input for creating a subscription record.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub site_id: Uuid,
    pub name: String,
    pub url: String,
    pub resource_id: Option<Uuid>,
    pub resource_type_id: Option<Uuid>,
    pub include_sub_resources: bool,
    pub event_filter: String,
    pub secret_encrypted: Option<String>,
    pub max_retries: i32,
    pub retry_delay_seconds: i64,
    pub created_by: Option<Uuid>,
}

/// Partial update of a subscription. Scope fields are absent on purpose:
/// scope is immutable after creation.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub event_filter: Option<String>,
    pub enabled: Option<bool>,
    pub max_retries: Option<i32>,
    pub retry_delay_seconds: Option<i64>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
