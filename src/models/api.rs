//! Request/response DTOs for the webhook HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::delivery::WebhookDeliveryLog;
use super::subscription::WebhookSubscription;

// ---------------------------------------------------------------------------
// Subscription management
// ---------------------------------------------------------------------------

fn default_max_retries() -> i32 {
    3
}

fn default_retry_delay_seconds() -> i64 {
    60
}

/// Request body for creating a webhook subscription.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateSubscriptionRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[validate(length(min = 1, max = 2048))]
    pub url: String,

    /// Scope to a specific resource.
    #[serde(default)]
    pub resource_id: Option<Uuid>,

    /// Scope to a resource type.
    #[serde(default)]
    pub resource_type_id: Option<Uuid>,

    /// Also match events on descendants of the scoped resource.
    #[serde(default)]
    pub include_sub_resources: bool,

    /// One event type wire string, or `ALL`.
    pub event_filter: String,

    #[serde(default = "default_max_retries")]
    #[validate(range(min = 0, max = 20))]
    pub max_retries: i32,

    #[serde(default = "default_retry_delay_seconds")]
    #[validate(range(min = 1, max = 86400))]
    pub retry_delay_seconds: i64,
}

/// Request body for updating a webhook subscription.
///
/// Scope fields are accepted only so that attempts to change them can be
/// rejected explicitly; scope is immutable after creation.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSubscriptionRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 2048))]
    pub url: Option<String>,

    pub event_filter: Option<String>,

    pub enabled: Option<bool>,

    #[validate(range(min = 0, max = 20))]
    pub max_retries: Option<i32>,

    #[validate(range(min = 1, max = 86400))]
    pub retry_delay_seconds: Option<i64>,

    #[serde(default)]
    pub resource_id: Option<Uuid>,

    #[serde(default)]
    pub resource_type_id: Option<Uuid>,

    #[serde(default)]
    pub include_sub_resources: Option<bool>,
}

impl UpdateSubscriptionRequest {
    /// Whether the request tries to touch the immutable scope fields.
    #[must_use]
    pub fn touches_scope(&self) -> bool {
        self.resource_id.is_some()
            || self.resource_type_id.is_some()
            || self.include_sub_resources.is_some()
    }
}

/// A subscription as returned by the API. The signing secret appears exactly
/// once, in the creation response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub site_id: Uuid,
    pub name: String,
    pub url: String,
    pub resource_id: Option<Uuid>,
    pub resource_type_id: Option<Uuid>,
    pub include_sub_resources: bool,
    pub event_filter: String,
    pub enabled: bool,
    pub max_retries: i32,
    pub retry_delay_seconds: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Plaintext signing secret, present only in the create response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl SubscriptionResponse {
    /// Convert a subscription record, without exposing any secret material.
    #[must_use]
    pub fn from_subscription(sub: WebhookSubscription) -> Self {
        Self {
            id: sub.id,
            site_id: sub.site_id,
            name: sub.name,
            url: sub.url,
            resource_id: sub.resource_id,
            resource_type_id: sub.resource_type_id,
            include_sub_resources: sub.include_sub_resources,
            event_filter: sub.event_filter,
            enabled: sub.enabled,
            max_retries: sub.max_retries,
            retry_delay_seconds: sub.retry_delay_seconds,
            created_at: sub.created_at,
            updated_at: sub.updated_at,
            secret: None,
        }
    }
}

fn default_limit() -> i64 {
    50
}

/// Query parameters for listing subscriptions.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListSubscriptionsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Paginated subscription list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionListResponse {
    pub items: Vec<SubscriptionResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Description of a supported event type.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventTypeInfo {
    pub event_type: String,
    pub category: String,
    pub description: String,
}

/// List of supported event types.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventTypeListResponse {
    pub event_types: Vec<EventTypeInfo>,
}

// ---------------------------------------------------------------------------
// Delivery history
// ---------------------------------------------------------------------------

/// A delivery log entry as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryLogResponse {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub event_type: String,
    pub payload: String,
    pub resource_id: Option<Uuid>,
    pub status_code: Option<i16>,
    pub response_body: Option<String>,
    pub success: bool,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WebhookDeliveryLog> for DeliveryLogResponse {
    fn from(log: WebhookDeliveryLog) -> Self {
        Self {
            id: log.id,
            subscription_id: log.subscription_id,
            event_type: log.event_type,
            payload: log.payload,
            resource_id: log.resource_id,
            status_code: log.status_code,
            response_body: log.response_body,
            success: log.success,
            retry_count: log.retry_count,
            max_retries: log.max_retries,
            next_retry_at: log.next_retry_at,
            created_at: log.created_at,
            updated_at: log.updated_at,
        }
    }
}

/// Query parameters for listing deliveries of a subscription.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListDeliveriesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// Paginated delivery list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryLogListResponse {
    pub items: Vec<DeliveryLogResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ---------------------------------------------------------------------------
// Inbound (partner-originated) requests
// ---------------------------------------------------------------------------

/// Partner-pushed notification addressed to a specific user, authenticated
/// against the subscription's secret.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub webhook_id: String,
    pub user_id: String,
    pub message: String,
    /// Defaults to `INFO` when blank or absent.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Partner-reported outcome of a delivery the partner performed itself.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeliveryLogRequest {
    pub webhook_id: String,
    pub event_type: String,
    pub payload: String,
    pub success: bool,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub status_code: Option<i16>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub retry_count: Option<i32>,
}
