//! Delivery log entity model.
//!
//! One record per dispatch invocation, mutated afterwards only for outcome
//! and retry bookkeeping. The original payload and target are append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A webhook delivery attempt and its retry bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebhookDeliveryLog {
    pub id: Uuid,

    /// Originating subscription. Deleting the subscription cascades here.
    pub subscription_id: Uuid,

    /// Site of the originating subscription.
    pub site_id: Uuid,

    /// Event type wire string.
    pub event_type: String,

    /// Serialized envelope JSON; retries resend these exact bytes.
    pub payload: String,

    /// Resource the event fired on, if still known.
    pub resource_id: Option<Uuid>,

    /// HTTP status of the last attempt; None when the transport itself failed.
    pub status_code: Option<i16>,

    /// Response body of the last attempt, truncated.
    pub response_body: Option<String>,

    /// Terminal once true; the retry sweep never revisits successes.
    pub success: bool,

    /// Retry attempts consumed so far. Invariant: `retry_count <= max_retries`.
    pub retry_count: i32,

    /// Snapshot of the subscription's policy at creation time, so the due
    /// sweep needs no join.
    pub max_retries: i32,

    /// When the next retry is due; None once retries stop.
    pub next_retry_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookDeliveryLog {
    /// Whether retries for this entry are exhausted.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        !self.success && self.next_retry_at.is_none() && self.retry_count >= self.max_retries
    }
}

/// Input for creating a delivery log record.
#[derive(Debug, Clone)]
pub struct NewDeliveryLog {
    pub subscription_id: Uuid,
    pub site_id: Uuid,
    pub event_type: String,
    pub payload: String,
    pub resource_id: Option<Uuid>,
    pub status_code: Option<i16>,
    pub response_body: Option<String>,
    pub success: bool,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
}

/// Outcome of a single HTTP delivery attempt.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub status_code: Option<i16>,
    pub response_body: Option<String>,
    pub success: bool,
}

impl DeliveryOutcome {
    /// A 2xx response.
    #[must_use]
    pub fn success(status_code: i16, body: Option<String>) -> Self {
        Self {
            status_code: Some(status_code),
            response_body: body,
            success: true,
        }
    }

    /// A non-2xx response.
    #[must_use]
    pub fn http_failure(status_code: i16, body: Option<String>) -> Self {
        Self {
            status_code: Some(status_code),
            response_body: body,
            success: false,
        }
    }

    /// A transport-level failure (DNS, connect, timeout).
    #[must_use]
    pub fn transport_failure(error: String) -> Self {
        Self {
            status_code: None,
            response_body: Some(error),
            success: false,
        }
    }
}
