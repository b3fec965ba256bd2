//! Resource lifecycle event types and the outbound payload envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wildcard event filter matching every event type.
pub const EVENT_FILTER_ALL: &str = "ALL";

/// Known resource lifecycle event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEventType {
    ResourceCreated,
    ResourceUpdated,
    ResourceDeleted,
    ResourceStatusChanged,
    BookingCreated,
    BookingUpdated,
    BookingCancelled,
    BookingStarted,
    BookingEnded,
}

impl WebhookEventType {
    /// Wire representation of the event type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceCreated => "RESOURCE_CREATED",
            Self::ResourceUpdated => "RESOURCE_UPDATED",
            Self::ResourceDeleted => "RESOURCE_DELETED",
            Self::ResourceStatusChanged => "RESOURCE_STATUS_CHANGED",
            Self::BookingCreated => "BOOKING_CREATED",
            Self::BookingUpdated => "BOOKING_UPDATED",
            Self::BookingCancelled => "BOOKING_CANCELLED",
            Self::BookingStarted => "BOOKING_STARTED",
            Self::BookingEnded => "BOOKING_ENDED",
        }
    }

    /// Parse a wire string back to an event type. Returns None for unknown
    /// strings (including the `ALL` wildcard, which is a filter, not an event).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|et| et.as_str() == s)
    }

    /// All known event types.
    #[must_use]
    pub fn all() -> Vec<Self> {
        vec![
            Self::ResourceCreated,
            Self::ResourceUpdated,
            Self::ResourceDeleted,
            Self::ResourceStatusChanged,
            Self::BookingCreated,
            Self::BookingUpdated,
            Self::BookingCancelled,
            Self::BookingStarted,
            Self::BookingEnded,
        ]
    }

    /// Category of the event type (resource or booking lifecycle).
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::ResourceCreated
            | Self::ResourceUpdated
            | Self::ResourceDeleted
            | Self::ResourceStatusChanged => "resource",
            Self::BookingCreated
            | Self::BookingUpdated
            | Self::BookingCancelled
            | Self::BookingStarted
            | Self::BookingEnded => "booking",
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::ResourceCreated => "A resource was registered",
            Self::ResourceUpdated => "A resource's attributes changed",
            Self::ResourceDeleted => "A resource was removed",
            Self::ResourceStatusChanged => "A resource changed lifecycle status",
            Self::BookingCreated => "A booking was created",
            Self::BookingUpdated => "A booking was modified",
            Self::BookingCancelled => "A booking was cancelled",
            Self::BookingStarted => "A booking period started",
            Self::BookingEnded => "A booking period ended",
        }
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A domain event entering the engine together with the affected resource.
///
/// Producers hand these to the [`crate::EventPublisher`] and continue without
/// waiting for any HTTP roundtrip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub event_id: Uuid,
    pub event_type: WebhookEventType,
    pub resource_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl ResourceEvent {
    /// Build an event stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(event_type: WebhookEventType, resource_id: Uuid, data: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            resource_id,
            timestamp: Utc::now(),
            data,
        }
    }
}

/// JSON body POSTed to subscriber URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub webhook_id: Uuid,
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_roundtrip() {
        for et in WebhookEventType::all() {
            assert_eq!(WebhookEventType::parse(et.as_str()), Some(et));
        }
    }

    #[test]
    fn test_all_wildcard_is_not_an_event_type() {
        assert_eq!(WebhookEventType::parse(EVENT_FILTER_ALL), None);
    }

    #[test]
    fn test_unknown_event_type() {
        assert_eq!(WebhookEventType::parse("RESOURCE_EXPLODED"), None);
    }

    #[test]
    fn test_envelope_uses_camel_case_keys() {
        let envelope = WebhookEnvelope {
            event_type: "RESOURCE_STATUS_CHANGED".to_string(),
            timestamp: Utc::now(),
            webhook_id: Uuid::new_v4(),
            data: serde_json::json!({"status": "ACTIVE"}),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert!(value.get("eventType").is_some());
        assert!(value.get("webhookId").is_some());
        assert!(value.get("timestamp").is_some());
        assert!(value.get("data").is_some());
    }
}
