//! Fire-and-forget event intake.
//!
//! Producers hand resource events to a bounded in-process queue; the
//! [`crate::worker::WebhookWorker`] drains it and drives deliveries. Queue
//! pressure is absorbed by dropping the event with a warning rather than
//! blocking the caller's request path.

use tokio::sync::mpsc;

use crate::models::ResourceEvent;

/// Sending half of the bounded event queue.
#[derive(Clone)]
pub struct EventPublisher {
    sender: mpsc::Sender<ResourceEvent>,
}

impl EventPublisher {
    /// Create a publisher and the receiver the worker consumes.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ResourceEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Enqueue an event without waiting. Never blocks and never fails the
    /// caller; a full or closed queue drops the event.
    pub fn publish(&self, event: ResourceEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    target: "webhook_delivery",
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    "Event queue full; dropping webhook event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::warn!(
                    target: "webhook_delivery",
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    "Event queue closed; dropping webhook event"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
