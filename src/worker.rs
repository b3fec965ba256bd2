//! Background worker that drains the event queue and drives deliveries.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::models::ResourceEvent;
use crate::services::dispatcher::Dispatcher;

/// Consumes published resource events and dispatches them to subscribers.
pub struct WebhookWorker {
    dispatcher: Arc<Dispatcher>,
}

impl WebhookWorker {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Worker loop, intended to be spawned as a background task. Exits when
    /// the shutdown signal flips to true or the queue closes.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<ResourceEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!(target: "webhook_delivery", "Webhook worker started");

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(event) => self.dispatcher.dispatch_event(&event).await,
                        None => {
                            tracing::info!(
                                target: "webhook_delivery",
                                "Event queue closed; webhook worker exiting"
                            );
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!(
                            target: "webhook_delivery",
                            "Webhook worker shutting down"
                        );
                        break;
                    }
                }
            }
        }
    }
}
