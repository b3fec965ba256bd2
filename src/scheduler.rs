//! Periodic retry sweep.
//!
//! Failed deliveries with a due `next_retry_at` are claimed in batches and
//! re-sent. The claim itself advances the retry counter and clears the due
//! timestamp atomically, so a delivery in flight can never be picked up by
//! an overlapping sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::config::WebhookConfig;
use crate::error::WebhookError;
use crate::models::DeliveryOutcome;
use crate::services::dispatcher::Dispatcher;
use crate::store::{DeliveryLogStore, SubscriptionStore};

/// Background scheduler that drives webhook delivery retries.
pub struct RetryScheduler {
    dispatcher: Arc<Dispatcher>,
    subscriptions: Arc<dyn SubscriptionStore>,
    logs: Arc<dyn DeliveryLogStore>,
    interval: Duration,
    batch_limit: i64,
}

impl RetryScheduler {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        subscriptions: Arc<dyn SubscriptionStore>,
        logs: Arc<dyn DeliveryLogStore>,
        config: &WebhookConfig,
    ) -> Self {
        Self {
            dispatcher,
            subscriptions,
            logs,
            interval: config.sweep_interval,
            batch_limit: config.sweep_batch_limit,
        }
    }

    /// Run one sweep: claim everything due at `now` and re-send each entry.
    /// Returns the number of entries processed.
    pub async fn process_due_retries(&self, now: DateTime<Utc>) -> Result<usize, WebhookError> {
        let claimed = self.logs.claim_due(now, self.batch_limit).await?;
        if claimed.is_empty() {
            return Ok(0);
        }

        tracing::info!(
            target: "webhook_delivery",
            count = claimed.len(),
            "Retry sweep claimed due deliveries"
        );

        let mut processed = 0;
        for log in claimed {
            // An entry whose subscription vanished or was disabled after the
            // failure is closed out rather than re-sent.
            let subscription = match self.subscriptions.find_by_id(log.subscription_id).await? {
                Some(sub) if sub.enabled => sub,
                Some(_) => {
                    self.abandon(log.id, "Subscription disabled").await?;
                    processed += 1;
                    continue;
                }
                None => {
                    self.abandon(log.id, "Subscription deleted").await?;
                    processed += 1;
                    continue;
                }
            };

            if let Err(e) = self.dispatcher.resend(&log, &subscription).await {
                tracing::error!(
                    target: "webhook_delivery",
                    delivery_id = %log.id,
                    subscription_id = %log.subscription_id,
                    error = %e,
                    "Retry bookkeeping failed"
                );
            }
            processed += 1;
        }

        Ok(processed)
    }

    /// Close out a claimed entry without attempting delivery.
    async fn abandon(&self, delivery_id: uuid::Uuid, reason: &str) -> Result<(), WebhookError> {
        tracing::info!(
            target: "webhook_delivery",
            %delivery_id,
            reason,
            "Abandoning retry"
        );
        self.logs
            .record_outcome(
                delivery_id,
                DeliveryOutcome::transport_failure(reason.to_string()),
                None,
            )
            .await?;
        Ok(())
    }

    /// Sweep loop, intended to be spawned as a background task. Exits when
    /// the shutdown signal flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            target: "webhook_delivery",
            interval_secs = self.interval.as_secs(),
            batch_limit = self.batch_limit,
            "Retry scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.process_due_retries(Utc::now()).await {
                        tracing::error!(
                            target: "webhook_delivery",
                            error = %e,
                            "Retry sweep failed"
                        );
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!(
                            target: "webhook_delivery",
                            "Retry scheduler shutting down"
                        );
                        break;
                    }
                }
            }
        }
    }
}
