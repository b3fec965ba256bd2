//! Axum router setup for webhook endpoints.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::handlers::{deliveries, inbound, subscriptions};
use crate::services::gateway::InboundGateway;
use crate::services::subscription_service::SubscriptionService;
use crate::store::DeliveryLogStore;

/// Authenticated caller identity, injected by the platform's auth middleware
/// as a request extension.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub site_id: Uuid,
}

/// Shared state for webhook handlers.
#[derive(Clone)]
pub struct WebhooksState {
    pub subscription_service: Arc<SubscriptionService>,
    pub gateway: Arc<InboundGateway>,
    pub logs: Arc<dyn DeliveryLogStore>,
}

impl WebhooksState {
    pub fn new(
        subscription_service: Arc<SubscriptionService>,
        gateway: Arc<InboundGateway>,
        logs: Arc<dyn DeliveryLogStore>,
    ) -> Self {
        Self {
            subscription_service,
            gateway,
            logs,
        }
    }
}

/// Creates the webhook router with all routes.
pub fn webhooks_router(state: WebhooksState) -> Router {
    Router::new()
        // Subscription CRUD
        .route(
            "/webhooks/subscriptions",
            post(subscriptions::create_subscription_handler)
                .get(subscriptions::list_subscriptions_handler),
        )
        .route(
            "/webhooks/subscriptions/:id",
            get(subscriptions::get_subscription_handler)
                .patch(subscriptions::update_subscription_handler)
                .delete(subscriptions::delete_subscription_handler),
        )
        // Event types
        .route(
            "/webhooks/event-types",
            get(subscriptions::list_event_types_handler),
        )
        // Delivery history
        .route(
            "/webhooks/subscriptions/:id/deliveries",
            get(deliveries::list_deliveries_handler),
        )
        .route(
            "/webhooks/subscriptions/:id/deliveries/:delivery_id",
            get(deliveries::get_delivery_handler),
        )
        // Signature-gated partner callbacks
        .route(
            "/webhooks/inbound/notifications",
            post(inbound::create_notification_handler),
        )
        .route(
            "/webhooks/inbound/delivery-logs",
            post(inbound::create_delivery_log_handler),
        )
        .with_state(state)
}
