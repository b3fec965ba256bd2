//! Webhook delivery engine for resource lifecycle event subscriptions.
//!
//! Provides site-scoped webhook subscription management, async delivery with
//! HMAC-SHA256 signing, exponential backoff retries, delivery tracking, and
//! signature-gated ingestion of partner callbacks.

pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod matcher;
pub mod models;
pub mod router;
pub mod scheduler;
pub mod services;
pub mod store;
pub mod validation;
pub mod worker;

pub use config::WebhookConfig;
pub use error::WebhookError;
pub use matcher::SubscriptionMatcher;
pub use models::{ResourceEvent, WebhookEventType};
pub use router::{webhooks_router, AuthContext, WebhooksState};
pub use scheduler::RetryScheduler;
pub use services::dispatcher::Dispatcher;
pub use services::event_publisher::EventPublisher;
pub use services::gateway::InboundGateway;
pub use worker::WebhookWorker;
