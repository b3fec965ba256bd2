//! HTTP handlers for the webhook API.

pub mod deliveries;
pub mod inbound;
pub mod subscriptions;
