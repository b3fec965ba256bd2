//! Business logic services for the webhook engine.

pub mod dispatcher;
pub mod event_publisher;
pub mod gateway;
pub mod subscription_service;
