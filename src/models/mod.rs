//! Domain and API models for the webhook engine.

pub mod api;
pub mod delivery;
pub mod event;
pub mod resource;
pub mod subscription;

pub use api::{
    CreateDeliveryLogRequest, CreateNotificationRequest, CreateSubscriptionRequest,
    DeliveryLogListResponse, DeliveryLogResponse, EventTypeInfo, EventTypeListResponse,
    ListDeliveriesQuery, ListSubscriptionsQuery, SubscriptionListResponse, SubscriptionResponse,
    UpdateSubscriptionRequest,
};
pub use delivery::{DeliveryOutcome, NewDeliveryLog, WebhookDeliveryLog};
pub use event::{ResourceEvent, WebhookEnvelope, WebhookEventType, EVENT_FILTER_ALL};
pub use resource::ResourceRef;
pub use subscription::{NewSubscription, SubscriptionUpdate, WebhookSubscription};
