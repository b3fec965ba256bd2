//! Handlers for partner-originated callbacks.
//!
//! These endpoints carry no platform auth; each request authenticates
//! itself with an `X-Webhook-Signature` HMAC over the raw body.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::error::{ApiResult, WebhookError};
use crate::models::DeliveryLogResponse;
use crate::router::WebhooksState;

const SIGNATURE_HEADER: &str = "x-webhook-signature";

fn extract_signature(headers: &HeaderMap) -> Result<&str, WebhookError> {
    headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or(WebhookError::SignatureRejected)
}

/// Accept a partner-pushed user notification.
#[utoipa::path(
    post,
    path = "/webhooks/inbound/notifications",
    tag = "Webhooks",
    request_body = crate::models::CreateNotificationRequest,
    responses(
        (status = 204, description = "Notification accepted"),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Signature verification failed"),
    ),
)]
pub async fn create_notification_handler(
    State(state): State<WebhooksState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let signature = extract_signature(&headers)?;
    state.gateway.accept_notification(signature, &body).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Accept a partner-reported delivery outcome.
#[utoipa::path(
    post,
    path = "/webhooks/inbound/delivery-logs",
    tag = "Webhooks",
    request_body = crate::models::CreateDeliveryLogRequest,
    responses(
        (status = 201, description = "Delivery log recorded", body = DeliveryLogResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Signature verification failed"),
    ),
)]
pub async fn create_delivery_log_handler(
    State(state): State<WebhooksState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<DeliveryLogResponse>)> {
    let signature = extract_signature(&headers)?;
    let log = state.gateway.accept_delivery_log(signature, &body).await?;
    Ok((StatusCode::CREATED, Json(DeliveryLogResponse::from(log))))
}
