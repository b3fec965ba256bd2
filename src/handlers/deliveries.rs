//! Delivery history handlers.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::error::{ApiResult, WebhookError};
use crate::models::{DeliveryLogListResponse, DeliveryLogResponse, ListDeliveriesQuery};
use crate::router::{AuthContext, WebhooksState};

/// List delivery attempts for a subscription, newest first.
#[utoipa::path(
    get,
    path = "/webhooks/subscriptions/{id}/deliveries",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Subscription ID"),
        ListDeliveriesQuery,
    ),
    responses(
        (status = 200, description = "Paginated delivery list", body = DeliveryLogListResponse),
        (status = 403, description = "Not a site administrator"),
        (status = 404, description = "Subscription not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_deliveries_handler(
    State(state): State<WebhooksState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListDeliveriesQuery>,
) -> ApiResult<Json<DeliveryLogListResponse>> {
    // Ownership and authorization run through the subscription lookup.
    state
        .subscription_service
        .get(auth.user_id, auth.site_id, id)
        .await?;

    let limit = query.limit.clamp(1, 200);
    let offset = query.offset.max(0);

    let items = state.logs.list_by_subscription(id, limit, offset).await?;
    let total = state.logs.count_by_subscription(id).await?;

    Ok(Json(DeliveryLogListResponse {
        items: items.into_iter().map(DeliveryLogResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Get a single delivery attempt.
#[utoipa::path(
    get,
    path = "/webhooks/subscriptions/{id}/deliveries/{delivery_id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Subscription ID"),
        ("delivery_id" = Uuid, Path, description = "Delivery log ID"),
    ),
    responses(
        (status = 200, description = "Delivery details", body = DeliveryLogResponse),
        (status = 403, description = "Not a site administrator"),
        (status = 404, description = "Delivery not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_delivery_handler(
    State(state): State<WebhooksState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, delivery_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<DeliveryLogResponse>> {
    state
        .subscription_service
        .get(auth.user_id, auth.site_id, id)
        .await?;

    let log = state
        .logs
        .find_by_id(delivery_id)
        .await?
        .filter(|log| log.subscription_id == id)
        .ok_or(WebhookError::DeliveryNotFound)?;

    Ok(Json(DeliveryLogResponse::from(log)))
}
