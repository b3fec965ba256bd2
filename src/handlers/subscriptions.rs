//! CRUD handlers for webhook subscriptions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiResult, WebhookError};
use crate::models::{
    CreateSubscriptionRequest, EventTypeInfo, EventTypeListResponse, ListSubscriptionsQuery,
    SubscriptionListResponse, SubscriptionResponse, UpdateSubscriptionRequest, WebhookEventType,
};
use crate::router::{AuthContext, WebhooksState};

// ---------------------------------------------------------------------------
// Subscription CRUD handlers
// ---------------------------------------------------------------------------

/// Create a new webhook subscription.
#[utoipa::path(
    post,
    path = "/webhooks/subscriptions",
    tag = "Webhooks",
    request_body = CreateSubscriptionRequest,
    responses(
        (status = 201, description = "Subscription created", body = SubscriptionResponse),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not a site administrator"),
        (status = 409, description = "Subscription limit exceeded"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_subscription_handler(
    State(state): State<WebhooksState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> ApiResult<(StatusCode, Json<SubscriptionResponse>)> {
    request
        .validate()
        .map_err(|e| WebhookError::Validation(e.to_string()))?;

    let response = state
        .subscription_service
        .create(auth.user_id, auth.site_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// List webhook subscriptions for the caller's site.
#[utoipa::path(
    get,
    path = "/webhooks/subscriptions",
    tag = "Webhooks",
    params(ListSubscriptionsQuery),
    responses(
        (status = 200, description = "Paginated subscription list", body = SubscriptionListResponse),
        (status = 403, description = "Not a site administrator"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_subscriptions_handler(
    State(state): State<WebhooksState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListSubscriptionsQuery>,
) -> ApiResult<Json<SubscriptionListResponse>> {
    let (items, total) = state
        .subscription_service
        .list(
            auth.user_id,
            auth.site_id,
            query.limit,
            query.offset,
            query.enabled,
        )
        .await?;

    Ok(Json(SubscriptionListResponse {
        items: items
            .into_iter()
            .map(SubscriptionResponse::from_subscription)
            .collect(),
        total,
        limit: query.limit,
        offset: query.offset,
    }))
}

/// Get a single webhook subscription.
#[utoipa::path(
    get,
    path = "/webhooks/subscriptions/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Subscription ID")
    ),
    responses(
        (status = 200, description = "Subscription details", body = SubscriptionResponse),
        (status = 403, description = "Not a site administrator"),
        (status = 404, description = "Subscription not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_subscription_handler(
    State(state): State<WebhooksState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let sub = state
        .subscription_service
        .get(auth.user_id, auth.site_id, id)
        .await?;

    Ok(Json(SubscriptionResponse::from_subscription(sub)))
}

/// Update a webhook subscription.
#[utoipa::path(
    patch,
    path = "/webhooks/subscriptions/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Subscription ID")
    ),
    request_body = UpdateSubscriptionRequest,
    responses(
        (status = 200, description = "Subscription updated", body = SubscriptionResponse),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not a site administrator"),
        (status = 404, description = "Subscription not found"),
        (status = 409, description = "Scope fields are immutable"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_subscription_handler(
    State(state): State<WebhooksState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSubscriptionRequest>,
) -> ApiResult<Json<SubscriptionResponse>> {
    request
        .validate()
        .map_err(|e| WebhookError::Validation(e.to_string()))?;

    let updated = state
        .subscription_service
        .update(auth.user_id, auth.site_id, id, request)
        .await?;

    Ok(Json(SubscriptionResponse::from_subscription(updated)))
}

/// Delete a webhook subscription and its delivery history.
#[utoipa::path(
    delete,
    path = "/webhooks/subscriptions/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Subscription ID")
    ),
    responses(
        (status = 204, description = "Subscription deleted"),
        (status = 403, description = "Not a site administrator"),
        (status = 404, description = "Subscription not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_subscription_handler(
    State(state): State<WebhooksState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .subscription_service
        .delete(auth.user_id, auth.site_id, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Event types handler
// ---------------------------------------------------------------------------

/// List all supported webhook event types.
#[utoipa::path(
    get,
    path = "/webhooks/event-types",
    tag = "Webhooks",
    responses(
        (status = 200, description = "List of event types", body = EventTypeListResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_event_types_handler() -> Json<EventTypeListResponse> {
    let event_types = WebhookEventType::all()
        .into_iter()
        .map(|et| EventTypeInfo {
            event_type: et.as_str().to_string(),
            category: et.category().to_string(),
            description: et.description().to_string(),
        })
        .collect();

    Json(EventTypeListResponse { event_types })
}
