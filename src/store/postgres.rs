//! Postgres store implementations.
//!
//! Runtime-checked sqlx queries against the schema in `migrations/`. The
//! due-retry claim relies on `FOR UPDATE SKIP LOCKED` so concurrent sweeps
//! against one database cannot double-fire an entry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    DeliveryOutcome, NewDeliveryLog, NewSubscription, SubscriptionUpdate, WebhookDeliveryLog,
    WebhookSubscription,
};

use super::{DeliveryLogStore, StoreError, SubscriptionStore};

/// Embedded schema migrations for the webhook tables.
pub static MIGRATIONS: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Postgres-backed subscription store.
#[derive(Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn insert(&self, sub: NewSubscription) -> Result<WebhookSubscription, StoreError> {
        let record = sqlx::query_as::<_, WebhookSubscription>(
            r#"
            INSERT INTO webhook_subscriptions (
                id, site_id, name, url, resource_id, resource_type_id,
                include_sub_resources, event_filter, enabled, secret_encrypted,
                max_retries, retry_delay_seconds, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $10, $11, $12, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(sub.site_id)
        .bind(&sub.name)
        .bind(&sub.url)
        .bind(sub.resource_id)
        .bind(sub.resource_type_id)
        .bind(sub.include_sub_resources)
        .bind(&sub.event_filter)
        .bind(&sub.secret_encrypted)
        .bind(sub.max_retries)
        .bind(sub.retry_delay_seconds)
        .bind(sub.created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WebhookSubscription>, StoreError> {
        let record = sqlx::query_as::<_, WebhookSubscription>(
            "SELECT * FROM webhook_subscriptions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_by_site(
        &self,
        site_id: Uuid,
        limit: i64,
        offset: i64,
        enabled: Option<bool>,
    ) -> Result<Vec<WebhookSubscription>, StoreError> {
        let records = sqlx::query_as::<_, WebhookSubscription>(
            r#"
            SELECT * FROM webhook_subscriptions
            WHERE site_id = $1
              AND ($2::boolean IS NULL OR enabled = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(site_id)
        .bind(enabled)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn count_by_site(
        &self,
        site_id: Uuid,
        enabled: Option<bool>,
    ) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM webhook_subscriptions
            WHERE site_id = $1
              AND ($2::boolean IS NULL OR enabled = $2)
            "#,
        )
        .bind(site_id)
        .bind(enabled)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    async fn list_enabled_by_site(
        &self,
        site_id: Uuid,
    ) -> Result<Vec<WebhookSubscription>, StoreError> {
        let records = sqlx::query_as::<_, WebhookSubscription>(
            "SELECT * FROM webhook_subscriptions WHERE site_id = $1 AND enabled = TRUE",
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn update(
        &self,
        id: Uuid,
        update: SubscriptionUpdate,
    ) -> Result<Option<WebhookSubscription>, StoreError> {
        let record = sqlx::query_as::<_, WebhookSubscription>(
            r#"
            UPDATE webhook_subscriptions SET
                name = COALESCE($2, name),
                url = COALESCE($3, url),
                event_filter = COALESCE($4, event_filter),
                enabled = COALESCE($5, enabled),
                max_retries = COALESCE($6, max_retries),
                retry_delay_seconds = COALESCE($7, retry_delay_seconds),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.url)
        .bind(&update.event_filter)
        .bind(update.enabled)
        .bind(update.max_retries)
        .bind(update.retry_delay_seconds)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM webhook_subscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Postgres-backed delivery log store.
#[derive(Clone)]
pub struct PgDeliveryLogStore {
    pool: PgPool,
}

impl PgDeliveryLogStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryLogStore for PgDeliveryLogStore {
    async fn insert(&self, log: NewDeliveryLog) -> Result<WebhookDeliveryLog, StoreError> {
        let record = sqlx::query_as::<_, WebhookDeliveryLog>(
            r#"
            INSERT INTO webhook_delivery_logs (
                id, subscription_id, site_id, event_type, payload, resource_id,
                status_code, response_body, success, retry_count, max_retries,
                next_retry_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(log.subscription_id)
        .bind(log.site_id)
        .bind(&log.event_type)
        .bind(&log.payload)
        .bind(log.resource_id)
        .bind(log.status_code)
        .bind(&log.response_body)
        .bind(log.success)
        .bind(log.retry_count)
        .bind(log.max_retries)
        .bind(log.next_retry_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WebhookDeliveryLog>, StoreError> {
        let record = sqlx::query_as::<_, WebhookDeliveryLog>(
            "SELECT * FROM webhook_delivery_logs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookDeliveryLog>, StoreError> {
        let records = sqlx::query_as::<_, WebhookDeliveryLog>(
            r#"
            SELECT * FROM webhook_delivery_logs
            WHERE subscription_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(subscription_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn count_by_subscription(&self, subscription_id: Uuid) -> Result<i64, StoreError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM webhook_delivery_logs WHERE subscription_id = $1")
                .bind(subscription_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }

    async fn record_outcome(
        &self,
        id: Uuid,
        outcome: DeliveryOutcome,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE webhook_delivery_logs SET
                status_code = $2,
                response_body = $3,
                success = $4,
                next_retry_at = $5,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(outcome.status_code)
        .bind(&outcome.response_body)
        .bind(outcome.success)
        .bind(next_retry_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookDeliveryLog>, StoreError> {
        let records = sqlx::query_as::<_, WebhookDeliveryLog>(
            r#"
            UPDATE webhook_delivery_logs SET
                retry_count = retry_count + 1,
                next_retry_at = NULL,
                updated_at = now()
            WHERE id IN (
                SELECT id FROM webhook_delivery_logs
                WHERE success = FALSE
                  AND next_retry_at IS NOT NULL
                  AND next_retry_at <= $1
                  AND retry_count < max_retries
                ORDER BY next_retry_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn delete_for_subscription(&self, subscription_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM webhook_delivery_logs WHERE subscription_id = $1")
            .bind(subscription_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
