//! In-memory store implementations, used by tests and embedded deployments.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    DeliveryOutcome, NewDeliveryLog, NewSubscription, ResourceRef, SubscriptionUpdate,
    WebhookDeliveryLog, WebhookSubscription,
};

use super::{
    AccessControl, AuditSink, DeliveryLogStore, NotificationSink, ResourceDirectory, StoreError,
    SubscriptionStore,
};

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// In-memory subscription store.
#[derive(Default)]
pub struct MemorySubscriptionStore {
    state: Mutex<HashMap<Uuid, WebhookSubscription>>,
}

impl MemorySubscriptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn insert(&self, sub: NewSubscription) -> Result<WebhookSubscription, StoreError> {
        let now = Utc::now();
        let record = WebhookSubscription {
            id: Uuid::new_v4(),
            site_id: sub.site_id,
            name: sub.name,
            url: sub.url,
            resource_id: sub.resource_id,
            resource_type_id: sub.resource_type_id,
            include_sub_resources: sub.include_sub_resources,
            event_filter: sub.event_filter,
            enabled: true,
            secret_encrypted: sub.secret_encrypted,
            max_retries: sub.max_retries,
            retry_delay_seconds: sub.retry_delay_seconds,
            created_by: sub.created_by,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WebhookSubscription>, StoreError> {
        Ok(self.state.lock().unwrap().get(&id).cloned())
    }

    async fn list_by_site(
        &self,
        site_id: Uuid,
        limit: i64,
        offset: i64,
        enabled: Option<bool>,
    ) -> Result<Vec<WebhookSubscription>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut subs: Vec<_> = state
            .values()
            .filter(|s| s.site_id == site_id)
            .filter(|s| enabled.map_or(true, |e| s.enabled == e))
            .cloned()
            .collect();
        subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(subs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_by_site(
        &self,
        site_id: Uuid,
        enabled: Option<bool>,
    ) -> Result<i64, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .values()
            .filter(|s| s.site_id == site_id)
            .filter(|s| enabled.map_or(true, |e| s.enabled == e))
            .count() as i64)
    }

    async fn list_enabled_by_site(
        &self,
        site_id: Uuid,
    ) -> Result<Vec<WebhookSubscription>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .values()
            .filter(|s| s.site_id == site_id && s.enabled)
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        id: Uuid,
        update: SubscriptionUpdate,
    ) -> Result<Option<WebhookSubscription>, StoreError> {
        let mut state = self.state.lock().unwrap();
        let Some(sub) = state.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            sub.name = name;
        }
        if let Some(url) = update.url {
            sub.url = url;
        }
        if let Some(event_filter) = update.event_filter {
            sub.event_filter = event_filter;
        }
        if let Some(enabled) = update.enabled {
            sub.enabled = enabled;
        }
        if let Some(max_retries) = update.max_retries {
            sub.max_retries = max_retries;
        }
        if let Some(retry_delay_seconds) = update.retry_delay_seconds {
            sub.retry_delay_seconds = retry_delay_seconds;
        }
        sub.updated_at = Utc::now();
        Ok(Some(sub.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.state.lock().unwrap().remove(&id).is_some())
    }
}

// ---------------------------------------------------------------------------
// Delivery logs
// ---------------------------------------------------------------------------

/// In-memory delivery log store.
#[derive(Default)]
pub struct MemoryDeliveryLogStore {
    state: Mutex<HashMap<Uuid, WebhookDeliveryLog>>,
}

impl MemoryDeliveryLogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored entry, for test assertions.
    #[must_use]
    pub fn all(&self) -> Vec<WebhookDeliveryLog> {
        self.state.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl DeliveryLogStore for MemoryDeliveryLogStore {
    async fn insert(&self, log: NewDeliveryLog) -> Result<WebhookDeliveryLog, StoreError> {
        let now = Utc::now();
        let record = WebhookDeliveryLog {
            id: Uuid::new_v4(),
            subscription_id: log.subscription_id,
            site_id: log.site_id,
            event_type: log.event_type,
            payload: log.payload,
            resource_id: log.resource_id,
            status_code: log.status_code,
            response_body: log.response_body,
            success: log.success,
            retry_count: log.retry_count,
            max_retries: log.max_retries,
            next_retry_at: log.next_retry_at,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WebhookDeliveryLog>, StoreError> {
        Ok(self.state.lock().unwrap().get(&id).cloned())
    }

    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookDeliveryLog>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut logs: Vec<_> = state
            .values()
            .filter(|l| l.subscription_id == subscription_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(logs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_by_subscription(&self, subscription_id: Uuid) -> Result<i64, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .values()
            .filter(|l| l.subscription_id == subscription_id)
            .count() as i64)
    }

    async fn record_outcome(
        &self,
        id: Uuid,
        outcome: DeliveryOutcome,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let Some(log) = state.get_mut(&id) else {
            return Err(StoreError::Integrity(format!(
                "Delivery log {id} disappeared while recording outcome"
            )));
        };
        log.status_code = outcome.status_code;
        log.response_body = outcome.response_body;
        log.success = outcome.success;
        log.next_retry_at = next_retry_at;
        log.updated_at = Utc::now();
        Ok(())
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookDeliveryLog>, StoreError> {
        let mut state = self.state.lock().unwrap();
        let mut due: Vec<(DateTime<Utc>, Uuid)> = state
            .values()
            .filter(|l| !l.success && l.retry_count < l.max_retries)
            .filter_map(|l| l.next_retry_at.filter(|at| *at <= now).map(|at| (at, l.id)))
            .collect();
        due.sort();
        due.truncate(limit.max(0) as usize);
        let due_ids: Vec<Uuid> = due.into_iter().map(|(_, id)| id).collect();

        let mut claimed = Vec::with_capacity(due_ids.len());
        for id in due_ids {
            if let Some(log) = state.get_mut(&id) {
                log.retry_count += 1;
                log.next_retry_at = None;
                log.updated_at = Utc::now();
                claimed.push(log.clone());
            }
        }
        Ok(claimed)
    }

    async fn delete_for_subscription(&self, subscription_id: Uuid) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        let before = state.len();
        state.retain(|_, l| l.subscription_id != subscription_id);
        Ok((before - state.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// In-memory resource directory.
#[derive(Default)]
pub struct MemoryResourceDirectory {
    state: Mutex<HashMap<Uuid, ResourceRef>>,
}

impl MemoryResourceDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, resource: ResourceRef) {
        self.state.lock().unwrap().insert(resource.id, resource);
    }

    pub fn remove(&self, id: Uuid) {
        self.state.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl ResourceDirectory for MemoryResourceDirectory {
    async fn find(&self, id: Uuid) -> Result<Option<ResourceRef>, StoreError> {
        Ok(self.state.lock().unwrap().get(&id).cloned())
    }
}

/// In-memory access control table.
#[derive(Default)]
pub struct MemoryAccessControl {
    site_admins: Mutex<std::collections::HashSet<(Uuid, Uuid)>>,
    global_admins: Mutex<std::collections::HashSet<Uuid>>,
}

impl MemoryAccessControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant_site_admin(&self, user_id: Uuid, site_id: Uuid) {
        self.site_admins.lock().unwrap().insert((user_id, site_id));
    }

    pub fn grant_global_admin(&self, user_id: Uuid) {
        self.global_admins.lock().unwrap().insert(user_id);
    }
}

#[async_trait]
impl AccessControl for MemoryAccessControl {
    async fn is_admin_of(&self, user_id: Uuid, site_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .site_admins
            .lock()
            .unwrap()
            .contains(&(user_id, site_id)))
    }

    async fn is_global_admin(&self, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.global_admins.lock().unwrap().contains(&user_id))
    }
}

/// Recorded notification for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedNotification {
    pub user_id: Uuid,
    pub message: String,
    pub kind: String,
}

/// In-memory notification sink.
#[derive(Default)]
pub struct MemoryNotificationSink {
    state: Mutex<Vec<RecordedNotification>>,
}

impl MemoryNotificationSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn recorded(&self) -> Vec<RecordedNotification> {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotificationSink {
    async fn notify(&self, user_id: Uuid, message: &str, kind: &str) -> Result<(), StoreError> {
        self.state.lock().unwrap().push(RecordedNotification {
            user_id,
            message: message.to_string(),
            kind: kind.to_string(),
        });
        Ok(())
    }
}

/// Audit sink that forwards to structured logging.
#[derive(Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(
        &self,
        action: &str,
        entity: &str,
        details: serde_json::Value,
    ) -> Result<(), StoreError> {
        tracing::info!(target: "webhook_audit", action, entity, details = %details, "Audit record");
        Ok(())
    }
}
