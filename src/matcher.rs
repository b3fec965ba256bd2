//! Subscription matching: which subscribers receive a given resource event.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::WebhookError;
use crate::models::{ResourceRef, WebhookEventType, WebhookSubscription};
use crate::store::{ResourceDirectory, SubscriptionStore};

/// Cap on parent-chain traversal, guarding against hierarchy cycles.
const MAX_ANCESTOR_DEPTH: usize = 64;

/// Resolves the subscriber set for a resource event.
#[derive(Clone)]
pub struct SubscriptionMatcher {
    subscriptions: Arc<dyn SubscriptionStore>,
    resources: Arc<dyn ResourceDirectory>,
}

impl SubscriptionMatcher {
    #[must_use]
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        resources: Arc<dyn ResourceDirectory>,
    ) -> Self {
        Self {
            subscriptions,
            resources,
        }
    }

    /// Find every enabled subscription relevant to an event on a resource.
    ///
    /// A subscription matches when its event filter covers `event_type` and
    /// at least one scope condition holds:
    /// - it is scoped to the event's resource,
    /// - it is scoped to an ancestor of the resource with
    ///   `include_sub_resources` set,
    /// - it is scoped to the resource's type,
    /// - it is site-wide and shares the resource's site.
    ///
    /// The result is distinct by subscription id; order is unspecified.
    /// A resource that can no longer be found yields an empty set.
    ///
    /// Candidates are drawn from the resource's own site: a subscription
    /// registered under another site never matches, even when its scope
    /// names this resource. Subscriptions are administered per site, so a
    /// cross-site scope cannot arise through the service layer.
    pub async fn find_relevant(
        &self,
        resource_id: Uuid,
        event_type: WebhookEventType,
    ) -> Result<Vec<WebhookSubscription>, WebhookError> {
        let Some(resource) = self.resources.find(resource_id).await? else {
            tracing::debug!(
                target: "webhook_delivery",
                %resource_id,
                event_type = %event_type,
                "Resource not found while matching subscriptions"
            );
            return Ok(Vec::new());
        };

        let ancestors = self.collect_ancestors(&resource).await?;
        let candidates = self
            .subscriptions
            .list_enabled_by_site(resource.site_id)
            .await?;

        let mut seen = HashSet::new();
        let matched = candidates
            .into_iter()
            .filter(|sub| sub.matches_event(event_type))
            .filter(|sub| Self::scope_matches(sub, &resource, &ancestors))
            .filter(|sub| seen.insert(sub.id))
            .collect();

        Ok(matched)
    }

    /// Whether a subscription's scope covers the resource.
    fn scope_matches(
        sub: &WebhookSubscription,
        resource: &ResourceRef,
        ancestors: &HashSet<Uuid>,
    ) -> bool {
        if let Some(scope_resource) = sub.resource_id {
            if scope_resource == resource.id {
                return true;
            }
            if sub.include_sub_resources && ancestors.contains(&scope_resource) {
                return true;
            }
        }

        // Skipped when the type record is gone (resource deleted mid-event).
        if let (Some(scope_type), Some(resource_type)) =
            (sub.resource_type_id, resource.resource_type_id)
        {
            if scope_type == resource_type {
                return true;
            }
        }

        sub.is_site_wide() && sub.site_id == resource.site_id
    }

    /// Collect the ids of all ancestors of a resource, walking the parent
    /// chain. A parent that cannot be resolved ends the walk.
    async fn collect_ancestors(&self, resource: &ResourceRef) -> Result<HashSet<Uuid>, WebhookError> {
        let mut ancestors = HashSet::new();
        let mut next = resource.parent_id;

        while let Some(parent_id) = next {
            if ancestors.len() >= MAX_ANCESTOR_DEPTH || !ancestors.insert(parent_id) {
                tracing::warn!(
                    target: "webhook_delivery",
                    resource_id = %resource.id,
                    "Resource parent chain too deep or cyclic; truncating ancestor walk"
                );
                break;
            }
            next = match self.resources.find(parent_id).await? {
                Some(parent) => parent.parent_id,
                None => None,
            };
        }

        Ok(ancestors)
    }
}
