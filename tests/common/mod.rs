//! Common test utilities for webhook engine integration tests.
//!
//! Provides in-memory store wiring, mock HTTP responders, and fixtures for
//! verifying delivery behavior without a real database.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;
use wiremock::{Request, Respond, ResponseTemplate};

use resgrid_webhooks::config::WebhookConfig;
use resgrid_webhooks::crypto;
use resgrid_webhooks::matcher::SubscriptionMatcher;
use resgrid_webhooks::models::{NewSubscription, ResourceRef, WebhookSubscription};
use resgrid_webhooks::scheduler::RetryScheduler;
use resgrid_webhooks::services::dispatcher::Dispatcher;
use resgrid_webhooks::services::gateway::InboundGateway;
use resgrid_webhooks::services::subscription_service::SubscriptionService;
use resgrid_webhooks::store::memory::{
    MemoryAccessControl, MemoryDeliveryLogStore, MemoryNotificationSink, MemoryResourceDirectory,
    MemorySubscriptionStore, TracingAuditSink,
};
use resgrid_webhooks::store::{DeliveryLogStore, SubscriptionStore};

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// Standard test site IDs
pub const SITE_A: Uuid = Uuid::from_bytes([
    0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11,
]);

pub const SITE_B: Uuid = Uuid::from_bytes([
    0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22,
]);

/// Standard test user IDs
pub const ADMIN_1: Uuid = Uuid::from_bytes([
    0xaa, 0xaa, 0x11, 0x11, 0xaa, 0xaa, 0x11, 0x11, 0xaa, 0xaa, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11,
]);

pub const USER_1: Uuid = Uuid::from_bytes([
    0xbb, 0xbb, 0x22, 0x22, 0xbb, 0xbb, 0x22, 0x22, 0xbb, 0xbb, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22,
]);

/// Standard test secrets
pub const SECRET_1: &str = "whsec_test_secret_key_12345";
pub const SECRET_2: &str = "whsec_another_secret_67890";

/// At-rest encryption key shared by all test fixtures.
pub const TEST_KEY: [u8; 32] = [0x42u8; 32];

// ---------------------------------------------------------------------------
// TestEnv - wires the engine against in-memory stores
// ---------------------------------------------------------------------------

/// Fully wired engine over in-memory stores.
pub struct TestEnv {
    pub subscriptions: Arc<MemorySubscriptionStore>,
    pub logs: Arc<MemoryDeliveryLogStore>,
    pub resources: Arc<MemoryResourceDirectory>,
    pub access: Arc<MemoryAccessControl>,
    pub notifications: Arc<MemoryNotificationSink>,
    pub config: WebhookConfig,
    pub matcher: SubscriptionMatcher,
    pub dispatcher: Arc<Dispatcher>,
}

impl TestEnv {
    pub fn new() -> Self {
        let subscriptions = Arc::new(MemorySubscriptionStore::new());
        let logs = Arc::new(MemoryDeliveryLogStore::new());
        let resources = Arc::new(MemoryResourceDirectory::new());
        let access = Arc::new(MemoryAccessControl::new());
        let notifications = Arc::new(MemoryNotificationSink::new());

        let config = WebhookConfig::new(TEST_KEY.to_vec()).with_allow_http(true);

        let subs_dyn: Arc<dyn SubscriptionStore> = subscriptions.clone();
        let logs_dyn: Arc<dyn DeliveryLogStore> = logs.clone();
        let matcher = SubscriptionMatcher::new(subs_dyn, resources.clone());
        let dispatcher = Arc::new(
            Dispatcher::new(matcher.clone(), logs_dyn, &config)
                .expect("failed to build dispatcher"),
        );

        Self {
            subscriptions,
            logs,
            resources,
            access,
            notifications,
            config,
            matcher,
            dispatcher,
        }
    }

    pub fn scheduler(&self) -> RetryScheduler {
        let subs_dyn: Arc<dyn SubscriptionStore> = self.subscriptions.clone();
        let logs_dyn: Arc<dyn DeliveryLogStore> = self.logs.clone();
        RetryScheduler::new(self.dispatcher.clone(), subs_dyn, logs_dyn, &self.config)
    }

    pub fn gateway(&self) -> InboundGateway {
        let subs_dyn: Arc<dyn SubscriptionStore> = self.subscriptions.clone();
        let logs_dyn: Arc<dyn DeliveryLogStore> = self.logs.clone();
        InboundGateway::new(subs_dyn, logs_dyn, self.notifications.clone(), &self.config)
    }

    pub fn subscription_service(&self) -> SubscriptionService {
        let subs_dyn: Arc<dyn SubscriptionStore> = self.subscriptions.clone();
        let logs_dyn: Arc<dyn DeliveryLogStore> = self.logs.clone();
        SubscriptionService::new(
            subs_dyn,
            logs_dyn,
            self.access.clone(),
            Arc::new(TracingAuditSink),
            &self.config,
        )
    }

    /// Register a resource in the directory.
    pub fn add_resource(
        &self,
        id: Uuid,
        site_id: Uuid,
        resource_type_id: Option<Uuid>,
        parent_id: Option<Uuid>,
    ) {
        self.resources.add(ResourceRef {
            id,
            resource_type_id,
            parent_id,
            site_id,
        });
    }

    /// Insert a subscription directly into the store, bypassing the API
    /// layer, with its secret encrypted under the test key.
    pub async fn insert_subscription(&self, spec: SubscriptionSpec) -> WebhookSubscription {
        let secret_encrypted = spec
            .secret
            .map(|s| crypto::encrypt_secret(s, &TEST_KEY).expect("encryption failed"));

        self.subscriptions
            .insert(NewSubscription {
                site_id: spec.site_id,
                name: spec.name.to_string(),
                url: spec.url,
                resource_id: spec.resource_id,
                resource_type_id: spec.resource_type_id,
                include_sub_resources: spec.include_sub_resources,
                event_filter: spec.event_filter.to_string(),
                secret_encrypted,
                max_retries: spec.max_retries,
                retry_delay_seconds: spec.retry_delay_seconds,
                created_by: Some(ADMIN_1),
            })
            .await
            .expect("insert failed")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Input for [`TestEnv::insert_subscription`].
pub struct SubscriptionSpec {
    pub site_id: Uuid,
    pub name: &'static str,
    pub url: String,
    pub resource_id: Option<Uuid>,
    pub resource_type_id: Option<Uuid>,
    pub include_sub_resources: bool,
    pub event_filter: &'static str,
    pub secret: Option<&'static str>,
    pub max_retries: i32,
    pub retry_delay_seconds: i64,
}

impl SubscriptionSpec {
    /// Site-wide subscription with the `ALL` filter and a signing secret.
    pub fn site_wide(site_id: Uuid, url: String) -> Self {
        Self {
            site_id,
            name: "test",
            url,
            resource_id: None,
            resource_type_id: None,
            include_sub_resources: false,
            event_filter: "ALL",
            secret: Some(SECRET_1),
            max_retries: 3,
            retry_delay_seconds: 10,
        }
    }

    pub fn for_resource(mut self, resource_id: Uuid) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    pub fn with_sub_resources(mut self) -> Self {
        self.include_sub_resources = true;
        self
    }

    pub fn for_resource_type(mut self, resource_type_id: Uuid) -> Self {
        self.resource_type_id = Some(resource_type_id);
        self
    }

    pub fn with_filter(mut self, filter: &'static str) -> Self {
        self.event_filter = filter;
        self
    }

    pub fn without_secret(mut self) -> Self {
        self.secret = None;
        self
    }

    pub fn with_retries(mut self, max_retries: i32, retry_delay_seconds: i64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_seconds = retry_delay_seconds;
        self
    }
}

// ---------------------------------------------------------------------------
// CapturedRequest - for inspecting webhook requests
// ---------------------------------------------------------------------------

/// A captured HTTP request with body and headers.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl CapturedRequest {
    /// Parse the body as JSON.
    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }
}

/// Verify the delivery signature on a captured request: base64 HMAC-SHA256
/// over the exact body bytes.
pub fn verify_captured_signature(request: &CapturedRequest, secret: &str) -> bool {
    match request.header("x-webhook-signature") {
        Some(signature) => crypto::verify_payload(signature, secret, &request.body),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// CaptureResponder - captures requests and returns success
// ---------------------------------------------------------------------------

/// A wiremock responder that captures incoming requests.
#[derive(Clone)]
pub struct CaptureResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    response_code: u16,
}

impl CaptureResponder {
    /// Create a new capture responder that returns 200 OK.
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            response_code: 200,
        }
    }

    /// Create a capture responder that returns a custom status code.
    pub fn with_status(status: u16) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            response_code: status,
        }
    }

    /// Get all captured requests.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for CaptureResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl Respond for CaptureResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let captured = CapturedRequest {
            body: request.body.clone(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect(),
            timestamp: Utc::now(),
        };
        self.requests.lock().unwrap().push(captured);
        ResponseTemplate::new(self.response_code)
    }
}

// ---------------------------------------------------------------------------
// CountingResponder - counts requests
// ---------------------------------------------------------------------------

/// A wiremock responder that counts incoming requests.
#[derive(Clone)]
pub struct CountingResponder {
    count: Arc<AtomicU32>,
    response_code: u16,
}

impl CountingResponder {
    /// Create a new counting responder that returns 200 OK.
    pub fn new() -> Self {
        Self {
            count: Arc::new(AtomicU32::new(0)),
            response_code: 200,
        }
    }

    /// Create a counting responder that returns a custom status code.
    pub fn with_status(status: u16) -> Self {
        Self {
            count: Arc::new(AtomicU32::new(0)),
            response_code: status,
        }
    }

    /// Get the current request count.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

impl Default for CountingResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl Respond for CountingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.count.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(self.response_code)
    }
}

// ---------------------------------------------------------------------------
// FailingResponder - fails N times then succeeds
// ---------------------------------------------------------------------------

/// A wiremock responder that fails a specified number of times before succeeding.
#[derive(Clone)]
pub struct FailingResponder {
    attempt_count: Arc<AtomicU32>,
    failures_before_success: u32,
    failure_code: u16,
    success_code: u16,
}

impl FailingResponder {
    /// Create a responder that fails `n` times with 500, then returns 200.
    pub fn fail_times(n: u32) -> Self {
        Self {
            attempt_count: Arc::new(AtomicU32::new(0)),
            failures_before_success: n,
            failure_code: 500,
            success_code: 200,
        }
    }

    /// Get the current attempt count.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count.load(Ordering::SeqCst)
    }
}

impl Respond for FailingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.attempt_count.fetch_add(1, Ordering::SeqCst);
        if n < self.failures_before_success {
            ResponseTemplate::new(self.failure_code)
        } else {
            ResponseTemplate::new(self.success_code)
        }
    }
}
