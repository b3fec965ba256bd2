//! Outbound delivery behavior: envelope format, signing, outcome recording,
//! and per-subscriber isolation.

mod common;

use common::{
    verify_captured_signature, CaptureResponder, SubscriptionSpec, TestEnv, SECRET_1, SITE_A,
};
use resgrid_webhooks::models::{ResourceEvent, WebhookEventType};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

async fn mock_endpoint(responder: CaptureResponder) -> (MockServer, String) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(responder)
        .mount(&server)
        .await;
    let url = format!("{}/hook", server.uri());
    (server, url)
}

fn booking_event(resource_id: Uuid) -> ResourceEvent {
    ResourceEvent::new(
        WebhookEventType::BookingCreated,
        resource_id,
        serde_json::json!({"bookingId": "b-100", "start": "2026-09-01T09:00:00Z"}),
    )
}

#[tokio::test]
async fn test_successful_delivery_records_success() {
    let env = TestEnv::new();
    let responder = CaptureResponder::new();
    let (_server, url) = mock_endpoint(responder.clone()).await;

    let resource = Uuid::new_v4();
    env.add_resource(resource, SITE_A, None, None);
    let sub = env
        .insert_subscription(SubscriptionSpec::site_wide(SITE_A, url))
        .await;

    env.dispatcher.dispatch_event(&booking_event(resource)).await;

    assert_eq!(responder.request_count(), 1);

    let logs = env.logs.all();
    assert_eq!(logs.len(), 1);
    let log = &logs[0];
    assert_eq!(log.subscription_id, sub.id);
    assert!(log.success);
    assert_eq!(log.status_code, Some(200));
    assert_eq!(log.retry_count, 0);
    assert_eq!(log.event_type, "BOOKING_CREATED");
    assert!(log.next_retry_at.is_none());
}

#[tokio::test]
async fn test_envelope_uses_camel_case_and_subscription_id() {
    let env = TestEnv::new();
    let responder = CaptureResponder::new();
    let (_server, url) = mock_endpoint(responder.clone()).await;

    let resource = Uuid::new_v4();
    env.add_resource(resource, SITE_A, None, None);
    let sub = env
        .insert_subscription(SubscriptionSpec::site_wide(SITE_A, url))
        .await;

    env.dispatcher.dispatch_event(&booking_event(resource)).await;

    let request = &responder.requests()[0];
    assert_eq!(request.header("content-type"), Some("application/json"));

    let body: serde_json::Value = request.body_json().unwrap();
    assert_eq!(body["eventType"], "BOOKING_CREATED");
    assert_eq!(body["webhookId"], sub.id.to_string());
    assert!(body.get("timestamp").is_some());
    assert_eq!(body["data"]["bookingId"], "b-100");
}

#[tokio::test]
async fn test_delivery_carries_verifiable_signature() {
    let env = TestEnv::new();
    let responder = CaptureResponder::new();
    let (_server, url) = mock_endpoint(responder.clone()).await;

    let resource = Uuid::new_v4();
    env.add_resource(resource, SITE_A, None, None);
    env.insert_subscription(SubscriptionSpec::site_wide(SITE_A, url))
        .await;

    env.dispatcher.dispatch_event(&booking_event(resource)).await;

    let request = &responder.requests()[0];
    assert!(verify_captured_signature(request, SECRET_1));
    assert!(!verify_captured_signature(request, "wrong-secret"));
}

#[tokio::test]
async fn test_subscription_without_secret_sends_unsigned() {
    let env = TestEnv::new();
    let responder = CaptureResponder::new();
    let (_server, url) = mock_endpoint(responder.clone()).await;

    let resource = Uuid::new_v4();
    env.add_resource(resource, SITE_A, None, None);
    env.insert_subscription(SubscriptionSpec::site_wide(SITE_A, url).without_secret())
        .await;

    env.dispatcher.dispatch_event(&booking_event(resource)).await;

    let request = &responder.requests()[0];
    assert!(request.header("x-webhook-signature").is_none());
}

#[tokio::test]
async fn test_http_failure_schedules_first_retry() {
    let env = TestEnv::new();
    let responder = CaptureResponder::with_status(500);
    let (_server, url) = mock_endpoint(responder.clone()).await;

    let resource = Uuid::new_v4();
    env.add_resource(resource, SITE_A, None, None);
    env.insert_subscription(SubscriptionSpec::site_wide(SITE_A, url).with_retries(3, 10))
        .await;

    let before = chrono::Utc::now();
    env.dispatcher.dispatch_event(&booking_event(resource)).await;

    let logs = env.logs.all();
    assert_eq!(logs.len(), 1);
    let log = &logs[0];
    assert!(!log.success);
    assert_eq!(log.status_code, Some(500));
    assert_eq!(log.retry_count, 0);

    // First retry is scheduled one base delay out.
    let next = log.next_retry_at.expect("first retry must be scheduled");
    let delay = (next - before).num_seconds();
    assert!((9..=12).contains(&delay), "unexpected delay: {delay}s");
}

#[tokio::test]
async fn test_zero_max_retries_fails_terminally() {
    let env = TestEnv::new();
    let responder = CaptureResponder::with_status(503);
    let (_server, url) = mock_endpoint(responder.clone()).await;

    let resource = Uuid::new_v4();
    env.add_resource(resource, SITE_A, None, None);
    env.insert_subscription(SubscriptionSpec::site_wide(SITE_A, url).with_retries(0, 10))
        .await;

    env.dispatcher.dispatch_event(&booking_event(resource)).await;

    let logs = env.logs.all();
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].success);
    assert!(logs[0].next_retry_at.is_none());
}

#[tokio::test]
async fn test_transport_failure_recorded_without_status_code() {
    let env = TestEnv::new();

    let resource = Uuid::new_v4();
    env.add_resource(resource, SITE_A, None, None);
    // Nothing listens on this port.
    env.insert_subscription(SubscriptionSpec::site_wide(
        SITE_A,
        "http://127.0.0.1:1/hook".to_string(),
    ))
    .await;

    env.dispatcher.dispatch_event(&booking_event(resource)).await;

    let logs = env.logs.all();
    assert_eq!(logs.len(), 1);
    let log = &logs[0];
    assert!(!log.success);
    assert_eq!(log.status_code, None);
    assert!(log.response_body.is_some());
    assert!(log.next_retry_at.is_some());
}

#[tokio::test]
async fn test_one_failing_subscriber_does_not_block_others() {
    let env = TestEnv::new();
    let healthy = CaptureResponder::new();
    let (_server, healthy_url) = mock_endpoint(healthy.clone()).await;

    let resource = Uuid::new_v4();
    env.add_resource(resource, SITE_A, None, None);
    env.insert_subscription(SubscriptionSpec::site_wide(
        SITE_A,
        "http://127.0.0.1:1/hook".to_string(),
    ))
    .await;
    env.insert_subscription(SubscriptionSpec::site_wide(SITE_A, healthy_url))
        .await;

    env.dispatcher.dispatch_event(&booking_event(resource)).await;

    assert_eq!(healthy.request_count(), 1);

    let logs = env.logs.all();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs.iter().filter(|l| l.success).count(), 1);
    assert_eq!(logs.iter().filter(|l| !l.success).count(), 1);
}

#[tokio::test]
async fn test_publisher_worker_pipeline_delivers() {
    let env = TestEnv::new();
    let responder = CaptureResponder::new();
    let (_server, url) = mock_endpoint(responder.clone()).await;

    let resource = Uuid::new_v4();
    env.add_resource(resource, SITE_A, None, None);
    env.insert_subscription(SubscriptionSpec::site_wide(SITE_A, url))
        .await;

    let (publisher, receiver) = resgrid_webhooks::EventPublisher::new(16);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker = resgrid_webhooks::WebhookWorker::new(env.dispatcher.clone());
    let handle = tokio::spawn(worker.run(receiver, shutdown_rx));

    publisher.publish(booking_event(resource));
    drop(publisher); // queue closes once drained

    handle.await.unwrap();
    drop(shutdown_tx);

    assert_eq!(responder.request_count(), 1);
    assert_eq!(env.logs.all().len(), 1);
    assert!(env.logs.all()[0].success);
}

#[tokio::test]
async fn test_event_without_subscribers_writes_no_logs() {
    let env = TestEnv::new();
    let resource = Uuid::new_v4();
    env.add_resource(resource, SITE_A, None, None);

    env.dispatcher.dispatch_event(&booking_event(resource)).await;

    assert!(env.logs.all().is_empty());
}
