//! Request validation: target URLs, SSRF protection, subscription scope,
//! event filters, and retry policy bounds.

use std::net::IpAddr;

use crate::error::WebhookError;
use crate::models::{WebhookEventType, EVENT_FILTER_ALL};

// ---------------------------------------------------------------------------
// URL validation
// ---------------------------------------------------------------------------

/// Validate a webhook delivery URL.
///
/// Checks:
/// 1. URL is parseable
/// 2. Scheme is HTTPS (or HTTP if `allow_http` is true for dev/test)
/// 3. Host is not a private/internal address (SSRF protection)
pub fn validate_webhook_url(url: &str, allow_http: bool) -> Result<(), WebhookError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| WebhookError::InvalidUrl(format!("Invalid URL format: {e}")))?;

    match parsed.scheme() {
        "https" => {}
        "http" if allow_http => {}
        "http" => {
            return Err(WebhookError::InvalidUrl(
                "Webhook URLs must use HTTPS".to_string(),
            ));
        }
        scheme => {
            return Err(WebhookError::InvalidUrl(format!(
                "Unsupported URL scheme: {scheme}"
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| WebhookError::InvalidUrl("URL must have a host".to_string()))?;

    validate_host_not_internal(host)?;

    Ok(())
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Validate that a host is not a private/internal address.
///
/// Blocks:
/// - Loopback addresses (127.0.0.0/8)
/// - Private networks (10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16)
/// - Link-local (169.254.0.0/16, AWS/Azure/GCP metadata endpoint)
/// - CGNAT (100.64.0.0/10)
/// - IPv6 loopback and unspecified
/// - Internal hostnames (localhost, *.internal, *.local)
pub fn validate_host_not_internal(host: &str) -> Result<(), WebhookError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_internal_ip(&ip) {
            return Err(WebhookError::SsrfDetected(format!(
                "Destination host {host} is a private/internal address"
            )));
        }
    }

    let lower = host.to_ascii_lowercase();
    if lower == "localhost"
        || lower == "metadata.google.internal"
        || lower.ends_with(".internal")
        || lower.ends_with(".local")
    {
        return Err(WebhookError::SsrfDetected(format!(
            "Destination host {host} is a restricted internal hostname"
        )));
    }

    Ok(())
}

/// Check if an IP address belongs to a private/internal range.
fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()                // 127.0.0.0/8
                || v4.is_private()          // 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16
                || v4.is_link_local()       // 169.254.0.0/16
                || v4.is_broadcast()
                || v4.is_unspecified()
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64) // 100.64.0.0/10 (CGNAT)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

// ---------------------------------------------------------------------------
// Event filter validation
// ---------------------------------------------------------------------------

/// Validate an event filter string: one known event type, or `ALL`.
pub fn validate_event_filter(filter: &str) -> Result<(), WebhookError> {
    if filter == EVENT_FILTER_ALL || WebhookEventType::parse(filter).is_some() {
        Ok(())
    } else {
        Err(WebhookError::Validation(format!(
            "Unknown event filter: {filter}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Scope validation
// ---------------------------------------------------------------------------

/// Validate the subscription scope invariant: at least one of a resource
/// scope, a resource-type scope, or the `ALL` event filter must be present.
pub fn validate_scope(
    resource_id: Option<uuid::Uuid>,
    resource_type_id: Option<uuid::Uuid>,
    event_filter: &str,
) -> Result<(), WebhookError> {
    if resource_id.is_none() && resource_type_id.is_none() && event_filter != EVENT_FILTER_ALL {
        return Err(WebhookError::Validation(
            "Subscription must be scoped to a resource, a resource type, \
             or carry the ALL event filter"
                .to_string(),
        ));
    }
    Ok(())
}

/// Maximum base retry delay, one day. Matches the API-layer range cap so
/// service-level callers cannot persist a larger delay than the handlers
/// accept.
pub const MAX_RETRY_DELAY_SECONDS: i64 = 86_400;

/// Validate retry policy bounds: `max_retries >= 0`,
/// `0 < retry_delay_seconds <= MAX_RETRY_DELAY_SECONDS`.
pub fn validate_retry_policy(max_retries: i32, retry_delay_seconds: i64) -> Result<(), WebhookError> {
    if max_retries < 0 {
        return Err(WebhookError::Validation(
            "max_retries must not be negative".to_string(),
        ));
    }
    if retry_delay_seconds <= 0 {
        return Err(WebhookError::Validation(
            "retry_delay_seconds must be positive".to_string(),
        ));
    }
    if retry_delay_seconds > MAX_RETRY_DELAY_SECONDS {
        return Err(WebhookError::Validation(format!(
            "retry_delay_seconds must not exceed {MAX_RETRY_DELAY_SECONDS}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    // --- URL validation ---

    #[test]
    fn test_valid_https_url() {
        assert!(validate_webhook_url("https://example.com/webhooks", false).is_ok());
    }

    #[test]
    fn test_valid_https_url_with_port() {
        assert!(validate_webhook_url("https://hooks.example.com:8443/callback", false).is_ok());
    }

    #[test]
    fn test_http_url_rejected_in_production() {
        let result = validate_webhook_url("http://example.com/webhooks", false);
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), WebhookError::InvalidUrl(_)));
    }

    #[test]
    fn test_http_url_allowed_in_dev() {
        assert!(validate_webhook_url("http://example.com/webhooks", true).is_ok());
    }

    #[test]
    fn test_invalid_url_format() {
        assert!(validate_webhook_url("not-a-url", false).is_err());
    }

    #[test]
    fn test_unsupported_scheme() {
        assert!(validate_webhook_url("ftp://example.com/webhooks", false).is_err());
    }

    // --- SSRF protection ---

    #[test]
    fn test_ssrf_blocks_loopback() {
        assert!(validate_host_not_internal("127.0.0.1").is_err());
        assert!(validate_host_not_internal("127.0.0.2").is_err());
    }

    #[test]
    fn test_ssrf_blocks_private_ranges() {
        assert!(validate_host_not_internal("10.0.0.1").is_err());
        assert!(validate_host_not_internal("172.16.0.1").is_err());
        assert!(validate_host_not_internal("192.168.0.1").is_err());
    }

    #[test]
    fn test_ssrf_blocks_link_local() {
        // AWS/Azure/GCP metadata endpoint
        assert!(validate_host_not_internal("169.254.169.254").is_err());
        assert!(validate_host_not_internal("169.254.0.1").is_err());
    }

    #[test]
    fn test_ssrf_blocks_cgnat() {
        assert!(validate_host_not_internal("100.64.0.1").is_err());
        assert!(validate_host_not_internal("100.127.255.255").is_err());
    }

    #[test]
    fn test_ssrf_blocks_ipv6_loopback_and_unspecified() {
        assert!(validate_host_not_internal("::1").is_err());
        assert!(validate_host_not_internal("::").is_err());
    }

    #[test]
    fn test_ssrf_blocks_localhost() {
        assert!(validate_host_not_internal("localhost").is_err());
        assert!(validate_host_not_internal("LOCALHOST").is_err());
    }

    #[test]
    fn test_ssrf_blocks_internal_hostnames() {
        assert!(validate_host_not_internal("metadata.google.internal").is_err());
        assert!(validate_host_not_internal("service.internal").is_err());
        assert!(validate_host_not_internal("myhost.local").is_err());
    }

    #[test]
    fn test_ssrf_allows_public_hosts() {
        assert!(validate_host_not_internal("8.8.8.8").is_ok());
        assert!(validate_host_not_internal("example.com").is_ok());
        assert!(validate_host_not_internal("hooks.myapp.io").is_ok());
    }

    #[test]
    fn test_ssrf_url_integration_private_ip() {
        let result = validate_webhook_url("https://10.0.0.1/webhook", false);
        assert!(matches!(result.unwrap_err(), WebhookError::SsrfDetected(_)));
    }

    // --- Event filter validation ---

    #[test]
    fn test_valid_event_filters() {
        assert!(validate_event_filter("ALL").is_ok());
        assert!(validate_event_filter("RESOURCE_STATUS_CHANGED").is_ok());
        assert!(validate_event_filter("BOOKING_CANCELLED").is_ok());
    }

    #[test]
    fn test_invalid_event_filter() {
        let result = validate_event_filter("RESOURCE_VANISHED");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("RESOURCE_VANISHED"));
    }

    // --- Scope validation ---

    #[test]
    fn test_scope_resource_only() {
        assert!(validate_scope(Some(Uuid::new_v4()), None, "BOOKING_CREATED").is_ok());
    }

    #[test]
    fn test_scope_type_only() {
        assert!(validate_scope(None, Some(Uuid::new_v4()), "BOOKING_CREATED").is_ok());
    }

    #[test]
    fn test_scope_site_wide_requires_all_filter() {
        assert!(validate_scope(None, None, "ALL").is_ok());
        assert!(validate_scope(None, None, "BOOKING_CREATED").is_err());
    }

    // --- Retry policy validation ---

    #[test]
    fn test_retry_policy_bounds() {
        assert!(validate_retry_policy(0, 1).is_ok());
        assert!(validate_retry_policy(5, 30).is_ok());
        assert!(validate_retry_policy(-1, 30).is_err());
        assert!(validate_retry_policy(3, 0).is_err());
    }

    #[test]
    fn test_retry_policy_delay_ceiling() {
        assert!(validate_retry_policy(3, MAX_RETRY_DELAY_SECONDS).is_ok());
        assert!(validate_retry_policy(3, MAX_RETRY_DELAY_SECONDS + 1).is_err());
        assert!(validate_retry_policy(3, i64::MAX / 2).is_err());
    }
}
