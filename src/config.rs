//! Engine configuration.

use std::time::Duration;

/// Default maximum active subscriptions per site.
pub const DEFAULT_MAX_SUBSCRIPTIONS: i64 = 25;

/// Default retry sweep interval.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default bounded event queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default outbound HTTP timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum entries claimed per retry sweep.
pub const DEFAULT_SWEEP_BATCH_LIMIT: i64 = 100;

/// Configuration for the webhook engine.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// 32-byte key for AES-256-GCM encryption of subscription secrets at rest.
    pub encryption_key: Vec<u8>,

    /// Allow plain HTTP target URLs (development/testing only).
    pub allow_http: bool,

    /// Maximum active subscriptions per site.
    pub max_subscriptions_per_site: i64,

    /// Interval between retry sweeps.
    pub sweep_interval: Duration,

    /// Maximum entries claimed per sweep.
    pub sweep_batch_limit: i64,

    /// Capacity of the bounded fire-and-forget event queue.
    pub queue_capacity: usize,

    /// Connect/read timeout for outbound deliveries.
    pub http_timeout: Duration,
}

impl WebhookConfig {
    /// Create a configuration with defaults around the given encryption key.
    #[must_use]
    pub fn new(encryption_key: Vec<u8>) -> Self {
        Self {
            encryption_key,
            allow_http: false,
            max_subscriptions_per_site: DEFAULT_MAX_SUBSCRIPTIONS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            sweep_batch_limit: DEFAULT_SWEEP_BATCH_LIMIT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Allow HTTP URLs (for development/testing).
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    /// Set the per-site subscription limit.
    #[must_use]
    pub fn with_max_subscriptions(mut self, max: i64) -> Self {
        self.max_subscriptions_per_site = max;
        self
    }

    /// Set the retry sweep interval.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the bounded event queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}
