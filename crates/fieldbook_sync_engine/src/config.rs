//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum number of uploads in flight during one batch.
    pub upload_concurrency: usize,
    /// Retry behavior for outbox replay within one trigger.
    pub retry: RetryConfig,
    /// Whether bootstrap and full-sync summaries are sent to the notifier.
    pub notify_on_bootstrap: bool,
    /// Whether sign-in runs a full pass (otherwise an incremental one).
    pub full_sync_on_sign_in: bool,
    /// Whether remote operations require a verified email address.
    pub require_verified_email: bool,
    /// How often the coordinator retries an engine that went offline
    /// while the network still reports a connection. `None` waits for a
    /// connectivity change instead.
    pub reconnect_interval: Option<Duration>,
}

impl SyncConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            upload_concurrency: 4,
            retry: RetryConfig::default(),
            notify_on_bootstrap: true,
            full_sync_on_sign_in: true,
            require_verified_email: false,
            reconnect_interval: Some(Duration::from_secs(30)),
        }
    }

    /// Sets the upload concurrency. Zero is treated as one.
    pub fn with_upload_concurrency(mut self, concurrency: usize) -> Self {
        self.upload_concurrency = concurrency.max(1);
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Enables or disables bootstrap notifications.
    pub fn with_notify_on_bootstrap(mut self, notify: bool) -> Self {
        self.notify_on_bootstrap = notify;
        self
    }

    /// Chooses between a full and an incremental pass on sign-in.
    pub fn with_full_sync_on_sign_in(mut self, full: bool) -> Self {
        self.full_sync_on_sign_in = full;
        self
    }

    /// Requires a verified email before touching the remote store.
    pub fn with_require_verified_email(mut self, require: bool) -> Self {
        self.require_verified_email = require;
        self
    }

    /// Sets the offline retry interval. Zero disables the retry.
    pub fn with_reconnect_interval(mut self, interval: Option<Duration>) -> Self {
        self.reconnect_interval = interval.filter(|every| !every.is_zero());
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.add_jitter = jitter;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% extra.
            let jitter = delay_secs * 0.25 * jitter_fraction();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

fn jitter_fraction() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_upload_concurrency(8)
            .with_notify_on_bootstrap(false)
            .with_full_sync_on_sign_in(false)
            .with_require_verified_email(true);

        assert_eq!(config.upload_concurrency, 8);
        assert!(!config.notify_on_bootstrap);
        assert!(!config.full_sync_on_sign_in);
        assert!(config.require_verified_email);
    }

    #[test]
    fn zero_reconnect_interval_disables_retry() {
        let config = SyncConfig::new().with_reconnect_interval(Some(Duration::ZERO));
        assert!(config.reconnect_interval.is_none());
        assert_eq!(
            SyncConfig::new().reconnect_interval,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        assert_eq!(SyncConfig::new().with_upload_concurrency(0).upload_concurrency, 1);
    }

    #[test]
    fn retry_config_no_retry() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.delay_for_attempt(1), Duration::ZERO);
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);

        let delay1 = config.delay_for_attempt(1);
        assert!(delay1 >= Duration::from_millis(100));
        assert!(delay1 <= Duration::from_millis(150));

        let delay2 = config.delay_for_attempt(2);
        assert!(delay2 >= Duration::from_millis(200));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0)
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(5));
    }
}
