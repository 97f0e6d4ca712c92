//! # Rate Limiter Configuration
//!
//! Settings shared read-only by every operation of one [`RateLimiter`](super::RateLimiter).
//!
//! ```text
//!     Parameter relationships:
//!
//!     rate ──────────► tokens added per second (refill speed)
//!     capacity ──────► maximum tokens in one bucket (burst size)
//!     max_buckets ───► distinct clients tracked at once (memory bound)
//!     cleanup_interval ► how often idle buckets are swept
//!     bucket_ttl ────► idle time after which a bucket is evicted
//!     max_retry_after ► ceiling on the advertised Retry-After
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use tot_api::RateLimiterConfig;
//!
//! // 3 logins per minute, burst of 3
//! let config = RateLimiterConfig::per_window(3, Duration::from_secs(60));
//! assert_eq!(config.capacity, 3);
//! assert!((config.rate - 0.05).abs() < f64::EPSILON);
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

/// Default refill rate in tokens per second.
pub const DEFAULT_RATE: f64 = 10.0;

/// Default bucket capacity.
pub const DEFAULT_CAPACITY: u32 = 20;

/// Default bound on distinct tracked clients.
pub const DEFAULT_MAX_BUCKETS: usize = 10_000;

/// Default sweep period for idle buckets.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default idle time before a bucket is evicted.
pub const DEFAULT_BUCKET_TTL: Duration = Duration::from_secs(10 * 60);

/// Default ceiling on the advertised retry delay.
pub const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::from_secs(5 * 60);

/// Configuration for a per-client rate limiter.
///
/// Immutable once handed to a limiter.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Tokens refilled per second.
    pub rate: f64,

    /// Maximum tokens a bucket can hold.
    pub capacity: u32,

    /// Maximum number of distinct clients tracked simultaneously.
    ///
    /// New clients beyond this bound are denied until idle buckets are
    /// swept away.
    pub max_buckets: usize,

    /// Period of the background sweep.
    pub cleanup_interval: Duration,

    /// Buckets not seen for longer than this are evicted on the next sweep.
    pub bucket_ttl: Duration,

    /// Upper bound for the Retry-After value handed to denied clients.
    pub max_retry_after: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            rate: DEFAULT_RATE,
            capacity: DEFAULT_CAPACITY,
            max_buckets: DEFAULT_MAX_BUCKETS,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            bucket_ttl: DEFAULT_BUCKET_TTL,
            max_retry_after: DEFAULT_MAX_RETRY_AFTER,
        }
    }
}

impl RateLimiterConfig {
    /// Creates a configuration with the given rate and capacity and default
    /// housekeeping settings.
    pub fn new(rate: f64, capacity: u32) -> Self {
        Self {
            rate,
            capacity,
            ..Self::default()
        }
    }

    /// `limit` requests per `window`, with a burst of `limit`.
    ///
    /// A zero window yields a non-finite rate, which [`validate`](Self::validate)
    /// rejects.
    pub fn per_window(limit: u32, window: Duration) -> Self {
        Self::new(limit as f64 / window.as_secs_f64(), limit)
    }

    /// `requests_per_second` sustained, with twice that as burst.
    pub fn per_second(requests_per_second: u32) -> Self {
        Self::new(
            requests_per_second as f64,
            requests_per_second.saturating_mul(2),
        )
    }

    /// `requests_per_minute` sustained, with a burst of the full minute.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::per_window(requests_per_minute, Duration::from_secs(60))
    }

    /// Sets the tracked-client bound.
    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets;
        self
    }

    /// Sets the sweep period and idle TTL.
    pub fn with_cleanup(mut self, interval: Duration, ttl: Duration) -> Self {
        self.cleanup_interval = interval;
        self.bucket_ttl = ttl;
        self
    }

    /// Sets the Retry-After ceiling.
    pub fn with_max_retry_after(mut self, max_retry_after: Duration) -> Self {
        self.max_retry_after = max_retry_after;
        self
    }

    /// Checks the configuration for values a limiter cannot run with.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err("rate must be a positive, finite number");
        }
        if self.capacity == 0 {
            return Err("capacity must be greater than 0");
        }
        if self.max_buckets == 0 {
            return Err("max_buckets must be greater than 0");
        }
        if self.cleanup_interval.is_zero() {
            return Err("cleanup_interval must be greater than 0");
        }
        if self.bucket_ttl.is_zero() {
            return Err("bucket_ttl must be greater than 0");
        }
        if self.max_retry_after < Duration::from_secs(1) {
            return Err("max_retry_after must be at least one second");
        }
        Ok(())
    }

    /// Retry-After ceiling in whole seconds, never below 1.
    #[inline]
    pub fn max_retry_after_secs(&self) -> u64 {
        self.max_retry_after.as_secs().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.rate, 10.0);
        assert_eq!(config.capacity, 20);
        assert_eq!(config.max_buckets, 10_000);
        assert_eq!(config.cleanup_interval, Duration::from_secs(300));
        assert_eq!(config.bucket_ttl, Duration::from_secs(600));
        assert_eq!(config.max_retry_after_secs(), 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let invalid = RateLimiterConfig {
            capacity: 0,
            ..Default::default()
        };
        assert!(invalid.validate().is_err());

        let invalid_rate = RateLimiterConfig::new(0.0, 10);
        assert!(invalid_rate.validate().is_err());

        let nan_rate = RateLimiterConfig::new(f64::NAN, 10);
        assert!(nan_rate.validate().is_err());

        let no_buckets = RateLimiterConfig::default().with_max_buckets(0);
        assert!(no_buckets.validate().is_err());

        let short_retry = RateLimiterConfig::default().with_max_retry_after(Duration::from_millis(10));
        assert!(short_retry.validate().is_err());
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let config = RateLimiterConfig::per_window(5, Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_builders() {
        let config = RateLimiterConfig::per_second(100);
        assert_eq!(config.capacity, 200);
        assert_eq!(config.rate, 100.0);

        let config = RateLimiterConfig::per_minute(120);
        assert_eq!(config.capacity, 120);
        assert_eq!(config.rate, 2.0);

        let config = RateLimiterConfig::per_window(30, Duration::from_secs(60))
            .with_cleanup(Duration::from_secs(60), Duration::from_secs(120))
            .with_max_buckets(1000);
        assert_eq!(config.capacity, 30);
        assert_eq!(config.rate, 0.5);
        assert_eq!(config.max_buckets, 1000);
        assert_eq!(config.bucket_ttl, Duration::from_secs(120));
    }
}
