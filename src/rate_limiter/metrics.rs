//! # Rate Limiter Metrics
//!
//! Counters are updated with atomic operations on the hot path and read
//! without touching the bucket registry. Individual updates are not
//! linearized with the decision that produced them: a snapshot is accurate in
//! aggregate, not a transaction.
//!
//! ```text
//!     requests_allowed ─┐
//!     requests_denied ──┤ monotonically increasing
//!     buckets_created ──┤
//!     buckets_expired ──┘
//!     active_buckets ───┐ point-in-time gauges
//!     last_cleanup ─────┘ (unix seconds, 0 = never)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by one limiter.
#[derive(Debug, Default)]
pub struct LimiterMetrics {
    requests_allowed: AtomicU64,
    requests_denied: AtomicU64,
    active_buckets: AtomicU64,
    buckets_created: AtomicU64,
    buckets_expired: AtomicU64,
    last_cleanup: AtomicU64,
}

impl LimiterMetrics {
    #[inline]
    pub(crate) fn record_allowed(&self) {
        self.requests_allowed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_denied(&self) {
        self.requests_denied.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_created(&self) {
        self.buckets_created.fetch_add(1, Ordering::Relaxed);
        self.active_buckets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cleanup(&self, expired: u64, active: u64, at_unix_secs: u64) {
        self.buckets_expired.fetch_add(expired, Ordering::Relaxed);
        self.active_buckets.store(active, Ordering::Relaxed);
        self.last_cleanup.store(at_unix_secs, Ordering::Relaxed);
    }

    /// Copies the counters into a plain value.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_allowed: self.requests_allowed.load(Ordering::Relaxed),
            requests_denied: self.requests_denied.load(Ordering::Relaxed),
            active_buckets: self.active_buckets.load(Ordering::Relaxed),
            buckets_created: self.buckets_created.load(Ordering::Relaxed),
            buckets_expired: self.buckets_expired.load(Ordering::Relaxed),
            last_cleanup: self.last_cleanup.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a limiter's counters.
///
/// Serializes to the flat JSON object served by the metrics endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests_allowed: u64,
    pub requests_denied: u64,
    pub active_buckets: u64,
    pub buckets_created: u64,
    pub buckets_expired: u64,
    /// Unix seconds of the last sweep, 0 if none has run.
    pub last_cleanup: u64,
}

impl MetricsSnapshot {
    #[inline]
    pub fn total_requests(&self) -> u64 {
        self.requests_allowed + self.requests_denied
    }

    /// Fraction of requests admitted; 1.0 before any traffic.
    #[inline]
    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            1.0
        } else {
            self.requests_allowed as f64 / total as f64
        }
    }

    #[inline]
    pub fn rejection_rate(&self) -> f64 {
        1.0 - self.success_rate()
    }

    /// Health given how full the registry is (`fill_ratio` in `0.0..=1.0`).
    pub fn health_status(&self, fill_ratio: f64) -> HealthStatus {
        if fill_ratio >= 0.95 || self.rejection_rate() > 0.5 {
            HealthStatus::Critical
        } else if fill_ratio >= 0.8 || self.rejection_rate() > 0.2 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Rate Limiter Metrics:\n\
             ├─ Requests:\n\
             │  ├─ Allowed: {}\n\
             │  ├─ Denied: {}\n\
             │  └─ Success Rate: {:.2}%\n\
             └─ Buckets:\n\
                ├─ Active: {}\n\
                ├─ Created: {}\n\
                ├─ Expired: {}\n\
                └─ Last Cleanup: {}",
            self.requests_allowed,
            self.requests_denied,
            self.success_rate() * 100.0,
            self.active_buckets,
            self.buckets_created,
            self.buckets_expired,
            self.last_cleanup,
        )
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Coarse health classification for dashboards and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    /// Registry filling up or a large share of requests denied.
    Degraded,
    /// Registry nearly full or most requests denied.
    Critical,
}

impl HealthStatus {
    pub fn is_unhealthy(&self) -> bool {
        !matches!(self, Self::Healthy)
    }

    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::Healthy => "No action needed",
            Self::Degraded => "Monitor closely, consider raising limits or max_buckets",
            Self::Critical => "Immediate action required: new clients are being turned away",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "Healthy"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}
