//! # Per-Client Rate Limiter
//!
//! Ties the registry, the identifier and the metrics together behind one
//! admission decision, and owns the background sweep for idle buckets.
//!
//! ```text
//!     decide(request)
//!        │  now = Instant::now()     (read once)
//!        │  key = identify(request)
//!        ▼
//!     registry.get_or_create(key)
//!        ├─ Existing ─► touch, consume(1, now) ─► allowed | denied + retry-after
//!        ├─ Created ──► full bucket, one token taken ─► allowed
//!        └─ Full ─────► denied + max retry-after (nothing stored)
//!
//!     cleanup thread: every cleanup_interval, evict last_seen < now - ttl
//! ```
//!
//! ## Lifecycle
//!
//! The sweep thread starts in the constructor and stops on [`RateLimiter::close`]
//! (bounded wait for acknowledgement) or when the limiter is dropped.
//! Admission checks keep working after `close`; only the sweep stops.

use super::{
    config::RateLimiterConfig,
    core::TokenBucket,
    identifier::ClientIdentifier,
    metrics::{HealthStatus, LimiterMetrics, MetricsSnapshot},
    registry::{BucketEntry, BucketRegistry, Lookup},
    utils::{instant_millis, unix_timestamp},
};
use crate::error::RateLimitError;
use axum::http::Request;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long [`RateLimiter::close`] waits for the sweep thread to stop.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

const CLEANUP_THREAD_NAME: &str = "tot-rate-limit-cleanup";

/// Result of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Seconds the client should wait; 0 when allowed.
    pub retry_after_secs: u64,
}

impl Decision {
    #[inline]
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_secs: 0,
        }
    }

    #[inline]
    pub const fn deny(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            retry_after_secs,
        }
    }
}

/// State shared with the sweep thread.
struct Shared {
    config: RateLimiterConfig,
    registry: BucketRegistry,
    metrics: LimiterMetrics,
    #[cfg(test)]
    stall: test_hooks::Stall,
}

impl Shared {
    fn sweep(&self, now: Instant) -> usize {
        let ttl_ms = self.config.bucket_ttl.as_millis() as u64;
        let cutoff = instant_millis(now).saturating_sub(ttl_ms);

        let removed = self.registry.sweep(cutoff);
        let active = self.registry.len();
        self.metrics
            .record_cleanup(removed as u64, active as u64, unix_timestamp());

        if removed > 0 {
            debug!(expired = removed, active, "Cleanup removed idle buckets");
        }
        if self.registry.fill_ratio() > 0.9 {
            warn!(
                active,
                max = self.registry.max_buckets(),
                "Bucket registry above 90% of capacity after cleanup"
            );
        }

        removed
    }
}

struct CleanupHandle {
    stop_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<()>,
    thread: thread::JoinHandle<()>,
}

/// Token-bucket rate limiter keyed by client.
///
/// # Example
///
/// ```rust
/// use tot_api::{RateLimiter, RateLimiterConfig};
///
/// let limiter = RateLimiter::new(RateLimiterConfig::new(1.0, 2)).unwrap();
///
/// assert!(limiter.allow("ip:203.0.113.1"));
/// assert!(limiter.allow("ip:203.0.113.1"));
///
/// let decision = limiter.check("ip:203.0.113.1");
/// assert!(!decision.allowed);
/// assert_eq!(decision.retry_after_secs, 1);
///
/// limiter.close().unwrap();
/// ```
pub struct RateLimiter {
    shared: Arc<Shared>,
    identifier: ClientIdentifier,
    cleanup: Mutex<Option<CleanupHandle>>,
}

impl RateLimiter {
    /// Creates a limiter that identifies clients by IP.
    pub fn new(config: RateLimiterConfig) -> Result<Self, RateLimitError> {
        Self::with_identifier(config, ClientIdentifier::ip_only())
    }

    /// Creates a limiter with a custom identifier and starts its sweep thread.
    pub fn with_identifier(
        config: RateLimiterConfig,
        identifier: ClientIdentifier,
    ) -> Result<Self, RateLimitError> {
        config.validate().map_err(RateLimitError::InvalidConfig)?;

        let shared = Arc::new(Shared {
            registry: BucketRegistry::new(config.max_buckets),
            metrics: LimiterMetrics::default(),
            config,
            #[cfg(test)]
            stall: test_hooks::Stall::default(),
        });
        let cleanup = Self::spawn_cleanup(shared.clone())?;

        Ok(Self {
            shared,
            identifier,
            cleanup: Mutex::new(Some(cleanup)),
        })
    }

    fn spawn_cleanup(shared: Arc<Shared>) -> Result<CleanupHandle, RateLimitError> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let interval = shared.config.cleanup_interval;

        let thread = thread::Builder::new()
            .name(CLEANUP_THREAD_NAME.to_string())
            .spawn(move || {
                info!(
                    interval_ms = interval.as_millis() as u64,
                    ttl_ms = shared.config.bucket_ttl.as_millis() as u64,
                    "Started rate limiter cleanup thread"
                );

                loop {
                    match stop_rx.recv_timeout(interval) {
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            #[cfg(test)]
                            shared.stall.wait();
                            shared.sweep(Instant::now());
                        }
                    }
                }

                info!("Rate limiter cleanup thread stopping");
                let _ = done_tx.send(());
            })
            .map_err(|err| RateLimitError::SpawnFailed(err.to_string()))?;

        Ok(CleanupHandle {
            stop_tx,
            done_rx,
            thread,
        })
    }

    /// Admission decision for an HTTP request.
    pub fn decide<B>(&self, req: &Request<B>) -> Decision {
        let now = Instant::now();
        let client_id = self.identifier.identify(req);
        self.check_at(&client_id, now)
    }

    /// Admission decision for an already-resolved client key.
    #[inline]
    pub fn check(&self, client_id: &str) -> Decision {
        self.check_at(client_id, Instant::now())
    }

    /// Whether a request from `client_id` is admitted right now.
    #[inline]
    pub fn allow(&self, client_id: &str) -> bool {
        self.check(client_id).allowed
    }

    /// Admission decision using a caller-supplied timestamp.
    ///
    /// The same `now` drives the refill and the retry-after estimate.
    pub fn check_at(&self, client_id: &str, now: Instant) -> Decision {
        let shared = &*self.shared;
        let now_ms = instant_millis(now);

        let lookup = shared.registry.get_or_create(client_id, || {
            let bucket = TokenBucket::new(shared.config.capacity, shared.config.rate, now);
            let admitted = bucket.consume(1, now);
            debug_assert!(admitted, "fresh bucket must admit its first request");
            BucketEntry::new(bucket, now_ms)
        });

        match lookup {
            Lookup::Existing(entry) => {
                entry.touch(now_ms);
                let bucket = entry.bucket();

                if bucket.consume(1, now) {
                    shared.metrics.record_allowed();
                    Decision::allow()
                } else {
                    let retry_after = self.retry_after_secs(bucket.remaining_tokens(now));
                    shared.metrics.record_denied();
                    Decision::deny(retry_after)
                }
            }
            Lookup::Created(_) => {
                shared.metrics.record_created();
                shared.metrics.record_allowed();
                Decision::allow()
            }
            Lookup::Full => {
                shared.metrics.record_denied();
                Decision::deny(shared.config.max_retry_after_secs())
            }
        }
    }

    /// Seconds until one token is available, clamped to
    /// `[1, max_retry_after]`.
    pub fn retry_after_secs(&self, current_tokens: f64) -> u64 {
        let max = self.shared.config.max_retry_after_secs();
        if current_tokens >= 1.0 {
            return 1;
        }

        let deficit = 1.0 - current_tokens;
        let secs = (deficit / self.shared.config.rate).ceil();
        if !secs.is_finite() || secs >= max as f64 {
            max
        } else {
            (secs as u64).clamp(1, max)
        }
    }

    /// Runs one sweep now. Returns how many buckets were evicted.
    pub fn cleanup_expired(&self) -> usize {
        self.shared.sweep(Instant::now())
    }

    /// Stops the sweep thread, waiting up to [`SHUTDOWN_TIMEOUT`].
    ///
    /// Safe to call more than once. Admission checks keep working afterwards.
    pub fn close(&self) -> Result<(), RateLimitError> {
        let handle = match self.cleanup.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return Ok(());
        };

        let _ = handle.stop_tx.send(());
        match handle.done_rx.recv_timeout(SHUTDOWN_TIMEOUT) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                let _ = handle.thread.join();
                debug!("Rate limiter closed");
                Ok(())
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!("Rate limiter cleanup thread did not stop in time");
                Err(RateLimitError::ShutdownTimeout(SHUTDOWN_TIMEOUT))
            }
        }
    }

    /// Whether the sweep thread is still running.
    pub fn is_running(&self) -> bool {
        match self.cleanup.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }

    /// Counter snapshot. `active_buckets` reflects the registry as of now.
    pub fn metrics(&self) -> MetricsSnapshot {
        let mut snapshot = self.shared.metrics.snapshot();
        snapshot.active_buckets = self.shared.registry.len() as u64;
        snapshot
    }

    pub fn health(&self) -> HealthStatus {
        self.metrics()
            .health_status(self.shared.registry.fill_ratio())
    }

    #[inline]
    pub fn active_buckets(&self) -> usize {
        self.shared.registry.len()
    }

    #[inline]
    pub fn config(&self) -> &RateLimiterConfig {
        &self.shared.config
    }

    #[inline]
    pub fn identifier(&self) -> &ClientIdentifier {
        &self.identifier
    }

    /// Drops a client's bucket so its next request starts fresh.
    pub fn forget(&self, client_id: &str) -> bool {
        self.shared.registry.remove(client_id)
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        let handle = match self.cleanup.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            let _ = handle.stop_tx.send(());
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate", &self.shared.config.rate)
            .field("capacity", &self.shared.config.capacity)
            .field("active_buckets", &self.active_buckets())
            .field("identifier", &self.identifier)
            .finish()
    }
}
