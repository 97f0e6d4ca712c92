//! # tot-api - User Accounts Behind a Per-Client Rate Limiter
//!
//! An HTTP API for user accounts (signup, login, profiles, a leaderboard and
//! profile pictures) where every route that does real work sits behind a
//! token-bucket admission check keyed by client.
//!
//! ## The Token Bucket
//!
//! Each client gets its own bucket. A bucket holds up to `capacity` tokens,
//! refills continuously at `rate` tokens per second, and every request takes
//! one token:
//!
//! ```text
//!     rate = 1/s, capacity = 2
//!
//!     t=0.0   [● ●]  request ✓  → [●  ]
//!     t=0.0   [●  ]  request ✓  → [   ]
//!     t=0.0   [   ]  request ✗  429, Retry-After: 1
//!     t=1.1   [●  ]  request ✓  → [   ]   (1.1 tokens refilled, capped)
//! ```
//!
//! ## Who Is a Client?
//!
//! ```text
//!     Authorization: Bearer <valid token>  ──► user:<sha256(user id)>
//!     otherwise X-Forwarded-For (first)    ──┐
//!               X-Real-IP                  ──┼► ip:<address>
//!               peer address               ──┘
//!     nothing usable                       ──► ip:unknown
//! ```
//!
//! Authenticated users keep one budget across networks; anonymous callers
//! are limited per address.
//!
//! ## Quick Start
//!
//! ```rust
//! use tot_api::{RateLimiter, RateLimiterConfig};
//! use std::time::Duration;
//!
//! // 30 requests per minute, bursts of up to 30
//! let config = RateLimiterConfig::per_window(30, Duration::from_secs(60));
//! let limiter = RateLimiter::new(config).unwrap();
//!
//! let decision = limiter.check("ip:198.51.100.7");
//! assert!(decision.allowed);
//!
//! limiter.close().unwrap();
//! ```
//!
//! ## Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │        axum Router       │  api::router
//!                 └────────────┬─────────────┘
//!                              │
//!            ┌─────────────────┼───────────────────┐
//!            ▼                 ▼                   ▼
//!     auth limiter      generic limiter     health / metrics / uploads
//!     (signup, login)   (users, me)         (not limited)
//!            │                 │
//!            └────────┬────────┘
//!                     ▼
//!          ┌────────────────────┐     ┌──────────────────┐
//!          │  handlers (api)    │ ──► │ UserStore        │
//!          │                    │ ──► │ FileStorage      │
//!          │                    │ ──► │ JwtManager       │
//!          └────────────────────┘     └──────────────────┘
//! ```
//!
//! ## Thread Safety
//!
//! [`RateLimiter`] is `Send + Sync` and is shared as `Arc<RateLimiter>`.
//! Buckets are guarded individually, so clients never contend with each
//! other; a background thread evicts buckets idle longer than `bucket_ttl`.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rust_2018_idioms, missing_debug_implementations)]
#![forbid(unsafe_code)]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod store;

mod rate_limiter;

use std::time::Duration;

pub use error::{AuthError, RateLimitError, StorageError, StoreError};
pub use rate_limiter::{
    bearer_token, client_ip, current_time_ms, hash_identity, instant_millis, metrics_handler,
    rate_limit, too_many_requests, unix_timestamp, BucketEntry, BucketRegistry, ClientIdentifier,
    Decision, HealthStatus, LimiterMetrics, Lookup, MetricsSnapshot, RateLimiter,
    RateLimiterConfig, TokenBucket, TokenVerifier, DEFAULT_BUCKET_TTL, DEFAULT_CAPACITY,
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_MAX_BUCKETS, DEFAULT_MAX_RETRY_AFTER, DEFAULT_RATE,
    RATE_LIMIT_MESSAGE, SHUTDOWN_TIMEOUT,
};

/// A rate limiter wrapped in `Arc`, the form handlers and middleware share.
pub type SharedRateLimiter = std::sync::Arc<RateLimiter>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum supported Rust version (`Mutex::clear_poison`).
pub const MSRV: &str = "1.77.0";

/// Common imports for wiring a limiter into an application.
pub mod prelude {
    pub use crate::{
        ClientIdentifier, Decision, HealthStatus, MetricsSnapshot, RateLimiter,
        RateLimiterBuilder, RateLimiterConfig, SharedRateLimiter, TokenVerifier,
    };
}

/// Fluent construction of a [`RateLimiter`].
///
/// # Example
///
/// ```rust
/// use tot_api::RateLimiterBuilder;
/// use std::time::Duration;
///
/// let limiter = RateLimiterBuilder::new()
///     .rate(0.05)                              // 3 per minute
///     .capacity(3)
///     .max_buckets(1_000)
///     .bucket_ttl(Duration::from_secs(600))
///     .build();
/// assert_eq!(limiter.config().capacity, 3);
///
/// // try_build reports invalid settings instead of panicking
/// assert!(RateLimiterBuilder::new().capacity(0).try_build().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RateLimiterBuilder {
    config: RateLimiterConfig,
    identifier: ClientIdentifier,
}

impl RateLimiterBuilder {
    /// Starts from [`RateLimiterConfig::default`] with IP-only identification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens added per second (must be finite and > 0).
    pub fn rate(mut self, rate: f64) -> Self {
        self.config.rate = rate;
        self
    }

    /// Bucket size, i.e. the largest burst a client can send.
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Most clients tracked at once; new clients beyond it are denied.
    pub fn max_buckets(mut self, max_buckets: usize) -> Self {
        self.config.max_buckets = max_buckets;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    pub fn bucket_ttl(mut self, ttl: Duration) -> Self {
        self.config.bucket_ttl = ttl;
        self
    }

    pub fn max_retry_after(mut self, max: Duration) -> Self {
        self.config.max_retry_after = max;
        self
    }

    /// Resolves clients through `identifier` (e.g. with token verification).
    pub fn identifier(mut self, identifier: ClientIdentifier) -> Self {
        self.identifier = identifier;
        self
    }

    /// Starts the limiter.
    ///
    /// # Panics
    ///
    /// If the settings are invalid or the cleanup thread can't start.
    /// Use [`try_build`](Self::try_build) to handle that instead.
    pub fn build(self) -> RateLimiter {
        match self.try_build() {
            Ok(limiter) => limiter,
            Err(err) => panic!("{err}"),
        }
    }

    /// Validates the settings and starts the limiter.
    ///
    /// # Errors
    ///
    /// [`RateLimitError::InvalidConfig`] for bad settings, or
    /// [`RateLimitError::SpawnFailed`] if the cleanup thread can't start.
    pub fn try_build(self) -> Result<RateLimiter, RateLimitError> {
        RateLimiter::with_identifier(self.config, self.identifier)
    }
}
