//! # Rate Limiter Module
//!
//! Per-client admission control for the HTTP API.
//!
//! ## Module Structure
//!
//! ```text
//!     rate_limiter/
//!     ├── mod.rs          (Module organization)
//!     ├── config.rs       (Limits, housekeeping settings, validation)
//!     ├── core.rs         (Single-client token bucket)
//!     ├── registry.rs     (Bounded concurrent map of buckets)
//!     ├── identifier.rs   (Request → client key)
//!     ├── limiter.rs      (Admission decision + cleanup thread)
//!     ├── metrics.rs      (Atomic counters and snapshots)
//!     ├── middleware.rs   (axum integration)
//!     └── utils.rs        (Clock helpers)
//! ```
//!
//! ## Architecture Flow
//!
//! ```text
//!     HTTP Request
//!          │
//!          ▼
//!     ┌────────────┐
//!     │ Middleware │ ◄── 429 + Retry-After on denial
//!     └─────┬──────┘
//!           ▼
//!     ┌────────────┐
//!     │  Limiter   │ ◄── identifier → registry → bucket
//!     └─────┬──────┘
//!           ▼
//!     ┌────────────┐         ┌──────────────┐
//!     │  Registry  │ ◄────── │ cleanup      │ every cleanup_interval
//!     └─────┬──────┘         │ thread       │
//!           ▼                └──────────────┘
//!     ┌────────────┐
//!     │   Bucket   │ ◄── per-bucket mutex
//!     └────────────┘
//! ```

mod config;
mod core;
mod identifier;
mod limiter;
mod metrics;
mod middleware;
mod registry;
mod utils;

/// Limits and housekeeping settings
pub use config::{
    RateLimiterConfig, DEFAULT_BUCKET_TTL, DEFAULT_CAPACITY, DEFAULT_CLEANUP_INTERVAL,
    DEFAULT_MAX_BUCKETS, DEFAULT_MAX_RETRY_AFTER, DEFAULT_RATE,
};

/// Single-client token bucket
pub use self::core::TokenBucket;

/// Client key resolution
pub use identifier::{bearer_token, client_ip, hash_identity, ClientIdentifier, TokenVerifier};

/// Admission decisions and lifecycle
pub use limiter::{Decision, RateLimiter, SHUTDOWN_TIMEOUT};

/// Observability
pub use metrics::{HealthStatus, LimiterMetrics, MetricsSnapshot};

/// axum integration
pub use middleware::{metrics_handler, rate_limit, too_many_requests, RATE_LIMIT_MESSAGE};

/// Bucket storage
pub use registry::{BucketEntry, BucketRegistry, Lookup};

/// Clock helpers
pub use utils::{current_time_ms, instant_millis, unix_timestamp};
