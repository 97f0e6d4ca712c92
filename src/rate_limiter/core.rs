//! # Token Bucket
//!
//! A single client's admission counter. The balance is a float that refills
//! continuously at `rate` tokens per second up to `capacity`, and every
//! admitted request debits one token.
//!
//! ```text
//!     Lazy refill on every call:
//!
//!     t=0.0  [■■■■■■■■■■] 10/10   consume(1) ✅
//!     t=0.0  [■■■■■■■■■ ]  9/10   ...
//!     t=0.0  [          ]  0/10   consume(1) ❌
//!     t=0.5  [■■■■■     ]  5/10   (rate = 10/s, 0.5s idle)
//!     t=9.9  [■■■■■■■■■■] 10/10   (saturates at capacity)
//! ```
//!
//! ## Locking
//!
//! Each bucket owns its own mutex. Admission checks for different clients
//! never contend, and the registry lock is never held while a bucket is
//! locked.
//!
//! ## Timestamps
//!
//! Callers pass `now` explicitly, so one admission decision uses a single
//! clock reading for both the refill and the retry-after estimate.
//!
//! ## Fail-open
//!
//! A poisoned lock (a panic while the bucket was held) or a non-finite
//! balance resets the bucket to full capacity. Rate limiting must never turn
//! an internal fault into a wall that rejects every request.

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    #[inline]
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Balance after refilling up to `now`, without mutating.
    #[inline]
    fn refilled(&self, capacity: f64, rate: f64, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * rate).min(capacity)
    }
}

/// A thread-safe token bucket with lazy, continuous refill.
///
/// # Example
///
/// ```rust
/// use std::time::{Duration, Instant};
/// use tot_api::TokenBucket;
///
/// let start = Instant::now();
/// let bucket = TokenBucket::new(2, 1.0, start);
///
/// assert!(bucket.consume(1, start));
/// assert!(bucket.consume(1, start));
/// assert!(!bucket.consume(1, start));
///
/// // One second later a token is back
/// assert!(bucket.consume(1, start + Duration::from_secs(1)));
/// ```
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    rate: f64,
}

impl TokenBucket {
    /// Creates a full bucket.
    pub fn new(capacity: u32, rate: f64, now: Instant) -> Self {
        let capacity = capacity as f64;
        Self {
            state: Mutex::new(BucketState::full(capacity, now)),
            capacity,
            rate,
        }
    }

    /// Refills lazily, then takes `n` tokens if the balance covers them.
    ///
    /// A denied call leaves the (refilled) balance in place.
    pub fn consume(&self, n: u32, now: Instant) -> bool {
        let mut state = self.lock(now);
        let tokens = state.refilled(self.capacity, self.rate, now);

        // A stale `now` from a racing caller must not move the clock back.
        if now > state.last_refill {
            state.last_refill = now;
        }
        state.tokens = tokens;

        let n = n as f64;
        if tokens >= n {
            state.tokens = tokens - n;
            true
        } else {
            false
        }
    }

    /// Balance as of `now`, without mutating the bucket.
    pub fn remaining_tokens(&self, now: Instant) -> f64 {
        let state = self.lock(now);
        state.refilled(self.capacity, self.rate, now)
    }

    /// Maximum balance.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    /// Tokens refilled per second.
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Refills to capacity.
    pub fn reset(&self, now: Instant) {
        let mut state = self.lock(now);
        *state = BucketState::full(self.capacity, now);
    }

    fn lock(&self, now: Instant) -> MutexGuard<'_, BucketState> {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Token bucket lock poisoned, resetting bucket to full capacity");
                let mut guard = poisoned.into_inner();
                *guard = BucketState::full(self.capacity, now);
                self.state.clear_poison();
                guard
            }
        };

        if !guard.tokens.is_finite() {
            warn!(tokens = guard.tokens, "Token bucket balance corrupted, resetting");
            *guard = BucketState::full(self.capacity, now);
        }

        guard
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("capacity", &self.capacity)
            .field("rate", &self.rate)
            .field("tokens", &self.remaining_tokens(Instant::now()))
            .finish()
    }
}
