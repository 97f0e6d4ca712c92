//! Clock helpers shared by the limiter components.
//!
//! `Instant` is monotonic but opaque, so bucket timestamps that have to live
//! in an atomic (`last_seen`) are stored as milliseconds on a clock anchored
//! to the wall time the first time it is read. Readings never go backwards
//! even if the system clock is adjusted.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static START_TIME_BASE: OnceLock<(Instant, u64)> = OnceLock::new();

#[inline]
fn time_base() -> &'static (Instant, u64) {
    START_TIME_BASE.get_or_init(|| {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        (Instant::now(), epoch_ms)
    })
}

/// Milliseconds on the monotonic clock for the given instant.
///
/// Instants taken before the clock was anchored map to the anchor itself.
#[inline]
pub fn instant_millis(instant: Instant) -> u64 {
    let (start, base_ms) = time_base();
    base_ms.saturating_add(instant.saturating_duration_since(*start).as_millis() as u64)
}

/// Current time in milliseconds on the monotonic clock.
#[inline(always)]
pub fn current_time_ms() -> u64 {
    instant_millis(Instant::now())
}

/// Wall-clock seconds since the Unix epoch.
#[inline]
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
