//! Backpressure thresholds and idle-expiry tracking for one partition.
//!
//! Grounded in the teacher's `backpressure::BackpressureController`:
//! the same externally-mutable threshold fields plus atomic bookkeeping,
//! generalized from a single semaphore-backed count into the quantity
//! and byte thresholds the spec requires, and extended with the
//! `activity`/`throttle` idle clocks that drive `ProcessQueue` expiry.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Messages cached with no activity for this long are eligible for
/// removal from the owning engine (spec §6 fixed timing constants).
pub const MAX_IDLE: Duration = Duration::from_secs(30);

/// Quantity/byte backpressure thresholds and idle-expiry clocks.
pub struct Throttle {
    quantity_threshold: AtomicU64,
    bytes_threshold: AtomicU64,
    /// Nanos since an epoch the caller controls, stamped on every fetch attempt.
    activity_nanos: AtomicI64,
    /// Nanos since the same epoch, stamped only when a fetch is deferred
    /// due to backpressure.
    throttle_nanos: AtomicI64,
}

impl Throttle {
    pub fn new(quantity_threshold: u64, bytes_threshold: u64) -> Self {
        Self {
            quantity_threshold: AtomicU64::new(quantity_threshold),
            bytes_threshold: AtomicU64::new(bytes_threshold),
            activity_nanos: AtomicI64::new(0),
            throttle_nanos: AtomicI64::new(0),
        }
    }

    pub fn set_quantity_threshold(&self, value: u64) {
        self.quantity_threshold.store(value, Ordering::SeqCst);
    }

    pub fn set_bytes_threshold(&self, value: u64) {
        self.bytes_threshold.store(value, Ordering::SeqCst);
    }

    /// Whether either threshold is currently met or exceeded.
    pub fn throttled(&self, cached_quantity: u64, cached_bytes: u64) -> bool {
        cached_quantity >= self.quantity_threshold.load(Ordering::SeqCst)
            || cached_bytes >= self.bytes_threshold.load(Ordering::SeqCst)
    }

    /// Stamp the activity clock. Called on every fetch attempt,
    /// throttled or not.
    pub fn mark_activity(&self, now_nanos: i64) {
        self.activity_nanos.store(now_nanos, Ordering::SeqCst);
    }

    /// Stamp the throttle clock. Called only when a fetch is actually
    /// deferred because `throttled()` returned true.
    pub fn mark_throttled(&self, now_nanos: i64) {
        self.throttle_nanos.store(now_nanos, Ordering::SeqCst);
    }

    /// True once both clocks have been idle for at least `MAX_IDLE`.
    /// A `ProcessQueue` that has never throttled is never expired by
    /// this check alone. `throttle_nanos` starts at 0 and the caller's
    /// epoch is assumed monotonic and positive.
    pub fn expired(&self, now_nanos: i64) -> bool {
        let activity_idle = now_nanos.saturating_sub(self.activity_nanos.load(Ordering::SeqCst));
        let throttle_idle = now_nanos.saturating_sub(self.throttle_nanos.load(Ordering::SeqCst));
        let max_idle = MAX_IDLE.as_nanos() as i64;
        activity_idle >= max_idle && throttle_idle >= max_idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: i64 = 1_000_000_000;

    #[test]
    fn throttled_on_either_threshold() {
        let throttle = Throttle::new(10, 1000);
        assert!(!throttle.throttled(5, 500));
        assert!(throttle.throttled(10, 500));
        assert!(throttle.throttled(5, 1000));
    }

    #[test]
    fn single_cached_message_at_threshold_one_is_throttled() {
        // spec.md scenario 3: quantity threshold=1, one cached message.
        let throttle = Throttle::new(1, u64::MAX);
        assert!(throttle.throttled(1, 0));
    }

    #[test]
    fn expires_only_after_both_clocks_idle() {
        let throttle = Throttle::new(10, 1000);
        throttle.mark_activity(0);
        throttle.mark_throttled(0);
        assert!(!throttle.expired(10 * SEC));
        assert!(throttle.expired(31 * SEC));
    }

    #[test]
    fn recent_activity_resets_expiry() {
        let throttle = Throttle::new(10, 1000);
        throttle.mark_activity(0);
        throttle.mark_throttled(0);
        throttle.mark_activity(40 * SEC);
        assert!(!throttle.expired(41 * SEC));
    }
}
