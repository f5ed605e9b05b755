//! Dual-sequence message store: `pending` (received, not yet handed out)
//! and `inflight` (handed out, not yet erased), plus byte accounting and
//! the FIFO single-in-flight slot.
//!
//! Mirrors the teacher's `backpressure::BackpressureController` in
//! shape. Atomic counters guarded by narrow locks, no I/O under the
//! lock. Generalized from one counter to the two ordered sequences
//! the spec requires. The cross-sequence lock order (`pending` before
//! `inflight`) is load-bearing: every operation that touches both
//! acquires them in that order.

use crate::message::Message;
use crate::offset_ledger::OffsetLedger;
use crate::rate_limiter::RateLimiter;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::sync::RwLock;
use tracing::debug;

/// Two ordered sequences plus byte accounting for one partition.
pub struct MessageStore {
    pending: RwLock<VecDeque<Message>>,
    inflight: RwLock<VecDeque<Message>>,
    cached_bytes: AtomicU64,
    fifo_slot_busy: AtomicBool,
    /// `Some` only in broadcasting mode.
    ledger: Option<StdMutex<OffsetLedger>>,
}

impl MessageStore {
    pub fn new(broadcasting: bool) -> Self {
        Self {
            pending: RwLock::new(VecDeque::new()),
            inflight: RwLock::new(VecDeque::new()),
            cached_bytes: AtomicU64::new(0),
            fifo_slot_busy: AtomicBool::new(false),
            ledger: broadcasting.then(|| StdMutex::new(OffsetLedger::new())),
        }
    }

    /// Append freshly received messages to `pending`.
    pub async fn cache(&self, msgs: Vec<Message>) {
        if msgs.is_empty() {
            return;
        }
        let added_bytes: u64 = msgs.iter().map(|m| m.body_len() as u64).sum();
        if let Some(ledger) = &self.ledger {
            let offsets: Vec<i64> = msgs.iter().map(|m| m.queue_offset).collect();
            ledger.lock().unwrap().record_cached(offsets);
        }
        let mut pending = self.pending.write().await;
        pending.extend(msgs);
        self.cached_bytes.fetch_add(added_bytes, Ordering::SeqCst);
        debug!(added = added_bytes, cached_bytes = self.cached_bytes(), "cached messages");
    }

    /// Move up to `max_n` head messages from `pending` to `inflight`.
    ///
    /// With a rate limiter, takes greedily while a permit is available,
    /// the taken count is below `max_n`, and `pending` is non-empty.
    pub async fn try_take(&self, max_n: usize, rate_limiter: Option<&dyn RateLimiter>) -> Vec<Message> {
        if max_n == 0 {
            return Vec::new();
        }
        let mut pending = self.pending.write().await;
        let mut inflight = self.inflight.write().await;

        let mut taken = Vec::new();
        while taken.len() < max_n {
            if let Some(limiter) = rate_limiter {
                if !limiter.try_acquire() {
                    break;
                }
            }
            match pending.pop_front() {
                Some(msg) => {
                    inflight.push_back(msg.clone());
                    taken.push(msg);
                }
                None => break,
            }
        }
        taken
    }

    /// Claim the single FIFO slot and the head `pending` message, if any.
    pub async fn try_take_fifo(&self, rate_limiter: Option<&dyn RateLimiter>) -> Option<Message> {
        if self
            .fifo_slot_busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }

        if let Some(limiter) = rate_limiter {
            if !limiter.try_acquire() {
                self.fifo_slot_busy.store(false, Ordering::SeqCst);
                return None;
            }
        }

        let mut pending = self.pending.write().await;
        let mut inflight = self.inflight.write().await;
        match pending.pop_front() {
            Some(msg) => {
                inflight.push_back(msg.clone());
                Some(msg)
            }
            None => {
                drop(inflight);
                drop(pending);
                self.fifo_slot_busy.store(false, Ordering::SeqCst);
                None
            }
        }
    }

    /// Release the FIFO slot without erasing a message. Used when a
    /// resubmit future fails and the queue is being dropped (§4.5).
    pub fn release_fifo_slot(&self) {
        self.fifo_slot_busy.store(false, Ordering::SeqCst);
    }

    /// Remove each message from `inflight` if present, reclaiming its
    /// byte budget. Messages not found are silently skipped. They may
    /// have already been removed by a concurrent drop.
    pub async fn erase(&self, msgs: &[Message]) {
        if msgs.is_empty() {
            return;
        }
        // pending is locked only to uphold the fixed pending -> inflight
        // acquisition order, even though erase itself only mutates inflight.
        let _pending = self.pending.write().await;
        let mut inflight = self.inflight.write().await;

        let mut removed_bytes: u64 = 0;
        for msg in msgs {
            if let Some(pos) = inflight.iter().position(|m| m == msg) {
                let removed = inflight.remove(pos).unwrap();
                removed_bytes += removed.body_len() as u64;
            }
        }
        self.cached_bytes.fetch_sub(removed_bytes, Ordering::SeqCst);
    }

    /// Mark a broadcasting-mode message's consumption as concluded.
    pub fn release_offset(&self, offset: i64) {
        if let Some(ledger) = &self.ledger {
            ledger.lock().unwrap().release(offset);
        }
    }

    pub fn committed_offset(&self) -> Option<i64> {
        self.ledger.as_ref().and_then(|l| l.lock().unwrap().committed_offset())
    }

    pub async fn cached_count(&self) -> usize {
        self.pending.read().await.len() + self.inflight.read().await.len()
    }

    pub async fn inflight_count(&self) -> usize {
        self.inflight.read().await.len()
    }

    pub fn cached_bytes(&self) -> u64 {
        self.cached_bytes.load(Ordering::SeqCst)
    }
}
