//! Rate limiting seam used by `MessageStore::try_take`/`try_take_fifo`.
//!
//! Token-bucket semantics, externally owned and optionally absent.
//! Mirrors the teacher's `BackpressureController::try_acquire`, but as
//! a trait so a per-topic limiter registry can be injected rather than
//! owned by the engine.

/// A permit-granting rate limiter. Implementations are expected to be
/// cheap and non-blocking: `try_acquire` must never await.
pub trait RateLimiter: Send + Sync {
    /// Attempt to acquire one permit without blocking.
    fn try_acquire(&self) -> bool;
}

/// A limiter that always grants a permit. The default when no
/// per-topic limiter has been configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn try_acquire(&self) -> bool {
        true
    }
}
