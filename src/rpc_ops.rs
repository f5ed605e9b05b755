//! RPC issuance policy: fire-and-forget acks/nacks/forwards versus the
//! retry-until-dropped variants FIFO delivery depends on.
//!
//! Grounded in the teacher's `retry::RetryExecutor`/`RetryPolicy`: the
//! same "keep retrying on a fixed schedule until a stop condition
//! fires" shape, specialized to the two stop conditions the spec
//! names: the queue being dropped, or the RPC finally succeeding.

use crate::config::timing;
use crate::error::{with_deadline, ErrorSeverity};
use crate::message::Message;
use crate::rpc_client::RpcClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Thin wrapper around an `RpcClient` that applies the engine's fixed
/// ack/nack/forward issuance policy on top of it.
pub struct RpcOps {
    client: Arc<dyn RpcClient>,
    queue_id: i32,
    /// Deadline passed to every call this wraps (spec.md §6's
    /// `IoTimeoutMillis`), and the bound `with_deadline` enforces
    /// independently of whether the implementation honors it.
    io_timeout: Duration,
}

/// Log a failed one-shot RPC at the level its `severity()` calls for.
fn log_one_shot_failure(op: &str, message_id: &str, err: &crate::error::ProcessQueueError) {
    match err.severity() {
        ErrorSeverity::Fatal | ErrorSeverity::Error => error!(message_id, error = %err, retryable = err.is_retryable(), "{op} RPC failed"),
        ErrorSeverity::Warning => warn!(message_id, error = %err, retryable = err.is_retryable(), "{op} RPC failed"),
    }
}

impl RpcOps {
    pub fn new(client: Arc<dyn RpcClient>, queue_id: i32, io_timeout: Duration) -> Self {
        Self { client, queue_id, io_timeout }
    }

    /// One-shot ack: issue once, log a non-OK outcome, never retry.
    pub async fn ack(&self, message: &Message) {
        match with_deadline(self.io_timeout, self.client.ack_message(self.queue_id, message, self.io_timeout)).await {
            Ok(status) if status == crate::pb::FetchStatus::Ok => {}
            Ok(status) => warn!(message_id = %message.message_id, ?status, "ack returned non-OK status"),
            Err(err) => log_one_shot_failure("ack", &message.message_id, &err),
        }
    }

    /// One-shot nack: same shape as `ack`, different RPC.
    pub async fn nack(&self, message: &Message) {
        match with_deadline(self.io_timeout, self.client.nack_message(self.queue_id, message, self.io_timeout)).await {
            Ok(status) if status == crate::pb::FetchStatus::Ok => {}
            Ok(status) => warn!(message_id = %message.message_id, ?status, "nack returned non-OK status"),
            Err(err) => log_one_shot_failure("nack", &message.message_id, &err),
        }
    }

    /// One-shot forward to DLQ. Used outside the FIFO terminal path,
    /// where a failure to forward is merely logged rather than retried.
    pub async fn forward(&self, message: &Message, max_delivery_attempts: u32) {
        match with_deadline(
            self.io_timeout,
            self.client.forward_to_dlq(self.queue_id, message, max_delivery_attempts, self.io_timeout),
        )
        .await
        {
            Ok(status) if status == crate::pb::FetchStatus::Ok => {}
            Ok(status) => warn!(message_id = %message.message_id, ?status, "forward-to-dlq returned non-OK status"),
            Err(err) => log_one_shot_failure("forward-to-dlq", &message.message_id, &err),
        }
    }

    /// Retry `ack_message` on a fixed delay until it succeeds or
    /// `dropped` becomes true. Completes exactly once either way.
    pub async fn ack_fifo(&self, message: &Message, dropped: &AtomicBool) {
        loop {
            if dropped.load(Ordering::SeqCst) {
                warn!(message_id = %message.message_id, "ack_fifo abandoned: queue dropped");
                return;
            }
            match with_deadline(self.io_timeout, self.client.ack_message(self.queue_id, message, self.io_timeout)).await {
                Ok(status) if status == crate::pb::FetchStatus::Ok => return,
                _ => {
                    tokio::time::sleep(timing::ACK_FIFO_MESSAGE_DELAY).await;
                }
            }
        }
    }

    /// Retry `forward_to_dlq` on a fixed delay until it succeeds or
    /// `dropped` becomes true.
    pub async fn forward_fifo_to_dlq(&self, message: &Message, max_delivery_attempts: u32, dropped: &AtomicBool) {
        loop {
            if dropped.load(Ordering::SeqCst) {
                warn!(message_id = %message.message_id, "forward_fifo_to_dlq abandoned: queue dropped");
                return;
            }
            match with_deadline(
                self.io_timeout,
                self.client.forward_to_dlq(self.queue_id, message, max_delivery_attempts, self.io_timeout),
            )
            .await
            {
                Ok(status) if status == crate::pb::FetchStatus::Ok => return,
                _ => {
                    tokio::time::sleep(timing::REDIRECT_FIFO_TO_DLQ_DELAY).await;
                }
            }
        }
    }
}
