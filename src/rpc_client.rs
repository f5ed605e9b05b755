//! Collaborator seams the `ProcessQueue` depends on but does not own.
//!
//! `spec.md` §1 places the RPC transport, broadcasting-offset commit
//! and consumption dispatch outside the engine's scope; these traits
//! are the injection points SPEC_FULL.md adds so the engine compiles
//! and tests against fakes instead of a real broker. Grounded in the
//! teacher's `processor::MessageProcessor`/`BatchProcessor` traits,
//! which the same repo uses to keep Kafka specifics out of the
//! consumer loop.

use crate::error::ProcessQueueResult;
use crate::message::{FilterExpression, Message};
use crate::pb::FetchStatus;
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of a receive or pull RPC.
pub struct FetchResult {
    pub status: FetchStatus,
    pub messages: Vec<Message>,
    /// Only populated by pull-mode responses.
    pub next_begin_offset: Option<i64>,
}

/// Where a receive/pull cursor should start when a partition has no
/// prior offset recorded, mirroring `ConsumePolicy` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeFrom {
    Resume,
    Beginning,
    End,
    Timestamp(i64),
}

/// The broker-facing transport. Implementations own connection pooling,
/// TLS and endpoint resolution; the engine only calls these methods.
///
/// Every method takes a `deadline`: the caller (`FetchDriver` for
/// receive/pull, `RpcOps` for ack/nack/forward/query-offset) wraps the
/// call in `error::with_deadline` using that same value, so an
/// implementation that ignores `deadline` is still bounded from the
/// outside. Implementations are free to use it for their own
/// lower-level transport timeout too (spec.md §4.6: "All RPC wrappers
/// capture: ... and the deadline").
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn receive_message(
        &self,
        queue_id: i32,
        batch_size: i32,
        await_time: Duration,
        invisible_duration: Duration,
        consume_from: ConsumeFrom,
        filter: Option<&FilterExpression>,
        fifo: bool,
        deadline: Duration,
    ) -> ProcessQueueResult<FetchResult>;

    async fn pull_message(
        &self,
        queue_id: i32,
        offset: i64,
        batch_size: i32,
        await_time: Duration,
        filter: Option<&FilterExpression>,
        deadline: Duration,
    ) -> ProcessQueueResult<FetchResult>;

    async fn ack_message(&self, queue_id: i32, message: &Message, deadline: Duration) -> ProcessQueueResult<FetchStatus>;

    async fn nack_message(&self, queue_id: i32, message: &Message, deadline: Duration) -> ProcessQueueResult<FetchStatus>;

    async fn forward_to_dlq(
        &self,
        queue_id: i32,
        message: &Message,
        max_delivery_attempts: u32,
        deadline: Duration,
    ) -> ProcessQueueResult<FetchStatus>;

    async fn query_offset(&self, queue_id: i32, consume_from: ConsumeFrom, deadline: Duration) -> ProcessQueueResult<i64>;
}

/// Persists the broadcasting-mode committed watermark. Clustering mode
/// never calls this. The broker tracks position via ack/nack.
#[async_trait]
pub trait OffsetStore: Send + Sync {
    async fn read_offset(&self, queue_id: i32) -> ProcessQueueResult<Option<i64>>;
    async fn update_offset(&self, queue_id: i32, offset: i64) -> ProcessQueueResult<()>;
}

/// Dispatches buffered messages to user consumption code and reports
/// the result back into the delivery loop. Out of scope per spec.md
/// §1; the engine only needs to call into it and await a verdict.
#[async_trait]
pub trait ConsumeNotifier: Send + Sync {
    async fn consume_batch(&self, messages: &[Message]) -> ConsumeResult;
    async fn consume_one(&self, message: &Message) -> ConsumeResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeResult {
    Ok,
    Error,
}
