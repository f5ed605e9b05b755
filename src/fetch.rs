//! Receive-mode and pull-mode fetch loops, spec §4.3.
//!
//! Grounded in the teacher's `consumer::spawn_consumer_loop`: a task
//! that loops forever, checking a stop flag and a backpressure gate
//! before issuing the next fetch, and rescheduling on any failure
//! rather than crashing the loop. Generalized from Kafka's single
//! poll-loop into the two fetch strategies (broker long-poll vs
//! locally tracked offset) the spec requires.

use crate::config::timing;
use crate::error::{with_deadline, ErrorSeverity};
use crate::message::FilterExpression;
use crate::metrics::Metrics;
use crate::rpc_client::{ConsumeFrom, OffsetStore, RpcClient};
use crate::store::MessageStore;
use crate::throttle::Throttle;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Log a failed fetch RPC at the level its `severity()` calls for.
fn log_fetch_failure(queue_id: i32, op: &str, err: &crate::error::ProcessQueueError) {
    match err.severity() {
        ErrorSeverity::Fatal | ErrorSeverity::Error => {
            error!(queue_id, error = %err, retryable = err.is_retryable(), "{op} RPC failed")
        }
        ErrorSeverity::Warning => warn!(queue_id, error = %err, retryable = err.is_retryable(), "{op} RPC failed"),
    }
}

fn now_nanos(epoch: &Instant) -> i64 {
    epoch.elapsed().as_nanos() as i64
}

/// Drives message acquisition for one partition, either via the
/// broker's long-poll receive RPC or a locally tracked pull offset.
pub struct FetchDriver {
    client: Arc<dyn RpcClient>,
    store: Arc<MessageStore>,
    throttle: Arc<Throttle>,
    metrics: Arc<Metrics>,
    queue_id: i32,
    batch_size: i32,
    await_time: Duration,
    invisible_duration: Duration,
    filter: Option<FilterExpression>,
    fifo: bool,
    dropped: Arc<AtomicBool>,
    /// Deadline for the initial pull-mode `query_offset` RPC (spec.md
    /// §6's `IoTimeoutMillis`). Receive/pull themselves use the fixed
    /// long-poll constants instead.
    io_timeout: Duration,
    epoch: Instant,
}

impl FetchDriver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn RpcClient>,
        store: Arc<MessageStore>,
        throttle: Arc<Throttle>,
        metrics: Arc<Metrics>,
        queue_id: i32,
        batch_size: i32,
        await_time: Duration,
        invisible_duration: Duration,
        filter: Option<FilterExpression>,
        fifo: bool,
        dropped: Arc<AtomicBool>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            client,
            store,
            throttle,
            metrics,
            queue_id,
            batch_size,
            await_time,
            invisible_duration,
            filter,
            fifo,
            dropped,
            io_timeout,
            epoch: Instant::now(),
        }
    }

    /// Run the receive-mode loop until `dropped` is set. Never returns
    /// otherwise. Every iteration either caches a batch and loops
    /// immediately, or reschedules after `LaterDelay`/throttle backoff.
    pub async fn run_receive_loop(&self, consume_from: ConsumeFrom) {
        loop {
            if self.dropped.load(Ordering::SeqCst) {
                return;
            }

            let now = now_nanos(&self.epoch);
            self.throttle.mark_activity(now);
            if self.throttle.throttled(self.store.cached_count().await as u64, self.store.cached_bytes()) {
                self.throttle.mark_throttled(now);
                tokio::time::sleep(timing::LATER_DELAY).await;
                continue;
            }

            let result = with_deadline(
                timing::RECEIVE_LONG_POLL_TIMEOUT,
                self.client.receive_message(
                    self.queue_id,
                    self.batch_size,
                    self.await_time,
                    self.invisible_duration,
                    consume_from,
                    self.filter.as_ref(),
                    self.fifo,
                    timing::RECEIVE_LONG_POLL_TIMEOUT,
                ),
            )
            .await;

            match result {
                Ok(fetch) if fetch.status == crate::pb::FetchStatus::Ok => {
                    if !fetch.messages.is_empty() {
                        debug!(queue_id = self.queue_id, count = fetch.messages.len(), "received messages");
                        self.metrics.record_received(fetch.messages.len() as u64);
                        self.store.cache(fetch.messages).await;
                    }
                    // success loops immediately, no delay, but still
                    // yields so a transport that never actually awaits
                    // on I/O can't monopolize the executor.
                    tokio::task::yield_now().await;
                }
                Ok(fetch) => {
                    warn!(queue_id = self.queue_id, status = ?fetch.status, "receive returned non-OK status");
                    self.metrics.record_fetch_error();
                    tokio::time::sleep(timing::LATER_DELAY).await;
                }
                Err(err) => {
                    log_fetch_failure(self.queue_id, "receive", &err);
                    self.metrics.record_fetch_error();
                    tokio::time::sleep(timing::LATER_DELAY).await;
                }
            }
        }
    }

    /// Run the pull-mode loop, tracking the next offset to request
    /// locally. The offset only advances on an OK response (resolved
    /// open question, spec.md §9).
    ///
    /// The initial offset comes from `offset_store` when the caller
    /// supplies one; a read failure there is unrecoverable locally and
    /// drops the queue (spec §4.3, §7). With no custom store, or when
    /// the store has no recorded position yet, the initial offset is
    /// asked of the broker instead.
    pub async fn run_pull_loop(&self, consume_from: ConsumeFrom, offset_store: Option<&dyn OffsetStore>) {
        let offset = if let Some(store) = offset_store {
            match store.read_offset(self.queue_id).await {
                Ok(Some(offset)) => offset,
                Ok(None) => match with_deadline(self.io_timeout, self.client.query_offset(self.queue_id, consume_from, self.io_timeout)).await {
                    Ok(offset) => offset,
                    Err(err) => {
                        log_fetch_failure(self.queue_id, "initial broker offset query", &err);
                        0
                    }
                },
                Err(err) => {
                    warn!(queue_id = self.queue_id, error = %err, "offset store read failed, dropping queue");
                    self.dropped.store(true, Ordering::SeqCst);
                    return;
                }
            }
        } else {
            match with_deadline(self.io_timeout, self.client.query_offset(self.queue_id, consume_from, self.io_timeout)).await {
                Ok(offset) => offset,
                Err(err) => {
                    log_fetch_failure(self.queue_id, "initial broker offset query", &err);
                    0
                }
            }
        };
        let cursor = AtomicI64::new(offset);

        loop {
            if self.dropped.load(Ordering::SeqCst) {
                return;
            }

            let now = now_nanos(&self.epoch);
            self.throttle.mark_activity(now);
            if self.throttle.throttled(self.store.cached_count().await as u64, self.store.cached_bytes()) {
                self.throttle.mark_throttled(now);
                tokio::time::sleep(timing::LATER_DELAY).await;
                continue;
            }

            let next_offset = cursor.load(Ordering::SeqCst);
            let result = with_deadline(
                timing::PULL_LONG_POLL_TIMEOUT,
                self.client.pull_message(
                    self.queue_id,
                    next_offset,
                    self.batch_size,
                    self.await_time,
                    self.filter.as_ref(),
                    timing::PULL_LONG_POLL_TIMEOUT,
                ),
            )
            .await;

            match result {
                Ok(fetch) if fetch.status == crate::pb::FetchStatus::Ok => {
                    if !fetch.messages.is_empty() {
                        debug!(queue_id = self.queue_id, count = fetch.messages.len(), "pulled messages");
                        self.metrics.record_pulled(fetch.messages.len() as u64);
                        self.store.cache(fetch.messages).await;
                    }
                    if let Some(next) = fetch.next_begin_offset {
                        cursor.store(next, Ordering::SeqCst);
                    }
                    tokio::task::yield_now().await;
                }
                Ok(fetch) => {
                    warn!(queue_id = self.queue_id, status = ?fetch.status, "pull returned non-OK status");
                    self.metrics.record_fetch_error();
                    tokio::time::sleep(timing::LATER_DELAY).await;
                }
                Err(err) => {
                    log_fetch_failure(self.queue_id, "pull", &err);
                    self.metrics.record_fetch_error();
                    tokio::time::sleep(timing::LATER_DELAY).await;
                }
            }
        }
    }
}
