//! `ProcessQueue`: the per-partition facade that composes every other
//! module in this crate into one consumption engine.
//!
//! Grounded in the teacher's `RedpandaConsumer` (`consumer.rs`):
//! `new`/`spawn_*`/`shutdown` lifecycle methods that hand off to
//! background tasks and expose a small synchronous surface to the
//! caller, generalized from "one consumer, many partitions" to "one
//! `ProcessQueue` per partition", each independently spawned and
//! independently droppable.

use crate::config::{Config, MessageModel};
use crate::delivery::{BatchDeliveryLoop, FifoDeliveryLoop};
use crate::message::{FilterExpression, Message, MessageQueue};
use crate::metrics::Metrics;
use crate::rate_limiter::RateLimiter;
use crate::rpc_client::{ConsumeFrom, ConsumeNotifier, ConsumeResult, RpcClient};
use crate::rpc_ops::RpcOps;
use crate::store::MessageStore;
use crate::throttle::Throttle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// Owns one partition's buffered messages, throttle state and
/// background fetch task for its lifetime.
pub struct ProcessQueue {
    message_queue: MessageQueue,
    store: Arc<MessageStore>,
    throttle: Arc<Throttle>,
    metrics: Arc<Metrics>,
    rate_limiter: Arc<dyn RateLimiter>,
    batch_delivery: BatchDeliveryLoop,
    fifo_delivery: Arc<FifoDeliveryLoop>,
    config: Config,
    dropped: Arc<AtomicBool>,
    fetch_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    created_at: Instant,
}

impl ProcessQueue {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        message_queue: MessageQueue,
        config: Config,
        client: Arc<dyn RpcClient>,
        notifier: Arc<dyn ConsumeNotifier>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let broadcasting = config.message_model == MessageModel::Broadcasting;
        let store = Arc::new(MessageStore::new(broadcasting));
        let throttle = Arc::new(Throttle::new(
            config.cached_messages_quantity_threshold_per_queue,
            config.cached_messages_bytes_threshold_per_queue,
        ));
        let rpc_ops = Arc::new(RpcOps::new(client.clone(), message_queue.queue_id, config.io_timeout));
        let metrics = Arc::new(Metrics::new());
        let dropped = Arc::new(AtomicBool::new(false));

        let batch_delivery = BatchDeliveryLoop::new(store.clone(), rpc_ops.clone(), metrics.clone(), config.message_model);
        let fifo_delivery = Arc::new(FifoDeliveryLoop::new(
            store.clone(),
            rpc_ops.clone(),
            metrics.clone(),
            notifier,
            broadcasting,
            config.max_delivery_attempts,
            config.fifo_consumption_suspend_time,
            dropped.clone(),
        ));

        Self {
            message_queue,
            store,
            throttle,
            metrics,
            rate_limiter,
            batch_delivery,
            fifo_delivery,
            config,
            dropped,
            fetch_task: std::sync::Mutex::new(None),
            created_at: Instant::now(),
        }
    }

    /// Spawn the background fetch loop. Idempotent: calling twice on an
    /// already-started queue is a no-op. `offset_store` is consulted
    /// only in pull mode, and only for its initial position (spec §4.3).
    pub fn start(
        self: &Arc<Self>,
        client: Arc<dyn RpcClient>,
        filter: Option<FilterExpression>,
        pull_mode: bool,
        offset_store: Option<Arc<dyn crate::rpc_client::OffsetStore>>,
    ) {
        let mut guard = self.fetch_task.lock().unwrap();
        if guard.is_some() {
            return;
        }

        let driver = crate::fetch::FetchDriver::new(
            client,
            self.store.clone(),
            self.throttle.clone(),
            self.metrics.clone(),
            self.message_queue.queue_id,
            self.config.max_await_batch_size_per_queue,
            self.config.max_await_time_per_queue,
            self.config.consumption_timeout,
            filter,
            self.config.listener_type == crate::config::ListenerType::Orderly,
            self.dropped.clone(),
            self.config.io_timeout,
        );
        let consume_from = match self.config.consume_from_where {
            crate::config::ConsumeFromWhere::Beginning => ConsumeFrom::Beginning,
            crate::config::ConsumeFromWhere::End => ConsumeFrom::End,
            crate::config::ConsumeFromWhere::Timestamp => ConsumeFrom::Timestamp(self.config.consume_from_time_millis),
        };

        let handle = tokio::spawn(async move {
            if pull_mode {
                driver.run_pull_loop(consume_from, offset_store.as_deref()).await;
            } else {
                driver.run_receive_loop(consume_from).await;
            }
        });
        *guard = Some(handle);
    }

    /// Mark the queue dropped, abandon its fetch task and any in-flight
    /// retry-until-dropped RPCs currently looping in `RpcOps`.
    pub fn drop_queue(&self) {
        self.dropped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.fetch_task.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Whether this queue has been idle past its throttle/activity
    /// window and is eligible for removal from the owning engine.
    pub fn expired(&self) -> bool {
        let now = self.created_at.elapsed().as_nanos() as i64;
        self.throttle.expired(now)
    }

    pub fn message_queue(&self) -> &MessageQueue {
        &self.message_queue
    }

    pub async fn cached_messages_quantity(&self) -> usize {
        self.store.cached_count().await
    }

    pub async fn inflight_messages_quantity(&self) -> usize {
        self.store.inflight_count().await
    }

    pub fn cached_message_bytes(&self) -> u64 {
        self.store.cached_bytes()
    }

    /// Hand up to `max_n` unordered messages to the caller for batch
    /// consumption.
    pub async fn try_take_messages(&self, max_n: usize) -> Vec<Message> {
        self.store.try_take(max_n, Some(self.rate_limiter.as_ref())).await
    }

    /// Claim the FIFO slot and its next message, if available.
    pub async fn try_take_fifo_message(&self) -> Option<Message> {
        self.store.try_take_fifo(Some(self.rate_limiter.as_ref())).await
    }

    /// Resolve a finished unordered batch.
    pub async fn erase_messages(&self, messages: Vec<Message>, result: ConsumeResult) {
        self.batch_delivery.erase_messages(messages, result).await;
    }

    /// Resolve one finished FIFO message.
    pub async fn erase_fifo_message(&self, message: Message, result: ConsumeResult) {
        self.fifo_delivery.erase_fifo(message, result).await;
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
