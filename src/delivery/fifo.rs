//! Ordered (ORDERLY listener) consume-result handling, spec §4.5.
//!
//! A FIFO partition has a single in-flight message at a time (the
//! `MessageStore` slot). On a consume error the same message is
//! redelivered in place, up to `MaxDeliveryAttempts`, before falling
//! through to the DLQ. Grounded in the teacher's `retry::RetryExecutor`
//! for the "redeliver with a fixed suspend, then give up" shape, and in
//! `shutdown::ShutdownCoordinator`'s `AtomicBool` drop flag for the
//! stop condition shared with `RpcOps`'s retry-until-dropped RPCs.

use crate::message::Message;
use crate::metrics::Metrics;
use crate::rpc_client::{ConsumeNotifier, ConsumeResult};
use crate::rpc_ops::RpcOps;
use crate::store::MessageStore;
use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

pub struct FifoDeliveryLoop {
    store: Arc<MessageStore>,
    rpc_ops: Arc<RpcOps>,
    metrics: Arc<Metrics>,
    notifier: Arc<dyn ConsumeNotifier>,
    broadcasting: bool,
    max_delivery_attempts: u32,
    fifo_consumption_suspend_time: Duration,
    dropped: Arc<AtomicBool>,
}

impl FifoDeliveryLoop {
    pub fn new(
        store: Arc<MessageStore>,
        rpc_ops: Arc<RpcOps>,
        metrics: Arc<Metrics>,
        notifier: Arc<dyn ConsumeNotifier>,
        broadcasting: bool,
        max_delivery_attempts: u32,
        fifo_consumption_suspend_time: Duration,
        dropped: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            rpc_ops,
            metrics,
            notifier,
            broadcasting,
            max_delivery_attempts,
            fifo_consumption_suspend_time,
            dropped,
        }
    }

    /// Resolve one FIFO message's consume result. Boxed because a
    /// bounded-retry redelivery re-enters this same function.
    pub fn erase_fifo(&self, message: Message, result: ConsumeResult) -> BoxFuture<'_, ()> {
        async move {
            match result {
                ConsumeResult::Ok => self.metrics.record_consume_ok(1),
                ConsumeResult::Error => self.metrics.record_consume_error(1),
            }

            if self.broadcasting {
                self.store.release_offset(message.queue_offset);
                self.store.erase(std::slice::from_ref(&message)).await;
                self.store.release_fifo_slot();
                return;
            }

            match result {
                ConsumeResult::Ok => {
                    self.rpc_ops.ack_fifo(&message, &self.dropped).await;
                    self.metrics.record_acked(1);
                    self.store.erase(std::slice::from_ref(&message)).await;
                    self.store.release_fifo_slot();
                }
                ConsumeResult::Error => {
                    if self.dropped.load(std::sync::atomic::Ordering::SeqCst) {
                        self.store.release_fifo_slot();
                        return;
                    }
                    if message.delivery_attempt() < self.max_delivery_attempts {
                        message.bump_delivery_attempt();
                        tokio::time::sleep(self.fifo_consumption_suspend_time).await;
                        let redelivered = self.notifier.consume_one(&message).await;
                        self.erase_fifo(message, redelivered).await;
                    } else {
                        self.rpc_ops.forward_fifo_to_dlq(&message, self.max_delivery_attempts, &self.dropped).await;
                        self.metrics.record_sent_to_dlq(1);
                        self.store.erase(std::slice::from_ref(&message)).await;
                        self.store.release_fifo_slot();
                    }
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessQueueResult;
    use crate::message::FilterExpression;
    use crate::pb::FetchStatus;
    use crate::rpc_client::{ConsumeFrom, FetchResult, RpcClient};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysOkClient;

    #[async_trait]
    impl RpcClient for AlwaysOkClient {
        async fn receive_message(
            &self,
            _queue_id: i32,
            _batch_size: i32,
            _await_time: Duration,
            _invisible_duration: Duration,
            _consume_from: ConsumeFrom,
            _filter: Option<&FilterExpression>,
            _fifo: bool,
            _deadline: Duration,
        ) -> ProcessQueueResult<FetchResult> {
            unimplemented!()
        }

        async fn pull_message(
            &self,
            _queue_id: i32,
            _offset: i64,
            _batch_size: i32,
            _await_time: Duration,
            _filter: Option<&FilterExpression>,
            _deadline: Duration,
        ) -> ProcessQueueResult<FetchResult> {
            unimplemented!()
        }

        async fn ack_message(&self, _queue_id: i32, _message: &Message, _deadline: Duration) -> ProcessQueueResult<FetchStatus> {
            Ok(FetchStatus::Ok)
        }

        async fn nack_message(&self, _queue_id: i32, _message: &Message, _deadline: Duration) -> ProcessQueueResult<FetchStatus> {
            Ok(FetchStatus::Ok)
        }

        async fn forward_to_dlq(
            &self,
            _queue_id: i32,
            _message: &Message,
            _max_delivery_attempts: u32,
            _deadline: Duration,
        ) -> ProcessQueueResult<FetchStatus> {
            Ok(FetchStatus::Ok)
        }

        async fn query_offset(&self, _queue_id: i32, _consume_from: ConsumeFrom, _deadline: Duration) -> ProcessQueueResult<i64> {
            unimplemented!()
        }
    }

    struct AlwaysErrorNotifier {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ConsumeNotifier for AlwaysErrorNotifier {
        async fn consume_batch(&self, _messages: &[Message]) -> ConsumeResult {
            unimplemented!()
        }

        async fn consume_one(&self, _message: &Message) -> ConsumeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ConsumeResult::Error
        }
    }

    fn msg() -> Message {
        Message::new("id-1", Bytes::from_static(b"x"), 0, "handle", vec![])
    }

    #[tokio::test]
    async fn redelivers_up_to_max_then_forwards_to_dlq() {
        let store = Arc::new(MessageStore::new(false));
        let m = msg();
        store.cache(vec![m.clone()]).await;
        let taken = store.try_take_fifo(None).await.unwrap();

        let client = Arc::new(AlwaysOkClient);
        let rpc_ops = Arc::new(RpcOps::new(client, 0, Duration::from_secs(3)));
        let notifier = Arc::new(AlwaysErrorNotifier { calls: AtomicU32::new(0) });
        let deliver = FifoDeliveryLoop::new(
            store.clone(),
            rpc_ops,
            Arc::new(Metrics::new()),
            notifier.clone(),
            false,
            3,
            Duration::from_millis(1),
            Arc::new(AtomicBool::new(false)),
        );

        deliver.erase_fifo(taken, ConsumeResult::Error).await;
        // attempt 1 (initial) -> error -> redeliver (2) -> error -> redeliver (3) -> error -> DLQ
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.cached_count().await, 0);
        let reclaimed = store.try_take_fifo(None).await;
        assert!(reclaimed.is_none());
    }

    #[tokio::test]
    async fn broadcasting_never_acks_or_forwards() {
        let store = Arc::new(MessageStore::new(true));
        let m = msg();
        store.cache(vec![m.clone()]).await;
        let taken = store.try_take_fifo(None).await.unwrap();

        let client = Arc::new(AlwaysOkClient);
        let rpc_ops = Arc::new(RpcOps::new(client, 0, Duration::from_secs(3)));
        let notifier = Arc::new(AlwaysErrorNotifier { calls: AtomicU32::new(0) });
        let deliver = FifoDeliveryLoop::new(
            store.clone(),
            rpc_ops,
            Arc::new(Metrics::new()),
            notifier,
            true,
            3,
            Duration::from_millis(1),
            Arc::new(AtomicBool::new(false)),
        );

        deliver.erase_fifo(taken, ConsumeResult::Ok).await;
        assert_eq!(store.committed_offset(), Some(0));
        assert_eq!(store.cached_count().await, 0);
    }
}
