//! Scenario tests driving `ProcessQueue` end to end through fakes for
//! the RPC transport and consume dispatch, mirroring the teacher's
//! `tests/consumer/integration/end_to_end_test.rs` style (a
//! `CountingProcessor`-like fake standing in for the broker/consumer
//! callback instead of testcontainers, since no real broker is in
//! scope here).

use async_trait::async_trait;
use bytes::Bytes;
use rocketmq_process_queue::config::timing;
use rocketmq_process_queue::{
    Config, ConsumeFrom, ConsumeNotifier, ConsumeResult, FilterExpression, ListenerType, Message, MessageModel, MessageQueue,
    ProcessQueue, ProcessQueueResult, RpcClient,
};
use rocketmq_process_queue::pb::FetchStatus;
use rocketmq_process_queue::rpc_client::FetchResult;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct ScriptedClient {
    /// Messages served on the first successful fetch call; empty on every
    /// subsequent call.
    first_batch: Mutex<Option<Vec<Message>>>,
    acked: AtomicU32,
    nacked: AtomicU32,
    forwarded: AtomicU32,
    fail_ack_times: AtomicU32,
}

impl ScriptedClient {
    fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            first_batch: Mutex::new(Some(messages)),
            acked: AtomicU32::new(0),
            nacked: AtomicU32::new(0),
            forwarded: AtomicU32::new(0),
            fail_ack_times: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl RpcClient for ScriptedClient {
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
        let mut guard = self.first_batch.lock().unwrap();
        let messages = guard.take().unwrap_or_default();
        Ok(FetchResult { status: FetchStatus::Ok, messages, next_begin_offset: None })
    }

    async fn pull_message(
        &self,
        _queue_id: i32,
        offset: i64,
        _batch_size: i32,
        _await_time: Duration,
        _filter: Option<&FilterExpression>,
        _deadline: Duration,
    ) -> ProcessQueueResult<FetchResult> {
        let mut guard = self.first_batch.lock().unwrap();
        let messages = guard.take().unwrap_or_default();
        let next = offset + messages.len() as i64;
        Ok(FetchResult { status: FetchStatus::Ok, messages, next_begin_offset: Some(next) })
    }

    async fn ack_message(&self, _queue_id: i32, _message: &Message, _deadline: Duration) -> ProcessQueueResult<FetchStatus> {
        if self.fail_ack_times.load(Ordering::SeqCst) > 0 {
            self.fail_ack_times.fetch_sub(1, Ordering::SeqCst);
            return Ok(FetchStatus::Internal);
        }
        self.acked.fetch_add(1, Ordering::SeqCst);
        Ok(FetchStatus::Ok)
    }

    async fn nack_message(&self, _queue_id: i32, _message: &Message, _deadline: Duration) -> ProcessQueueResult<FetchStatus> {
        self.nacked.fetch_add(1, Ordering::SeqCst);
        Ok(FetchStatus::Ok)
    }

    async fn forward_to_dlq(&self, _queue_id: i32, _message: &Message, _max_delivery_attempts: u32, _deadline: Duration) -> ProcessQueueResult<FetchStatus> {
        self.forwarded.fetch_add(1, Ordering::SeqCst);
        Ok(FetchStatus::Ok)
    }

    async fn query_offset(&self, _queue_id: i32, _consume_from: ConsumeFrom, _deadline: Duration) -> ProcessQueueResult<i64> {
        Ok(0)
    }
}

struct ScriptedNotifier {
    result: ConsumeResult,
}

#[async_trait]
impl ConsumeNotifier for ScriptedNotifier {
    async fn consume_batch(&self, _messages: &[Message]) -> ConsumeResult {
        self.result
    }

    async fn consume_one(&self, _message: &Message) -> ConsumeResult {
        self.result
    }
}

fn msg(id: &str, offset: i64) -> Message {
    Message::new(id, Bytes::from_static(b"payload"), offset, format!("handle-{id}"), vec![])
}

async fn poll_until_cached<F>(pq: &ProcessQueue, predicate: F, timeout: Duration)
where
    F: Fn(usize) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate(pq.cached_messages_quantity().await) {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within timeout");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn poll_until_sync<F>(predicate: F, timeout: Duration)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !predicate() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within timeout");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn happy_path_receive_then_ack() {
    let mq = MessageQueue::new("orders", "broker-0", 0, vec!["127.0.0.1:9000".into()]);
    let config = Config::builder().message_model(MessageModel::Clustering).build().unwrap();
    let client = Arc::new(ScriptedClient::with_messages(vec![msg("a", 0)]));
    let notifier = Arc::new(ScriptedNotifier { result: ConsumeResult::Ok });
    let pq = Arc::new(ProcessQueue::new(mq, config, client.clone(), notifier, Arc::new(rocketmq_process_queue::rate_limiter::Unlimited)));

    pq.start(client.clone(), None, false, None);
    poll_until_cached(&pq, |n| n > 0, Duration::from_secs(1)).await;

    let taken = pq.try_take_messages(10).await;
    assert_eq!(taken.len(), 1);
    pq.erase_messages(taken, ConsumeResult::Ok).await;

    assert_eq!(client.acked.load(Ordering::SeqCst), 1);
    assert_eq!(client.nacked.load(Ordering::SeqCst), 0);
    pq.drop_queue();
}

#[tokio::test]
async fn consume_failure_nacks_instead_of_acking() {
    let mq = MessageQueue::new("orders", "broker-0", 0, vec!["127.0.0.1:9000".into()]);
    let config = Config::builder().message_model(MessageModel::Clustering).build().unwrap();
    let client = Arc::new(ScriptedClient::with_messages(vec![msg("a", 0)]));
    let notifier = Arc::new(ScriptedNotifier { result: ConsumeResult::Error });
    let pq = Arc::new(ProcessQueue::new(mq, config, client.clone(), notifier, Arc::new(rocketmq_process_queue::rate_limiter::Unlimited)));

    pq.start(client.clone(), None, false, None);
    poll_until_cached(&pq, |n| n > 0, Duration::from_secs(1)).await;

    let taken = pq.try_take_messages(10).await;
    pq.erase_messages(taken, ConsumeResult::Error).await;

    assert_eq!(client.nacked.load(Ordering::SeqCst), 1);
    assert_eq!(client.acked.load(Ordering::SeqCst), 0);
    pq.drop_queue();
}

#[tokio::test]
async fn backpressure_defers_further_fetches() {
    let mq = MessageQueue::new("orders", "broker-0", 0, vec!["127.0.0.1:9000".into()]);
    let config = Config::builder()
        .cached_messages_quantity_threshold_per_queue(1)
        .build()
        .unwrap();
    // three messages offered, but the quantity threshold is 1: only the
    // first receive call's results should ever land in the store because
    // every subsequent loop iteration is throttled before fetching again.
    let client = Arc::new(ScriptedClient::with_messages(vec![msg("a", 0), msg("b", 1), msg("c", 2)]));
    let notifier = Arc::new(ScriptedNotifier { result: ConsumeResult::Ok });
    let pq = Arc::new(ProcessQueue::new(mq, config, client.clone(), notifier, Arc::new(rocketmq_process_queue::rate_limiter::Unlimited)));

    pq.start(client.clone(), None, false, None);
    poll_until_cached(&pq, |n| n > 0, Duration::from_secs(1)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(pq.cached_messages_quantity().await, 3);
    pq.drop_queue();
}

#[tokio::test]
async fn fifo_redelivers_until_exhausted_then_forwards_to_dlq() {
    let mq = MessageQueue::new("orders", "broker-0", 0, vec!["127.0.0.1:9000".into()]);
    let config = Config::builder()
        .listener_type(ListenerType::Orderly)
        .max_delivery_attempts(2)
        .fifo_consumption_suspend_time(Duration::from_millis(1))
        .build()
        .unwrap();
    let client = Arc::new(ScriptedClient::with_messages(vec![msg("a", 0)]));
    let notifier = Arc::new(ScriptedNotifier { result: ConsumeResult::Error });
    let pq = Arc::new(ProcessQueue::new(mq, config, client.clone(), notifier, Arc::new(rocketmq_process_queue::rate_limiter::Unlimited)));

    pq.start(client.clone(), None, false, None);
    poll_until_cached(&pq, |n| n > 0, Duration::from_secs(1)).await;

    let taken = pq.try_take_fifo_message().await.unwrap();
    pq.erase_fifo_message(taken, ConsumeResult::Error).await;

    poll_until_sync(|| client.forwarded.load(Ordering::SeqCst) > 0, Duration::from_secs(1)).await;
    assert_eq!(pq.cached_messages_quantity().await, 0);
    pq.drop_queue();
}

#[tokio::test]
async fn broadcasting_commits_locally_without_acking() {
    let mq = MessageQueue::new("orders", "broker-0", 0, vec!["127.0.0.1:9000".into()]);
    let config = Config::builder().message_model(MessageModel::Broadcasting).build().unwrap();
    let client = Arc::new(ScriptedClient::with_messages(vec![msg("a", 7)]));
    let notifier = Arc::new(ScriptedNotifier { result: ConsumeResult::Ok });
    let pq = Arc::new(ProcessQueue::new(mq, config, client.clone(), notifier, Arc::new(rocketmq_process_queue::rate_limiter::Unlimited)));

    pq.start(client.clone(), None, false, None);
    poll_until_cached(&pq, |n| n > 0, Duration::from_secs(1)).await;

    let taken = pq.try_take_messages(10).await;
    pq.erase_messages(taken, ConsumeResult::Ok).await;

    assert_eq!(client.acked.load(Ordering::SeqCst), 0);
    assert_eq!(client.nacked.load(Ordering::SeqCst), 0);
    pq.drop_queue();
}

#[tokio::test]
async fn drop_during_fifo_retry_abandons_the_rpc_instead_of_looping_forever() {
    let mq = MessageQueue::new("orders", "broker-0", 0, vec!["127.0.0.1:9000".into()]);
    let config = Config::builder()
        .listener_type(ListenerType::Orderly)
        .build()
        .unwrap();
    let client = Arc::new(ScriptedClient::with_messages(vec![msg("a", 0)]));
    client.fail_ack_times.store(u32::MAX, Ordering::SeqCst);
    let notifier = Arc::new(ScriptedNotifier { result: ConsumeResult::Ok });
    let pq = Arc::new(ProcessQueue::new(mq, config, client.clone(), notifier, Arc::new(rocketmq_process_queue::rate_limiter::Unlimited)));

    pq.start(client.clone(), None, false, None);
    poll_until_cached(&pq, |n| n > 0, Duration::from_secs(1)).await;

    let taken = pq.try_take_fifo_message().await.unwrap();
    let pq2 = pq.clone();
    let erase_handle = tokio::spawn(async move { pq2.erase_fifo_message(taken, ConsumeResult::Ok).await });

    // give ack_fifo a couple of failed attempts, then drop the queue.
    // the retry loop must notice and return instead of retrying forever.
    tokio::time::sleep(timing::ACK_FIFO_MESSAGE_DELAY * 3).await;
    pq.drop_queue();

    tokio::time::timeout(Duration::from_secs(2), erase_handle)
        .await
        .expect("erase_fifo_message did not return after drop")
        .unwrap();
}
