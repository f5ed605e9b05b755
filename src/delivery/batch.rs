//! Unordered (CONCURRENT listener) consume-result handling, spec §4.4.
//!
//! Grounded in the teacher's `processor::MetricsProcessor` wrapper,
//! which records outcome counters around a processing call before
//! acting on the result. The same shape, specialized to the
//! clustering-vs-broadcasting ack/nack split this engine needs.

use crate::config::MessageModel;
use crate::message::Message;
use crate::metrics::Metrics;
use crate::rpc_client::ConsumeResult;
use crate::rpc_ops::RpcOps;
use crate::store::MessageStore;
use std::sync::Arc;

pub struct BatchDeliveryLoop {
    store: Arc<MessageStore>,
    rpc_ops: Arc<RpcOps>,
    metrics: Arc<Metrics>,
    message_model: MessageModel,
}

impl BatchDeliveryLoop {
    pub fn new(store: Arc<MessageStore>, rpc_ops: Arc<RpcOps>, metrics: Arc<Metrics>, message_model: MessageModel) -> Self {
        Self { store, rpc_ops, metrics, message_model }
    }

    /// Resolve a finished batch: erase it from the store and, in
    /// clustering mode, fire the matching ack/nack per message.
    pub async fn erase_messages(&self, messages: Vec<Message>, result: ConsumeResult) {
        match result {
            ConsumeResult::Ok => self.metrics.record_consume_ok(messages.len() as u64),
            ConsumeResult::Error => self.metrics.record_consume_error(messages.len() as u64),
        }

        match self.message_model {
            MessageModel::Broadcasting => {
                for message in &messages {
                    self.store.release_offset(message.queue_offset);
                }
                self.store.erase(&messages).await;
            }
            MessageModel::Clustering => {
                self.store.erase(&messages).await;
                match result {
                    ConsumeResult::Ok => {
                        for message in &messages {
                            self.rpc_ops.ack(message).await;
                        }
                        self.metrics.record_acked(messages.len() as u64);
                    }
                    ConsumeResult::Error => {
                        for message in &messages {
                            self.rpc_ops.nack(message).await;
                        }
                        self.metrics.record_nacked(messages.len() as u64);
                    }
                }
            }
        }
    }
}
