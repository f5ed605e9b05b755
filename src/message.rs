//! Core domain types: partition identity, filter expressions and messages.

use bytes::Bytes;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Identity of one partition (message queue) a `ProcessQueue` owns.
///
/// Immutable for the lifetime of the owning `ProcessQueue`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageQueue {
    pub topic: String,
    pub broker_name: String,
    pub queue_id: i32,
    /// Resolved broker endpoints (`host:port`), used to target fetch RPCs.
    pub endpoints: Vec<String>,
}

impl MessageQueue {
    pub fn new(topic: impl Into<String>, broker_name: impl Into<String>, queue_id: i32, endpoints: Vec<String>) -> Self {
        Self {
            topic: topic.into(),
            broker_name: broker_name.into(),
            queue_id,
            endpoints,
        }
    }
}

/// Filter type for a `FilterExpression`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Tag,
    Sql92,
}

/// An immutable message filter attached to receive/pull requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpression {
    pub expression: String,
    pub filter_type: FilterType,
}

impl FilterExpression {
    pub fn tag(expression: impl Into<String>) -> Self {
        Self { expression: expression.into(), filter_type: FilterType::Tag }
    }

    pub fn sql92(expression: impl Into<String>) -> Self {
        Self { expression: expression.into(), filter_type: FilterType::Sql92 }
    }
}

/// A single delivered message.
///
/// Opaque to the engine beyond the fields it needs to track delivery
/// state and target ack/nack/forward RPCs at the right broker.
#[derive(Debug, Clone)]
pub struct Message {
    pub message_id: String,
    pub body: Bytes,
    pub queue_offset: i64,
    pub receipt_handle: String,
    /// Broker endpoints to target for ack/nack/forward of this specific
    /// delivered copy; stamped by the receive path.
    pub ack_endpoints: Vec<String>,
    delivery_attempt: Arc<AtomicU32>,
}

impl Message {
    pub fn new(
        message_id: impl Into<String>,
        body: impl Into<Bytes>,
        queue_offset: i64,
        receipt_handle: impl Into<String>,
        ack_endpoints: Vec<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            body: body.into(),
            queue_offset,
            receipt_handle: receipt_handle.into(),
            ack_endpoints,
            delivery_attempt: Arc::new(AtomicU32::new(1)),
        }
    }

    /// Current delivery attempt, starting at 1.
    pub fn delivery_attempt(&self) -> u32 {
        self.delivery_attempt.load(Ordering::SeqCst)
    }

    /// Bump the delivery attempt counter, returning the new value.
    ///
    /// Shared via `Arc` so every clone of this `Message` observes the
    /// bump. Redelivery in `FifoDeliveryLoop` depends on this.
    pub fn bump_delivery_attempt(&self) -> u32 {
        self.delivery_attempt.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.message_id == other.message_id
    }
}
impl Eq for Message {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_attempt_starts_at_one() {
        let msg = Message::new("id-1", Bytes::from_static(b"body"), 0, "handle", vec![]);
        assert_eq!(msg.delivery_attempt(), 1);
    }

    #[test]
    fn bump_is_shared_across_clones() {
        let msg = Message::new("id-1", Bytes::from_static(b"body"), 0, "handle", vec![]);
        let clone = msg.clone();
        clone.bump_delivery_attempt();
        assert_eq!(msg.delivery_attempt(), 2);
    }

    #[test]
    fn equality_is_by_message_id() {
        let a = Message::new("id-1", Bytes::from_static(b"a"), 0, "h1", vec![]);
        let b = Message::new("id-1", Bytes::from_static(b"different"), 5, "h2", vec![]);
        assert_eq!(a, b);
    }
}
