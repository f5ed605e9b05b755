//! Per-partition consumption engine for a RocketMQ-style message bus
//! client.
//!
//! A [`process_queue::ProcessQueue`] owns one partition: it fetches
//! messages (via receive-mode long-poll or pull-mode local offset
//! tracking), buffers them under backpressure in a [`store::MessageStore`],
//! hands them to a user consume function through either the unordered
//! [`delivery::BatchDeliveryLoop`] or the single-slot
//! [`delivery::FifoDeliveryLoop`], and acks, nacks or forwards to a
//! dead-letter queue depending on the result and the message's
//! delivery-attempt count.
//!
//! The RPC transport, consumption dispatch and broadcasting-offset
//! persistence are injection points ([`rpc_client::RpcClient`],
//! [`rpc_client::ConsumeNotifier`], [`rpc_client::OffsetStore`]) rather
//! than owned by this crate.

pub mod config;
pub mod delivery;
pub mod error;
pub mod fetch;
pub mod message;
pub mod metrics;
pub mod offset_ledger;
pub mod pb;
pub mod process_queue;
pub mod rate_limiter;
pub mod rpc_client;
pub mod rpc_ops;
pub mod store;
pub mod throttle;

pub use config::{Config, ConfigBuilder, ConsumeFromWhere, ListenerType, MessageModel};
pub use error::{ErrorSeverity, ProcessQueueError, ProcessQueueResult};
pub use message::{FilterExpression, Message, MessageQueue};
pub use process_queue::ProcessQueue;
pub use rpc_client::{ConsumeFrom, ConsumeNotifier, ConsumeResult, OffsetStore, RpcClient};
