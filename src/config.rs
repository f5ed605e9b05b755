//! Consumer configuration surface and builder.
//!
//! Grounded in the teacher's `ConsumerConfig`/`ConsumerConfigBuilder`
//! pair (`backpressure`/`config.rs` in both the top-level and
//! `rust-implementation` copies): a plain data struct plus a builder
//! that validates before handing out a `Config`, so an invalid
//! combination can never reach a running `ProcessQueue`.

use crate::error::{ProcessQueueError, ProcessQueueResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where a partition's cursor starts when no prior offset is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumeFromWhere {
    Beginning,
    End,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageModel {
    Clustering,
    Broadcasting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListenerType {
    Concurrent,
    Orderly,
}

/// Fixed timing constants from spec.md §6. Not configurable. Callers
/// that need different values are expected to fork the constant, not
/// thread a parameter through every call site.
pub mod timing {
    use std::time::Duration;

    /// Default for `Config::io_timeout`, the one fixed-timing entry
    /// spec.md §6 lists under the *configurable* surface rather than
    /// among the fixed constants.
    pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(3);
    /// Deadline for every `receive_message` RPC (spec.md §4.3 step 4, §6).
    pub const RECEIVE_LONG_POLL_TIMEOUT: Duration = Duration::from_secs(15);
    /// Deadline for every `pull_message` RPC (spec.md §6).
    pub const PULL_LONG_POLL_TIMEOUT: Duration = Duration::from_secs(15);
    pub const LATER_DELAY: Duration = Duration::from_millis(3_000);
    pub const ACK_FIFO_MESSAGE_DELAY: Duration = Duration::from_millis(100);
    pub const REDIRECT_FIFO_TO_DLQ_DELAY: Duration = Duration::from_millis(100);
}

/// Validated runtime configuration for one consumer instance.
///
/// Construct via [`ConfigBuilder`]; there is no public constructor on
/// `Config` itself so an instance in hand is always valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub max_delivery_attempts: u32,
    pub max_await_batch_size_per_queue: i32,
    pub max_await_time_per_queue: Duration,
    pub consumption_timeout: Duration,
    pub fifo_consumption_suspend_time: Duration,
    pub consume_from_where: ConsumeFromWhere,
    pub consume_from_time_millis: i64,
    pub message_model: MessageModel,
    pub listener_type: ListenerType,
    pub cached_messages_quantity_threshold_per_queue: u64,
    pub cached_messages_bytes_threshold_per_queue: u64,
    /// Default RPC deadline for ack/nack/forward/query-offset calls
    /// (spec.md §6's `IoTimeoutMillis`). Receive/pull calls use the
    /// fixed `RECEIVE_LONG_POLL_TIMEOUT`/`PULL_LONG_POLL_TIMEOUT`
    /// instead, since those are long-poll RPCs by design.
    pub io_timeout: Duration,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    max_delivery_attempts: u32,
    max_await_batch_size_per_queue: i32,
    max_await_time_per_queue: Duration,
    consumption_timeout: Duration,
    fifo_consumption_suspend_time: Duration,
    consume_from_where: ConsumeFromWhere,
    consume_from_time_millis: i64,
    message_model: MessageModel,
    listener_type: ListenerType,
    cached_messages_quantity_threshold_per_queue: u64,
    cached_messages_bytes_threshold_per_queue: u64,
    io_timeout: Duration,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            max_delivery_attempts: 16,
            max_await_batch_size_per_queue: 32,
            max_await_time_per_queue: Duration::from_millis(15_000),
            consumption_timeout: Duration::from_secs(15),
            fifo_consumption_suspend_time: Duration::from_millis(1_000),
            consume_from_where: ConsumeFromWhere::Beginning,
            consume_from_time_millis: 0,
            message_model: MessageModel::Clustering,
            listener_type: ListenerType::Concurrent,
            cached_messages_quantity_threshold_per_queue: 1_000,
            cached_messages_bytes_threshold_per_queue: 100 * 1024 * 1024,
            io_timeout: timing::DEFAULT_IO_TIMEOUT,
        }
    }
}

impl ConfigBuilder {
    pub fn max_delivery_attempts(mut self, value: u32) -> Self {
        self.max_delivery_attempts = value;
        self
    }

    pub fn max_await_batch_size_per_queue(mut self, value: i32) -> Self {
        self.max_await_batch_size_per_queue = value;
        self
    }

    pub fn max_await_time_per_queue(mut self, value: Duration) -> Self {
        self.max_await_time_per_queue = value;
        self
    }

    pub fn consumption_timeout(mut self, value: Duration) -> Self {
        self.consumption_timeout = value;
        self
    }

    pub fn fifo_consumption_suspend_time(mut self, value: Duration) -> Self {
        self.fifo_consumption_suspend_time = value;
        self
    }

    pub fn consume_from_where(mut self, value: ConsumeFromWhere) -> Self {
        self.consume_from_where = value;
        self
    }

    pub fn consume_from_time_millis(mut self, value: i64) -> Self {
        self.consume_from_time_millis = value;
        self
    }

    pub fn message_model(mut self, value: MessageModel) -> Self {
        self.message_model = value;
        self
    }

    pub fn listener_type(mut self, value: ListenerType) -> Self {
        self.listener_type = value;
        self
    }

    pub fn cached_messages_quantity_threshold_per_queue(mut self, value: u64) -> Self {
        self.cached_messages_quantity_threshold_per_queue = value;
        self
    }

    pub fn cached_messages_bytes_threshold_per_queue(mut self, value: u64) -> Self {
        self.cached_messages_bytes_threshold_per_queue = value;
        self
    }

    pub fn io_timeout(mut self, value: Duration) -> Self {
        self.io_timeout = value;
        self
    }

    pub fn build(self) -> ProcessQueueResult<Config> {
        self.validate()?;
        Ok(Config {
            max_delivery_attempts: self.max_delivery_attempts,
            max_await_batch_size_per_queue: self.max_await_batch_size_per_queue,
            max_await_time_per_queue: self.max_await_time_per_queue,
            consumption_timeout: self.consumption_timeout,
            fifo_consumption_suspend_time: self.fifo_consumption_suspend_time,
            consume_from_where: self.consume_from_where,
            consume_from_time_millis: self.consume_from_time_millis,
            message_model: self.message_model,
            listener_type: self.listener_type,
            cached_messages_quantity_threshold_per_queue: self.cached_messages_quantity_threshold_per_queue,
            cached_messages_bytes_threshold_per_queue: self.cached_messages_bytes_threshold_per_queue,
            io_timeout: self.io_timeout,
        })
    }

    fn validate(&self) -> ProcessQueueResult<()> {
        if self.max_delivery_attempts == 0 {
            return Err(ProcessQueueError::ConfigError("max_delivery_attempts must be at least 1".into()));
        }
        if self.max_await_batch_size_per_queue <= 0 {
            return Err(ProcessQueueError::ConfigError("max_await_batch_size_per_queue must be positive".into()));
        }
        if self.consume_from_where == ConsumeFromWhere::Timestamp && self.consume_from_time_millis < 0 {
            return Err(ProcessQueueError::ConfigError("consume_from_time_millis must be non-negative for Timestamp".into()));
        }
        if self.cached_messages_quantity_threshold_per_queue == 0 {
            return Err(ProcessQueueError::ConfigError("cached_messages_quantity_threshold_per_queue must be positive".into()));
        }
        if self.cached_messages_bytes_threshold_per_queue == 0 {
            return Err(ProcessQueueError::ConfigError("cached_messages_bytes_threshold_per_queue must be positive".into()));
        }
        if self.io_timeout.is_zero() {
            return Err(ProcessQueueError::ConfigError("io_timeout must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_successfully() {
        assert!(Config::builder().build().is_ok());
    }

    #[test]
    fn zero_delivery_attempts_is_rejected() {
        let result = Config::builder().max_delivery_attempts(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn timestamp_policy_requires_non_negative_time() {
        let result = Config::builder()
            .consume_from_where(ConsumeFromWhere::Timestamp)
            .consume_from_time_millis(-1)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn zero_io_timeout_is_rejected() {
        let result = Config::builder().io_timeout(Duration::ZERO).build();
        assert!(result.is_err());
    }

    #[test]
    fn io_timeout_defaults_to_the_fixed_constant() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config.io_timeout, timing::DEFAULT_IO_TIMEOUT);
    }

    #[test]
    fn builder_overrides_are_reflected() {
        let config = Config::builder()
            .max_delivery_attempts(5)
            .message_model(MessageModel::Broadcasting)
            .listener_type(ListenerType::Orderly)
            .build()
            .unwrap();
        assert_eq!(config.max_delivery_attempts, 5);
        assert_eq!(config.message_model, MessageModel::Broadcasting);
        assert_eq!(config.listener_type, ListenerType::Orderly);
    }
}
