//! Process queue error types

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Result type for process queue operations
pub type ProcessQueueResult<T> = Result<T, ProcessQueueError>;

/// Process queue error types
#[derive(Error, Debug)]
pub enum ProcessQueueError {
    /// Transport-level failure: no response within deadline, or channel fault
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// RPC completed but the server returned a non-OK status
    #[error("rpc status error: {0}")]
    Status(#[from] tonic::Status),

    /// Configuration errors
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// A message could not be wrapped from the wire representation
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Offset store read failed during pull-mode initialization
    #[error("offset store error: {0}")]
    OffsetStoreError(String),

    /// An RPC did not complete within its deadline (spec.md §4.3/§4.6)
    #[error("rpc timed out after {0:?}")]
    Timeout(Duration),

    /// The process queue has already been dropped
    #[error("process queue dropped")]
    Dropped,

    /// Generic/catch-all errors, usually from a caught callback panic
    #[error("process queue error: {0}")]
    Generic(String),
}

impl ProcessQueueError {
    /// Whether this error represents a condition worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessQueueError::Transport(_) => true,
            ProcessQueueError::Status(status) => {
                !matches!(status.code(), tonic::Code::InvalidArgument | tonic::Code::Unimplemented)
            }
            ProcessQueueError::Timeout(_) => true,
            ProcessQueueError::OffsetStoreError(_) => false,
            ProcessQueueError::MalformedMessage(_) => false,
            ProcessQueueError::ConfigError(_) => false,
            ProcessQueueError::Dropped => false,
            ProcessQueueError::Generic(_) => false,
        }
    }

    /// Severity classification, used to pick the tracing level when logging.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ProcessQueueError::ConfigError(_) => ErrorSeverity::Fatal,
            ProcessQueueError::MalformedMessage(_) => ErrorSeverity::Warning,
            ProcessQueueError::OffsetStoreError(_) => ErrorSeverity::Fatal,
            ProcessQueueError::Timeout(_) => ErrorSeverity::Warning,
            ProcessQueueError::Dropped => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Run `fut` against a deadline, turning an expiry into
/// [`ProcessQueueError::Timeout`] instead of a bare `Elapsed`. Every RPC
/// wrapper in `rpc_ops.rs`/`fetch.rs` issues its call through this so a
/// stalled transport can never wedge the fetch or delivery loops
/// (spec.md §4.3 step 4, §4.6).
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> ProcessQueueResult<T>
where
    F: Future<Output = ProcessQueueResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_elapsed) => Err(ProcessQueueError::Timeout(deadline)),
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Warnings that don't stop processing
    Warning,
    /// Errors that may be retried
    Error,
    /// Fatal errors that stop the process queue
    Fatal,
}
