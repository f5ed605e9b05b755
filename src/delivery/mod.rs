//! Consume-result handling: what happens to a message once the user's
//! consume function has returned, split by delivery mode.

pub mod batch;
pub mod fifo;

pub use batch::BatchDeliveryLoop;
pub use fifo::FifoDeliveryLoop;
