//! Generated wire types and the conversions between them and the
//! engine's domain types.
//!
//! The generated module is produced by `build.rs` via `tonic-build`,
//! the same mechanism the teacher's sibling services use for their
//! gRPC surfaces.

use crate::message::Message as DomainMessage;

tonic::include_proto!("rocketmq.process_queue.v1");

/// Normalized outcome of a receive/pull RPC, collapsing the wire
/// `Code` enum down to the four cases §6 assigns distinct handling to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Ok,
    ResourceExhausted,
    DeadlineExceeded,
    /// Everything else (`NOT_FOUND`, `DATA_CORRUPTED`, `CODE_UNSPECIFIED`,
    /// and any future code) is treated as an opaque internal failure.
    Internal,
}

impl From<Code> for FetchStatus {
    fn from(code: Code) -> Self {
        match code {
            Code::Ok => FetchStatus::Ok,
            Code::ResourceExhausted => FetchStatus::ResourceExhausted,
            Code::DeadlineExceeded => FetchStatus::DeadlineExceeded,
            Code::NotFound | Code::DataCorrupted | Code::CodeUnspecified => FetchStatus::Internal,
        }
    }
}

impl Status {
    pub fn fetch_status(&self) -> FetchStatus {
        Code::try_from(self.code).unwrap_or(Code::CodeUnspecified).into()
    }

    pub fn is_ok(&self) -> bool {
        self.fetch_status() == FetchStatus::Ok
    }
}

impl From<Message> for DomainMessage {
    fn from(wire: Message) -> Self {
        let mut msg = DomainMessage::new(wire.message_id, wire.body, wire.queue_offset, wire.receipt_handle, Vec::new());
        for _ in 1..wire.delivery_attempt.max(1) {
            msg.bump_delivery_attempt();
        }
        msg
    }
}

pub fn resource(name: impl Into<String>) -> Resource {
    Resource { arn: String::new(), name: name.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_codes_collapse_to_internal() {
        assert_eq!(FetchStatus::from(Code::NotFound), FetchStatus::Internal);
        assert_eq!(FetchStatus::from(Code::DataCorrupted), FetchStatus::Internal);
        assert_eq!(FetchStatus::from(Code::CodeUnspecified), FetchStatus::Internal);
    }

    #[test]
    fn wire_message_carries_delivery_attempt_forward() {
        let wire = Message {
            message_id: "id".into(),
            body: vec![1, 2, 3],
            queue_offset: 42,
            receipt_handle: "handle".into(),
            delivery_attempt: 3,
        };
        let domain: DomainMessage = wire.into();
        assert_eq!(domain.delivery_attempt(), 3);
    }
}
