//! Broker error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error code carried by each partition of a broker response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum ErrorCode {
    #[default]
    #[error("no error")]
    NoError,

    #[error("unknown broker error")]
    Unknown,

    #[error("offset out of range")]
    OffsetOutOfRange,

    #[error("corrupt message")]
    CorruptMessage,

    #[error("unknown topic or partition")]
    UnknownTopicOrPartition,

    #[error("invalid fetch size")]
    InvalidFetchSize,

    #[error("leader not available")]
    LeaderNotAvailable,

    #[error("not leader for partition")]
    NotLeaderForPartition,

    #[error("request timed out")]
    RequestTimedOut,

    #[error("broker not available")]
    BrokerNotAvailable,

    #[error("replica not available")]
    ReplicaNotAvailable,

    #[error("message size too large")]
    MessageSizeTooLarge,

    #[error("network exception")]
    NetworkException,

    #[error("not enough replicas")]
    NotEnoughReplicas,

    #[error("not enough replicas after append")]
    NotEnoughReplicasAfterAppend,

    /// Code with no dedicated variant
    #[error("broker error code {0}")]
    Other(i16),
}

impl ErrorCode {
    /// Decode a numeric broker error code
    pub fn from_code(code: i16) -> Self {
        match code {
            0 => ErrorCode::NoError,
            -1 => ErrorCode::Unknown,
            1 => ErrorCode::OffsetOutOfRange,
            2 => ErrorCode::CorruptMessage,
            3 => ErrorCode::UnknownTopicOrPartition,
            4 => ErrorCode::InvalidFetchSize,
            5 => ErrorCode::LeaderNotAvailable,
            6 => ErrorCode::NotLeaderForPartition,
            7 => ErrorCode::RequestTimedOut,
            8 => ErrorCode::BrokerNotAvailable,
            9 => ErrorCode::ReplicaNotAvailable,
            10 => ErrorCode::MessageSizeTooLarge,
            13 => ErrorCode::NetworkException,
            19 => ErrorCode::NotEnoughReplicas,
            20 => ErrorCode::NotEnoughReplicasAfterAppend,
            other => ErrorCode::Other(other),
        }
    }

    /// Numeric broker error code
    pub fn code(&self) -> i16 {
        match self {
            ErrorCode::NoError => 0,
            ErrorCode::Unknown => -1,
            ErrorCode::OffsetOutOfRange => 1,
            ErrorCode::CorruptMessage => 2,
            ErrorCode::UnknownTopicOrPartition => 3,
            ErrorCode::InvalidFetchSize => 4,
            ErrorCode::LeaderNotAvailable => 5,
            ErrorCode::NotLeaderForPartition => 6,
            ErrorCode::RequestTimedOut => 7,
            ErrorCode::BrokerNotAvailable => 8,
            ErrorCode::ReplicaNotAvailable => 9,
            ErrorCode::MessageSizeTooLarge => 10,
            ErrorCode::NetworkException => 13,
            ErrorCode::NotEnoughReplicas => 19,
            ErrorCode::NotEnoughReplicasAfterAppend => 20,
            ErrorCode::Other(code) => *code,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ErrorCode::NoError)
    }

    /// Whether the same request may succeed once routing has been refreshed
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ErrorCode::UnknownTopicOrPartition
                | ErrorCode::LeaderNotAvailable
                | ErrorCode::NotLeaderForPartition
                | ErrorCode::RequestTimedOut
                | ErrorCode::BrokerNotAvailable
                | ErrorCode::ReplicaNotAvailable
                | ErrorCode::NetworkException
                | ErrorCode::NotEnoughReplicas
                | ErrorCode::NotEnoughReplicasAfterAppend
        )
    }
}

impl From<i16> for ErrorCode {
    fn from(code: i16) -> Self {
        ErrorCode::from_code(code)
    }
}
