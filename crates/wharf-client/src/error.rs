use thiserror::Error;
use wharf_protocol::ErrorCode;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("Broker error: {0}")]
    Broker(#[from] ErrorCode),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
