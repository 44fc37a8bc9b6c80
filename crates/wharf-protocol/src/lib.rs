//! Wharf protocol types
//!
//! Value types shared by the wharf routing engine and by the node
//! implementations that talk to brokers: partition selectors, offset
//! sentinels, request envelopes, partition responses, acknowledgements,
//! broker error codes and topic-grouped batches.
//!
//! Wire encoding is left to node implementations; every type here derives
//! `serde` so any codec can carry it.
//!
//! # Example
//!
//! ```rust
//! use wharf_protocol::{
//!     Acknowledgement, CommonResponse, ErrorCode, OffsetPartitionResponse,
//! };
//!
//! let ack = Acknowledgement::now(CommonResponse::single(
//!     "poulpe",
//!     vec![OffsetPartitionResponse {
//!         partition: 0,
//!         error: ErrorCode::NoError,
//!         offsets: vec![42],
//!     }],
//! ));
//! assert_eq!(ack.response.iter().count(), 1);
//! ```

mod batch;
mod error;
mod messages;
mod metadata;
pub mod serde_utils;
mod types;

pub use batch::BatchByTopic;
pub use error::ErrorCode;
pub use messages::{
    Acknowledgement, CommonResponse, FetchAcknowledgement, FetchMessage, FetchPartitionResponse,
    OffsetAcknowledgement, OffsetMessage, OffsetPartitionResponse, ProducePartitionResponse,
    ResponseMessage, TopicData, TopicRequest,
};
pub use metadata::{BrokerInfo, ClusterMetadata, PartitionMetadata, TopicMetadata};
pub use types::{Message, OffsetTime, PartitionSelector, StartOffset, StopAt};
