//! Request envelopes, partition responses and acknowledgements

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::types::{Message, OffsetTime};

// ============================================================================
// Requests
// ============================================================================

/// Fetch request for one partition, starting at `offset`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchMessage {
    pub topic: String,
    pub partition: u32,
    pub offset: i64,
    pub max_bytes: u32,
}

impl FetchMessage {
    pub fn new(topic: impl Into<String>, partition: u32, offset: i64, max_bytes: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            max_bytes,
        }
    }
}

/// Offset-resolution request for one partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetMessage {
    pub topic: String,
    pub partition: u32,
    pub time: OffsetTime,
    pub max_number_of_offsets: u32,
}

impl OffsetMessage {
    pub fn new(topic: impl Into<String>, partition: u32, time: OffsetTime) -> Self {
        Self {
            topic: topic.into(),
            partition,
            time,
            max_number_of_offsets: 1,
        }
    }
}

/// Topic-addressed request, used to group batches by topic
pub trait TopicRequest {
    fn topic(&self) -> &str;
}

impl<T: TopicRequest + ?Sized> TopicRequest for Box<T> {
    fn topic(&self) -> &str {
        (**self).topic()
    }
}

impl TopicRequest for FetchMessage {
    fn topic(&self) -> &str {
        &self.topic
    }
}

impl TopicRequest for OffsetMessage {
    fn topic(&self) -> &str {
        &self.topic
    }
}

// ============================================================================
// Responses
// ============================================================================

/// A consumed message with its log offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub offset: i64,
    pub message: Message,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPartitionResponse {
    pub partition: u32,
    pub error: ErrorCode,
    pub high_watermark: i64,
    pub messages: Vec<ResponseMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetPartitionResponse {
    pub partition: u32,
    pub error: ErrorCode,
    pub offsets: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducePartitionResponse {
    pub partition: u32,
    pub error: ErrorCode,
    /// Base offset assigned to the first appended message
    pub offset: i64,
}

/// Per-topic slice of a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicData<T> {
    pub topic: String,
    pub partitions: Vec<T>,
}

impl<T> TopicData<T> {
    pub fn new(topic: impl Into<String>, partitions: Vec<T>) -> Self {
        Self {
            topic: topic.into(),
            partitions,
        }
    }
}

/// A broker response: partition results grouped by topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonResponse<T> {
    pub topics_responses: Vec<TopicData<T>>,
}

impl<T> CommonResponse<T> {
    pub fn new(topics_responses: Vec<TopicData<T>>) -> Self {
        Self { topics_responses }
    }

    /// Single topic response
    pub fn single(topic: impl Into<String>, partitions: Vec<T>) -> Self {
        Self::new(vec![TopicData::new(topic, partitions)])
    }

    /// Iterate `(topic, partition response)` pairs in response order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.topics_responses
            .iter()
            .flat_map(|td| td.partitions.iter().map(move |p| (td.topic.as_str(), p)))
    }

    pub fn into_iter_flat(self) -> impl Iterator<Item = (String, T)> {
        self.topics_responses.into_iter().flat_map(|td| {
            let topic = td.topic;
            td.partitions.into_iter().map(move |p| (topic.clone(), p))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.topics_responses.iter().all(|td| td.partitions.is_empty())
    }
}

impl<T> Default for CommonResponse<T> {
    fn default() -> Self {
        Self {
            topics_responses: Vec::new(),
        }
    }
}

/// A broker response stamped with the instant the client received it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement<T> {
    pub response: CommonResponse<T>,
    pub received: DateTime<Utc>,
}

impl<T> Acknowledgement<T> {
    pub fn new(response: CommonResponse<T>, received: DateTime<Utc>) -> Self {
        Self { response, received }
    }

    /// Stamp a response with the current time
    pub fn now(response: CommonResponse<T>) -> Self {
        Self::new(response, Utc::now())
    }
}

pub type FetchAcknowledgement = Acknowledgement<FetchPartitionResponse>;
pub type OffsetAcknowledgement = Acknowledgement<OffsetPartitionResponse>;
