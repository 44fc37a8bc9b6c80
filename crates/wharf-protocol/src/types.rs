//! Partition selectors, offset sentinels and message payloads

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Selects one partition of a topic, or all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionSelector {
    /// Every partition the cluster reports for the topic
    All,
    /// A single cluster-assigned partition id
    Id(u32),
}

impl PartitionSelector {
    /// Returns the concrete partition id, if any
    pub fn id(&self) -> Option<u32> {
        match self {
            PartitionSelector::All => None,
            PartitionSelector::Id(id) => Some(*id),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, PartitionSelector::All)
    }
}

impl From<u32> for PartitionSelector {
    fn from(id: u32) -> Self {
        PartitionSelector::Id(id)
    }
}

impl std::fmt::Display for PartitionSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionSelector::All => write!(f, "*"),
            PartitionSelector::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Symbolic point in time used by an offset-resolution request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetTime {
    /// First offset still retained by the partition
    Earliest,
    /// Offset of the next message to be appended
    Latest,
    /// Offset matching the broker's current wall-clock position
    Now,
}

/// Where consumption of a partition starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartOffset {
    Earliest,
    Latest,
    Now,
    /// A known numeric offset, fetched directly without resolution
    At(i64),
}

impl StartOffset {
    /// The symbolic time to resolve, or `None` when the offset is already known
    pub fn resolution_time(&self) -> Option<OffsetTime> {
        match self {
            StartOffset::Earliest => Some(OffsetTime::Earliest),
            StartOffset::Latest => Some(OffsetTime::Latest),
            StartOffset::Now => Some(OffsetTime::Now),
            StartOffset::At(_) => None,
        }
    }
}

impl From<i64> for StartOffset {
    fn from(offset: i64) -> Self {
        StartOffset::At(offset)
    }
}

impl From<OffsetTime> for StartOffset {
    fn from(time: OffsetTime) -> Self {
        match time {
            OffsetTime::Earliest => StartOffset::Earliest,
            OffsetTime::Latest => StartOffset::Latest,
            OffsetTime::Now => StartOffset::Now,
        }
    }
}

/// Where consumption of a partition stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopAt {
    /// Stop at the current position, without waiting for in-flight data
    Now,
    /// Stop once this offset has been delivered (inclusive)
    Offset(i64),
}

impl From<i64> for StopAt {
    fn from(offset: i64) -> Self {
        StopAt::Offset(offset)
    }
}

/// A message payload as produced or consumed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Optional partitioning key
    #[serde(with = "crate::serde_utils::option_bytes_serde")]
    pub key: Option<Bytes>,
    /// Message value
    #[serde(with = "crate::serde_utils::bytes_serde")]
    pub value: Bytes,
}

impl Message {
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            key: None,
            value: value.into(),
        }
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Payload size in bytes, key included
    pub fn size(&self) -> usize {
        self.value.len() + self.key.as_ref().map(|k| k.len()).unwrap_or(0)
    }
}
