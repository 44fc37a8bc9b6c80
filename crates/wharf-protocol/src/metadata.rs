//! Cluster topology as reported by a metadata request

use serde::{Deserialize, Serialize};

/// A broker advertised by the cluster
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BrokerInfo {
    pub node_id: i32,
    pub host: String,
    pub port: u16,
}

impl BrokerInfo {
    pub fn new(node_id: i32, host: impl Into<String>, port: u16) -> Self {
        Self {
            node_id,
            host: host.into(),
            port,
        }
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicMetadata {
    pub name: String,
    pub partitions: Vec<PartitionMetadata>,
}

impl TopicMetadata {
    pub fn new(name: impl Into<String>, partitions: Vec<PartitionMetadata>) -> Self {
        Self {
            name: name.into(),
            partitions,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionMetadata {
    pub partition: u32,
    /// Leader broker id, `None` while an election is in progress
    pub leader: Option<i32>,
}

impl PartitionMetadata {
    /// A partition without a leader
    pub fn new(partition: u32) -> Self {
        Self {
            partition,
            leader: None,
        }
    }

    pub fn with_leader(mut self, leader: i32) -> Self {
        self.leader = Some(leader);
        self
    }
}

/// Full answer to a metadata request
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterMetadata {
    pub brokers: Vec<BrokerInfo>,
    pub topics: Vec<TopicMetadata>,
}

impl ClusterMetadata {
    pub fn new(brokers: Vec<BrokerInfo>, topics: Vec<TopicMetadata>) -> Self {
        Self { brokers, topics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_address() {
        let broker = BrokerInfo::new(1, "localhost", 9092);
        assert_eq!(broker.address(), "localhost:9092");
    }

    #[test]
    fn test_metadata_from_json() {
        let md: ClusterMetadata = serde_json::from_str(
            r#"{
                "brokers": [{"node_id": 1, "host": "a", "port": 9092}],
                "topics": [{"name": "tako", "partitions": [
                    {"partition": 0, "leader": 1},
                    {"partition": 1, "leader": null}
                ]}]
            }"#,
        )
        .unwrap();

        assert_eq!(md.brokers, vec![BrokerInfo::new(1, "a", 9092)]);
        assert_eq!(
            md.topics[0].partitions,
            vec![PartitionMetadata::new(0).with_leader(1), PartitionMetadata::new(1)]
        );
    }
}
