//! Cluster topology contract and a metadata-backed implementation
//!
//! Routers depend only on the [`Cluster`] trait. [`MetadataCluster`] is the
//! stock implementation: it asks a [`MetadataSource`] for the cluster
//! layout, keeps one node handle per live broker and publishes every table
//! it builds through a `watch` channel, which routers subscribe to.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use wharf_protocol::{BrokerInfo, ClusterMetadata};

use crate::node::NodeHandle;
use crate::routing::{Partition, RoutingTable};
use crate::{Error, Result};

/// Topology queries routers suspend on
///
/// Both operations may be slow or fail. Callers make no assumption about
/// the completion order of concurrent calls.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Every partition id of `topic`, ascending
    async fn require_all_partitions_for_topic(&self, topic: &str) -> Result<Vec<u32>>;

    /// A freshly built routing table
    async fn require_new_routing_table(&self) -> Result<Arc<RoutingTable>>;

    /// Tables published whenever the topology changes, if the cluster pushes them
    fn subscribe(&self) -> Option<watch::Receiver<Arc<RoutingTable>>> {
        None
    }
}

/// Answers metadata requests (the bootstrap connection)
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Layout of `topics`, or of every topic when the slice is empty
    async fn fetch_metadata(&self, topics: &[String]) -> Result<ClusterMetadata>;
}

/// Opens a node for a broker advertised by the cluster
pub trait NodeFactory: Send + Sync {
    fn create(&self, broker: &BrokerInfo) -> NodeHandle;
}

struct LiveNode {
    broker: BrokerInfo,
    handle: NodeHandle,
}

pub struct MetadataCluster {
    source: Arc<dyn MetadataSource>,
    factory: Arc<dyn NodeFactory>,
    nodes: DashMap<i32, LiveNode>,
    current: watch::Sender<Arc<RoutingTable>>,
    refresh: Mutex<()>,
}

impl MetadataCluster {
    pub fn new(source: Arc<dyn MetadataSource>, factory: Arc<dyn NodeFactory>) -> Self {
        let (current, _) = watch::channel(Arc::new(RoutingTable::default()));
        Self {
            source,
            factory,
            nodes: DashMap::new(),
            current,
            refresh: Mutex::new(()),
        }
    }

    /// Last published table
    pub fn current_table(&self) -> Arc<RoutingTable> {
        self.current.borrow().clone()
    }

    pub fn node(&self, broker_id: i32) -> Option<NodeHandle> {
        self.nodes.get(&broker_id).map(|n| n.handle.clone())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Fetch metadata, reconcile nodes, build and publish a new table
    pub async fn refresh(&self) -> Result<Arc<RoutingTable>> {
        let _guard = self.refresh.lock().await;
        let metadata = self.source.fetch_metadata(&[]).await?;
        self.reconcile_nodes(&metadata.brokers);
        let table = Arc::new(self.build_table(&metadata));
        self.current.send_replace(Arc::clone(&table));
        debug!(
            brokers = metadata.brokers.len(),
            topics = metadata.topics.len(),
            "routing table refreshed"
        );
        Ok(table)
    }

    fn reconcile_nodes(&self, brokers: &[BrokerInfo]) {
        let live: HashSet<i32> = brokers.iter().map(|b| b.node_id).collect();
        self.nodes.retain(|id, node| {
            let keep = live.contains(id);
            if !keep {
                info!(broker = *id, node = %node.handle.name(), "broker left the cluster");
            }
            keep
        });

        for broker in brokers {
            let stale = self
                .nodes
                .get(&broker.node_id)
                .map(|n| n.broker != *broker)
                .unwrap_or(true);
            if stale {
                info!(broker = broker.node_id, address = %broker.address(), "opening node");
                let handle = self.factory.create(broker);
                self.nodes.insert(
                    broker.node_id,
                    LiveNode {
                        broker: broker.clone(),
                        handle,
                    },
                );
            }
        }
    }

    fn build_table(&self, metadata: &ClusterMetadata) -> RoutingTable {
        let mut routes = HashMap::with_capacity(metadata.topics.len());
        for topic in &metadata.topics {
            let partitions = topic
                .partitions
                .iter()
                .map(|p| {
                    let leader = p.leader.and_then(|id| self.node(id));
                    if leader.is_none() {
                        warn!(
                            topic = %topic.name,
                            partition = p.partition,
                            leader = ?p.leader,
                            "partition has no reachable leader"
                        );
                    }
                    Partition::new(p.partition, leader)
                })
                .collect();
            routes.insert(topic.name.clone(), partitions);
        }
        RoutingTable::new(routes)
    }
}

#[async_trait]
impl Cluster for MetadataCluster {
    async fn require_all_partitions_for_topic(&self, topic: &str) -> Result<Vec<u32>> {
        if let Some(ids) = self.current_table().partition_ids(topic) {
            if !ids.is_empty() {
                return Ok(ids);
            }
        }
        self.refresh()
            .await?
            .partition_ids(topic)
            .filter(|ids| !ids.is_empty())
            .ok_or_else(|| Error::UnknownTopic(topic.to_string()))
    }

    async fn require_new_routing_table(&self) -> Result<Arc<RoutingTable>> {
        self.refresh().await
    }

    fn subscribe(&self) -> Option<watch::Receiver<Arc<RoutingTable>>> {
        Some(self.current.subscribe())
    }
}
