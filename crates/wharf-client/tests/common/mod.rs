//! Shared fixtures for router integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use wharf_client::{
    Cluster, Error, Node, NodeHandle, Partition, ProduceMessage, RequestBatch, Result,
    RoutingTable,
};
use wharf_protocol::{FetchMessage, OffsetMessage};

pub const TOPIC: &str = "poulpe";
pub const TOPIC2: &str = "tako";
pub const OFFSET: i64 = 42;
pub const PARTITION: u32 = 0;

// ==================== Mock node ====================

/// Records every request it is handed
#[derive(Default)]
pub struct MockNode {
    name: String,
    pub fetches: Mutex<Vec<FetchMessage>>,
    pub offsets: Mutex<Vec<OffsetMessage>>,
    pub produces: Mutex<Vec<Box<ProduceMessage>>>,
    pub posts: Mutex<Vec<RequestBatch>>,
}

impl MockNode {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            ..Default::default()
        })
    }

    pub fn fetches(&self) -> Vec<FetchMessage> {
        self.fetches.lock().clone()
    }

    pub fn offsets(&self) -> Vec<OffsetMessage> {
        self.offsets.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().len()
    }

    pub fn offset_count(&self) -> usize {
        self.offsets.lock().len()
    }

    pub fn produce_count(&self) -> usize {
        self.produces.lock().len()
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().len()
    }

    /// Hand back every envelope received through `produce`
    pub fn take_produces(&self) -> Vec<Box<ProduceMessage>> {
        std::mem::take(&mut *self.produces.lock())
    }

    pub fn take_posts(&self) -> Vec<RequestBatch> {
        std::mem::take(&mut *self.posts.lock())
    }
}

impl Node for MockNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, request: FetchMessage) {
        self.fetches.lock().push(request);
    }

    fn offset(&self, request: OffsetMessage) {
        self.offsets.lock().push(request);
    }

    fn produce(&self, message: Box<ProduceMessage>) {
        self.produces.lock().push(message);
    }

    fn post(&self, batch: RequestBatch) {
        self.posts.lock().push(batch);
    }
}

pub fn handle(node: &Arc<MockNode>) -> NodeHandle {
    node.clone()
}

// ==================== Routing tables ====================

/// Every listed partition of `topic` led by `node`
pub fn led_by(node: &Arc<MockNode>, topic: &str, partitions: &[u32]) -> (String, Vec<Partition>) {
    (
        topic.to_string(),
        partitions
            .iter()
            .map(|id| Partition::with_leader(*id, handle(node)))
            .collect(),
    )
}

pub fn leaderless(topic: &str, partitions: &[u32]) -> (String, Vec<Partition>) {
    (
        topic.to_string(),
        partitions.iter().map(|id| Partition::leaderless(*id)).collect(),
    )
}

pub fn table(routes: Vec<(String, Vec<Partition>)>) -> Arc<RoutingTable> {
    Arc::new(RoutingTable::new(routes.into_iter().collect::<HashMap<_, _>>()))
}

// ==================== Mock cluster ====================

/// Serves a fixed routing table and partition lists
pub struct MockCluster {
    table: Mutex<Arc<RoutingTable>>,
    partitions: Mutex<HashMap<String, Vec<u32>>>,
    fail_routing: AtomicBool,
    pub routing_calls: AtomicUsize,
    pub partition_requests: Mutex<Vec<String>>,
    push: Option<watch::Sender<Arc<RoutingTable>>>,
}

impl MockCluster {
    pub fn new(table: Arc<RoutingTable>) -> Arc<Self> {
        Arc::new(Self::build(table, None))
    }

    /// A cluster whose table changes are pushed to subscribers
    pub fn with_push(table: Arc<RoutingTable>) -> Arc<Self> {
        let (tx, _) = watch::channel(Arc::clone(&table));
        Arc::new(Self::build(table, Some(tx)))
    }

    fn build(table: Arc<RoutingTable>, push: Option<watch::Sender<Arc<RoutingTable>>>) -> Self {
        Self {
            table: Mutex::new(table),
            partitions: Mutex::new(HashMap::new()),
            fail_routing: AtomicBool::new(false),
            routing_calls: AtomicUsize::new(0),
            partition_requests: Mutex::new(Vec::new()),
            push,
        }
    }

    pub fn set_partitions(&self, topic: &str, partitions: &[u32]) {
        self.partitions
            .lock()
            .insert(topic.to_string(), partitions.to_vec());
    }

    pub fn set_table(&self, table: Arc<RoutingTable>) {
        *self.table.lock() = Arc::clone(&table);
        if let Some(push) = &self.push {
            push.send_replace(table);
        }
    }

    pub fn fail_routing(&self, fail: bool) {
        self.fail_routing.store(fail, Ordering::SeqCst);
    }

    pub fn routing_calls(&self) -> usize {
        self.routing_calls.load(Ordering::SeqCst)
    }

    pub fn partition_requests(&self) -> Vec<String> {
        self.partition_requests.lock().clone()
    }
}

#[async_trait]
impl Cluster for MockCluster {
    async fn require_all_partitions_for_topic(&self, topic: &str) -> Result<Vec<u32>> {
        self.partition_requests.lock().push(topic.to_string());
        self.partitions
            .lock()
            .get(topic)
            .cloned()
            .ok_or_else(|| Error::UnknownTopic(topic.to_string()))
    }

    async fn require_new_routing_table(&self) -> Result<Arc<RoutingTable>> {
        self.routing_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_routing.load(Ordering::SeqCst) {
            return Err(Error::MetadataUnavailable("bootstrap unreachable".into()));
        }
        Ok(Arc::clone(&self.table.lock()))
    }

    fn subscribe(&self) -> Option<watch::Receiver<Arc<RoutingTable>>> {
        self.push.as_ref().map(|tx| tx.subscribe())
    }
}

/// Drain every event currently queued
pub fn drain<T>(rx: &mut tokio::sync::mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
