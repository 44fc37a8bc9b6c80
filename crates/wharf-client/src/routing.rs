//! Routing table snapshots and the per-router queue of requests awaiting one

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::node::NodeHandle;

/// One partition and its current leader
#[derive(Clone)]
pub struct Partition {
    pub id: u32,
    pub leader: Option<NodeHandle>,
}

impl Partition {
    pub fn new(id: u32, leader: Option<NodeHandle>) -> Self {
        Self { id, leader }
    }

    pub fn with_leader(id: u32, leader: NodeHandle) -> Self {
        Self::new(id, Some(leader))
    }

    pub fn leaderless(id: u32) -> Self {
        Self::new(id, None)
    }
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition")
            .field("id", &self.id)
            .field("leader", &self.leader.as_ref().map(|n| n.name()))
            .finish()
    }
}

/// Immutable topic → partitions snapshot
///
/// Partitions of a topic are ordered by id. A table is never modified once
/// built; topology changes produce a new table.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<String, Arc<[Partition]>>,
}

impl RoutingTable {
    pub fn new(routes: HashMap<String, Vec<Partition>>) -> Self {
        let routes = routes
            .into_iter()
            .map(|(topic, mut partitions)| {
                partitions.sort_by_key(|p| p.id);
                (topic, Arc::from(partitions))
            })
            .collect();
        Self { routes }
    }

    pub fn partitions(&self, topic: &str) -> Option<&[Partition]> {
        self.routes.get(topic).map(|p| &p[..])
    }

    /// Leader of a partition; `None` when the topic, the partition or its leader is unknown
    pub fn leader(&self, topic: &str, partition: u32) -> Option<&NodeHandle> {
        let partitions = self.partitions(topic)?;
        let idx = partitions
            .binary_search_by_key(&partition, |p| p.id)
            .ok()?;
        partitions[idx].leader.as_ref()
    }

    pub fn partition_ids(&self, topic: &str) -> Option<Vec<u32>> {
        self.partitions(topic)
            .map(|partitions| partitions.iter().map(|p| p.id).collect())
    }

    /// Partitions of a topic that currently have a leader
    pub fn routable(&self, topic: &str) -> Vec<&Partition> {
        self.partitions(topic)
            .map(|partitions| partitions.iter().filter(|p| p.leader.is_some()).collect())
            .unwrap_or_default()
    }

    pub fn contains_topic(&self, topic: &str) -> bool {
        self.routes.contains_key(topic)
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

// ============================================================================
// Route queue
// ============================================================================

/// Requests of one router waiting for a routing table
///
/// `waiting` requests are covered by the routing refresh currently in
/// flight. `postponed` requests could not be routed with the last table and
/// wait for a newer one.
#[derive(Debug)]
pub(crate) struct RouteQueue<R> {
    latest: Option<Arc<RoutingTable>>,
    refreshing: bool,
    retry_armed: bool,
    waiting: Vec<R>,
    postponed: Vec<R>,
}

impl<R> RouteQueue<R> {
    pub(crate) fn new() -> Self {
        Self {
            latest: None,
            refreshing: false,
            retry_armed: false,
            waiting: Vec::new(),
            postponed: Vec::new(),
        }
    }

    /// Returns `true` when the caller must start a routing refresh
    pub(crate) fn enqueue(&mut self, request: R) -> bool {
        self.waiting.push(request);
        if self.refreshing {
            false
        } else {
            self.refreshing = true;
            true
        }
    }

    /// A refresh completed: every waiting and postponed request is handed back
    pub(crate) fn on_table(&mut self, table: Arc<RoutingTable>) -> Vec<R> {
        self.refreshing = false;
        self.latest = Some(table);
        let mut ready = std::mem::take(&mut self.waiting);
        ready.append(&mut self.postponed);
        ready
    }

    /// A refresh failed: waiting requests are handed back for postponement
    pub(crate) fn on_refresh_failed(&mut self) -> Vec<R> {
        self.refreshing = false;
        std::mem::take(&mut self.waiting)
    }

    /// A table was pushed by the cluster without being requested
    pub(crate) fn on_push(&mut self, table: Arc<RoutingTable>) -> Vec<R> {
        self.latest = Some(table);
        std::mem::take(&mut self.postponed)
    }

    /// Returns `true` when the caller must arm the retry timer
    pub(crate) fn postpone(&mut self, request: R) -> bool {
        self.postponed.push(request);
        if self.retry_armed {
            false
        } else {
            self.retry_armed = true;
            true
        }
    }

    /// The retry timer fired: postponed requests are handed back
    pub(crate) fn on_retry(&mut self) -> Vec<R> {
        self.retry_armed = false;
        std::mem::take(&mut self.postponed)
    }

    pub(crate) fn latest(&self) -> Option<&Arc<RoutingTable>> {
        self.latest.as_ref()
    }

    pub(crate) fn postponed_len(&self) -> usize {
        self.postponed.len()
    }

    pub(crate) fn waiting_len(&self) -> usize {
        self.waiting.len()
    }
}
