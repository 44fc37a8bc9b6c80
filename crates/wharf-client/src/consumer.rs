//! Consume router: per-partition fetch state machines
//!
//! A [`ConsumeRouter`] owns the consumption state of every partition it was
//! asked to read and is driven through a cloneable [`ConsumeRouterHandle`].
//! Each partition moves through
//!
//! ```text
//! AwaitingOffset ──offset ack──▶ Fetching ──fetch ack──▶ Fetching ...
//!        │                          │
//!        └────────── stop / error ──┴──▶ Stopped | Errored
//! ```
//!
//! and only a new start leaves `Stopped` or `Errored`.
//!
//! # Features
//!
//! - **Cursor filtering**: messages below the partition cursor are dropped,
//!   so duplicated or overlapping fetch responses are harmless
//! - **Stop markers**: stop now, or once a given offset has been delivered
//! - **Postponement**: requests for partitions without a known leader wait
//!   for a newer routing table instead of failing
//! - **Batching**: per node (the node decides) or global (the router posts
//!   one topic-grouped batch per node)
//!
//! # Example
//!
//! ```rust,ignore
//! use wharf_client::{ClientConfig, ConsumeRouter, ConsumerEvent};
//! use wharf_protocol::{PartitionSelector, StartOffset};
//!
//! let (router, handle, mut events) = ConsumeRouter::new(cluster, ClientConfig::default());
//! router.spawn();
//!
//! handle.start_consume("events", PartitionSelector::All, StartOffset::Earliest);
//!
//! while let Some(event) = events.recv().await {
//!     if let ConsumerEvent::MessageReceived(record) = event {
//!         println!("{}/{}@{}", record.topic, record.partition, record.offset);
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use wharf_protocol::{
    BatchByTopic, ErrorCode, FetchAcknowledgement, FetchMessage, FetchPartitionResponse, Message,
    OffsetAcknowledgement, OffsetMessage, OffsetPartitionResponse, OffsetTime, PartitionSelector,
    StartOffset, StopAt,
};

use crate::batching::{GlobalBatcher, NodeBatch, Pushed};
use crate::cluster::Cluster;
use crate::config::{BatchStrategy, ClientConfig};
use crate::node::{NodeHandle, RequestBatch};
use crate::routing::{RouteQueue, RoutingTable};
use crate::scheduler::{Scheduler, Wake};
use crate::stats::{RouterStats, RouterStatsSnapshot};
use crate::{Error, Result};

// ============================================================================
// Events
// ============================================================================

/// A message delivered from a partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    pub topic: String,
    pub partition: u32,
    pub offset: i64,
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerEvent {
    MessageReceived(ConsumedRecord),
    /// A request found no leader; raised once per request
    FetchPostponed { topic: String, partition: u32 },
    /// The broker reported an error; the partition stays errored until restarted
    PartitionError {
        topic: String,
        partition: u32,
        error: ErrorCode,
    },
    /// Partitions of a topic could not be enumerated for an all-partitions start
    PartitionsUnavailable { topic: String, reason: Error },
}

// ============================================================================
// Partition state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumePhase {
    AwaitingOffset,
    Fetching,
    Stopped,
    Errored(ErrorCode),
}

impl ConsumePhase {
    pub fn is_active(&self) -> bool {
        matches!(self, ConsumePhase::AwaitingOffset | ConsumePhase::Fetching)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopMarker {
    Never,
    /// Last offset to deliver
    At(i64),
}

impl StopMarker {
    fn admits(&self, offset: i64) -> bool {
        match self {
            StopMarker::Never => true,
            StopMarker::At(last) => offset <= *last,
        }
    }

    /// Nothing at or past `cursor` may be delivered
    fn reached(&self, cursor: i64) -> bool {
        matches!(self, StopMarker::At(last) if *last < cursor)
    }
}

#[derive(Debug)]
struct ConsumeEntry {
    next_offset: Option<i64>,
    stop: StopMarker,
    phase: ConsumePhase,
    started_at: DateTime<Utc>,
    epoch: u64,
}

type PartitionKey = (String, u32);

fn partition_key(topic: &str, partition: u32) -> PartitionKey {
    (topic.to_string(), partition)
}

// ============================================================================
// Commands
// ============================================================================

enum Command {
    Start {
        topic: String,
        selector: PartitionSelector,
        offset: StartOffset,
    },
    Stop {
        topic: String,
        selector: PartitionSelector,
        at: StopAt,
    },
    OffsetsAcknowledged(OffsetAcknowledgement),
    FetchAcknowledged(FetchAcknowledgement),
    PartitionsResolved {
        topic: String,
        offset: StartOffset,
        result: Result<Vec<u32>>,
    },
    RoutingResolved(Result<Arc<RoutingTable>>),
    RetryPostponed,
    FlushFetches(u64),
    FlushOffsets(u64),
}

enum ConsumeRequest {
    Fetch(FetchMessage),
    Offset(OffsetMessage),
}

impl ConsumeRequest {
    fn topic(&self) -> &str {
        match self {
            ConsumeRequest::Fetch(f) => &f.topic,
            ConsumeRequest::Offset(o) => &o.topic,
        }
    }

    fn partition(&self) -> u32 {
        match self {
            ConsumeRequest::Fetch(f) => f.partition,
            ConsumeRequest::Offset(o) => o.partition,
        }
    }
}

/// All-partitions starts of one topic still waiting for enumeration
#[derive(Debug, Default)]
struct Enumeration {
    in_flight: usize,
    /// `stop_consume(All)` received meanwhile, applied to the resolved partitions
    stop: Option<StopAt>,
}

struct PendingRequest {
    request: ConsumeRequest,
    /// Epoch of the entry the request was issued for
    epoch: u64,
    notified: bool,
}

// ============================================================================
// Handle
// ============================================================================

/// Cheap, cloneable front of a [`ConsumeRouter`]
///
/// Every call only enqueues a command. Failures are reported as
/// [`ConsumerEvent`]s, never returned.
#[derive(Clone)]
pub struct ConsumeRouterHandle {
    commands: mpsc::UnboundedSender<Command>,
    stats: Arc<RouterStats>,
}

impl ConsumeRouterHandle {
    pub fn start_consume(
        &self,
        topic: impl Into<String>,
        selector: PartitionSelector,
        offset: StartOffset,
    ) {
        self.send(Command::Start {
            topic: topic.into(),
            selector,
            offset,
        });
    }

    pub fn stop_consume(&self, topic: impl Into<String>, selector: PartitionSelector, at: StopAt) {
        self.send(Command::Stop {
            topic: topic.into(),
            selector,
            at,
        });
    }

    /// Entry point for offset-resolution responses
    pub fn acknowledge_offsets(&self, ack: OffsetAcknowledgement) {
        self.send(Command::OffsetsAcknowledged(ack));
    }

    /// Entry point for fetch responses
    pub fn acknowledge_fetch(&self, ack: FetchAcknowledgement) {
        self.send(Command::FetchAcknowledged(ack));
    }

    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("consume router has stopped, command dropped");
        }
    }
}

// ============================================================================
// Router
// ============================================================================

pub struct ConsumeRouter {
    cluster: Arc<dyn Cluster>,
    config: ClientConfig,
    scheduler: Scheduler<Command>,
    entries: HashMap<PartitionKey, ConsumeEntry>,
    enumerating: HashMap<String, Enumeration>,
    routes: RouteQueue<PendingRequest>,
    fetches: GlobalBatcher<FetchMessage>,
    offsets: GlobalBatcher<OffsetMessage>,
    events: mpsc::UnboundedSender<ConsumerEvent>,
    stats: Arc<RouterStats>,
    epochs: u64,
}

impl ConsumeRouter {
    pub fn new(
        cluster: Arc<dyn Cluster>,
        config: ClientConfig,
    ) -> (
        Self,
        ConsumeRouterHandle,
        mpsc::UnboundedReceiver<ConsumerEvent>,
    ) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(RouterStats::new());
        let scheduler = Scheduler::new(commands_rx, cluster.subscribe());

        let router = Self {
            fetches: GlobalBatcher::new(config.consume_batch_size, config.consume_buffering()),
            offsets: GlobalBatcher::new(config.consume_batch_size, config.consume_buffering()),
            cluster,
            config,
            scheduler,
            entries: HashMap::new(),
            enumerating: HashMap::new(),
            routes: RouteQueue::new(),
            events: events_tx,
            stats: Arc::clone(&stats),
            epochs: 0,
        };
        let handle = ConsumeRouterHandle {
            commands: commands_tx,
            stats,
        };
        (router, handle, events_rx)
    }

    /// Run on the current tokio runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process work until every handle is dropped, then flush global batches
    pub async fn run(mut self) {
        info!(strategy = ?self.config.batch_strategy, "consume router started");
        while let Some(wake) = self.scheduler.next().await {
            self.handle(wake);
        }
        self.flush();
        info!(
            partitions = self.entries.len(),
            postponed = self.routes.postponed_len(),
            suspended = self.scheduler.suspended_len(),
            "consume router stopped"
        );
    }

    /// Process everything that can progress without waiting on a timer
    pub async fn run_until_idle(&mut self) {
        while let Some(wake) = self.scheduler.next_ready().await {
            self.handle(wake);
        }
    }

    pub fn phase(&self, topic: &str, partition: u32) -> Option<ConsumePhase> {
        self.entries.get(&partition_key(topic, partition)).map(|e| e.phase)
    }

    /// Cursor of a partition; `None` until its start offset is resolved
    pub fn next_offset(&self, topic: &str, partition: u32) -> Option<i64> {
        self.entries
            .get(&partition_key(topic, partition))
            .and_then(|e| e.next_offset)
    }

    /// Requests waiting for a routing table with a leader
    pub fn postponed(&self) -> usize {
        self.routes.postponed_len()
    }

    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    fn handle(&mut self, wake: Wake<Command>) {
        match wake {
            Wake::RoutingTable(table) => {
                let ready = self.routes.on_push(Arc::clone(&table));
                self.route_all(&table, ready);
            }
            Wake::Command(command) => self.execute(command),
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Start {
                topic,
                selector,
                offset,
            } => self.start(topic, selector, offset),
            Command::Stop {
                topic,
                selector,
                at,
            } => self.stop(&topic, selector, at),
            Command::OffsetsAcknowledged(ack) => {
                let received = ack.received;
                for (topic, response) in ack.response.into_iter_flat() {
                    self.on_offset_response(topic, response, received);
                }
            }
            Command::FetchAcknowledged(ack) => {
                let received = ack.received;
                for (topic, response) in ack.response.into_iter_flat() {
                    self.on_fetch_response(topic, response, received);
                }
            }
            Command::PartitionsResolved {
                topic,
                offset,
                result,
            } => match result {
                Ok(partitions) => {
                    debug!(topic = %topic, partitions = partitions.len(), "starting every partition");
                    let stop = self.settle_enumeration(&topic);
                    for &partition in &partitions {
                        self.start_partition(&topic, partition, offset);
                    }
                    if let Some(at) = stop {
                        for partition in partitions {
                            self.stop_partition(&topic, partition, at);
                        }
                    }
                }
                Err(reason) => {
                    self.settle_enumeration(&topic);
                    warn!(topic = %topic, error = %reason, "cannot enumerate partitions");
                    self.emit(ConsumerEvent::PartitionsUnavailable { topic, reason });
                }
            },
            Command::RoutingResolved(Ok(table)) => {
                let ready = self.routes.on_table(Arc::clone(&table));
                self.route_all(&table, ready);
            }
            Command::RoutingResolved(Err(e)) => {
                warn!(error = %e, "routing table refresh failed");
                for pending in self.routes.on_refresh_failed() {
                    self.postpone(pending);
                }
            }
            Command::RetryPostponed => {
                for pending in self.routes.on_retry() {
                    self.enqueue(pending);
                }
            }
            Command::FlushFetches(generation) => {
                if let Some(batches) = self.fetches.expire(generation) {
                    self.post(batches, RequestBatch::Fetch);
                }
            }
            Command::FlushOffsets(generation) => {
                if let Some(batches) = self.offsets.expire(generation) {
                    self.post(batches, RequestBatch::Offset);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Start / stop
    // ------------------------------------------------------------------

    fn start(&mut self, topic: String, selector: PartitionSelector, offset: StartOffset) {
        match selector {
            PartitionSelector::Id(partition) => self.start_partition(&topic, partition, offset),
            PartitionSelector::All => {
                let enumeration = self.enumerating.entry(topic.clone()).or_default();
                enumeration.in_flight += 1;
                enumeration.stop = None;
                let cluster = Arc::clone(&self.cluster);
                self.scheduler.suspend(async move {
                    let result = cluster.require_all_partitions_for_topic(&topic).await;
                    Command::PartitionsResolved {
                        topic,
                        offset,
                        result,
                    }
                });
            }
        }
    }

    /// Close one enumeration of `topic`, returning the stop to apply to its partitions
    fn settle_enumeration(&mut self, topic: &str) -> Option<StopAt> {
        let enumeration = self.enumerating.get_mut(topic)?;
        enumeration.in_flight = enumeration.in_flight.saturating_sub(1);
        let stop = enumeration.stop;
        if enumeration.in_flight == 0 {
            self.enumerating.remove(topic);
        }
        stop
    }

    fn start_partition(&mut self, topic: &str, partition: u32, offset: StartOffset) {
        let request = match offset {
            StartOffset::At(at) => ConsumeRequest::Fetch(FetchMessage::new(
                topic,
                partition,
                at,
                self.config.fetch_message_max_bytes,
            )),
            StartOffset::Earliest => {
                ConsumeRequest::Offset(OffsetMessage::new(topic, partition, OffsetTime::Earliest))
            }
            StartOffset::Latest => {
                ConsumeRequest::Offset(OffsetMessage::new(topic, partition, OffsetTime::Latest))
            }
            StartOffset::Now => {
                ConsumeRequest::Offset(OffsetMessage::new(topic, partition, OffsetTime::Now))
            }
        };
        let (phase, next_offset) = match &request {
            ConsumeRequest::Fetch(fetch) => (ConsumePhase::Fetching, Some(fetch.offset)),
            ConsumeRequest::Offset(_) => (ConsumePhase::AwaitingOffset, None),
        };

        self.epochs += 1;
        let epoch = self.epochs;
        let replaced = self.entries.insert(
            partition_key(topic, partition),
            ConsumeEntry {
                next_offset,
                stop: StopMarker::Never,
                phase,
                started_at: Utc::now(),
                epoch,
            },
        );
        info!(
            topic = %topic,
            partition,
            offset = ?offset,
            restarted = replaced.is_some(),
            "starting partition"
        );

        self.enqueue(PendingRequest {
            request,
            epoch,
            notified: false,
        });
    }

    fn stop(&mut self, topic: &str, selector: PartitionSelector, at: StopAt) {
        let partitions: Vec<u32> = match selector {
            PartitionSelector::Id(partition) => vec![partition],
            PartitionSelector::All => {
                if let Some(enumeration) = self.enumerating.get_mut(topic) {
                    debug!(topic = %topic, at = ?at, "stop deferred until partitions are enumerated");
                    enumeration.stop = Some(at);
                }
                self.entries
                    .keys()
                    .filter(|(t, _)| t == topic)
                    .map(|(_, p)| *p)
                    .collect()
            }
        };
        for partition in partitions {
            self.stop_partition(topic, partition, at);
        }
    }

    fn stop_partition(&mut self, topic: &str, partition: u32, at: StopAt) {
        let Some(entry) = self.entries.get_mut(&partition_key(topic, partition)) else {
            debug!(topic = %topic, partition, "stop for a partition that was never started");
            return;
        };
        if !entry.phase.is_active() {
            return;
        }

        let stop_now = match at {
            StopAt::Now => true,
            StopAt::Offset(last) => {
                entry.stop = StopMarker::At(last);
                entry.next_offset.map_or(false, |cursor| last < cursor)
            }
        };
        if stop_now {
            entry.phase = ConsumePhase::Stopped;
            info!(topic = %topic, partition, "partition stopped");
        } else {
            debug!(topic = %topic, partition, at = ?at, "stop marker recorded");
        }
    }

    // ------------------------------------------------------------------
    // Acknowledgements
    // ------------------------------------------------------------------

    fn on_offset_response(
        &mut self,
        topic: String,
        response: OffsetPartitionResponse,
        received: DateTime<Utc>,
    ) {
        let key = (topic, response.partition);
        let Some(entry) = self.entries.get_mut(&key) else {
            self.discard(&key, "offsets for an unknown partition");
            return;
        };
        if entry.phase != ConsumePhase::AwaitingOffset || received < entry.started_at {
            self.discard(&key, "offsets no longer expected");
            return;
        }
        if !response.error.is_ok() {
            self.fail(key, response.error);
            return;
        }
        let Some(&offset) = response.offsets.first() else {
            self.fail(key, ErrorCode::Unknown);
            return;
        };

        entry.next_offset = Some(offset);
        if entry.stop.reached(offset) {
            entry.phase = ConsumePhase::Stopped;
            info!(topic = %key.0, partition = key.1, offset, "stop offset precedes the resolved offset");
            return;
        }
        entry.phase = ConsumePhase::Fetching;
        let epoch = entry.epoch;
        debug!(topic = %key.0, partition = key.1, offset, "offset resolved");

        let request = FetchMessage::new(key.0, key.1, offset, self.config.fetch_message_max_bytes);
        self.enqueue(PendingRequest {
            request: ConsumeRequest::Fetch(request),
            epoch,
            notified: false,
        });
    }

    fn on_fetch_response(
        &mut self,
        topic: String,
        response: FetchPartitionResponse,
        received: DateTime<Utc>,
    ) {
        let key = (topic, response.partition);
        let Some(entry) = self.entries.get_mut(&key) else {
            self.discard(&key, "fetch for an unknown partition");
            return;
        };
        if !entry.phase.is_active() || received < entry.started_at {
            self.discard(&key, "fetch no longer expected");
            return;
        }
        if !response.error.is_ok() {
            self.fail(key, response.error);
            return;
        }

        let mut messages = response.messages;
        if let (ConsumePhase::Fetching, Some(c)) = (entry.phase, entry.next_offset) {
            // Nothing at or past the cursor: this answers a fetch already settled
            if !messages.is_empty() && messages.iter().all(|m| m.offset < c) {
                self.discard(&key, "fetch answers an earlier request");
                return;
            }
        }
        messages.sort_by_key(|m| m.offset);

        let mut cursor = entry.next_offset;
        let mut delivered = Vec::with_capacity(messages.len());
        for m in messages {
            if cursor.map_or(false, |c| m.offset < c) {
                continue;
            }
            if !entry.stop.admits(m.offset) {
                break;
            }
            let Some(next) = m.offset.checked_add(1) else {
                warn!(topic = %key.0, partition = key.1, offset = m.offset, "offset out of range, message dropped");
                break;
            };
            cursor = Some(next);
            delivered.push(ConsumedRecord {
                topic: key.0.clone(),
                partition: key.1,
                offset: m.offset,
                message: m.message,
            });
        }

        entry.next_offset = cursor;
        let next = match cursor {
            Some(c) if entry.stop.reached(c) => {
                entry.phase = ConsumePhase::Stopped;
                None
            }
            Some(c) => {
                entry.phase = ConsumePhase::Fetching;
                Some((c, entry.epoch))
            }
            None => None,
        };
        let stopped = entry.phase == ConsumePhase::Stopped;

        trace!(topic = %key.0, partition = key.1, delivered = delivered.len(), "fetch acknowledged");
        RouterStats::add(&self.stats.messages, delivered.len() as u64);
        for record in delivered {
            self.emit(ConsumerEvent::MessageReceived(record));
        }

        if stopped {
            info!(topic = %key.0, partition = key.1, "stop offset reached");
        }
        if let Some((offset, epoch)) = next {
            let request =
                FetchMessage::new(key.0, key.1, offset, self.config.fetch_message_max_bytes);
            self.enqueue(PendingRequest {
                request: ConsumeRequest::Fetch(request),
                epoch,
                notified: false,
            });
        }
    }

    fn fail(&mut self, key: PartitionKey, error: ErrorCode) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.phase = ConsumePhase::Errored(error);
        }
        warn!(topic = %key.0, partition = key.1, error = %error, "partition error");
        RouterStats::incr(&self.stats.errors);
        self.emit(ConsumerEvent::PartitionError {
            topic: key.0,
            partition: key.1,
            error,
        });
    }

    fn discard(&self, key: &PartitionKey, reason: &'static str) {
        debug!(topic = %key.0, partition = key.1, reason, "acknowledgement discarded");
        RouterStats::incr(&self.stats.discarded);
    }

    // ------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------

    fn enqueue(&mut self, pending: PendingRequest) {
        if self.routes.enqueue(pending) {
            let cluster = Arc::clone(&self.cluster);
            self.scheduler.suspend(async move {
                Command::RoutingResolved(cluster.require_new_routing_table().await)
            });
        }
    }

    fn route_all(&mut self, table: &RoutingTable, ready: Vec<PendingRequest>) {
        for pending in ready {
            self.route(table, pending);
        }
    }

    fn route(&mut self, table: &RoutingTable, pending: PendingRequest) {
        if !self.is_current(&pending) {
            debug!(
                topic = %pending.request.topic(),
                partition = pending.request.partition(),
                "dropping request of a stopped or restarted partition"
            );
            return;
        }
        let leader = table
            .leader(pending.request.topic(), pending.request.partition())
            .cloned();
        match leader {
            Some(node) => self.dispatch(node, pending.request),
            None => self.postpone(pending),
        }
    }

    fn is_current(&self, pending: &PendingRequest) -> bool {
        let entry = match self
            .entries
            .get(&partition_key(pending.request.topic(), pending.request.partition()))
        {
            Some(entry) if entry.epoch == pending.epoch => entry,
            _ => return false,
        };
        match &pending.request {
            ConsumeRequest::Fetch(fetch) => {
                entry.phase == ConsumePhase::Fetching && entry.next_offset == Some(fetch.offset)
            }
            ConsumeRequest::Offset(_) => entry.phase == ConsumePhase::AwaitingOffset,
        }
    }

    fn postpone(&mut self, mut pending: PendingRequest) {
        if !pending.notified {
            pending.notified = true;
            let topic = pending.request.topic().to_string();
            let partition = pending.request.partition();
            warn!(topic = %topic, partition, "no leader known, request postponed");
            RouterStats::incr(&self.stats.postponed);
            self.emit(ConsumerEvent::FetchPostponed { topic, partition });
        }
        if self.routes.postpone(pending) {
            self.scheduler
                .schedule(self.config.postpone_retry(), Command::RetryPostponed);
        }
    }

    fn dispatch(&mut self, node: NodeHandle, request: ConsumeRequest) {
        RouterStats::incr(&self.stats.requests_sent);
        match (self.config.batch_strategy, request) {
            (BatchStrategy::ByNode, ConsumeRequest::Fetch(fetch)) => node.fetch(fetch),
            (BatchStrategy::ByNode, ConsumeRequest::Offset(offset)) => node.offset(offset),
            (BatchStrategy::Global, ConsumeRequest::Fetch(fetch)) => {
                match self.fetches.push(node, fetch) {
                    Pushed::Armed(generation) => self
                        .scheduler
                        .schedule(self.fetches.window(), Command::FlushFetches(generation)),
                    Pushed::Buffered => {}
                    Pushed::Full(batches) => self.post(batches, RequestBatch::Fetch),
                }
            }
            (BatchStrategy::Global, ConsumeRequest::Offset(offset)) => {
                match self.offsets.push(node, offset) {
                    Pushed::Armed(generation) => self
                        .scheduler
                        .schedule(self.offsets.window(), Command::FlushOffsets(generation)),
                    Pushed::Buffered => {}
                    Pushed::Full(batches) => self.post(batches, RequestBatch::Offset),
                }
            }
        }
    }

    fn post<T>(&self, batches: Vec<NodeBatch<T>>, wrap: fn(BatchByTopic<T>) -> RequestBatch) {
        for NodeBatch { node, batch } in batches {
            trace!(node = %node.name(), requests = batch.len(), "posting consume batch");
            RouterStats::incr(&self.stats.batches_posted);
            node.post(wrap(batch));
        }
    }

    fn flush(&mut self) {
        if let Some(batches) = self.fetches.flush() {
            self.post(batches, RequestBatch::Fetch);
        }
        if let Some(batches) = self.offsets.flush() {
            self.post(batches, RequestBatch::Offset);
        }
    }

    fn emit(&self, event: ConsumerEvent) {
        if self.events.send(event).is_err() {
            trace!("consumer event receiver dropped");
        }
    }
}
