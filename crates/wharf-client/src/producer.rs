//! Produce router: pooled envelopes routed to partition leaders
//!
//! Messages enter through a [`ProduceRouterHandle`], which wraps each one in
//! a pooled [`ProduceMessage`] envelope and hands it to the [`ProduceRouter`]
//! worker. The worker picks a partition, sends the envelope to its leader
//! and settles it when the node acknowledges:
//!
//! - **Partitioning**: a required partition is honored; otherwise partitions
//!   with a leader are chosen round robin, from a random start per topic
//! - **Retries**: retriable broker errors and transport failures re-route the
//!   envelope until it expires
//! - **Expiration**: envelopes past their TTL are failed locally, never sent
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wharf_client::{ClientConfig, ProduceMessagePool, ProduceRouter};
//! use wharf_protocol::Message;
//!
//! let pool = Arc::new(ProduceMessagePool::new());
//! let (router, handle, mut events) = ProduceRouter::new(cluster, ClientConfig::default(), pool);
//! router.spawn();
//!
//! handle.produce("events", Message::new("hello"));
//! handle.produce_to("events", 3, Message::new("pinned").with_key("k"));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use wharf_protocol::{
    BatchByTopic, CommonResponse, ErrorCode, Message, ProducePartitionResponse,
};

use crate::batching::{GlobalBatcher, NodeBatch, Pushed};
use crate::cluster::Cluster;
use crate::config::{BatchStrategy, ClientConfig};
use crate::node::{NodeHandle, RequestBatch};
use crate::pool::{ProduceMessage, ProduceMessagePool};
use crate::routing::{RouteQueue, RoutingTable};
use crate::scheduler::{Scheduler, Wake};
use crate::stats::{RouterStats, RouterStatsSnapshot};
use crate::Result;

// ============================================================================
// Events and acknowledgements
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerEvent {
    /// `count` messages of one acknowledgement were written to the partition
    MessagesAcknowledged {
        topic: String,
        partition: u32,
        count: usize,
    },
    MessageExpired { topic: String, message: Message },
    /// The broker rejected the message with a non-retriable error
    MessageDiscarded {
        topic: String,
        message: Message,
        error: ErrorCode,
    },
    /// A message found no leader; raised once per message
    ProducePostponed { topic: String },
}

/// Outcome of a produce request, handed back by the node
///
/// `batch` returns every envelope the node sent. A `None` response means the
/// request never got an answer (connection lost, timeout).
#[derive(Debug)]
pub struct ProduceAcknowledgement {
    pub batch: BatchByTopic<Box<ProduceMessage>>,
    pub response: Option<CommonResponse<ProducePartitionResponse>>,
    pub received: DateTime<Utc>,
}

impl ProduceAcknowledgement {
    pub fn new(
        batch: BatchByTopic<Box<ProduceMessage>>,
        response: CommonResponse<ProducePartitionResponse>,
    ) -> Self {
        Self {
            batch,
            response: Some(response),
            received: Utc::now(),
        }
    }

    pub fn transport_failure(batch: BatchByTopic<Box<ProduceMessage>>) -> Self {
        Self {
            batch,
            response: None,
            received: Utc::now(),
        }
    }
}

enum Command {
    Produce(Box<ProduceMessage>),
    Acknowledged(ProduceAcknowledgement),
    RoutingResolved(Result<Arc<RoutingTable>>),
    RetryPostponed,
    Flush(u64),
}

struct PendingProduce {
    message: Box<ProduceMessage>,
    notified: bool,
}

impl PendingProduce {
    fn new(message: Box<ProduceMessage>) -> Self {
        Self {
            message,
            notified: false,
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

#[derive(Clone)]
pub struct ProduceRouterHandle {
    commands: mpsc::UnboundedSender<Command>,
    pool: Arc<ProduceMessagePool>,
    stats: Arc<RouterStats>,
    ttl: chrono::Duration,
}

impl ProduceRouterHandle {
    /// Send to any partition of `topic`
    pub fn produce(&self, topic: &str, message: Message) {
        self.submit(topic, None, message);
    }

    /// Send to one partition of `topic`
    pub fn produce_to(&self, topic: &str, partition: u32, message: Message) {
        self.submit(topic, Some(partition), message);
    }

    /// Entry point for produce responses
    pub fn acknowledge(&self, ack: ProduceAcknowledgement) {
        if let Err(mpsc::error::SendError(command)) =
            self.commands.send(Command::Acknowledged(ack))
        {
            debug!("produce router has stopped, acknowledgement dropped");
            if let Command::Acknowledged(ack) = command {
                for envelope in ack.batch.into_requests() {
                    self.pool.release(envelope);
                }
            }
        }
    }

    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn pool(&self) -> &Arc<ProduceMessagePool> {
        &self.pool
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn submit(&self, topic: &str, partition: Option<u32>, message: Message) {
        let expiration = Utc::now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let envelope = self.pool.acquire(topic, message, expiration, partition);
        if let Err(mpsc::error::SendError(command)) = self.commands.send(Command::Produce(envelope))
        {
            debug!(topic = %topic, "produce router has stopped, message dropped");
            if let Command::Produce(envelope) = command {
                self.pool.release(envelope);
            }
        }
    }
}

// ============================================================================
// Router
// ============================================================================

pub struct ProduceRouter {
    cluster: Arc<dyn Cluster>,
    config: ClientConfig,
    pool: Arc<ProduceMessagePool>,
    scheduler: Scheduler<Command>,
    routes: RouteQueue<PendingProduce>,
    batcher: GlobalBatcher<Box<ProduceMessage>>,
    /// Round-robin position per topic
    cursors: HashMap<String, usize>,
    events: mpsc::UnboundedSender<ProducerEvent>,
    stats: Arc<RouterStats>,
}

impl ProduceRouter {
    pub fn new(
        cluster: Arc<dyn Cluster>,
        config: ClientConfig,
        pool: Arc<ProduceMessagePool>,
    ) -> (
        Self,
        ProduceRouterHandle,
        mpsc::UnboundedReceiver<ProducerEvent>,
    ) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(RouterStats::new());
        let ttl = chrono::Duration::milliseconds(
            i64::try_from(config.message_ttl_ms).unwrap_or(i64::MAX / 1_000),
        );

        let handle = ProduceRouterHandle {
            commands: commands_tx,
            pool: Arc::clone(&pool),
            stats: Arc::clone(&stats),
            ttl,
        };
        let router = Self {
            scheduler: Scheduler::new(commands_rx, cluster.subscribe()),
            batcher: GlobalBatcher::new(config.produce_batch_size, config.produce_buffering()),
            cluster,
            config,
            pool,
            routes: RouteQueue::new(),
            cursors: HashMap::new(),
            events: events_tx,
            stats,
        };
        (router, handle, events_rx)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process work until every handle is dropped, then flush the global batch
    pub async fn run(mut self) {
        info!(strategy = ?self.config.batch_strategy, "produce router started");
        while let Some(wake) = self.scheduler.next().await {
            self.handle(wake);
        }
        self.flush();
        info!(
            postponed = self.routes.postponed_len(),
            timers = self.scheduler.timers_len(),
            "produce router stopped"
        );
    }

    /// Process everything that can progress without waiting on a timer
    pub async fn run_until_idle(&mut self) {
        while let Some(wake) = self.scheduler.next_ready().await {
            self.handle(wake);
        }
    }

    /// Envelopes waiting for a routing table
    pub fn pending(&self) -> usize {
        self.routes.waiting_len() + self.routes.postponed_len()
    }

    pub fn postponed(&self) -> usize {
        self.routes.postponed_len()
    }

    /// Last routing table seen by the router
    pub fn routing_table(&self) -> Option<Arc<RoutingTable>> {
        self.routes.latest().cloned()
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
            Command::Produce(message) => self.enqueue(PendingProduce::new(message)),
            Command::Acknowledged(ack) => self.on_ack(ack),
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
                let now = Utc::now();
                for pending in self.routes.on_retry() {
                    if pending.message.is_expired(now) {
                        self.expire(pending.message);
                    } else {
                        self.enqueue(pending);
                    }
                }
            }
            Command::Flush(generation) => {
                if let Some(batches) = self.batcher.expire(generation) {
                    self.post(batches);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------

    fn enqueue(&mut self, pending: PendingProduce) {
        if self.routes.enqueue(pending) {
            let cluster = Arc::clone(&self.cluster);
            self.scheduler.suspend(async move {
                Command::RoutingResolved(cluster.require_new_routing_table().await)
            });
        }
    }

    fn route_all(&mut self, table: &RoutingTable, ready: Vec<PendingProduce>) {
        let now = Utc::now();
        for pending in ready {
            if pending.message.is_expired(now) {
                self.expire(pending.message);
            } else {
                self.route(table, pending);
            }
        }
    }

    fn route(&mut self, table: &RoutingTable, mut pending: PendingProduce) {
        let target = match pending.message.required_partition {
            Some(partition) => table
                .leader(&pending.message.topic, partition)
                .map(|leader| (partition, Arc::clone(leader))),
            None => self.pick(table, &pending.message.topic),
        };
        match target {
            Some((partition, leader)) => {
                pending.message.partition = Some(partition);
                self.dispatch(leader, pending.message);
            }
            None => self.postpone(pending),
        }
    }

    /// Next partition with a leader, round robin
    fn pick(&mut self, table: &RoutingTable, topic: &str) -> Option<(u32, NodeHandle)> {
        let routable = table.routable(topic);
        if routable.is_empty() {
            return None;
        }
        if !self.cursors.contains_key(topic) {
            self.cursors.insert(topic.to_string(), rand::random::<usize>());
        }
        let cursor = self.cursors.get_mut(topic)?;
        let partition = routable[*cursor % routable.len()];
        *cursor = cursor.wrapping_add(1);
        partition
            .leader
            .as_ref()
            .map(|leader| (partition.id, Arc::clone(leader)))
    }

    fn postpone(&mut self, mut pending: PendingProduce) {
        if !pending.notified {
            pending.notified = true;
            let topic = pending.message.topic.clone();
            warn!(
                topic = %topic,
                partition = ?pending.message.required_partition,
                "no leader known, message postponed"
            );
            RouterStats::incr(&self.stats.postponed);
            self.emit(ProducerEvent::ProducePostponed { topic });
        }
        if self.routes.postpone(pending) {
            self.scheduler
                .schedule(self.config.postpone_retry(), Command::RetryPostponed);
        }
    }

    fn dispatch(&mut self, node: NodeHandle, message: Box<ProduceMessage>) {
        RouterStats::incr(&self.stats.requests_sent);
        match self.config.batch_strategy {
            BatchStrategy::ByNode => node.produce(message),
            BatchStrategy::Global => match self.batcher.push(node, message) {
                Pushed::Armed(generation) => self
                    .scheduler
                    .schedule(self.batcher.window(), Command::Flush(generation)),
                Pushed::Buffered => {}
                Pushed::Full(batches) => self.post(batches),
            },
        }
    }

    /// Post each node batch, failing locally what expired inside the window
    fn post(&mut self, batches: Vec<NodeBatch<Box<ProduceMessage>>>) {
        let now = Utc::now();
        for NodeBatch { node, batch } in batches {
            let (expired, live): (Vec<_>, Vec<_>) = batch
                .into_requests()
                .partition(|envelope| envelope.is_expired(now));
            for envelope in expired {
                self.expire(envelope);
            }
            if live.is_empty() {
                continue;
            }
            let batch: BatchByTopic<Box<ProduceMessage>> = live.into_iter().collect();
            trace!(node = %node.name(), messages = batch.len(), "posting produce batch");
            RouterStats::incr(&self.stats.batches_posted);
            node.post(RequestBatch::Produce(batch));
        }
    }

    fn flush(&mut self) {
        if let Some(batches) = self.batcher.flush() {
            self.post(batches);
        }
    }

    // ------------------------------------------------------------------
    // Settlement
    // ------------------------------------------------------------------

    fn on_ack(&mut self, ack: ProduceAcknowledgement) {
        let ProduceAcknowledgement {
            batch, response, ..
        } = ack;
        let statuses: Option<HashMap<(String, u32), ErrorCode>> = response.map(|response| {
            response
                .into_iter_flat()
                .map(|(topic, p)| ((topic, p.partition), p.error))
                .collect()
        });

        let mut written: BTreeMap<(String, u32), usize> = BTreeMap::new();
        for envelope in batch.into_requests() {
            let outcome = envelope.partition.and_then(|partition| {
                statuses
                    .as_ref()?
                    .get(&(envelope.topic.clone(), partition))
                    .map(|error| (partition, *error))
            });
            match outcome {
                Some((partition, ErrorCode::NoError)) => {
                    *written.entry((envelope.topic.clone(), partition)).or_insert(0) += 1;
                    self.pool.release(envelope);
                }
                Some((_, error)) if !error.is_retriable() => self.discard(envelope, error),
                Some((_, error)) => self.retry(envelope, Some(error)),
                None => self.retry(envelope, None),
            }
        }

        for ((topic, partition), count) in written {
            RouterStats::add(&self.stats.messages, count as u64);
            trace!(topic = %topic, partition, count, "messages acknowledged");
            self.emit(ProducerEvent::MessagesAcknowledged {
                topic,
                partition,
                count,
            });
        }
    }

    fn retry(&mut self, mut envelope: Box<ProduceMessage>, error: Option<ErrorCode>) {
        RouterStats::incr(&self.stats.retries);
        debug!(
            topic = %envelope.topic,
            partition = ?envelope.partition,
            error = ?error,
            "re-routing message"
        );
        envelope.partition = envelope.required_partition;
        self.enqueue(PendingProduce::new(envelope));
    }

    fn discard(&mut self, mut envelope: Box<ProduceMessage>, error: ErrorCode) {
        RouterStats::incr(&self.stats.errors);
        warn!(
            topic = %envelope.topic,
            partition = ?envelope.partition,
            error = %error,
            "message discarded"
        );
        let message = std::mem::take(&mut envelope.message);
        let topic = std::mem::take(&mut envelope.topic);
        self.pool.release(envelope);
        self.emit(ProducerEvent::MessageDiscarded {
            topic,
            message,
            error,
        });
    }

    fn expire(&mut self, mut envelope: Box<ProduceMessage>) {
        RouterStats::incr(&self.stats.expired);
        debug!(topic = %envelope.topic, expiration = %envelope.expiration, "message expired");
        let message = std::mem::take(&mut envelope.message);
        let topic = std::mem::take(&mut envelope.topic);
        self.pool.release(envelope);
        self.emit(ProducerEvent::MessageExpired { topic, message });
    }

    fn emit(&self, event: ProducerEvent) {
        if self.events.send(event).is_err() {
            trace!("producer event receiver dropped");
        }
    }
}
