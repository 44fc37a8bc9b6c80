//! Broker node contract and the per-node batching decorator
//!
//! A [`Node`] is one broker connection. Every entry point is fire-and-forget:
//! implementations queue the request on their own connection task and report
//! the outcome later through the owning router handle
//! ([`ConsumeRouterHandle`](crate::ConsumeRouterHandle) or
//! [`ProduceRouterHandle`](crate::ProduceRouterHandle)).
//!
//! [`BatchingNode`] wraps any node and accumulates its fetch, offset and
//! produce traffic, posting one topic-grouped batch per flush.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;
use wharf_protocol::{BatchByTopic, FetchMessage, OffsetMessage, TopicRequest};

use crate::batching::{Accumulator, Pushed};
use crate::config::ClientConfig;
use crate::pool::ProduceMessage;

/// A batch of requests of one kind, grouped by topic
#[derive(Debug)]
pub enum RequestBatch {
    Fetch(BatchByTopic<FetchMessage>),
    Offset(BatchByTopic<OffsetMessage>),
    Produce(BatchByTopic<Box<ProduceMessage>>),
}

impl RequestBatch {
    pub fn len(&self) -> usize {
        match self {
            RequestBatch::Fetch(batch) => batch.len(),
            RequestBatch::Offset(batch) => batch.len(),
            RequestBatch::Produce(batch) => batch.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A broker connection
pub trait Node: Send + Sync {
    fn name(&self) -> &str;

    fn fetch(&self, request: FetchMessage);

    fn offset(&self, request: OffsetMessage);

    /// Takes ownership of a pooled envelope; it comes back in the produce acknowledgement
    fn produce(&self, message: Box<ProduceMessage>);

    fn post(&self, batch: RequestBatch);
}

pub type NodeHandle = Arc<dyn Node>;

// ============================================================================
// Per-node batching
// ============================================================================

/// Accumulates a node's traffic and flushes it through [`Node::post`]
///
/// Buffering windows are tokio timer tasks. Outside a runtime a window
/// cannot be armed, so the first buffered request flushes immediately.
pub struct BatchingNode<N> {
    state: Arc<BatchingState<N>>,
}

struct BatchingState<N> {
    node: N,
    fetches: Mutex<Accumulator<FetchMessage>>,
    offsets: Mutex<Accumulator<OffsetMessage>>,
    produces: Mutex<Accumulator<Box<ProduceMessage>>>,
}

type Slot<N, T> = fn(&BatchingState<N>) -> &Mutex<Accumulator<T>>;

fn fetch_slot<N>(state: &BatchingState<N>) -> &Mutex<Accumulator<FetchMessage>> {
    &state.fetches
}

fn offset_slot<N>(state: &BatchingState<N>) -> &Mutex<Accumulator<OffsetMessage>> {
    &state.offsets
}

fn produce_slot<N>(state: &BatchingState<N>) -> &Mutex<Accumulator<Box<ProduceMessage>>> {
    &state.produces
}

impl<N: Node + 'static> BatchingNode<N> {
    pub fn new(node: N, config: &ClientConfig) -> Self {
        Self::with_limits(
            node,
            config.consume_batch_size,
            config.consume_buffering(),
            config.produce_batch_size,
            config.produce_buffering(),
        )
    }

    pub fn with_limits(
        node: N,
        consume_batch_size: usize,
        consume_window: Duration,
        produce_batch_size: usize,
        produce_window: Duration,
    ) -> Self {
        Self {
            state: Arc::new(BatchingState {
                node,
                fetches: Mutex::new(Accumulator::new(consume_batch_size, consume_window)),
                offsets: Mutex::new(Accumulator::new(consume_batch_size, consume_window)),
                produces: Mutex::new(Accumulator::new(produce_batch_size, produce_window)),
            }),
        }
    }

    pub fn inner(&self) -> &N {
        &self.state.node
    }

    /// Post everything currently buffered
    pub fn flush(&self) {
        let state = &self.state;
        let fetches = state.fetches.lock().flush();
        if let Some(items) = fetches {
            state.post(items, RequestBatch::Fetch);
        }
        let offsets = state.offsets.lock().flush();
        if let Some(items) = offsets {
            state.post(items, RequestBatch::Offset);
        }
        let produces = state.produces.lock().flush();
        if let Some(items) = produces {
            state.post(items, RequestBatch::Produce);
        }
    }

    /// Number of buffered requests of every kind
    pub fn pending(&self) -> usize {
        self.state.fetches.lock().len()
            + self.state.offsets.lock().len()
            + self.state.produces.lock().len()
    }
}

impl<N: Node + 'static> BatchingState<N> {
    fn enqueue<T>(
        self: &Arc<Self>,
        slot: Slot<N, T>,
        item: T,
        wrap: fn(BatchByTopic<T>) -> RequestBatch,
    ) where
        T: TopicRequest + Send + 'static,
    {
        let (pushed, window) = {
            let mut acc = slot(self).lock();
            (acc.push(item), acc.window())
        };
        match pushed {
            Pushed::Full(items) => self.post(items, wrap),
            Pushed::Buffered => {}
            Pushed::Armed(generation) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let state = Arc::clone(self);
                    runtime.spawn(async move {
                        tokio::time::sleep(window).await;
                        let expired = slot(&state).lock().expire(generation);
                        if let Some(items) = expired {
                            state.post(items, wrap);
                        }
                    });
                }
                Err(_) => {
                    let flushed = slot(self).lock().flush();
                    if let Some(items) = flushed {
                        self.post(items, wrap);
                    }
                }
            },
        }
    }

    fn post<T: TopicRequest>(&self, items: Vec<T>, wrap: fn(BatchByTopic<T>) -> RequestBatch) {
        let batch = wrap(items.into_iter().collect());
        trace!(node = %self.node.name(), requests = batch.len(), "posting node batch");
        self.node.post(batch);
    }
}

impl<N: Node + 'static> Node for BatchingNode<N> {
    fn name(&self) -> &str {
        self.state.node.name()
    }

    fn fetch(&self, request: FetchMessage) {
        self.state.enqueue(fetch_slot, request, RequestBatch::Fetch);
    }

    fn offset(&self, request: OffsetMessage) {
        self.state.enqueue(offset_slot, request, RequestBatch::Offset);
    }

    fn produce(&self, message: Box<ProduceMessage>) {
        self.state.enqueue(produce_slot, message, RequestBatch::Produce);
    }

    fn post(&self, batch: RequestBatch) {
        self.state.node.post(batch);
    }
}
