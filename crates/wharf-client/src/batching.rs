//! Request accumulators
//!
//! An [`Accumulator`] holds requests until either the configured item count
//! is reached or the buffering window elapses. It owns no timer: the first
//! push into an empty accumulator reports [`Pushed::Armed`] with a
//! generation number, and whoever runs timers calls [`Accumulator::expire`]
//! with that generation once the window has elapsed. A flush bumps the
//! generation, so a timer armed for an already-flushed batch is a no-op.
//!
//! [`GlobalBatcher`] accumulates `(node, request)` pairs across every
//! destination and hands back one topic-grouped batch per node on flush.

use std::sync::Arc;
use std::time::Duration;

use wharf_protocol::{BatchByTopic, TopicRequest};

use crate::node::NodeHandle;

/// Outcome of a push
#[derive(Debug)]
pub enum Pushed<T> {
    /// First item of a new batch; arm a timer for this generation
    Armed(u64),
    /// Added to an already armed batch
    Buffered,
    /// Threshold reached; the batch is handed back and the accumulator is empty
    Full(Vec<T>),
}

impl<T> Pushed<T> {
    fn map<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> Pushed<U> {
        match self {
            Pushed::Armed(generation) => Pushed::Armed(generation),
            Pushed::Buffered => Pushed::Buffered,
            Pushed::Full(items) => Pushed::Full(f(items)),
        }
    }
}

#[derive(Debug)]
pub struct Accumulator<T> {
    items: Vec<T>,
    batch_size: usize,
    window: Duration,
    generation: u64,
}

impl<T> Accumulator<T> {
    pub fn new(batch_size: usize, window: Duration) -> Self {
        Self {
            items: Vec::new(),
            batch_size: batch_size.max(1),
            window,
            generation: 0,
        }
    }

    pub fn push(&mut self, item: T) -> Pushed<T> {
        self.items.push(item);
        if self.items.len() >= self.batch_size {
            self.generation += 1;
            Pushed::Full(std::mem::take(&mut self.items))
        } else if self.items.len() == 1 {
            Pushed::Armed(self.generation)
        } else {
            Pushed::Buffered
        }
    }

    /// Window elapsed for `generation`; returns the batch if it is still pending
    pub fn expire(&mut self, generation: u64) -> Option<Vec<T>> {
        if generation != self.generation {
            return None;
        }
        self.flush()
    }

    /// Hand back whatever is buffered
    pub fn flush(&mut self) -> Option<Vec<T>> {
        if self.items.is_empty() {
            return None;
        }
        self.generation += 1;
        Some(std::mem::take(&mut self.items))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Topic-grouped requests bound for one node
pub struct NodeBatch<T> {
    pub node: NodeHandle,
    pub batch: BatchByTopic<T>,
}

/// Client-wide accumulator spanning every destination node
pub struct GlobalBatcher<T> {
    accumulator: Accumulator<(NodeHandle, T)>,
}

impl<T: TopicRequest> GlobalBatcher<T> {
    pub fn new(batch_size: usize, window: Duration) -> Self {
        Self {
            accumulator: Accumulator::new(batch_size, window),
        }
    }

    pub fn push(&mut self, node: NodeHandle, request: T) -> Pushed<NodeBatch<T>> {
        self.accumulator.push((node, request)).map(group_by_node)
    }

    pub fn expire(&mut self, generation: u64) -> Option<Vec<NodeBatch<T>>> {
        self.accumulator.expire(generation).map(group_by_node)
    }

    pub fn flush(&mut self) -> Option<Vec<NodeBatch<T>>> {
        self.accumulator.flush().map(group_by_node)
    }

    pub fn window(&self) -> Duration {
        self.accumulator.window()
    }

    pub fn len(&self) -> usize {
        self.accumulator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulator.is_empty()
    }
}

/// Nodes keep the order of their first request
fn group_by_node<T: TopicRequest>(items: Vec<(NodeHandle, T)>) -> Vec<NodeBatch<T>> {
    let mut batches: Vec<NodeBatch<T>> = Vec::new();
    for (node, request) in items {
        match batches.iter_mut().find(|b| same_node(&b.node, &node)) {
            Some(entry) => entry.batch.push(request),
            None => {
                let mut batch = BatchByTopic::new();
                batch.push(request);
                batches.push(NodeBatch { node, batch });
            }
        }
    }
    batches
}

fn same_node(a: &NodeHandle, b: &NodeHandle) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
