//! Reusable produce envelopes
//!
//! Every message handed to the produce router travels in a boxed
//! [`ProduceMessage`] taken from a [`ProduceMessagePool`]. The envelope is
//! moved, never shared: caller → router → batcher → node → router, which
//! returns it to the pool once the message is acknowledged, discarded or
//! expired. A released envelope is owned by the free list and nothing else.
//!
//! The `allocated` and `released` counters only feed diagnostics. Under
//! steady load `allocated - released` tracks the envelopes in flight; a
//! growing gap points at a leak.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use crossbeam::queue::SegQueue;
use tracing::trace;
use wharf_protocol::{Message, TopicRequest};

/// A message on its way to a partition leader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceMessage {
    pub topic: String,
    pub message: Message,
    /// Past this instant the message is failed locally instead of sent
    pub expiration: DateTime<Utc>,
    /// Partition the caller asked for, if any
    pub required_partition: Option<u32>,
    /// Partition chosen by the router for the current attempt
    pub partition: Option<u32>,
}

impl ProduceMessage {
    fn empty() -> Self {
        Self {
            topic: String::new(),
            message: Message::default(),
            expiration: DateTime::<Utc>::MIN_UTC,
            required_partition: None,
            partition: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration
    }
}

impl TopicRequest for ProduceMessage {
    fn topic(&self) -> &str {
        &self.topic
    }
}

/// Lock-free free list of produce envelopes
#[derive(Debug, Default)]
pub struct ProduceMessagePool {
    free: SegQueue<Box<ProduceMessage>>,
    allocated: AtomicU64,
    released: AtomicU64,
    created: AtomicU64,
}

impl ProduceMessagePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take an envelope, reusing a released one when available
    ///
    /// Every field is overwritten; `required_partition` and `partition` both
    /// start as `partition`.
    pub fn acquire(
        &self,
        topic: &str,
        message: Message,
        expiration: DateTime<Utc>,
        partition: Option<u32>,
    ) -> Box<ProduceMessage> {
        let mut envelope = match self.free.pop() {
            Some(envelope) => envelope,
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                trace!("allocating produce envelope");
                Box::new(ProduceMessage::empty())
            }
        };
        envelope.topic.clear();
        envelope.topic.push_str(topic);
        envelope.message = message;
        envelope.expiration = expiration;
        envelope.required_partition = partition;
        envelope.partition = partition;
        self.allocated.fetch_add(1, Ordering::Relaxed);
        envelope
    }

    /// Return an envelope to the free list
    pub fn release(&self, mut envelope: Box<ProduceMessage>) {
        envelope.message = Message::default();
        self.free.push(envelope);
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    /// Total `acquire` calls
    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Total `release` calls
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Envelopes ever created because the free list was empty
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Envelopes acquired and not yet released
    pub fn in_use(&self) -> u64 {
        self.allocated().saturating_sub(self.released())
    }

    /// Envelopes sitting in the free list
    pub fn pooled(&self) -> usize {
        self.free.len()
    }
}
