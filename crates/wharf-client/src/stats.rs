//! Router statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by a router worker and read from its handles
#[derive(Debug, Default)]
pub struct RouterStats {
    pub(crate) requests_sent: AtomicU64,
    pub(crate) batches_posted: AtomicU64,
    pub(crate) postponed: AtomicU64,
    pub(crate) messages: AtomicU64,
    pub(crate) errors: AtomicU64,
    pub(crate) discarded: AtomicU64,
    pub(crate) expired: AtomicU64,
    pub(crate) retries: AtomicU64,
}

impl RouterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            batches_posted: self.batches_posted.load(Ordering::Relaxed),
            postponed: self.postponed.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

/// Router statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStatsSnapshot {
    /// Requests handed to a node or a global batch
    pub requests_sent: u64,
    /// Batches posted from the global batcher
    pub batches_posted: u64,
    /// Requests that waited for a routing table
    pub postponed: u64,
    /// Messages delivered (consumer) or acknowledged (producer)
    pub messages: u64,
    /// Partition errors (consumer) or discarded messages (producer)
    pub errors: u64,
    /// Stale acknowledgements dropped
    pub discarded: u64,
    /// Produce envelopes that outlived their expiration
    pub expired: u64,
    /// Produce envelopes routed again after a retriable failure
    pub retries: u64,
}

impl RouterStatsSnapshot {
    /// Share of settled produce envelopes that were acknowledged
    pub fn success_rate(&self) -> f64 {
        let settled = self.messages + self.errors + self.expired;
        if settled == 0 {
            1.0
        } else {
            self.messages as f64 / settled as f64
        }
    }
}
