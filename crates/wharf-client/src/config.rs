//! Client configuration
//!
//! [`ClientConfig`] gathers the batching and retry knobs shared by the
//! consume and produce routers. It deserializes with defaults for every
//! missing field, so a partial JSON/TOML document is enough.
//!
//! # Example
//!
//! ```rust
//! use wharf_client::{BatchStrategy, ClientConfig};
//!
//! let config = ClientConfig::builder()
//!     .batch_strategy(BatchStrategy::Global)
//!     .consume_batch_size(64)
//!     .consume_buffering_ms(10)
//!     .build();
//!
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_CONSUME_BATCH_SIZE: usize = 1000;
const DEFAULT_CONSUME_BUFFERING_MS: u64 = 1000;
const DEFAULT_PRODUCE_BATCH_SIZE: usize = 200;
const DEFAULT_PRODUCE_BUFFERING_MS: u64 = 5000;
const DEFAULT_FETCH_MESSAGE_MAX_BYTES: u32 = 256 * 1024;
const DEFAULT_MESSAGE_TTL_MS: u64 = 60_000;
const DEFAULT_POSTPONE_RETRY_MS: u64 = 1000;

// ============================================================================
// Configuration
// ============================================================================

/// Where outgoing requests are accumulated before being sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStrategy {
    /// Each node batches its own traffic; routers call the node directly
    #[default]
    ByNode,
    /// Routers batch across all nodes and post one batch per node on flush
    Global,
}

/// Router configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub batch_strategy: BatchStrategy,
    /// Fetch/offset requests accumulated before a flush
    pub consume_batch_size: usize,
    /// Longest time a fetch/offset request waits in a batch
    pub consume_buffering_ms: u64,
    /// Produce envelopes accumulated before a flush
    pub produce_batch_size: usize,
    /// Longest time a produce envelope waits in a batch
    pub produce_buffering_ms: u64,
    /// `max_bytes` of every fetch request
    pub fetch_message_max_bytes: u32,
    /// Lifetime of a produced message before it is failed locally
    pub message_ttl_ms: u64,
    /// Retry period for requests waiting on a routing table
    pub postpone_retry_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            batch_strategy: BatchStrategy::ByNode,
            consume_batch_size: DEFAULT_CONSUME_BATCH_SIZE,
            consume_buffering_ms: DEFAULT_CONSUME_BUFFERING_MS,
            produce_batch_size: DEFAULT_PRODUCE_BATCH_SIZE,
            produce_buffering_ms: DEFAULT_PRODUCE_BUFFERING_MS,
            fetch_message_max_bytes: DEFAULT_FETCH_MESSAGE_MAX_BYTES,
            message_ttl_ms: DEFAULT_MESSAGE_TTL_MS,
            postpone_retry_ms: DEFAULT_POSTPONE_RETRY_MS,
        }
    }
}

impl ClientConfig {
    /// Create a new builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Send every request as soon as it is routed
    pub fn low_latency() -> Self {
        Self {
            consume_batch_size: 1,
            consume_buffering_ms: 0,
            produce_batch_size: 1,
            produce_buffering_ms: 0,
            ..Default::default()
        }
    }

    /// Fewer, larger requests
    pub fn high_throughput() -> Self {
        Self {
            batch_strategy: BatchStrategy::Global,
            consume_batch_size: 5000,
            produce_batch_size: 1000,
            fetch_message_max_bytes: 1024 * 1024,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.consume_batch_size == 0 {
            return Err(Error::InvalidConfig(
                "consume_batch_size must be at least 1".into(),
            ));
        }
        if self.produce_batch_size == 0 {
            return Err(Error::InvalidConfig(
                "produce_batch_size must be at least 1".into(),
            ));
        }
        if self.fetch_message_max_bytes == 0 {
            return Err(Error::InvalidConfig(
                "fetch_message_max_bytes must be positive".into(),
            ));
        }
        if self.message_ttl_ms == 0 {
            return Err(Error::InvalidConfig("message_ttl_ms must be positive".into()));
        }
        if self.postpone_retry_ms == 0 {
            return Err(Error::InvalidConfig(
                "postpone_retry_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn consume_buffering(&self) -> Duration {
        Duration::from_millis(self.consume_buffering_ms)
    }

    pub fn produce_buffering(&self) -> Duration {
        Duration::from_millis(self.produce_buffering_ms)
    }

    pub fn message_ttl(&self) -> Duration {
        Duration::from_millis(self.message_ttl_ms)
    }

    pub fn postpone_retry(&self) -> Duration {
        Duration::from_millis(self.postpone_retry_ms)
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn batch_strategy(mut self, strategy: BatchStrategy) -> Self {
        self.config.batch_strategy = strategy;
        self
    }

    pub fn consume_batch_size(mut self, size: usize) -> Self {
        self.config.consume_batch_size = size;
        self
    }

    pub fn consume_buffering_ms(mut self, ms: u64) -> Self {
        self.config.consume_buffering_ms = ms;
        self
    }

    pub fn produce_batch_size(mut self, size: usize) -> Self {
        self.config.produce_batch_size = size;
        self
    }

    pub fn produce_buffering_ms(mut self, ms: u64) -> Self {
        self.config.produce_buffering_ms = ms;
        self
    }

    pub fn fetch_message_max_bytes(mut self, bytes: u32) -> Self {
        self.config.fetch_message_max_bytes = bytes;
        self
    }

    pub fn message_ttl_ms(mut self, ms: u64) -> Self {
        self.config.message_ttl_ms = ms;
        self
    }

    pub fn postpone_retry_ms(mut self, ms: u64) -> Self {
        self.config.postpone_retry_ms = ms;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
