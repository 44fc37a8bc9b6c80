//! Partition routing engine for Kafka-style broker clusters
//!
//! Two single-worker routers sit between an application and its broker
//! connections:
//!
//! - [`ConsumeRouter`] tracks every consumed partition (offset resolution,
//!   fetch cursor, stop marker) and issues one fetch at a time per partition
//! - [`ProduceRouter`] routes pooled [`ProduceMessage`] envelopes to
//!   partition leaders and settles them from produce acknowledgements
//!
//! Both resolve leaders through a [`Cluster`], send through [`Node`]s and
//! report through typed event channels. Requests are sent one by one (each
//! node batches on its own) or accumulated client-wide, see
//! [`BatchStrategy`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wharf_client::{ClientConfig, ConsumeRouter, MetadataCluster};
//! use wharf_protocol::{PartitionSelector, StartOffset};
//!
//! let cluster = Arc::new(MetadataCluster::new(bootstrap, connector));
//! let (router, consumer, mut events) = ConsumeRouter::new(cluster, ClientConfig::default());
//! router.spawn();
//!
//! consumer.start_consume("orders", PartitionSelector::All, StartOffset::Earliest);
//! ```

pub mod batching;
pub mod cluster;
pub mod config;
pub mod consumer;
pub mod error;
pub mod node;
pub mod pool;
pub mod producer;
pub mod routing;
mod scheduler;
pub mod stats;

pub use batching::{Accumulator, GlobalBatcher, NodeBatch, Pushed};
pub use cluster::{Cluster, MetadataCluster, MetadataSource, NodeFactory};
pub use config::{BatchStrategy, ClientConfig, ClientConfigBuilder};
pub use consumer::{ConsumePhase, ConsumeRouter, ConsumeRouterHandle, ConsumedRecord, ConsumerEvent};
pub use error::{Error, Result};
pub use node::{BatchingNode, Node, NodeHandle, RequestBatch};
pub use pool::{ProduceMessage, ProduceMessagePool};
pub use producer::{ProduceAcknowledgement, ProduceRouter, ProduceRouterHandle, ProducerEvent};
pub use routing::{Partition, RoutingTable};
pub use stats::{RouterStats, RouterStatsSnapshot};
