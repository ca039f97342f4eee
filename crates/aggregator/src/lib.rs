//! Aggregation layer.
//!
//! The [`ConnectorRegistry`] owns connector descriptors and authentication
//! state; the [`ParallelAggregator`] fans searches and collection listings
//! out over registry snapshots and caches collection listings in an
//! [`AggregationCache`].

pub mod aggregator;
pub mod cache;
pub mod metrics;
pub mod registry;
pub mod status;

pub use aggregator::{AggregatorConfig, ParallelAggregator, ALL_COLLECTIONS_KEY, QUERY_SOURCE};
pub use cache::{AggregationCache, CacheStats};
pub use registry::{AuthObserver, ConnectorDescriptor, ConnectorRegistry};
pub use status::{SkippedSource, SourceFailure, SourceSuccess, StatusSummary};
