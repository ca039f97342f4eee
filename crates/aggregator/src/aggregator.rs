//! Parallel fan-out of searches and collection listings over the registry.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use altair_common::{
    CanonicalItem, Capability, CatalogError, CatalogResult, CollectionInfo, SearchQuery,
};

use crate::cache::AggregationCache;
use crate::metrics;
use crate::registry::{ConnectorDescriptor, ConnectorRegistry};
use crate::status::StatusSummary;

/// Cache key of the aggregated collection listing.
pub const ALL_COLLECTIONS_KEY: &str = "all_collections";

const SKIP_REASON_AUTH: &str = "authentication required";

/// Status entry name for a query rejected before any connector ran.
pub const QUERY_SOURCE: &str = "query";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Connectors searched at the same time
    pub max_concurrent: usize,
    pub connector_timeout_secs: u64,
    pub collections_ttl_secs: u64,
    pub cache_capacity: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            connector_timeout_secs: 30,
            collections_ttl_secs: 300,
            cache_capacity: 64,
        }
    }
}

impl AggregatorConfig {
    pub fn connector_timeout(&self) -> Duration {
        Duration::from_secs(self.connector_timeout_secs)
    }

    pub fn collections_ttl(&self) -> Duration {
        Duration::from_secs(self.collections_ttl_secs)
    }
}

/// Searches every usable connector concurrently and merges the results.
///
/// A failing or slow connector never affects its siblings; its outcome is
/// recorded in the returned [`StatusSummary`].
pub struct ParallelAggregator {
    registry: Arc<ConnectorRegistry>,
    config: AggregatorConfig,
    collections: Arc<AggregationCache<Vec<CollectionInfo>>>,
}

impl ParallelAggregator {
    /// Build the aggregator and subscribe its cache to auth changes.
    pub async fn new(registry: Arc<ConnectorRegistry>, config: AggregatorConfig) -> Self {
        let collections = Arc::new(AggregationCache::new(config.cache_capacity).with_metrics("collections"));
        registry.add_observer(collections.clone()).await;
        Self {
            registry,
            config,
            collections,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectorRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn collections_cache(&self) -> &Arc<AggregationCache<Vec<CollectionInfo>>> {
        &self.collections
    }

    /// Fan a query out to all usable connectors, or to the one a composite
    /// `source::collection` id names.
    #[instrument(skip(self, query), fields(limit = query.limit))]
    pub async fn search_all(&self, query: &SearchQuery) -> (Vec<CanonicalItem>, StatusSummary) {
        let mut summary = StatusSummary::default();
        if let Err(e) = query.validate() {
            warn!(error = %e, "Rejected aggregated query");
            summary.record_failure(QUERY_SOURCE, QUERY_SOURCE, &e);
            return (Vec::new(), summary);
        }

        let connectors = self.registry.list().await;

        let targets: Vec<(ConnectorDescriptor, SearchQuery)> = match query.composite_target() {
            Some((source, collection)) => match connectors.iter().find(|c| c.id == source) {
                None => {
                    warn!(connector = %source, "Composite key names an unknown connector");
                    summary.record_failure(source, source, &CatalogError::NotFound(source.to_string()));
                    Vec::new()
                }
                Some(descriptor) if !descriptor.is_usable() => {
                    summary.record_failure(
                        &descriptor.id,
                        &descriptor.display_name,
                        &CatalogError::AuthRequired(descriptor.id.clone()),
                    );
                    Vec::new()
                }
                Some(descriptor) => vec![(descriptor.clone(), query.with_collection(collection))],
            },
            None => connectors
                .iter()
                .filter(|descriptor| {
                    if descriptor.is_usable() {
                        return true;
                    }
                    summary.record_skip(&descriptor.id, &descriptor.display_name, SKIP_REASON_AUTH);
                    false
                })
                .map(|descriptor| (descriptor.clone(), query.clone()))
                .collect(),
        };

        let timeout = self.config.connector_timeout();
        let outcomes = stream::iter(targets)
            .map(|(descriptor, query)| async move {
                let started = Instant::now();
                let result = match tokio::time::timeout(timeout, descriptor.adapter.search(&query)).await {
                    Ok(result) => result,
                    Err(_) => Err(CatalogError::ConnectorTimeout {
                        connector: descriptor.id.clone(),
                        after: timeout,
                    }),
                };
                metrics::record_search(&descriptor.id, started.elapsed(), result.is_ok());
                (descriptor, result)
            })
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut items = Vec::new();
        for (descriptor, result) in outcomes {
            match result {
                Ok(mut found) => {
                    for item in &mut found {
                        item.tag_source(&descriptor.id, &descriptor.display_name);
                    }
                    debug!(connector = %descriptor.id, items = found.len(), "Connector search done");
                    summary.record_success(&descriptor.id, &descriptor.display_name, found.len());
                    items.extend(found);
                }
                Err(e) => {
                    warn!(connector = %descriptor.id, error = %e, "Connector search failed");
                    summary.record_failure(&descriptor.id, &descriptor.display_name, &e);
                }
            }
        }

        summary.sort_by_key(|id| rank(&connectors, id));
        info!(
            items = items.len(),
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped.len(),
            "Aggregated search complete"
        );
        (items, summary)
    }

    /// Collections of every usable connector declaring `Collections`.
    pub async fn get_all_collections(&self, use_cache: bool) -> Vec<CollectionInfo> {
        let ttl = self.config.collections_ttl();
        if !use_cache {
            let collections = self.load_all_collections().await;
            self.collections.insert(ALL_COLLECTIONS_KEY, collections.clone()).await;
            return collections;
        }

        self.collections
            .get_or_load(ALL_COLLECTIONS_KEY, ttl, || async {
                Ok::<_, Infallible>(self.load_all_collections().await)
            })
            .await
            .unwrap_or_else(|never| match never {})
    }

    /// Drop the cached listing and load it again.
    pub async fn refresh_collections(&self) -> Vec<CollectionInfo> {
        self.collections.invalidate(ALL_COLLECTIONS_KEY).await;
        self.get_all_collections(true).await
    }

    /// Collections of one connector, cached per connector id.
    pub async fn collections_for(&self, id: &str, use_cache: bool) -> CatalogResult<Vec<CollectionInfo>> {
        let key = format!("collections:{}", id);
        if !use_cache {
            let collections = self.load_collections_of(id).await?;
            self.collections.insert(&key, collections.clone()).await;
            return Ok(collections);
        }
        self.collections
            .get_or_load(&key, self.config.collections_ttl(), || self.load_collections_of(id))
            .await
    }

    async fn load_collections_of(&self, id: &str) -> CatalogResult<Vec<CollectionInfo>> {
        let timeout = self.config.connector_timeout();
        match tokio::time::timeout(timeout, self.registry.collections(Some(id))).await {
            Ok(result) => result,
            Err(_) => Err(CatalogError::ConnectorTimeout {
                connector: id.to_string(),
                after: timeout,
            }),
        }
    }

    async fn load_all_collections(&self) -> Vec<CollectionInfo> {
        let connectors = self.registry.list().await;
        let timeout = self.config.connector_timeout();

        let mut listings = stream::iter(
            connectors
                .iter()
                .enumerate()
                .filter(|(_, d)| d.has(Capability::Collections) && d.is_usable()),
        )
        .map(|(index, descriptor)| async move {
            let result = match tokio::time::timeout(timeout, descriptor.adapter.list_collections()).await {
                Ok(result) => result,
                Err(_) => Err(CatalogError::ConnectorTimeout {
                    connector: descriptor.id.clone(),
                    after: timeout,
                }),
            };
            (index, descriptor, result)
        })
        .buffer_unordered(self.config.max_concurrent.max(1))
        .collect::<Vec<_>>()
        .await;
        listings.sort_by_key(|(index, _, _)| *index);

        let mut collections = Vec::new();
        for (_, descriptor, result) in listings {
            match result {
                Ok(found) => collections.extend(found.into_iter().map(|mut c| {
                    c.tag_source(&descriptor.id, &descriptor.display_name);
                    c
                })),
                Err(e) => warn!(connector = %descriptor.id, error = %e, "Collection listing failed"),
            }
        }
        info!(collections = collections.len(), "Loaded collections from all connectors");
        collections
    }
}

fn rank(connectors: &[ConnectorDescriptor], id: &str) -> usize {
    connectors
        .iter()
        .position(|c| c.id == id)
        .unwrap_or(connectors.len())
}
