//! Integration tests for parallel aggregation and the collections cache.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use aggregator::{
    AggregationCache, AggregatorConfig, AuthObserver, ConnectorDescriptor, ConnectorRegistry,
    ParallelAggregator, ALL_COLLECTIONS_KEY, QUERY_SOURCE,
};
use altair_common::{
    BoundingBox, CanonicalItem, Capability, CatalogError, CatalogResult, ConnectorAdapter, Credentials,
    SearchQuery,
};
use test_utils::{assert_item_ids_unordered, StubAdapter};

type Entry = (String, Arc<dyn ConnectorAdapter>, Vec<Capability>);

fn conn(id: &str, adapter: Arc<dyn ConnectorAdapter>, caps: &[Capability]) -> Entry {
    (id.to_string(), adapter, caps.to_vec())
}

async fn setup(connectors: Vec<Entry>) -> ParallelAggregator {
    setup_with(connectors, AggregatorConfig::default()).await
}

async fn setup_with(connectors: Vec<Entry>, config: AggregatorConfig) -> ParallelAggregator {
    let registry = Arc::new(ConnectorRegistry::new());
    for (id, adapter, caps) in connectors {
        registry
            .register(ConnectorDescriptor::new(
                &id,
                id.to_uppercase(),
                caps.into_iter().collect(),
                adapter,
            ))
            .await
            .unwrap();
    }
    ParallelAggregator::new(registry, config).await
}

fn token(value: &str) -> Credentials {
    Credentials::from([("token".to_string(), value.to_string())])
}

// ============================================================================
// search_all
// ============================================================================

#[tokio::test]
async fn test_partial_failure_keeps_sibling_results() {
    let aggregator = setup(vec![
        conn("a", Arc::new(StubAdapter::with_items("a", 2)), &[]),
        conn("b", Arc::new(StubAdapter::failing(CatalogError::network("https://b.test", "connection reset"))), &[]),
        conn("c", Arc::new(StubAdapter::with_items("c", 1)), &[]),
    ])
    .await;

    let (items, summary) = aggregator.search_all(&SearchQuery::default()).await;

    assert_item_ids_unordered!(items, ["a-0", "a-1", "c-0"]);
    assert_eq!(summary.succeeded.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].connector_id, "b");
    assert_eq!(summary.failed[0].kind, "network");
    assert!(summary.to_string().starts_with("Searched: A (2), C (1) | Failed: B ("));
}

#[tokio::test]
async fn test_items_tagged_with_source() {
    let aggregator = setup(vec![
        conn("umbra", Arc::new(StubAdapter::with_items("u", 1)), &[]),
        conn("iceye", Arc::new(StubAdapter::with_items("i", 1)), &[]),
    ])
    .await;

    let (items, _) = aggregator.search_all(&SearchQuery::default()).await;
    for item in &items {
        let expected = if item.id.starts_with('u') { "umbra" } else { "iceye" };
        assert_eq!(item.source_connector_id, expected);
        assert_eq!(item.source_display_name.as_deref(), Some(expected.to_uppercase().as_str()));
    }
}

#[tokio::test]
async fn test_composite_key_targets_one_source() {
    let umbra = Arc::new(StubAdapter::with_items("u", 2));
    let capella = Arc::new(StubAdapter::with_items("c", 2));
    let aggregator = setup(vec![
        conn("umbra", umbra.clone(), &[]),
        conn("capella", capella.clone(), &[]),
    ])
    .await;

    let query = SearchQuery::builder().collection("capella::GEO").build().unwrap();
    let (items, summary) = aggregator.search_all(&query).await;

    assert_item_ids_unordered!(items, ["c-0", "c-1"]);
    assert_eq!(umbra.search_calls(), 0);
    assert_eq!(capella.last_query().unwrap().collection_id.as_deref(), Some("GEO"));
    assert_eq!(summary.succeeded.len(), 1);
}

#[tokio::test]
async fn test_composite_key_unknown_source_is_failure() {
    let stub = Arc::new(StubAdapter::with_items("u", 2));
    let aggregator = setup(vec![conn("umbra", stub.clone(), &[])]).await;

    let query = SearchQuery::builder().collection("maxar::ard").build().unwrap();
    let (items, summary) = aggregator.search_all(&query).await;

    assert!(items.is_empty());
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].kind, "not_found");
    assert_eq!(stub.search_calls(), 0);
}

#[tokio::test]
async fn test_unauthenticated_connectors_are_skipped() {
    let planet = Arc::new(StubAdapter::with_items("p", 1).requiring_token("good"));
    let aggregator = setup(vec![
        conn("umbra", Arc::new(StubAdapter::with_items("u", 1)), &[]),
        conn("planet", planet.clone(), &[Capability::Authentication]),
    ])
    .await;

    let (items, summary) = aggregator.search_all(&SearchQuery::default()).await;
    assert_item_ids_unordered!(items, ["u-0"]);
    assert_eq!(planet.search_calls(), 0);
    assert_eq!(
        summary.to_string(),
        "Searched: UMBRA (1) | Skipped: PLANET (authentication required)"
    );

    aggregator.registry().authenticate("planet", &token("good")).await.unwrap();
    let (items, summary) = aggregator.search_all(&SearchQuery::default()).await;
    assert_eq!(items.len(), 2);
    assert!(summary.skipped.is_empty());
}

#[tokio::test]
async fn test_targeted_unauthenticated_connector_fails() {
    let aggregator = setup(vec![conn(
        "planet",
        Arc::new(StubAdapter::with_items("p", 1).requiring_token("good")),
        &[Capability::Authentication],
    )])
    .await;

    let query = SearchQuery::builder().collection("planet::PSScene").build().unwrap();
    let (_, summary) = aggregator.search_all(&query).await;
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].kind, "auth_required");
}

#[tokio::test]
async fn test_no_connectors() {
    let aggregator = setup(vec![]).await;
    let (items, summary) = aggregator.search_all(&SearchQuery::default()).await;
    assert!(items.is_empty());
    assert_eq!(summary.to_string(), "No connectors searched");
}

#[tokio::test(start_paused = true)]
async fn test_slow_connector_times_out() {
    let config = AggregatorConfig {
        connector_timeout_secs: 30,
        ..Default::default()
    };
    let aggregator = setup_with(
        vec![
            conn("fast", Arc::new(StubAdapter::with_items("f", 1)), &[]),
            conn("slow", Arc::new(StubAdapter::slow("s", 1, Duration::from_secs(120))), &[]),
        ],
        config,
    )
    .await;

    let (items, summary) = aggregator.search_all(&SearchQuery::default()).await;
    assert_item_ids_unordered!(items, ["f-0"]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].connector_id, "slow");
    assert_eq!(summary.failed[0].kind, "timeout");
    assert_eq!(summary.failed[0].reason, "Connector slow did not answer within 30s");
}

#[tokio::test]
async fn test_invalid_query_is_not_fanned_out() {
    let stub = Arc::new(StubAdapter::with_items("u", 3));
    let aggregator = setup(vec![
        conn("umbra", stub.clone(), &[]),
        conn("iceye", Arc::new(StubAdapter::with_items("i", 1)), &[]),
    ])
    .await;

    // west > east
    let query = SearchQuery {
        bbox: Some(BoundingBox::new(20.0, 40.0, 10.0, 50.0)),
        ..Default::default()
    };
    let (items, summary) = aggregator.search_all(&query).await;

    assert!(items.is_empty());
    assert_eq!(stub.search_calls(), 0);
    assert!(summary.succeeded.is_empty());
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].connector_id, QUERY_SOURCE);
    assert_eq!(summary.failed[0].kind, "invalid_query");
}

/// Tracks how many searches run at once.
#[derive(Default)]
struct GaugeAdapter {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl ConnectorAdapter for GaugeAdapter {
    async fn search(&self, _query: &SearchQuery) -> CatalogResult<Vec<CanonicalItem>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_is_bounded() {
    let gauge = Arc::new(GaugeAdapter::default());
    let ids: Vec<String> = (0..8).map(|n| format!("c{}", n)).collect();
    let connectors: Vec<Entry> = ids.iter().map(|id| conn(id, gauge.clone(), &[])).collect();
    let config = AggregatorConfig {
        max_concurrent: 3,
        ..Default::default()
    };
    let aggregator = setup_with(connectors, config).await;

    let (_, summary) = aggregator.search_all(&SearchQuery::default()).await;
    assert_eq!(summary.succeeded.len(), 8);
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 3);
}

// ============================================================================
// Collections cache
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_collections_cached_until_ttl() {
    let stub = Arc::new(StubAdapter::with_items("u", 0).with_collections(&["2023", "2024"]));
    let aggregator = setup(vec![conn("umbra", stub.clone(), &[Capability::Collections])]).await;

    let first = aggregator.get_all_collections(true).await;
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].source_connector_id, "umbra");

    tokio::time::advance(Duration::from_secs(299)).await;
    aggregator.get_all_collections(true).await;
    assert_eq!(stub.collection_calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    aggregator.get_all_collections(true).await;
    aggregator.get_all_collections(true).await;
    assert_eq!(stub.collection_calls(), 2);
}

#[tokio::test]
async fn test_collections_bypass_and_refresh() {
    let stub = Arc::new(StubAdapter::with_items("u", 0).with_collections(&["a"]));
    let aggregator = setup(vec![conn("umbra", stub.clone(), &[Capability::Collections])]).await;

    aggregator.get_all_collections(true).await;
    aggregator.get_all_collections(false).await;
    assert_eq!(stub.collection_calls(), 2);

    aggregator.refresh_collections().await;
    assert_eq!(stub.collection_calls(), 3);
    aggregator.get_all_collections(true).await;
    assert_eq!(stub.collection_calls(), 3);
}

#[tokio::test]
async fn test_collections_skip_connectors_without_capability() {
    let listed = Arc::new(StubAdapter::with_items("a", 0).with_collections(&["x"]));
    let unlisted = Arc::new(StubAdapter::with_items("b", 0).with_collections(&["y"]));
    let broken = Arc::new(StubAdapter::failing(CatalogError::Parse("bad".into())));
    let aggregator = setup(vec![
        conn("a", listed.clone(), &[Capability::Collections]),
        conn("b", unlisted.clone(), &[]),
        conn("c", broken, &[Capability::Collections]),
    ])
    .await;

    let collections = aggregator.get_all_collections(false).await;
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0].id, "x");
    assert_eq!(unlisted.collection_calls(), 0);
}

#[tokio::test]
async fn test_auth_change_invalidates_collections() {
    let stub = Arc::new(
        StubAdapter::with_items("p", 0)
            .with_collections(&["PSScene"])
            .requiring_token("good"),
    );
    let aggregator = setup(vec![conn(
        "planet",
        stub.clone(),
        &[Capability::Collections, Capability::Authentication],
    )])
    .await;

    // unauthenticated connectors contribute nothing
    assert!(aggregator.get_all_collections(true).await.is_empty());
    assert_eq!(stub.collection_calls(), 0);

    aggregator.registry().authenticate("planet", &token("good")).await.unwrap();
    assert!(aggregator.collections_cache().is_empty().await);

    let collections = aggregator.get_all_collections(true).await;
    assert_eq!(collections.len(), 1);
    assert_eq!(stub.collection_calls(), 1);
}

#[tokio::test]
async fn test_collections_for_single_connector() {
    let stub = Arc::new(StubAdapter::with_items("u", 0).with_collections(&["2023"]));
    let aggregator = setup(vec![conn("umbra", stub.clone(), &[Capability::Collections])]).await;

    aggregator.collections_for("umbra", true).await.unwrap();
    aggregator.collections_for("umbra", true).await.unwrap();
    assert_eq!(stub.collection_calls(), 1);

    let err = aggregator.collections_for("unknown", true).await.unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));

    aggregator.collections_cache().invalidate(ALL_COLLECTIONS_KEY).await;
    assert_eq!(aggregator.collections_cache().len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_load_in_flight_during_auth_change_is_not_stored() {
    let ttl = Duration::from_secs(300);
    let cache = Arc::new(AggregationCache::<Vec<String>>::new(8));

    let loading = cache.clone();
    let load = tokio::spawn(async move {
        loading
            .get_or_load(ALL_COLLECTIONS_KEY, ttl, || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, CatalogError>(vec!["listing-before-auth".to_string()])
            })
            .await
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    cache.auth_changed("planet", true).await;

    // the caller still gets its answer, but it is never served from the cache
    let loaded = load.await.unwrap().unwrap();
    assert_eq!(loaded, vec!["listing-before-auth"]);
    assert!(cache.get(ALL_COLLECTIONS_KEY, ttl).await.is_none());

    let fresh = cache
        .get_or_load(ALL_COLLECTIONS_KEY, ttl, || async {
            Ok::<_, CatalogError>(vec!["listing-after-auth".to_string()])
        })
        .await
        .unwrap();
    assert_eq!(fresh, vec!["listing-after-auth"]);
    assert_eq!(cache.get(ALL_COLLECTIONS_KEY, ttl).await, Some(fresh));
}
