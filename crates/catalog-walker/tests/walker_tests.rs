//! Integration tests for the catalog tree walker against synthetic catalogs.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;

use altair_common::{BoundingBox, CatalogError, DateInterval};
use catalog_walker::{BranchFilter, CatalogTreeWalker, NodeMatcher, WalkPlan, WalkerConfig};
use test_utils::{
    assert_item_ids, assert_item_ids_unordered, bbox, catalog, chain_catalog, chain_node_url,
    dated_catalog, organised_catalog, root_url, stac_item, two_branch_catalog, unlocated_item,
    wide_catalog, MockFetcher, CATALOG_BASE,
};

fn walker(fetcher: &Arc<MockFetcher>, max_depth: usize) -> CatalogTreeWalker {
    CatalogTreeWalker::new(
        fetcher.clone(),
        WalkerConfig {
            max_depth,
            ..Default::default()
        },
    )
}

fn plan(limit: usize) -> WalkPlan {
    WalkPlan::new(root_url(), "synthetic", limit)
}

fn bb(b: [f64; 4]) -> Option<BoundingBox> {
    Some(BoundingBox::new(b[0], b[1], b[2], b[3]))
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_two_branch_catalog_returns_only_intersecting_leaf() {
    let fetcher = Arc::new(MockFetcher::with_documents(two_branch_catalog()));
    let outcome = walker(&fetcher, 4)
        .walk(&plan(10).with_bbox(bb(bbox::SEARCH_WINDOW)))
        .await
        .unwrap();

    assert_item_ids!(outcome.items, ["near"]);
    assert_eq!(outcome.items[0].source_connector_id, "synthetic");
    assert_eq!(outcome.stats.items_filtered, 1);
    assert!(!outcome.stats.budget_exhausted);
}

#[tokio::test]
async fn test_item_without_bbox_is_included() {
    let fetcher = Arc::new(MockFetcher::with_documents(vec![
        (
            root_url(),
            catalog("root", &[("item", "./nowhere.json", None), ("item", "./far.json", None)]),
        ),
        (format!("{}/nowhere.json", CATALOG_BASE), unlocated_item("nowhere")),
        (format!("{}/far.json", CATALOG_BASE), stac_item("far", bbox::FAR_LEAF, None)),
    ]));

    let outcome = walker(&fetcher, 2)
        .walk(&plan(10).with_bbox(bb(bbox::SEARCH_WINDOW)))
        .await
        .unwrap();
    assert_item_ids!(outcome.items, ["nowhere"]);
}

#[tokio::test]
async fn test_feature_root_is_a_leaf() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.insert_json(&root_url(), &stac_item("solo", bbox::NEAR_LEAF, None));

    let outcome = walker(&fetcher, 2).walk(&plan(5)).await.unwrap();
    assert_item_ids!(outcome.items, ["solo"]);
    assert_eq!(outcome.items[0].self_href(), Some(root_url().as_str()));
}

// ============================================================================
// Result budget
// ============================================================================

#[tokio::test]
async fn test_result_budget_never_exceeded() {
    for limit in [0usize, 1, 2, 3, 5, 11, 12, 13, 100] {
        let fetcher = Arc::new(MockFetcher::with_documents(wide_catalog(3, 4)));
        let outcome = walker(&fetcher, 3).walk(&plan(limit)).await.unwrap();

        assert!(
            outcome.items.len() <= limit,
            "limit {} produced {} items",
            limit,
            outcome.items.len()
        );
        assert_eq!(outcome.items.len(), limit.min(12));
        assert_eq!(outcome.stats.budget_exhausted, limit > 0 && limit <= 12);
    }
}

#[tokio::test]
async fn test_zero_limit_fetches_nothing() {
    let fetcher = Arc::new(MockFetcher::with_documents(wide_catalog(2, 2)));
    let outcome = walker(&fetcher, 3).walk(&plan(0)).await.unwrap();

    assert!(outcome.items.is_empty());
    assert_eq!(fetcher.total_calls(), 0);
}

#[tokio::test]
async fn test_budget_stops_before_next_sibling() {
    let fetcher = Arc::new(MockFetcher::with_documents(wide_catalog(3, 4)));
    let outcome = walker(&fetcher, 3).walk(&plan(2)).await.unwrap();

    assert_item_ids!(outcome.items, ["c0-0", "c0-1"]);
    assert_eq!(
        fetcher.fetched_urls(),
        vec![
            root_url(),
            format!("{}/c0/collection.json", CATALOG_BASE),
            format!("{}/c0/c0-0.json", CATALOG_BASE),
            format!("{}/c0/c0-1.json", CATALOG_BASE),
        ]
    );
}

// ============================================================================
// Depth bound
// ============================================================================

#[tokio::test]
async fn test_no_node_deeper_than_max_depth_is_fetched() {
    for max_depth in 0..=4 {
        let fetcher = Arc::new(MockFetcher::with_documents(chain_catalog(5)));
        let outcome = walker(&fetcher, max_depth).walk(&plan(100)).await.unwrap();

        for depth in 0..=5 {
            let calls = fetcher.call_count(&chain_node_url(depth));
            if depth <= max_depth {
                assert_eq!(calls, 1, "depth {} should be fetched once", depth);
            } else {
                assert_eq!(calls, 0, "depth {} fetched with max_depth {}", depth, max_depth);
            }
        }
        assert_eq!(outcome.items.len(), max_depth + 1);
        assert_eq!(outcome.stats.nodes_fetched, max_depth + 1);
    }
}

// ============================================================================
// Link resolution and breadth order
// ============================================================================

#[tokio::test]
async fn test_nested_relative_links_resolve_at_every_level() {
    let fetcher = Arc::new(MockFetcher::with_documents(dated_catalog()));
    let outcome = walker(&fetcher, 4).walk(&plan(100)).await.unwrap();

    // breadth-first: 2023 months before 2024
    assert_item_ids!(outcome.items, ["2023-01-item", "2023-02-item", "2024-03-item"]);
    assert_eq!(outcome.stats.failed_fetches, 0);

    let first = &outcome.items[0];
    assert_eq!(
        first.self_href(),
        Some(format!("{}/2023/01/05/item.json", CATALOG_BASE).as_str())
    );
    assert_eq!(
        first.resolved_asset_href("GEC").unwrap(),
        format!("{}/2023/01/05/2023-01-item_GEC.tif", CATALOG_BASE)
    );
}

#[tokio::test]
async fn test_absolute_self_link_is_the_base() {
    let fetcher = Arc::new(MockFetcher::with_documents(vec![
        (
            root_url(),
            catalog(
                "root",
                &[
                    ("self", "https://mirror.test/data/catalog.json", None),
                    ("item", "./x.json", None),
                ],
            ),
        ),
        (
            "https://mirror.test/data/x.json".to_string(),
            stac_item("x", bbox::NEAR_LEAF, None),
        ),
    ]));

    let outcome = walker(&fetcher, 1).walk(&plan(5)).await.unwrap();
    assert_item_ids!(outcome.items, ["x"]);
}

#[tokio::test]
async fn test_duplicate_links_fetched_once() {
    let fetcher = Arc::new(MockFetcher::with_documents(vec![
        (
            root_url(),
            catalog(
                "root",
                &[
                    ("child", "./a/catalog.json", None),
                    ("child", "a/catalog.json", None),
                ],
            ),
        ),
        (
            format!("{}/a/catalog.json", CATALOG_BASE),
            catalog("a", &[("item", "./i.json", None), ("child", "../catalog.json", None)]),
        ),
        (
            format!("{}/a/i.json", CATALOG_BASE),
            stac_item("i", bbox::NEAR_LEAF, None),
        ),
    ]));

    let outcome = walker(&fetcher, 4).walk(&plan(10)).await.unwrap();
    assert_item_ids!(outcome.items, ["i"]);
    assert_eq!(fetcher.call_count(&format!("{}/a/catalog.json", CATALOG_BASE)), 1);
    assert_eq!(fetcher.call_count(&root_url()), 1);
}

#[tokio::test]
async fn test_node_pruned_under_one_parent_reachable_through_another() {
    let shared = format!("{}/shared/catalog.json", CATALOG_BASE);
    let fetcher = Arc::new(MockFetcher::with_documents(vec![
        (
            root_url(),
            catalog(
                "root",
                &[
                    ("child", "./shared/catalog.json", Some("archive")),
                    ("child", "./2023/catalog.json", Some("2023")),
                ],
            ),
        ),
        (
            format!("{}/2023/catalog.json", CATALOG_BASE),
            catalog("2023", &[("child", "../shared/catalog.json", Some("shared"))]),
        ),
        (
            shared.clone(),
            catalog("shared", &[("item", "./s.json", None)]),
        ),
        (
            format!("{}/shared/s.json", CATALOG_BASE),
            stac_item("s", bbox::NEAR_LEAF, None),
        ),
    ]));
    let walk = plan(10).with_filter(BranchFilter::new(1, NodeMatcher::TitleEquals("2023".into())));

    let outcome = walker(&fetcher, 4).walk(&walk).await.unwrap();
    assert_item_ids!(outcome.items, ["s"]);
    assert_eq!(fetcher.call_count(&shared), 1);
    assert_eq!(outcome.stats.nodes_pruned, 1);
}

// ============================================================================
// Filters
// ============================================================================

#[tokio::test]
async fn test_year_and_month_branch_filters() {
    let fetcher = Arc::new(MockFetcher::with_documents(dated_catalog()));
    let walk = plan(100)
        .with_filter(BranchFilter::new(1, NodeMatcher::TitleEquals("2023".into())))
        .with_filter(BranchFilter::new(2, NodeMatcher::TitleEquals("2023-02".into())));

    let outcome = walker(&fetcher, 4).walk(&walk).await.unwrap();
    assert_item_ids!(outcome.items, ["2023-02-item"]);
    assert_eq!(
        fetcher.call_count(&format!("{}/2024/catalog.json", CATALOG_BASE)),
        0
    );
}

#[tokio::test]
async fn test_date_interval_filter_end_day_inclusive() {
    let fetcher = Arc::new(MockFetcher::with_documents(dated_catalog()));
    let walk = plan(100).with_interval(DateInterval::new(
        Some(date("2023-01-05")),
        Some(date("2023-02-05")),
    ));

    let outcome = walker(&fetcher, 4).walk(&walk).await.unwrap();
    assert_item_ids!(outcome.items, ["2023-01-item", "2023-02-item"]);
    assert_eq!(outcome.stats.items_filtered, 1);
}

#[tokio::test]
async fn test_node_id_filter() {
    let fetcher = Arc::new(MockFetcher::with_documents(organised_catalog()));
    let walk = plan(100).with_filter(BranchFilter::new(
        1,
        NodeMatcher::NodeId("by-product-type".into()),
    ));

    let outcome = walker(&fetcher, 3).walk(&walk).await.unwrap();
    assert_item_ids_unordered!(outcome.items, ["GEO-item", "SLC-item"]);
    assert_eq!(outcome.stats.nodes_pruned, 1);
}

#[tokio::test]
async fn test_organisation_then_group_filters() {
    let fetcher = Arc::new(MockFetcher::with_documents(organised_catalog()));
    let walk = plan(100)
        .with_filter(BranchFilter::new(1, NodeMatcher::HrefContains("by-instrument-mode".into())))
        .with_filter(BranchFilter::new(2, NodeMatcher::TitleContains("SPOT".into())));

    let outcome = walker(&fetcher, 3).walk(&walk).await.unwrap();
    assert_item_ids!(outcome.items, ["spotlight-item"]);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_failed_branch_is_skipped() {
    let fetcher = Arc::new(MockFetcher::with_documents(two_branch_catalog()));
    fetcher.insert_failure(
        &format!("{}/a/catalog.json", CATALOG_BASE),
        CatalogError::network("a", "connection reset"),
    );

    let outcome = walker(&fetcher, 4).walk(&plan(10)).await.unwrap();
    assert_item_ids!(outcome.items, ["far"]);
    assert_eq!(outcome.stats.failed_fetches, 1);
}

#[tokio::test]
async fn test_unparseable_item_is_skipped() {
    let fetcher = Arc::new(MockFetcher::with_documents(two_branch_catalog()));
    fetcher.insert_status(&format!("{}/b/far.json", CATALOG_BASE), 200, "<html>oops</html>");
    fetcher.insert_json(&format!("{}/a/near.json", CATALOG_BASE), &json!(["not", "an", "item"]));

    let outcome = walker(&fetcher, 4).walk(&plan(10)).await.unwrap();
    assert!(outcome.items.is_empty());
    assert_eq!(outcome.stats.failed_fetches, 2);
}

#[tokio::test]
async fn test_root_network_failure_is_fatal() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.insert_failure(&root_url(), CatalogError::network(root_url(), "refused"));

    let err = walker(&fetcher, 4).walk(&plan(10)).await.unwrap_err();
    assert!(err.is_network());
}

#[tokio::test]
async fn test_root_missing_or_garbled() {
    let fetcher = Arc::new(MockFetcher::new());
    let err = walker(&fetcher, 4).walk(&plan(10)).await.unwrap_err();
    assert!(err.is_network(), "404 root should be a network error, got {:?}", err);

    fetcher.insert_status(&root_url(), 200, "not json");
    let err = walker(&fetcher, 4).walk(&plan(10)).await.unwrap_err();
    assert!(matches!(err, CatalogError::Parse(_)));
}
