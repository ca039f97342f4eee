//! Normalization idempotence and canonical invariants.

use altair_common::{normalize, normalize_with, AssetPriorityRules, CanonicalItem};
use serde_json::{json, Value};

fn renormalize(item: &CanonicalItem, source: &str) -> CanonicalItem {
    let value = serde_json::to_value(item).expect("canonical item serializes");
    normalize(&value, source).expect("canonical item normalizes")
}

fn raw_inputs() -> Vec<Value> {
    vec![
        json!({}),
        json!({"title": "only a title"}),
        json!({"id": 17, "bbox": [1.0, 2.0, 3.0, 4.0]}),
        json!({"id": "3d", "bbox": [1.0, 2.0, -5.0, 3.0, 4.0, 5.0], "geometry": null}),
        json!({"id": "bad-bbox", "bbox": "nope", "properties": "nope", "links": {}}),
        json!({
            "id": "dated",
            "properties": {"datetime": "2023-01-05", "platform": "umbra-06"}
        }),
        json!({
            "type": "Feature",
            "id": "stac-1",
            "geometry": {"type": "Point", "coordinates": [10.5, 10.5]},
            "bbox": [10.0, 10.0, 11.0, 11.0],
            "properties": {"datetime": "2023-01-05T12:00:00.123Z", "eo:cloud_cover": 12.5},
            "assets": {
                "GEC": {"href": "./item_GEC.tif", "type": "image/tiff", "roles": ["data"]},
                "thumbnail": {"href": "./thumb.png", "type": "image/png", "roles": ["thumbnail"]},
                "metadata": {"href": "./meta.json"}
            },
            "links": [
                {"rel": "self", "href": "https://h/2023/01/05/item.json"},
                {"rel": "parent", "href": "../catalog.json", "title": "Day"}
            ]
        }),
        json!({
            "type": "Feature",
            "id": "nested",
            "stac_feature": {
                "links": [{"rel": "self", "href": "https://h/nested.json"}],
                "assets": {},
                "properties": {}
            }
        }),
        json!({
            "id": "plain-with-nested",
            "stac_feature": {"links": [{"rel": "self", "href": "https://h/p.json"}]}
        }),
        json!({"type": "Feature", "id": "tagged", "source_display_name": "Umbra Open Data"}),
    ]
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_normalize_is_idempotent() {
    for raw in raw_inputs() {
        let once = normalize(&raw, "umbra").unwrap();
        let twice = renormalize(&once, "umbra");
        assert_eq!(once, twice, "normalization not idempotent for {}", raw);
    }
}

#[test]
fn test_normalize_with_rules_is_idempotent() {
    let rules = AssetPriorityRules::geocoded_first();
    for raw in raw_inputs() {
        let once = normalize_with(&raw, "umbra", &rules).unwrap();
        let value = serde_json::to_value(&once).unwrap();
        // Rules are irrelevant on the second pass: priorities are already set.
        let twice = normalize(&value, "umbra").unwrap();
        assert_eq!(once, twice);
    }
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn test_containers_never_absent_in_output() {
    for raw in raw_inputs() {
        let value = serde_json::to_value(normalize(&raw, "s").unwrap()).unwrap();
        assert!(value["properties"].is_object());
        assert!(value["assets"].is_object());
        assert!(value["links"].is_array());
        assert_eq!(value["type"], "Feature");
    }
}

#[test]
fn test_plain_record_keeps_geometry_and_bbox() {
    let item = normalize(&raw_inputs()[2], "s").unwrap();
    assert_eq!(item.id, "17");
    assert_eq!(item.bbox.unwrap().to_array(), [1.0, 2.0, 3.0, 4.0]);

    let item = normalize(&raw_inputs()[3], "s").unwrap();
    assert!(item.geometry.is_none());
    assert_eq!(item.bbox.unwrap().to_array(), [1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_stac_feature_asset_resolution() {
    let item = normalize_with(&raw_inputs()[6], "umbra", &AssetPriorityRules::geocoded_first())
        .unwrap();
    let (key, _) = item.best_asset().unwrap();
    assert_eq!(key, "GEC");
    assert_eq!(
        item.resolved_asset_href(key).unwrap(),
        "https://h/2023/01/05/item_GEC.tif"
    );
    assert_eq!(item.preview_href().unwrap(), "https://h/2023/01/05/thumb.png");
    assert_eq!(item.cloud_cover(), Some(12.5));
}
