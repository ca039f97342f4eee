//! Common test fixtures for catalog middleware tests.
//!
//! Small JSON builders for catalog nodes and items, plus well-known boxes
//! and dates used across the suite.

use serde_json::{json, Value};

/// Common bounding box definitions for testing, as `[west, south, east, north]`.
pub mod bbox {
    /// Whole world
    pub const GLOBAL: [f64; 4] = [-180.0, -90.0, 180.0, 90.0];

    /// Switzerland, roughly
    pub const SWITZERLAND: [f64; 4] = [5.9, 45.8, 10.5, 47.8];

    /// Europe bounding box
    pub const EUROPE: [f64; 4] = [-15.0, 35.0, 45.0, 72.0];

    /// Search window around the "near" leaf of the two-branch scenario
    pub const SEARCH_WINDOW: [f64; 4] = [9.0, 9.0, 12.0, 12.0];

    /// Leaf inside the search window
    pub const NEAR_LEAF: [f64; 4] = [10.0, 10.0, 11.0, 11.0];

    /// Leaf far outside the search window
    pub const FAR_LEAF: [f64; 4] = [50.0, 50.0, 51.0, 51.0];
}

/// Common time values for testing.
pub mod time {
    /// A fixed acquisition time (2023-01-05T10:00:00Z)
    pub const REFERENCE_TIME: &str = "2023-01-05T10:00:00Z";

    pub const REFERENCE_DAY: &str = "2023-01-05";
}

/// Base URL of the synthetic catalogs.
pub const CATALOG_BASE: &str = "https://catalog.test/stac";

/// A catalog (or collection) node with the given links.
///
/// Each link is `(rel, href, title)`.
pub fn catalog(id: &str, links: &[(&str, &str, Option<&str>)]) -> Value {
    json!({
        "type": "Catalog",
        "stac_version": "1.0.0",
        "id": id,
        "description": format!("{} catalog", id),
        "links": links
            .iter()
            .map(|(rel, href, title)| match title {
                Some(title) => json!({"rel": rel, "href": href, "title": title}),
                None => json!({"rel": rel, "href": href}),
            })
            .collect::<Vec<_>>(),
    })
}

/// A STAC item with one GeoTIFF and one thumbnail asset.
pub fn stac_item(id: &str, bbox: [f64; 4], datetime: Option<&str>) -> Value {
    let [w, s, e, n] = bbox;
    json!({
        "type": "Feature",
        "stac_version": "1.0.0",
        "id": id,
        "bbox": bbox,
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[w, s], [e, s], [e, n], [w, n], [w, s]]]
        },
        "properties": {
            "datetime": datetime,
            "platform": "test-sat-1"
        },
        "assets": {
            "GEC": {
                "href": format!("./{}_GEC.tif", id),
                "type": "image/tiff; application=geotiff; profile=cloud-optimized",
                "roles": ["data"]
            },
            "thumbnail": {
                "href": format!("./{}_thumb.png", id),
                "type": "image/png",
                "roles": ["thumbnail"]
            }
        },
        "links": []
    })
}

/// A STAC item with no bbox at all.
pub fn unlocated_item(id: &str) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "properties": {"datetime": time::REFERENCE_TIME},
        "assets": {},
        "links": []
    })
}

/// A STAC API `FeatureCollection` page.
pub fn feature_collection(items: Vec<Value>, next: Option<&str>) -> Value {
    let links: Vec<Value> = next
        .map(|href| vec![json!({"rel": "next", "href": href, "method": "GET"})])
        .unwrap_or_default();
    json!({
        "type": "FeatureCollection",
        "features": items,
        "links": links,
    })
}

/// A raw, non-STAC provider record.
pub fn raw_record(id: &str, bbox: [f64; 4]) -> Value {
    json!({"id": id, "bbox": bbox, "properties": {"sensor": "SAR"}})
}
