//! Mapping of arbitrary provider JSON into [`CanonicalItem`].
//!
//! Normalization is idempotent: serializing a normalized item and
//! normalizing it again with the same source id yields the same item.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::assets::AssetPriorityRules;
use crate::bbox::BoundingBox;
use crate::error::{CatalogError, CatalogResult};
use crate::item::{AssetRef, CanonicalItem, Link};

/// Normalize with the default asset priority rules.
pub fn normalize(raw: &Value, source_id: &str) -> CatalogResult<CanonicalItem> {
    normalize_with(raw, source_id, &AssetPriorityRules::default())
}

/// Normalize a provider record. Only a non-object input is an error.
pub fn normalize_with(
    raw: &Value,
    source_id: &str,
    rules: &AssetPriorityRules,
) -> CatalogResult<CanonicalItem> {
    let obj = raw.as_object().ok_or_else(|| {
        CatalogError::Parse(format!(
            "expected a JSON object for an item from {}, got {}",
            source_id,
            json_kind(raw)
        ))
    })?;

    let is_feature = obj.get("type").and_then(Value::as_str) == Some("Feature");

    let properties = obj
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let datetime = obj
        .get("datetime")
        .and_then(parse_datetime)
        .or_else(|| properties.get("datetime").and_then(parse_datetime));

    let nested = obj.get("stac_feature").filter(|v| v.is_object()).cloned();

    let links = match obj.get("links") {
        Some(links) => parse_links(links),
        None if is_feature => nested
            .as_ref()
            .and_then(|f| f.get("links"))
            .map(parse_links)
            .unwrap_or_default(),
        None => Vec::new(),
    };

    Ok(CanonicalItem {
        id: item_id(obj),
        geometry: obj.get("geometry").filter(|g| !g.is_null()).cloned(),
        bbox: obj.get("bbox").and_then(BoundingBox::from_json),
        datetime,
        properties,
        assets: obj
            .get("assets")
            .and_then(Value::as_object)
            .map(|assets| parse_assets(assets, rules))
            .unwrap_or_default(),
        links,
        source_connector_id: source_id.to_string(),
        source_display_name: obj
            .get("source_display_name")
            .and_then(Value::as_str)
            .map(str::to_string),
        feature: nested,
    })
}

/// `id`, else `title`, else `"unknown"`.
fn item_id(obj: &Map<String, Value>) -> String {
    ["id", "title"]
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// RFC 3339 timestamps, or a bare date taken as midnight UTC.
pub fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
}

fn parse_links(value: &Value) -> Vec<Link> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|link| {
            let rel = link.get("rel")?.as_str()?;
            let href = link.get("href")?.as_str()?;
            Some(Link {
                rel: rel.to_string(),
                href: href.to_string(),
                title: link.get("title").and_then(Value::as_str).map(str::to_string),
            })
        })
        .collect()
}

fn parse_assets(assets: &Map<String, Value>, rules: &AssetPriorityRules) -> IndexMap<String, AssetRef> {
    let mut out = IndexMap::with_capacity(assets.len());
    for (key, raw) in assets {
        let Some(href) = raw.get("href").and_then(Value::as_str) else {
            debug!(asset = %key, "Skipping asset without href");
            continue;
        };
        let mut asset = AssetRef {
            href: href.to_string(),
            media_type: raw.get("type").and_then(Value::as_str).map(str::to_string),
            title: raw.get("title").and_then(Value::as_str).map(str::to_string),
            roles: raw
                .get("roles")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            priority: 0,
        };
        asset.priority = match raw.get("priority").and_then(Value::as_u64) {
            Some(p) => u32::try_from(p).unwrap_or(u32::MAX),
            None => rules.score(key, &asset),
        };
        out.insert(key.clone(), asset);
    }
    out
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
