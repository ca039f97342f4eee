//! Canonical item and collection shapes produced by every connector.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bbox::BoundingBox;
use crate::href::{is_absolute, resolve_href};

/// Keys checked, in order, when looking for a quick-look image.
pub const PREVIEW_KEYS: [&str; 4] = ["thumbnail", "preview", "overview", "browse"];

/// One downloadable or viewable file attached to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRef {
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Higher wins when choosing an asset to visualize.
    #[serde(default)]
    pub priority: u32,
}

impl AssetRef {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Link {
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
            title: None,
        }
    }
}

/// The single item schema all connectors produce.
///
/// Serializes as a GeoJSON `Feature`. `properties`, `assets` and `links` are
/// always present, possibly empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct CanonicalItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub assets: IndexMap<String, AssetRef>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub source_connector_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_display_name: Option<String>,
    /// Nested provider feature payload, kept verbatim.
    #[serde(rename = "stac_feature", default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<Value>,
}

impl CanonicalItem {
    pub fn new(id: impl Into<String>, source_connector_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            geometry: None,
            bbox: None,
            datetime: None,
            properties: Map::new(),
            assets: IndexMap::new(),
            links: Vec::new(),
            source_connector_id: source_connector_id.into(),
            source_display_name: None,
            feature: None,
        }
    }

    /// Stamp the item with the connector that produced it.
    pub fn tag_source(&mut self, connector_id: &str, display_name: &str) {
        self.source_connector_id = connector_id.to_string();
        self.source_display_name = Some(display_name.to_string());
    }

    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == rel)
    }

    /// Absolute `self` href, if the item knows where it lives.
    pub fn self_href(&self) -> Option<&str> {
        self.link("self")
            .map(|l| l.href.as_str())
            .filter(|href| is_absolute(href))
    }

    /// `eo:cloud_cover` from properties, when numeric.
    pub fn cloud_cover(&self) -> Option<f64> {
        self.properties.get("eo:cloud_cover").and_then(Value::as_f64)
    }

    /// The asset with the highest priority; ties go to the first declared.
    pub fn best_asset(&self) -> Option<(&str, &AssetRef)> {
        let mut best: Option<(&str, &AssetRef)> = None;
        for (key, asset) in &self.assets {
            match best {
                Some((_, current)) if asset.priority <= current.priority => {}
                _ => best = Some((key.as_str(), asset)),
            }
        }
        best
    }

    /// Asset href made absolute against the item's `self` link.
    ///
    /// Relative hrefs on items without a `self` link are returned unchanged.
    pub fn resolved_asset_href(&self, key: &str) -> Option<String> {
        let asset = self.assets.get(key)?;
        Some(match self.self_href() {
            Some(base) => resolve_href(base, &asset.href),
            None => asset.href.clone(),
        })
    }

    /// Quick-look image href: a well-known preview key first, then a
    /// `thumbnail` or `overview` role.
    pub fn preview_href(&self) -> Option<String> {
        let key = PREVIEW_KEYS
            .iter()
            .find(|k| self.assets.contains_key(**k))
            .map(|k| k.to_string())
            .or_else(|| {
                self.assets
                    .iter()
                    .find(|(_, a)| a.has_role("thumbnail") || a.has_role("overview"))
                    .map(|(k, _)| k.clone())
            })?;
        self.resolved_asset_href(&key)
    }
}

/// One collection a connector exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: String,
    pub title: String,
    /// Best effort; 0 when unknown.
    #[serde(default)]
    pub item_or_asset_count: u64,
    #[serde(default)]
    pub source_connector_id: String,
    #[serde(default)]
    pub source_display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl CollectionInfo {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            item_or_asset_count: 0,
            source_connector_id: String::new(),
            source_display_name: String::new(),
            href: None,
        }
    }

    pub fn tag_source(&mut self, connector_id: &str, display_name: &str) {
        self.source_connector_id = connector_id.to_string();
        self.source_display_name = display_name.to_string();
    }
}
