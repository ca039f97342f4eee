//! Adapter for providers that publish one GeoJSON FeatureCollection of
//! footprints per collection (open-data event archives and similar).
//!
//! There is no server-side search: the whole collection is fetched once,
//! cached, normalized and filtered locally by bbox, date window, cloud cover
//! and free text. An optional `name,count` CSV index lists the collections.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use altair_common::fetch::{get_json, get_text};
use altair_common::{
    normalize_with, AssetPriorityRules, BoundingBox, CanonicalItem, CatalogError, CatalogResult,
    CollectionInfo, ConnectorAdapter, DateInterval, FetchPort, SearchQuery,
};

/// Placeholder substituted with the collection id in footprint URLs.
pub const COLLECTION_PLACEHOLDER: &str = "{collection}";

pub const COG_MEDIA_TYPE: &str = "image/tiff; application=geotiff; profile=cloud-optimized";

#[derive(Debug, Clone)]
pub struct FootprintOptions {
    pub connector_id: String,
    /// FeatureCollection URL, usually containing [`COLLECTION_PLACEHOLDER`].
    pub footprint_url: String,
    /// CSV document of `name,count` rows, one per collection.
    pub index_url: Option<String>,
    /// Collection searched when the query names none.
    pub default_collection: Option<String>,
    /// Property holding the cloud-cover percentage.
    pub cloud_cover_property: String,
    /// Properties whose value is a COG URL, promoted to assets of the same key.
    pub asset_properties: Vec<String>,
    pub timeout: Duration,
    pub asset_rules: AssetPriorityRules,
}

impl FootprintOptions {
    pub fn new(connector_id: impl Into<String>, footprint_url: impl Into<String>) -> Self {
        Self {
            connector_id: connector_id.into(),
            footprint_url: footprint_url.into(),
            index_url: None,
            default_collection: None,
            cloud_cover_property: "eo:cloud_cover".to_string(),
            asset_properties: Vec::new(),
            timeout: Duration::from_secs(180),
            asset_rules: AssetPriorityRules::default(),
        }
    }

    pub fn is_templated(&self) -> bool {
        self.footprint_url.contains(COLLECTION_PLACEHOLDER)
    }

    pub fn footprint_url_for(&self, collection: &str) -> String {
        self.footprint_url.replace(COLLECTION_PLACEHOLDER, collection)
    }
}

pub struct FootprintCollectionAdapter {
    fetch: Arc<dyn FetchPort>,
    options: FootprintOptions,
    footprints: RwLock<HashMap<String, Arc<Vec<Value>>>>,
}

impl FootprintCollectionAdapter {
    pub fn new(fetch: Arc<dyn FetchPort>, options: FootprintOptions) -> Self {
        Self {
            fetch,
            options,
            footprints: RwLock::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &FootprintOptions {
        &self.options
    }

    /// Features of one collection, fetched on first use.
    pub async fn load_features(&self, collection: &str) -> CatalogResult<Arc<Vec<Value>>> {
        let url = self.options.footprint_url_for(collection);
        if let Some(features) = self.footprints.read().await.get(&url) {
            debug!(collection = %collection, "Using cached footprints");
            return Ok(features.clone());
        }

        let doc = get_json(self.fetch.as_ref(), &url, self.options.timeout).await?;
        let features = doc
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| CatalogError::Parse(format!("{}: not a FeatureCollection", url)))?;
        let features = Arc::new(features.clone());
        info!(collection = %collection, features = features.len(), "Loaded footprints");

        self.footprints.write().await.insert(url, features.clone());
        Ok(features)
    }

    /// Normalize one footprint feature on behalf of `collection`.
    pub fn to_item(&self, feature: &Value, collection: &str) -> CatalogResult<CanonicalItem> {
        let mut raw = feature.clone();
        if let Some(obj) = raw.as_object_mut() {
            if !obj.contains_key("assets") {
                let assets = promoted_assets(obj.get("properties"), &self.options.asset_properties);
                obj.insert("assets".into(), Value::Object(assets));
            }
        }

        let mut item = normalize_with(&raw, &self.options.connector_id, &self.options.asset_rules)?;
        if item.bbox.is_none() {
            item.bbox = item.geometry.as_ref().and_then(BoundingBox::from_geometry);
        }
        if !collection.is_empty() {
            item.properties
                .entry("collection")
                .or_insert_with(|| Value::String(collection.to_string()));
        }
        Ok(item)
    }

    async fn load_index(&self, url: &str) -> CatalogResult<Vec<CollectionInfo>> {
        let text = get_text(self.fetch.as_ref(), url, self.options.timeout).await?;
        let mut collections = parse_index(&text);
        for info in &mut collections {
            info.href = Some(self.options.footprint_url_for(&info.id));
        }
        debug!(url = %url, collections = collections.len(), "Loaded collection index");
        Ok(collections)
    }
}

#[async_trait]
impl ConnectorAdapter for FootprintCollectionAdapter {
    #[instrument(skip(self, query), fields(connector = %self.options.connector_id))]
    async fn search(&self, query: &SearchQuery) -> CatalogResult<Vec<CanonicalItem>> {
        let collection = query
            .collection_id
            .as_deref()
            .filter(|c| !c.is_empty())
            .or(self.options.default_collection.as_deref());
        let collection = match collection {
            Some(collection) => collection,
            None if self.options.is_templated() => {
                debug!("No collection named, nothing to search");
                return Ok(Vec::new());
            }
            None => "",
        };
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let features = self.load_features(collection).await?;
        let filter = FootprintFilter::from_query(query, &self.options.cloud_cover_property);

        let mut items = Vec::new();
        for feature in features.iter() {
            let item = match self.to_item(feature, collection) {
                Ok(item) => item,
                Err(e) => {
                    warn!(collection = %collection, error = %e, "Skipping unusable footprint");
                    continue;
                }
            };
            if !filter.accepts(&item) {
                continue;
            }
            items.push(item);
            if items.len() >= query.limit {
                break;
            }
        }

        debug!(
            collection = %collection,
            returned = items.len(),
            scanned = features.len(),
            "Filtered footprints"
        );
        Ok(items)
    }

    async fn list_collections(&self) -> CatalogResult<Vec<CollectionInfo>> {
        if let Some(url) = &self.options.index_url {
            return self.load_index(url).await;
        }

        let collection = match (&self.options.default_collection, self.options.is_templated()) {
            (Some(collection), _) => collection.clone(),
            (None, false) => self.options.connector_id.clone(),
            (None, true) => return Ok(Vec::new()),
        };
        let features = self.load_features(&collection).await?;
        let mut info = CollectionInfo::new(&collection, &collection);
        info.item_or_asset_count = features.len() as u64;
        info.href = Some(self.options.footprint_url_for(&collection));
        Ok(vec![info])
    }
}

/// Local filters over normalized footprints.
///
/// Like the walker's filters they are inclusive: a footprint without a
/// bbox, datetime or cloud-cover value is never excluded by that filter.
#[derive(Debug, Clone)]
pub struct FootprintFilter {
    pub bbox: Option<BoundingBox>,
    pub interval: DateInterval,
    pub max_cloud_cover: Option<f64>,
    pub cloud_cover_property: String,
    /// Lower-cased free text matched against id and title.
    pub text: Option<String>,
}

impl FootprintFilter {
    pub fn from_query(query: &SearchQuery, cloud_cover_property: &str) -> Self {
        Self {
            bbox: query.bbox,
            interval: query.interval(),
            max_cloud_cover: query.max_cloud_cover,
            cloud_cover_property: cloud_cover_property.to_string(),
            text: query
                .text_query
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_lowercase),
        }
    }

    pub fn accepts(&self, item: &CanonicalItem) -> bool {
        if let (Some(filter), Some(bbox)) = (&self.bbox, &item.bbox) {
            if !bbox.intersects(filter) {
                return false;
            }
        }
        if let Some(datetime) = &item.datetime {
            if !self.interval.contains(datetime) {
                return false;
            }
        }
        if let (Some(max), Some(cloud)) = (self.max_cloud_cover, self.cloud_cover(item)) {
            if cloud > max {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let title = item.properties.get("title").and_then(Value::as_str).unwrap_or_default();
            if !item.id.to_lowercase().contains(text) && !title.to_lowercase().contains(text) {
                return false;
            }
        }
        true
    }

    fn cloud_cover(&self, item: &CanonicalItem) -> Option<f64> {
        match item.properties.get(&self.cloud_cover_property)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn promoted_assets(properties: Option<&Value>, keys: &[String]) -> Map<String, Value> {
    let mut assets = Map::new();
    for key in keys {
        let Some(href) = properties
            .and_then(|p| p.get(key))
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty())
        else {
            continue;
        };
        let role = if key == "visual" { "visual" } else { "data" };
        assets.insert(
            key.clone(),
            json!({"href": href, "type": COG_MEDIA_TYPE, "roles": [role]}),
        );
    }
    assets
}

/// Parse a `name,count` CSV index. The first line is a header; rows with an
/// empty name are dropped and an unreadable count becomes zero.
pub fn parse_index(text: &str) -> Vec<CollectionInfo> {
    let mut collections: Vec<CollectionInfo> = text
        .lines()
        .skip(1)
        .filter_map(|line| {
            let (name, count) = line.trim().split_once(',')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let count = count.split(',').next().unwrap_or_default().trim();
            let mut info = CollectionInfo::new(name, name);
            info.item_or_asset_count = count.parse().unwrap_or_else(|_| {
                warn!(collection = %name, count = %count, "Unreadable collection count");
                0
            });
            Some(info)
        })
        .collect();
    collections.sort_by_key(|c| c.id.to_lowercase());
    collections
}
