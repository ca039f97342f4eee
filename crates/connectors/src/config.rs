//! Declarative connector definitions.
//!
//! Each provider is described by one [`ConnectorSpec`], usually loaded from
//! YAML, and turned into a ready adapter by [`build`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use altair_common::{
    AssetPriorityRules, CapabilitySet, CollectionInfo, ConnectorAdapter, Credentials, FetchPort,
};
use catalog_walker::{CatalogTreeWalker, WalkerConfig};

use crate::auth::AuthScheme;
use crate::collections::{CollectionIdStyle, CollectionListing};
use crate::footprint::{FootprintCollectionAdapter, FootprintOptions, COLLECTION_PLACEHOLDER};
use crate::query_bag::BagDialect;
use crate::stac_api::{CloudCoverFilter, StacApiAdapter, StacApiOptions};
use crate::static_catalog::{BagCatalogAdapter, TreeWalkAdapter};

/// Errors raised while turning specs into adapters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Connector {id}: {message}")]
    Invalid { id: String, message: String },

    #[error("Duplicate connector id in configuration: {0}")]
    DuplicateId(String),
}

/// One provider definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorSpec {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capabilities: CapabilitySet,
    /// Credential key → environment variable holding its value.
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
    #[serde(default)]
    pub asset_rules: Option<AssetRulesSpec>,
    #[serde(flatten)]
    pub kind: ConnectorKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectorKind {
    StacApi(StacApiSpec),
    BagCatalog(BagCatalogSpec),
    TreeWalk(TreeWalkSpec),
    FootprintCollection(FootprintSpec),
}

/// Either a named preset or explicit rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetRulesSpec {
    Preset(AssetRulesPreset),
    Rules(AssetPriorityRules),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetRulesPreset {
    Default,
    GeocodedFirst,
    TerrainCorrectedFirst,
}

impl AssetRulesSpec {
    pub fn resolve(&self) -> AssetPriorityRules {
        match self {
            AssetRulesSpec::Preset(AssetRulesPreset::Default) => AssetPriorityRules::default(),
            AssetRulesSpec::Preset(AssetRulesPreset::GeocodedFirst) => AssetPriorityRules::geocoded_first(),
            AssetRulesSpec::Preset(AssetRulesPreset::TerrainCorrectedFirst) => {
                AssetPriorityRules::terrain_corrected_first()
            }
            AssetRulesSpec::Rules(rules) => rules.clone(),
        }
    }
}

/// Settings of a STAC API provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacApiSpec {
    pub base_url: String,
    #[serde(default = "default_search_path")]
    pub search_path: String,
    #[serde(default = "default_page_size")]
    pub max_page_size: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default)]
    pub require_bbox: bool,
    #[serde(default)]
    pub default_collection: Option<String>,
    #[serde(default)]
    pub default_lookback_days: Option<i64>,
    #[serde(default)]
    pub cloud_cover: Option<CloudCoverFilter>,
    /// CQL2 JSON filter applied to every search.
    #[serde(default)]
    pub base_filter: Option<Value>,
    #[serde(default)]
    pub text_search: bool,
    #[serde(default)]
    pub collections: Vec<StaticCollection>,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub auth: AuthScheme,
    /// GET request used to verify credentials.
    #[serde(default)]
    pub verify_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticCollection {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Traversal settings shared by the static-catalog kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkSpec {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_node_timeout")]
    pub node_timeout_secs: u64,
    #[serde(default = "default_item_timeout")]
    pub item_timeout_secs: u64,
    #[serde(default)]
    pub collection_ids: CollectionIdStyle,
    /// Organisation catalogs whose children are listed as collections.
    #[serde(default)]
    pub organisations: Vec<String>,
}

impl Default for WalkSpec {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            node_timeout_secs: default_node_timeout(),
            item_timeout_secs: default_item_timeout(),
            collection_ids: CollectionIdStyle::default(),
            organisations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BagCatalogSpec {
    pub root_url: String,
    pub dialect: BagDialect,
    #[serde(flatten)]
    pub walk: WalkSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeWalkSpec {
    pub root_url: String,
    #[serde(flatten)]
    pub walk: WalkSpec,
}

/// Settings of a provider publishing one FeatureCollection per collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootprintSpec {
    /// May contain `{collection}`, replaced by the searched collection id.
    pub footprint_url: String,
    /// `name,count` CSV listing the collections.
    #[serde(default)]
    pub index_url: Option<String>,
    #[serde(default)]
    pub default_collection: Option<String>,
    #[serde(default = "default_cloud_cover_property")]
    pub cloud_cover_property: String,
    #[serde(default)]
    pub asset_properties: Vec<String>,
    #[serde(default = "default_footprint_timeout")]
    pub timeout_secs: u64,
}

/// An adapter together with its registration metadata.
pub struct BuiltConnector {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub capabilities: CapabilitySet,
    pub adapter: Arc<dyn ConnectorAdapter>,
    /// Credential key → environment variable.
    pub credential_env: BTreeMap<String, String>,
}

impl BuiltConnector {
    /// Credentials read through `lookup`, `None` when any named value is missing
    /// or when the connector declares none.
    pub fn credentials_from<F>(&self, lookup: F) -> Option<Credentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.credential_env.is_empty() {
            return None;
        }
        self.credential_env
            .iter()
            .map(|(key, var)| lookup(var).map(|value| (key.clone(), value)))
            .collect()
    }
}

impl std::fmt::Debug for BuiltConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltConnector")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

pub fn build(spec: &ConnectorSpec, fetch: Arc<dyn FetchPort>) -> Result<BuiltConnector, ConfigError> {
    let invalid = |message: &str| ConfigError::Invalid {
        id: spec.id.clone(),
        message: message.to_string(),
    };
    if spec.id.trim().is_empty() {
        return Err(invalid("id must not be empty"));
    }
    if spec.id.contains(altair_common::query::COMPOSITE_SEPARATOR) {
        return Err(invalid("id must not contain '::'"));
    }

    let asset_rules = spec
        .asset_rules
        .as_ref()
        .map(AssetRulesSpec::resolve)
        .unwrap_or_default();

    let adapter: Arc<dyn ConnectorAdapter> = match &spec.kind {
        ConnectorKind::StacApi(api) => {
            if !is_http_url(&api.base_url) {
                return Err(invalid("base_url must be an http(s) URL"));
            }
            if api.max_page_size == 0 {
                return Err(invalid("max_page_size must be positive"));
            }
            let mut options = StacApiOptions::new(&spec.id, &api.base_url);
            options.search_path = api.search_path.clone();
            options.max_page_size = api.max_page_size;
            options.max_pages = api.max_pages.max(1);
            options.require_bbox = api.require_bbox;
            options.default_collection = api.default_collection.clone();
            options.default_lookback_days = api.default_lookback_days;
            options.cloud_cover = api.cloud_cover.clone();
            options.base_filter = api.base_filter.clone();
            options.text_search = api.text_search;
            options.static_collections = api
                .collections
                .iter()
                .map(|c| CollectionInfo::new(&c.id, c.title.as_deref().unwrap_or(&c.id)))
                .collect();
            options.timeout = Duration::from_secs(api.timeout_secs);
            options.auth = api.auth.clone();
            options.verify_url = api.verify_url.clone();
            options.asset_rules = asset_rules;
            Arc::new(StacApiAdapter::new(fetch, options))
        }
        ConnectorKind::BagCatalog(bag) => {
            if !is_http_url(&bag.root_url) {
                return Err(invalid("root_url must be an http(s) URL"));
            }
            let walker = CatalogTreeWalker::new(fetch, walker_config(&bag.walk, asset_rules));
            Arc::new(
                BagCatalogAdapter::new(&spec.id, &bag.root_url, bag.dialect.clone(), walker)
                    .with_listing(listing(&bag.walk)),
            )
        }
        ConnectorKind::TreeWalk(tree) => {
            if !is_http_url(&tree.root_url) {
                return Err(invalid("root_url must be an http(s) URL"));
            }
            let walker = CatalogTreeWalker::new(fetch, walker_config(&tree.walk, asset_rules));
            Arc::new(
                TreeWalkAdapter::new(&spec.id, &tree.root_url, walker).with_listing(listing(&tree.walk)),
            )
        }
        ConnectorKind::FootprintCollection(footprints) => {
            if !is_http_url(&footprints.footprint_url) {
                return Err(invalid("footprint_url must be an http(s) URL"));
            }
            if let Some(index_url) = &footprints.index_url {
                if !is_http_url(index_url) {
                    return Err(invalid("index_url must be an http(s) URL"));
                }
                if !footprints.footprint_url.contains(COLLECTION_PLACEHOLDER) {
                    return Err(invalid("footprint_url must contain {collection} when index_url is set"));
                }
            }
            let mut options = FootprintOptions::new(&spec.id, &footprints.footprint_url);
            options.index_url = footprints.index_url.clone();
            options.default_collection = footprints.default_collection.clone();
            options.cloud_cover_property = footprints.cloud_cover_property.clone();
            options.asset_properties = footprints.asset_properties.clone();
            options.timeout = Duration::from_secs(footprints.timeout_secs);
            options.asset_rules = asset_rules;
            Arc::new(FootprintCollectionAdapter::new(fetch, options))
        }
    };

    Ok(BuiltConnector {
        id: spec.id.clone(),
        display_name: spec.display_name.clone(),
        description: spec.description.clone(),
        capabilities: spec.capabilities.clone(),
        adapter,
        credential_env: spec.credentials.clone(),
    })
}

/// Build every spec, rejecting repeated ids.
pub fn build_all(specs: &[ConnectorSpec], fetch: Arc<dyn FetchPort>) -> Result<Vec<BuiltConnector>, ConfigError> {
    let mut seen = std::collections::HashSet::new();
    let mut built = Vec::with_capacity(specs.len());
    for spec in specs {
        if !seen.insert(spec.id.as_str()) {
            return Err(ConfigError::DuplicateId(spec.id.clone()));
        }
        built.push(build(spec, fetch.clone())?);
    }
    Ok(built)
}

fn walker_config(walk: &WalkSpec, asset_rules: AssetPriorityRules) -> WalkerConfig {
    WalkerConfig {
        max_depth: walk.max_depth,
        node_timeout: Duration::from_secs(walk.node_timeout_secs),
        item_timeout: Duration::from_secs(walk.item_timeout_secs),
        asset_rules,
    }
}

fn listing(walk: &WalkSpec) -> CollectionListing {
    CollectionListing {
        id_style: walk.collection_ids,
        organisations: walk.organisations.clone(),
        ..Default::default()
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn default_search_path() -> String {
    "search".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_max_pages() -> usize {
    10
}

fn default_api_timeout() -> u64 {
    30
}

fn default_cloud_cover_property() -> String {
    "eo:cloud_cover".to_string()
}

fn default_footprint_timeout() -> u64 {
    180
}

fn default_max_depth() -> usize {
    4
}

fn default_node_timeout() -> u64 {
    10
}

fn default_item_timeout() -> u64 {
    5
}
