//! Walk inputs: per-walker configuration and the per-search plan.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use altair_common::{AssetPriorityRules, BoundingBox, DateInterval};

/// Static settings of one walker, usually one per provider.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Deepest catalog level that may be fetched; the root is depth 0.
    pub max_depth: usize,
    pub node_timeout: Duration,
    pub item_timeout: Duration,
    pub asset_rules: AssetPriorityRules,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            node_timeout: Duration::from_secs(10),
            item_timeout: Duration::from_secs(5),
            asset_rules: AssetPriorityRules::default(),
        }
    }
}

/// How a catalog node is selected at a given depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeMatcher {
    /// Exact match on the `child` link title.
    TitleEquals(String),
    /// Case-insensitive substring of the `child` link title.
    TitleContains(String),
    /// Substring of the `child` link href.
    HrefContains(String),
    /// Exact match on the fetched node's own `id`.
    NodeId(String),
}

impl NodeMatcher {
    /// Whether the matcher can be decided from the link alone.
    pub fn applies_to_link(&self) -> bool {
        !matches!(self, NodeMatcher::NodeId(_))
    }

    pub fn matches_link(&self, title: Option<&str>, href: &str) -> bool {
        match self {
            NodeMatcher::TitleEquals(want) => title == Some(want.as_str()),
            NodeMatcher::TitleContains(want) => title
                .map(|t| t.to_lowercase().contains(&want.to_lowercase()))
                .unwrap_or(false),
            NodeMatcher::HrefContains(want) => href.contains(want.as_str()),
            NodeMatcher::NodeId(_) => true,
        }
    }

    pub fn matches_node(&self, node_id: Option<&str>) -> bool {
        match self {
            NodeMatcher::NodeId(want) => node_id == Some(want.as_str()),
            _ => true,
        }
    }
}

/// Restricts which branches are followed at one depth.
///
/// All filters declared for a depth must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFilter {
    pub depth: usize,
    pub matcher: NodeMatcher,
}

impl BranchFilter {
    pub fn new(depth: usize, matcher: NodeMatcher) -> Self {
        Self { depth, matcher }
    }
}

/// One walk request.
#[derive(Debug, Clone)]
pub struct WalkPlan {
    pub root_url: String,
    /// Connector id stamped on every produced item.
    pub source_id: String,
    /// Result budget; the walk stops as soon as it is reached.
    pub limit: usize,
    pub bbox: Option<BoundingBox>,
    pub interval: DateInterval,
    pub branch_filters: Vec<BranchFilter>,
}

impl WalkPlan {
    pub fn new(root_url: impl Into<String>, source_id: impl Into<String>, limit: usize) -> Self {
        Self {
            root_url: root_url.into(),
            source_id: source_id.into(),
            limit,
            bbox: None,
            interval: DateInterval::default(),
            branch_filters: Vec::new(),
        }
    }

    pub fn with_bbox(mut self, bbox: Option<BoundingBox>) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn with_interval(mut self, interval: DateInterval) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_filter(mut self, filter: BranchFilter) -> Self {
        self.branch_filters.push(filter);
        self
    }

    /// Whether a `child` link leading to `depth` should be followed.
    pub fn allows_link(&self, depth: usize, title: Option<&str>, href: &str) -> bool {
        self.filters_at(depth)
            .filter(|m| m.applies_to_link())
            .all(|m| m.matches_link(title, href))
    }

    /// Whether a fetched node at `depth` should be expanded.
    pub fn allows_node(&self, depth: usize, node_id: Option<&str>) -> bool {
        self.filters_at(depth).all(|m| m.matches_node(node_id))
    }

    fn filters_at(&self, depth: usize) -> impl Iterator<Item = &NodeMatcher> + '_ {
        self.branch_filters
            .iter()
            .filter(move |f| f.depth == depth)
            .map(|f| &f.matcher)
    }
}
