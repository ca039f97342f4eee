//! Breadth-first traversal of static catalogs.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use altair_common::fetch::get_json;
use altair_common::href::{document_base, resolve_href};
use altair_common::{normalize_with, CanonicalItem, CatalogResult, FetchPort, Link};

use crate::plan::{WalkPlan, WalkerConfig};

/// Relation of an outbound catalog link the walker acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Child,
    Item,
}

/// A `child` or `item` link with its href already made absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLink {
    pub kind: LinkKind,
    pub href: String,
    pub title: Option<String>,
}

/// Counters describing one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub nodes_fetched: usize,
    pub items_fetched: usize,
    pub items_filtered: usize,
    pub failed_fetches: usize,
    pub nodes_pruned: usize,
    /// True when the walk stopped because the result budget was reached.
    pub budget_exhausted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WalkOutcome {
    pub items: Vec<CanonicalItem>,
    pub stats: WalkStats,
}

/// Iterative walker over `child`/`item` links.
///
/// Catalog nodes are visited in FIFO order from an explicit frontier; item
/// links are fetched eagerly when their parent is expanded. Only the root is
/// allowed to fail the walk.
#[derive(Clone)]
pub struct CatalogTreeWalker {
    fetch: Arc<dyn FetchPort>,
    config: WalkerConfig,
}

impl CatalogTreeWalker {
    pub fn new(fetch: Arc<dyn FetchPort>, config: WalkerConfig) -> Self {
        Self { fetch, config }
    }

    pub fn config(&self) -> &WalkerConfig {
        &self.config
    }

    /// Fetch and parse a single catalog document.
    pub async fn fetch_node(&self, url: &str) -> CatalogResult<Value> {
        get_json(self.fetch.as_ref(), url, self.config.node_timeout).await
    }

    #[instrument(skip(self, plan), fields(root = %plan.root_url, source = %plan.source_id, limit = plan.limit))]
    pub async fn walk(&self, plan: &WalkPlan) -> CatalogResult<WalkOutcome> {
        let mut outcome = WalkOutcome::default();
        if plan.limit == 0 {
            return Ok(outcome);
        }

        let mut frontier: VecDeque<(String, usize)> = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();
        frontier.push_back((plan.root_url.clone(), 0));
        visited.insert(plan.root_url.clone());

        while let Some((url, depth)) = frontier.pop_front() {
            outcome.stats.nodes_fetched += 1;
            let doc = match self.fetch_node(&url).await {
                Ok(doc) => doc,
                Err(e) if depth == 0 => {
                    warn!(url = %url, error = %e, "Root catalog unavailable");
                    return Err(e);
                }
                Err(e) => {
                    warn!(url = %url, depth = depth, error = %e, "Skipping catalog node");
                    outcome.stats.failed_fetches += 1;
                    continue;
                }
            };

            if is_feature(&doc) {
                if self.accept_item(&doc, &url, plan, &mut outcome) {
                    break;
                }
                continue;
            }

            let node_id = doc.get("id").and_then(Value::as_str);
            if !plan.allows_node(depth, node_id) {
                debug!(url = %url, node_id = ?node_id, "Node filtered out");
                outcome.stats.nodes_pruned += 1;
                continue;
            }

            let base = document_base(&doc, &url);
            let mut budget_hit = false;

            // A link is marked visited only once it is enqueued or fetched, so a
            // node pruned under one parent stays reachable through another.
            for link in outbound_links(&doc, &base) {
                if visited.contains(&link.href) {
                    continue;
                }
                match link.kind {
                    LinkKind::Child => {
                        let child_depth = depth + 1;
                        if child_depth > self.config.max_depth {
                            outcome.stats.nodes_pruned += 1;
                            continue;
                        }
                        if !plan.allows_link(child_depth, link.title.as_deref(), &link.href) {
                            outcome.stats.nodes_pruned += 1;
                            continue;
                        }
                        visited.insert(link.href.clone());
                        frontier.push_back((link.href, child_depth));
                    }
                    LinkKind::Item => {
                        visited.insert(link.href.clone());
                        outcome.stats.items_fetched += 1;
                        let item = match get_json(
                            self.fetch.as_ref(),
                            &link.href,
                            self.config.item_timeout,
                        )
                        .await
                        {
                            Ok(item) => item,
                            Err(e) => {
                                warn!(url = %link.href, error = %e, "Skipping item");
                                outcome.stats.failed_fetches += 1;
                                continue;
                            }
                        };
                        if self.accept_item(&item, &link.href, plan, &mut outcome) {
                            budget_hit = true;
                            break;
                        }
                    }
                }
            }

            if budget_hit {
                break;
            }
        }

        info!(
            items = outcome.items.len(),
            nodes = outcome.stats.nodes_fetched,
            item_fetches = outcome.stats.items_fetched,
            filtered = outcome.stats.items_filtered,
            failed = outcome.stats.failed_fetches,
            budget_exhausted = outcome.stats.budget_exhausted,
            "Catalog walk finished"
        );
        Ok(outcome)
    }

    /// Normalize, filter and append one item. Returns true once the budget is met.
    fn accept_item(
        &self,
        raw: &Value,
        fetched_from: &str,
        plan: &WalkPlan,
        outcome: &mut WalkOutcome,
    ) -> bool {
        let mut item = match normalize_with(raw, &plan.source_id, &self.config.asset_rules) {
            Ok(item) => item,
            Err(e) => {
                warn!(url = %fetched_from, error = %e, "Unusable item document");
                outcome.stats.failed_fetches += 1;
                return false;
            }
        };

        if !passes_filters(&item, plan) {
            outcome.stats.items_filtered += 1;
            return false;
        }

        if item.self_href().is_none() {
            item.links.retain(|l| l.rel != "self");
            item.links.push(Link::new("self", fetched_from));
        }

        outcome.items.push(item);
        if outcome.items.len() >= plan.limit {
            outcome.stats.budget_exhausted = true;
            return true;
        }
        false
    }
}

/// Inclusive filters: an item without a bbox or datetime cannot be excluded.
pub fn passes_filters(item: &CanonicalItem, plan: &WalkPlan) -> bool {
    if let (Some(filter), Some(bbox)) = (&plan.bbox, &item.bbox) {
        if !bbox.intersects(filter) {
            return false;
        }
    }
    if let Some(datetime) = &item.datetime {
        if !plan.interval.contains(datetime) {
            return false;
        }
    }
    true
}

/// `child` and `item` links of a catalog document, resolved against `base`.
pub fn outbound_links(doc: &Value, base: &str) -> Vec<NodeLink> {
    doc.get("links")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|link| {
            let kind = match link.get("rel").and_then(Value::as_str)? {
                "child" => LinkKind::Child,
                "item" => LinkKind::Item,
                _ => return None,
            };
            let href = link.get("href").and_then(Value::as_str)?;
            Some(NodeLink {
                kind,
                href: resolve_href(base, href),
                title: link.get("title").and_then(Value::as_str).map(str::to_string),
            })
        })
        .collect()
}

fn is_feature(doc: &Value) -> bool {
    doc.get("type").and_then(Value::as_str) == Some("Feature")
}
