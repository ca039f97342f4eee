//! Collection listing for static catalogs.
//!
//! The root's `child` links are the collections. Each child is fetched to
//! count its own `child` + `item` links; a child that cannot be fetched is
//! listed with a count of zero.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use altair_common::href::document_base;
use altair_common::{CatalogResult, CollectionInfo};
use catalog_walker::{outbound_links, CatalogTreeWalker, LinkKind};

/// How a child catalog becomes a collection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionIdStyle {
    /// The link title as is.
    #[default]
    Title,
    /// Link title lower-cased with spaces replaced by `_`.
    Slug,
    /// The child document's own `id`.
    NodeId,
}

pub fn slugify(title: &str) -> String {
    title.to_lowercase().replace(' ', "_")
}

/// Lists the collections of one static catalog.
#[derive(Debug, Clone)]
pub struct CollectionListing {
    pub id_style: CollectionIdStyle,
    /// When set, only children whose href contains one of these are listed,
    /// and their own children become the collections.
    pub organisations: Vec<String>,
    pub max_concurrent_fetches: usize,
}

impl Default for CollectionListing {
    fn default() -> Self {
        Self {
            id_style: CollectionIdStyle::Title,
            organisations: Vec::new(),
            max_concurrent_fetches: 4,
        }
    }
}

struct Candidate {
    href: String,
    title: Option<String>,
}

impl CollectionListing {
    pub async fn list(&self, walker: &CatalogTreeWalker, root_url: &str) -> CatalogResult<Vec<CollectionInfo>> {
        let root = walker.fetch_node(root_url).await?;
        let mut candidates = child_candidates(&root, root_url);

        if !self.organisations.is_empty() {
            let organisations: Vec<Candidate> = candidates
                .into_iter()
                .filter(|c| self.organisations.iter().any(|o| c.href.contains(o.as_str())))
                .collect();
            candidates = Vec::new();
            for org in organisations {
                match walker.fetch_node(&org.href).await {
                    Ok(doc) => candidates.extend(child_candidates(&doc, &org.href)),
                    Err(e) => warn!(url = %org.href, error = %e, "Skipping organisation catalog"),
                }
            }
        }

        let style = self.id_style;
        let collections: Vec<CollectionInfo> = stream::iter(candidates)
            .map(|candidate| async move {
                let doc = match walker.fetch_node(&candidate.href).await {
                    Ok(doc) => Some(doc),
                    Err(e) => {
                        warn!(url = %candidate.href, error = %e, "Collection node unavailable");
                        None
                    }
                };
                describe(candidate, doc.as_ref(), style)
            })
            .buffered(self.max_concurrent_fetches.max(1))
            .collect()
            .await;

        debug!(root = %root_url, collections = collections.len(), "Listed static collections");
        Ok(collections)
    }
}

fn child_candidates(doc: &Value, fetched_from: &str) -> Vec<Candidate> {
    let base = document_base(doc, fetched_from);
    outbound_links(doc, &base)
        .into_iter()
        .filter(|l| l.kind == LinkKind::Child)
        .map(|l| Candidate {
            href: l.href,
            title: l.title,
        })
        .collect()
}

fn describe(candidate: Candidate, doc: Option<&Value>, style: CollectionIdStyle) -> CollectionInfo {
    let node_id = doc.and_then(|d| d.get("id")).and_then(Value::as_str);
    let title = candidate
        .title
        .clone()
        .or_else(|| doc.and_then(|d| d.get("title")).and_then(Value::as_str).map(str::to_string))
        .or_else(|| node_id.map(str::to_string))
        .unwrap_or_else(|| candidate.href.clone());

    let id = match style {
        CollectionIdStyle::Title => title.clone(),
        CollectionIdStyle::Slug => slugify(&title),
        CollectionIdStyle::NodeId => node_id.map(str::to_string).unwrap_or_else(|| slugify(&title)),
    };

    let count = doc
        .map(|d| outbound_links(d, &candidate.href).len() as u64)
        .unwrap_or(0);

    let mut info = CollectionInfo::new(id, title);
    info.item_or_asset_count = count;
    info.href = Some(candidate.href);
    info
}
