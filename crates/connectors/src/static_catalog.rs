//! Adapters for providers that only publish a static catalog tree.

use async_trait::async_trait;
use tracing::{debug, instrument};

use altair_common::{CanonicalItem, CatalogResult, CollectionInfo, ConnectorAdapter, SearchQuery};
use catalog_walker::{BranchFilter, CatalogTreeWalker, NodeMatcher, WalkPlan};

use crate::collections::CollectionListing;
use crate::query_bag::{BagDialect, QueryBag};

/// Executes one [`QueryBag`] per search over a static catalog.
pub struct BagCatalogAdapter {
    connector_id: String,
    root_url: String,
    dialect: BagDialect,
    walker: CatalogTreeWalker,
    listing: CollectionListing,
}

impl BagCatalogAdapter {
    pub fn new(
        connector_id: impl Into<String>,
        root_url: impl Into<String>,
        dialect: BagDialect,
        walker: CatalogTreeWalker,
    ) -> Self {
        Self {
            connector_id: connector_id.into(),
            root_url: root_url.into(),
            dialect,
            walker,
            listing: CollectionListing::default(),
        }
    }

    pub fn with_listing(mut self, listing: CollectionListing) -> Self {
        self.listing = listing;
        self
    }

    pub fn dialect(&self) -> &BagDialect {
        &self.dialect
    }

    pub fn build_bag(&self, query: &SearchQuery) -> QueryBag {
        QueryBag::from_query(query, &self.dialect)
    }

    /// Run a bag directly, bypassing [`SearchQuery`] translation.
    pub async fn execute(&self, bag: &QueryBag) -> CatalogResult<Vec<CanonicalItem>> {
        let plan = bag.to_walk_plan(&self.root_url, &self.connector_id, &self.dialect);
        let outcome = self.walker.walk(&plan).await?;
        Ok(outcome.items)
    }
}

#[async_trait]
impl ConnectorAdapter for BagCatalogAdapter {
    #[instrument(skip(self, query), fields(connector = %self.connector_id))]
    async fn search(&self, query: &SearchQuery) -> CatalogResult<Vec<CanonicalItem>> {
        let bag = self.build_bag(query);
        debug!(bag = ?bag, "Executing query bag");
        self.execute(&bag).await
    }

    async fn list_collections(&self) -> CatalogResult<Vec<CollectionInfo>> {
        self.listing.list(&self.walker, &self.root_url).await
    }
}

/// Delegates searches to the catalog walker.
///
/// A collection id restricts the walk to first-level nodes with that `id`.
pub struct TreeWalkAdapter {
    connector_id: String,
    root_url: String,
    walker: CatalogTreeWalker,
    listing: CollectionListing,
}

impl TreeWalkAdapter {
    pub fn new(connector_id: impl Into<String>, root_url: impl Into<String>, walker: CatalogTreeWalker) -> Self {
        Self {
            connector_id: connector_id.into(),
            root_url: root_url.into(),
            walker,
            listing: CollectionListing::default(),
        }
    }

    pub fn with_listing(mut self, listing: CollectionListing) -> Self {
        self.listing = listing;
        self
    }

    pub fn plan_for(&self, query: &SearchQuery) -> WalkPlan {
        let mut plan = WalkPlan::new(&self.root_url, &self.connector_id, query.limit)
            .with_bbox(query.bbox)
            .with_interval(query.interval());
        if let Some(collection) = query.collection_id.as_deref().filter(|c| !c.is_empty()) {
            plan = plan.with_filter(BranchFilter::new(1, NodeMatcher::NodeId(collection.to_string())));
        }
        plan
    }
}

#[async_trait]
impl ConnectorAdapter for TreeWalkAdapter {
    #[instrument(skip(self, query), fields(connector = %self.connector_id))]
    async fn search(&self, query: &SearchQuery) -> CatalogResult<Vec<CanonicalItem>> {
        let outcome = self.walker.walk(&self.plan_for(query)).await?;
        Ok(outcome.items)
    }

    async fn list_collections(&self) -> CatalogResult<Vec<CollectionInfo>> {
        self.listing.list(&self.walker, &self.root_url).await
    }
}
