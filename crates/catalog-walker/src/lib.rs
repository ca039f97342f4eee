//! Walker for static hierarchical catalogs.
//!
//! Providers without a query endpoint publish a tree of linked JSON
//! documents (catalog → year → month → day → item, or catalog →
//! organisation → collection → item). "Searching" such a provider means
//! walking that tree breadth-first, filtering leaves spatially and
//! temporally, and stopping as soon as the result budget is met.

pub mod plan;
pub mod walker;

pub use plan::{BranchFilter, NodeMatcher, WalkPlan, WalkerConfig};
pub use walker::{
    outbound_links, passes_filters, CatalogTreeWalker, LinkKind, NodeLink, WalkOutcome, WalkStats,
};
