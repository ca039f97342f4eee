//! The uniform contract every provider adapter implements.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::CatalogResult;
use crate::item::{CanonicalItem, CollectionInfo};
use crate::query::SearchQuery;

/// Opaque credential bag forwarded to an adapter's auth routine.
pub type Credentials = BTreeMap<String, String>;

/// Strategy object wrapping one provider's search entry point.
///
/// The aggregator never inspects which adapter it holds; it only calls these
/// methods. Zero matches is `Ok(vec![])`, never an error.
#[async_trait]
pub trait ConnectorAdapter: Send + Sync {
    /// Run a search and return items in discovery order.
    async fn search(&self, query: &SearchQuery) -> CatalogResult<Vec<CanonicalItem>>;

    /// List the provider's collections. Adapters without the notion return nothing.
    async fn list_collections(&self) -> CatalogResult<Vec<CollectionInfo>> {
        Ok(Vec::new())
    }

    /// Provider-specific authentication.
    ///
    /// `Ok(false)` means the credentials were rejected; `Err` means the
    /// routine itself could not complete.
    async fn authenticate(&self, _credentials: &Credentials) -> CatalogResult<bool> {
        Ok(true)
    }

    /// Drop any credentials held by the adapter.
    async fn deauthenticate(&self) {}
}
