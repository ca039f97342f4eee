//! Scripted [`ConnectorAdapter`] implementations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use altair_common::{
    CanonicalItem, CatalogError, CatalogResult, CollectionInfo, ConnectorAdapter, Credentials,
    SearchQuery,
};

#[derive(Debug, Clone)]
enum Behavior {
    Items(Vec<CanonicalItem>),
    Fail(CatalogError),
    Slow(Duration, Vec<CanonicalItem>),
}

/// Adapter returning canned results and recording how it was called.
#[derive(Debug)]
pub struct StubAdapter {
    behavior: Behavior,
    collections: Vec<CollectionInfo>,
    token: Option<String>,
    searches: AtomicUsize,
    collection_calls: AtomicUsize,
    last_query: Mutex<Option<SearchQuery>>,
}

impl StubAdapter {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            collections: Vec::new(),
            token: None,
            searches: AtomicUsize::new(0),
            collection_calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    /// Returns `count` items named `<prefix>-<n>`.
    pub fn with_items(prefix: &str, count: usize) -> Self {
        Self::with_behavior(Behavior::Items(make_items(prefix, count)))
    }

    /// Every search fails with `error`.
    pub fn failing(error: CatalogError) -> Self {
        Self::with_behavior(Behavior::Fail(error))
    }

    /// Returns `count` items after sleeping `delay` on the tokio clock.
    pub fn slow(prefix: &str, count: usize, delay: Duration) -> Self {
        Self::with_behavior(Behavior::Slow(delay, make_items(prefix, count)))
    }

    pub fn with_collections(mut self, ids: &[&str]) -> Self {
        self.collections = ids
            .iter()
            .map(|id| CollectionInfo::new(*id, id.to_uppercase()))
            .collect();
        self
    }

    /// Accept only credentials carrying `token = <token>`.
    pub fn requiring_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn search_calls(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn collection_calls(&self) -> usize {
        self.collection_calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<SearchQuery> {
        self.last_query
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ConnectorAdapter for StubAdapter {
    async fn search(&self, query: &SearchQuery) -> CatalogResult<Vec<CanonicalItem>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap_or_else(|e| e.into_inner()) = Some(query.clone());

        match &self.behavior {
            Behavior::Items(items) => Ok(items.iter().take(query.limit).cloned().collect()),
            Behavior::Fail(error) => Err(error.clone()),
            Behavior::Slow(delay, items) => {
                tokio::time::sleep(*delay).await;
                Ok(items.iter().take(query.limit).cloned().collect())
            }
        }
    }

    async fn list_collections(&self) -> CatalogResult<Vec<CollectionInfo>> {
        self.collection_calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Fail(error) => Err(error.clone()),
            _ => Ok(self.collections.clone()),
        }
    }

    async fn authenticate(&self, credentials: &Credentials) -> CatalogResult<bool> {
        match &self.token {
            Some(expected) => Ok(credentials.get("token") == Some(expected)),
            None => Ok(true),
        }
    }
}

fn make_items(prefix: &str, count: usize) -> Vec<CanonicalItem> {
    (0..count)
        .map(|n| CanonicalItem::new(format!("{}-{}", prefix, n), ""))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_items_respect_limit() {
        let stub = StubAdapter::with_items("a", 5);
        let query = SearchQuery::builder().limit(3).build().unwrap();
        let items = stub.search(&query).await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id, "a-0");
        assert_eq!(stub.search_calls(), 1);
        assert_eq!(stub.last_query().unwrap().limit, 3);
    }

    #[tokio::test]
    async fn test_token_check() {
        let stub = StubAdapter::with_items("a", 1).requiring_token("s3cret");
        let mut creds = Credentials::new();
        assert!(!stub.authenticate(&creds).await.unwrap());
        creds.insert("token".into(), "s3cret".into());
        assert!(stub.authenticate(&creds).await.unwrap());
    }
}
