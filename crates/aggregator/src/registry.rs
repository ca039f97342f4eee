//! Registry of connectors and their authentication state.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use altair_common::{
    CanonicalItem, Capability, CapabilitySet, CatalogError, CatalogResult, CollectionInfo,
    ConnectorAdapter, Credentials, SearchQuery,
};

/// A registered connector. Snapshots of this are handed to the aggregator.
#[derive(Clone)]
pub struct ConnectorDescriptor {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub capabilities: CapabilitySet,
    pub authenticated: bool,
    pub adapter: Arc<dyn ConnectorAdapter>,
}

impl ConnectorDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        capabilities: CapabilitySet,
        adapter: Arc<dyn ConnectorAdapter>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: String::new(),
            capabilities,
            authenticated: false,
            adapter,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Connectors without the `Authentication` capability are always usable.
    pub fn is_usable(&self) -> bool {
        !self.has(Capability::Authentication) || self.authenticated
    }
}

impl fmt::Debug for ConnectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorDescriptor")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("capabilities", &self.capabilities)
            .field("authenticated", &self.authenticated)
            .finish_non_exhaustive()
    }
}

/// Notified whenever a connector's authentication state changes.
#[async_trait]
pub trait AuthObserver: Send + Sync {
    async fn auth_changed(&self, connector_id: &str, authenticated: bool);
}

#[derive(Default)]
struct RegistryState {
    connectors: IndexMap<String, ConnectorDescriptor>,
    active: Option<String>,
}

/// Connectors in registration order, plus the active selection.
#[derive(Default)]
pub struct ConnectorRegistry {
    state: RwLock<RegistryState>,
    observers: RwLock<Vec<Arc<dyn AuthObserver>>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_observer(&self, observer: Arc<dyn AuthObserver>) {
        self.observers.write().await.push(observer);
    }

    pub async fn register(&self, descriptor: ConnectorDescriptor) -> CatalogResult<()> {
        let mut state = self.state.write().await;
        if state.connectors.contains_key(&descriptor.id) {
            return Err(CatalogError::DuplicateId(descriptor.id));
        }
        info!(connector = %descriptor.id, capabilities = descriptor.capabilities.len(), "Registered connector");
        state.connectors.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    /// Removing an unknown id is a no-op.
    pub async fn unregister(&self, id: &str) {
        let mut state = self.state.write().await;
        if state.connectors.shift_remove(id).is_some() {
            info!(connector = %id, "Unregistered connector");
        }
        if state.active.as_deref() == Some(id) {
            state.active = None;
        }
    }

    pub async fn get(&self, id: &str) -> Option<ConnectorDescriptor> {
        self.state.read().await.connectors.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.state.read().await.connectors.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.connectors.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot in registration order.
    pub async fn list(&self) -> Vec<ConnectorDescriptor> {
        self.state.read().await.connectors.values().cloned().collect()
    }

    pub async fn set_active(&self, id: &str) -> CatalogResult<()> {
        let mut state = self.state.write().await;
        if !state.connectors.contains_key(id) {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        state.active = Some(id.to_string());
        Ok(())
    }

    pub async fn active(&self) -> Option<ConnectorDescriptor> {
        let state = self.state.read().await;
        state
            .active
            .as_ref()
            .and_then(|id| state.connectors.get(id))
            .cloned()
    }

    /// False when the connector (or, without an id, the active one) is undefined.
    pub async fn has_capability(&self, capability: Capability, id: Option<&str>) -> bool {
        self.resolve(id)
            .await
            .map(|d| d.has(capability))
            .unwrap_or(false)
    }

    /// `Ok(false)` leaves the state untouched, as does an error from the adapter.
    #[instrument(skip(self, credentials))]
    pub async fn authenticate(&self, id: &str, credentials: &Credentials) -> CatalogResult<bool> {
        let descriptor = self
            .get(id)
            .await
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        if !descriptor.adapter.authenticate(credentials).await? {
            warn!(connector = %id, "Credentials rejected");
            return Ok(false);
        }

        if let Some(entry) = self.state.write().await.connectors.get_mut(id) {
            entry.authenticated = true;
        }
        info!(connector = %id, "Connector authenticated");
        self.notify(id, true).await;
        Ok(true)
    }

    pub async fn deauthenticate(&self, id: &str) -> CatalogResult<()> {
        let descriptor = self
            .get(id)
            .await
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        descriptor.adapter.deauthenticate().await;

        if let Some(entry) = self.state.write().await.connectors.get_mut(id) {
            entry.authenticated = false;
        }
        info!(connector = %id, "Connector deauthenticated");
        self.notify(id, false).await;
        Ok(())
    }

    /// Search one connector: `id` or the active one.
    #[instrument(skip(self, query), fields(limit = query.limit))]
    pub async fn search(&self, query: &SearchQuery, id: Option<&str>) -> CatalogResult<Vec<CanonicalItem>> {
        query.validate()?;
        let descriptor = self.require(id).await?;
        if !descriptor.is_usable() {
            return Err(CatalogError::AuthRequired(descriptor.id));
        }

        let mut items = descriptor.adapter.search(query).await?;
        for item in &mut items {
            item.tag_source(&descriptor.id, &descriptor.display_name);
        }
        debug!(connector = %descriptor.id, items = items.len(), "Single-connector search done");
        Ok(items)
    }

    /// Collections of one connector; empty when it lacks the `Collections` capability.
    pub async fn collections(&self, id: Option<&str>) -> CatalogResult<Vec<CollectionInfo>> {
        let descriptor = self.require(id).await?;
        if !descriptor.has(Capability::Collections) {
            return Ok(Vec::new());
        }

        let mut collections = descriptor.adapter.list_collections().await?;
        for collection in &mut collections {
            collection.tag_source(&descriptor.id, &descriptor.display_name);
        }
        Ok(collections)
    }

    async fn resolve(&self, id: Option<&str>) -> Option<ConnectorDescriptor> {
        match id {
            Some(id) => self.get(id).await,
            None => self.active().await,
        }
    }

    async fn require(&self, id: Option<&str>) -> CatalogResult<ConnectorDescriptor> {
        self.resolve(id).await.ok_or_else(|| {
            CatalogError::NotFound(id.unwrap_or("no active connector").to_string())
        })
    }

    async fn notify(&self, id: &str, authenticated: bool) {
        let observers = self.observers.read().await.clone();
        for observer in observers {
            observer.auth_changed(id, authenticated).await;
        }
    }
}
