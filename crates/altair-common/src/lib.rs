//! Common types and ports shared across the catalog middleware crates.
//!
//! Everything in here is a leaf: the spatial filter, the canonical item and
//! collection shapes, the search query value, the error taxonomy, the
//! injected fetch capability and the adapter contract every connector
//! implements.

pub mod adapter;
pub mod assets;
pub mod bbox;
pub mod capability;
pub mod error;
pub mod fetch;
pub mod href;
pub mod item;
pub mod normalize;
pub mod query;

pub use adapter::{ConnectorAdapter, Credentials};
pub use assets::AssetPriorityRules;
pub use bbox::BoundingBox;
pub use capability::{Capability, CapabilitySet};
pub use error::{CatalogError, CatalogResult};
pub use fetch::{FetchPort, FetchRequest, FetchResponse, Method};
pub use item::{AssetRef, CanonicalItem, CollectionInfo, Link};
pub use normalize::{normalize, normalize_with};
pub use query::{DateInterval, SearchQuery, SearchQueryBuilder};
