//! Provider adapters.
//!
//! Four shapes cover every provider the middleware talks to:
//!
//! - [`StacApiAdapter`]: providers with a STAC API `/search` endpoint.
//! - [`BagCatalogAdapter`]: static catalogs queried through a flat
//!   [`QueryBag`] (year/month buckets, product type or instrument mode).
//! - [`TreeWalkAdapter`]: static catalogs walked directly.
//! - [`FootprintCollectionAdapter`]: one GeoJSON FeatureCollection per
//!   collection, filtered locally.
//!
//! [`config`] builds any of them from a declarative [`ConnectorSpec`].

pub mod auth;
pub mod collections;
pub mod config;
pub mod footprint;
pub mod query_bag;
pub mod stac_api;
pub mod static_catalog;

pub use auth::{AuthScheme, HeaderAuth};
pub use collections::{CollectionIdStyle, CollectionListing};
pub use config::{build, build_all, BuiltConnector, ConfigError, ConnectorKind, ConnectorSpec};
pub use footprint::{FootprintCollectionAdapter, FootprintFilter, FootprintOptions};
pub use query_bag::{BagDialect, QueryBag};
pub use stac_api::{CloudCoverFilter, CloudCoverStyle, StacApiAdapter, StacApiOptions};
pub use static_catalog::{BagCatalogAdapter, TreeWalkAdapter};
