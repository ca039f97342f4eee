//! Dict-style query parameters for static catalogs.
//!
//! A [`SearchQuery`] is flattened into one [`QueryBag`], the collection id is
//! remapped by the provider's [`BagDialect`], and the bag is then turned into
//! walker branch filters.

use serde::{Deserialize, Serialize};

use altair_common::{BoundingBox, DateInterval, SearchQuery};
use catalog_walker::{BranchFilter, NodeMatcher, WalkPlan};

/// Flat parameter set understood by static-catalog providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryBag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    #[serde(skip)]
    pub interval: DateInterval,
    /// STAC interval string, e.g. `2024-01-01T00:00:00Z/..`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    /// `YYYY-MM`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument_mode: Option<String>,
}

/// How a provider reads the collection id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum BagDialect {
    /// Collections are date buckets: `YYYY` or `YYYY-MM`.
    YearMonth,
    /// Collections are either a product type or an instrument mode, each
    /// published under its own organisation catalog.
    ProductOrMode {
        #[serde(default = "default_product_types")]
        product_types: Vec<String>,
        #[serde(default = "default_product_organisation")]
        product_organisation: String,
        #[serde(default = "default_mode_organisation")]
        mode_organisation: String,
    },
}

fn default_product_types() -> Vec<String> {
    ["GEO", "GEC", "SLC", "SICD", "SIDD", "CPHD"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_product_organisation() -> String {
    "by-product-type".to_string()
}

fn default_mode_organisation() -> String {
    "by-instrument-mode".to_string()
}

impl BagDialect {
    pub fn product_or_mode() -> Self {
        BagDialect::ProductOrMode {
            product_types: default_product_types(),
            product_organisation: default_product_organisation(),
            mode_organisation: default_mode_organisation(),
        }
    }

    /// Fill the bag fields this dialect derives from `collection`.
    pub fn remap(&self, collection: &str, bag: &mut QueryBag) {
        let collection = collection.trim();
        if collection.is_empty() {
            return;
        }
        match self {
            BagDialect::YearMonth => {
                if is_year(collection) {
                    bag.year = Some(collection.to_string());
                } else if let Some((year, month)) = collection.split_once('-') {
                    if is_year(year) && is_month(month) {
                        bag.year = Some(year.to_string());
                        bag.month = Some(collection.to_string());
                    }
                }
            }
            BagDialect::ProductOrMode { product_types, .. } => {
                let upper = collection.to_uppercase();
                if product_types.iter().any(|p| p.eq_ignore_ascii_case(&upper)) {
                    bag.product_type = Some(upper);
                } else {
                    bag.instrument_mode = Some(collection.to_string());
                }
            }
        }
    }
}

fn is_year(s: &str) -> bool {
    s.len() == 4 && s.chars().all(|c| c.is_ascii_digit())
}

fn is_month(s: &str) -> bool {
    s.len() == 2 && matches!(s.parse::<u8>(), Ok(1..=12))
}

impl QueryBag {
    pub fn from_query(query: &SearchQuery, dialect: &BagDialect) -> Self {
        let interval = query.interval();
        let mut bag = QueryBag {
            bbox: query.bbox,
            datetime: interval.to_stac_interval(),
            interval,
            limit: query.limit,
            ..Default::default()
        };
        if let Some(collection) = query.collection_id.as_deref() {
            dialect.remap(collection, &mut bag);
        }
        bag
    }

    /// Walk plan restricted to the branches the bag selects.
    pub fn to_walk_plan(&self, root_url: &str, source_id: &str, dialect: &BagDialect) -> WalkPlan {
        let mut plan = WalkPlan::new(root_url, source_id, self.limit)
            .with_bbox(self.bbox)
            .with_interval(self.interval);

        if let Some(month) = &self.month {
            let year = self
                .year
                .clone()
                .unwrap_or_else(|| month.chars().take(4).collect());
            plan = plan
                .with_filter(BranchFilter::new(1, NodeMatcher::TitleEquals(year)))
                .with_filter(BranchFilter::new(2, NodeMatcher::TitleEquals(month.clone())));
        } else if let Some(year) = &self.year {
            plan = plan.with_filter(BranchFilter::new(1, NodeMatcher::TitleEquals(year.clone())));
        }

        if let BagDialect::ProductOrMode {
            product_organisation,
            mode_organisation,
            ..
        } = dialect
        {
            let selected = self
                .product_type
                .as_ref()
                .map(|p| (product_organisation, p))
                .or_else(|| self.instrument_mode.as_ref().map(|m| (mode_organisation, m)));
            if let Some((organisation, value)) = selected {
                plan = plan
                    .with_filter(BranchFilter::new(1, NodeMatcher::HrefContains(organisation.clone())))
                    .with_filter(BranchFilter::new(2, NodeMatcher::TitleContains(value.clone())));
            }
        }

        plan
    }
}
