//! The caller-facing search query.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::{CatalogError, CatalogResult};

/// Default per-connector result cap.
pub const DEFAULT_LIMIT: usize = 100;

/// Separator of a `"source::collection"` composite collection key.
pub const COMPOSITE_SEPARATOR: &str = "::";

/// Inclusive calendar-date interval; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateInterval {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateInterval {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// First instant covered by the interval.
    pub fn start_instant(&self) -> Option<DateTime<Utc>> {
        self.start
            .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
    }

    /// Last instant covered by the interval. The end date covers its whole day.
    pub fn end_instant(&self) -> Option<DateTime<Utc>> {
        self.end.and_then(|d| {
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
                .map(|t| Utc.from_utc_datetime(&d.and_time(t)))
        })
    }

    /// True when the instant falls inside the interval.
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        if let Some(start) = self.start_instant() {
            if *instant < start {
                return false;
            }
        }
        if let Some(end) = self.end_instant() {
            if *instant > end {
                return false;
            }
        }
        true
    }

    /// Render as a STAC `datetime` interval: `startT00:00:00Z/endT23:59:59Z`,
    /// open ends as `..`. Returns `None` when both ends are open.
    pub fn to_stac_interval(&self) -> Option<String> {
        if self.is_open() {
            return None;
        }
        let start = self
            .start
            .map(|d| format!("{}T00:00:00Z", d.format("%Y-%m-%d")))
            .unwrap_or_else(|| "..".to_string());
        let end = self
            .end
            .map(|d| format!("{}T23:59:59Z", d.format("%Y-%m-%d")))
            .unwrap_or_else(|| "..".to_string());
        Some(format!("{}/{}", start, end))
    }
}

/// Immutable search request, built through [`SearchQueryBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub bbox: Option<BoundingBox>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub max_cloud_cover: Option<f64>,
    pub collection_id: Option<String>,
    pub text_query: Option<String>,
    pub limit: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            bbox: None,
            start_date: None,
            end_date: None,
            max_cloud_cover: None,
            collection_id: None,
            text_query: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl SearchQuery {
    pub fn builder() -> SearchQueryBuilder {
        SearchQueryBuilder::default()
    }

    pub fn interval(&self) -> DateInterval {
        DateInterval::new(self.start_date, self.end_date)
    }

    /// Split a composite `"source::collection"` key.
    ///
    /// An empty collection part (`"source::"`) yields `None` for the collection.
    pub fn composite_target(&self) -> Option<(&str, Option<&str>)> {
        let key = self.collection_id.as_deref()?;
        let (source, collection) = key.split_once(COMPOSITE_SEPARATOR)?;
        let collection = (!collection.is_empty()).then_some(collection);
        Some((source, collection))
    }

    /// Copy of this query with a different collection id.
    pub fn with_collection(&self, collection_id: Option<&str>) -> Self {
        Self {
            collection_id: collection_id.map(str::to_string),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> CatalogResult<()> {
        if let Some(cc) = self.max_cloud_cover {
            if !(0.0..=100.0).contains(&cc) {
                return Err(CatalogError::InvalidQuery(format!(
                    "max_cloud_cover must be within 0..=100, got {}",
                    cc
                )));
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(CatalogError::InvalidQuery(format!(
                    "start_date {} is after end_date {}",
                    start, end
                )));
            }
        }
        if let Some(bbox) = &self.bbox {
            if !bbox.is_well_formed() {
                return Err(CatalogError::InvalidQuery(format!(
                    "bbox {:?} is inverted",
                    bbox.to_array()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchQueryBuilder {
    query: SearchQuery,
}

impl SearchQueryBuilder {
    pub fn bbox(mut self, bbox: BoundingBox) -> Self {
        self.query.bbox = Some(bbox);
        self
    }

    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.query.start_date = Some(date);
        self
    }

    pub fn end_date(mut self, date: NaiveDate) -> Self {
        self.query.end_date = Some(date);
        self
    }

    pub fn max_cloud_cover(mut self, percent: f64) -> Self {
        self.query.max_cloud_cover = Some(percent);
        self
    }

    pub fn collection(mut self, collection_id: impl Into<String>) -> Self {
        self.query.collection_id = Some(collection_id.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.query.text_query = Some(text.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = limit;
        self
    }

    pub fn build(self) -> CatalogResult<SearchQuery> {
        self.query.validate()?;
        Ok(self.query)
    }
}
