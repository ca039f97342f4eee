//! Direct-query adapter for STAC API `/search` endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use altair_common::fetch::fetch_json;
use altair_common::{
    normalize_with, AssetPriorityRules, CanonicalItem, CatalogError, CatalogResult,
    CollectionInfo, ConnectorAdapter, Credentials, DateInterval, FetchPort, FetchRequest,
    SearchQuery,
};

use crate::auth::{AuthScheme, HeaderAuth};

/// How a cloud-cover ceiling is expressed in the search body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudCoverStyle {
    /// STAC query extension: `"query": {"eo:cloud_cover": {"lte": x}}`
    QueryExtension,
    /// CQL2 JSON: `{"op": "<=", "args": [{"property": "eo:cloud_cover"}, x]}`
    Cql2,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudCoverFilter {
    pub style: CloudCoverStyle,
    /// Only collections starting with one of these get the filter. Empty means all.
    #[serde(default)]
    pub collection_prefixes: Vec<String>,
}

impl CloudCoverFilter {
    fn applies_to(&self, collection: Option<&str>) -> bool {
        if self.collection_prefixes.is_empty() {
            return true;
        }
        collection
            .map(|c| self.collection_prefixes.iter().any(|p| c.starts_with(p.as_str())))
            .unwrap_or(false)
    }
}

/// Provider rules for one STAC API.
#[derive(Debug, Clone)]
pub struct StacApiOptions {
    pub connector_id: String,
    pub base_url: String,
    pub search_path: String,
    /// Provider maximum for `limit` on one page.
    pub max_page_size: usize,
    pub max_pages: usize,
    pub require_bbox: bool,
    pub default_collection: Option<String>,
    /// Window used when the query names no dates.
    pub default_lookback_days: Option<i64>,
    pub cloud_cover: Option<CloudCoverFilter>,
    /// CQL2 JSON expression ANDed into every search.
    pub base_filter: Option<Value>,
    pub text_search: bool,
    /// Served by `list_collections` instead of `GET {base}/collections`.
    pub static_collections: Vec<CollectionInfo>,
    pub timeout: Duration,
    pub auth: AuthScheme,
    pub verify_url: Option<String>,
    pub asset_rules: AssetPriorityRules,
}

impl StacApiOptions {
    pub fn new(connector_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            connector_id: connector_id.into(),
            base_url: base_url.into(),
            search_path: "search".to_string(),
            max_page_size: 100,
            max_pages: 10,
            require_bbox: false,
            default_collection: None,
            default_lookback_days: None,
            cloud_cover: None,
            base_filter: None,
            text_search: false,
            static_collections: Vec::new(),
            timeout: Duration::from_secs(30),
            auth: AuthScheme::None,
            verify_url: None,
            asset_rules: AssetPriorityRules::default(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

/// Translates a [`SearchQuery`] into `POST {base}/search` and follows
/// `rel=next` pages.
pub struct StacApiAdapter {
    fetch: Arc<dyn FetchPort>,
    options: StacApiOptions,
    auth: HeaderAuth,
}

impl StacApiAdapter {
    pub fn new(fetch: Arc<dyn FetchPort>, options: StacApiOptions) -> Self {
        let auth = HeaderAuth::new(options.auth.clone(), options.verify_url.clone(), options.timeout);
        Self {
            fetch,
            options,
            auth,
        }
    }

    pub fn options(&self) -> &StacApiOptions {
        &self.options
    }

    /// Build the search body. `today` anchors the default look-back window.
    pub fn build_search_body(&self, query: &SearchQuery, today: NaiveDate) -> CatalogResult<Value> {
        let opts = &self.options;
        let mut body = Map::new();

        match &query.bbox {
            Some(bbox) => {
                body.insert("bbox".into(), json!(bbox.to_array()));
            }
            None if opts.require_bbox => {
                return Err(CatalogError::InvalidQuery(format!(
                    "{} requires a bounding box",
                    opts.connector_id
                )));
            }
            None => {}
        }

        let mut interval = query.interval();
        if interval.is_open() {
            if let Some(days) = opts.default_lookback_days {
                interval = DateInterval::new(Some(today - ChronoDuration::days(days)), Some(today));
            }
        }
        if let Some(datetime) = interval.to_stac_interval() {
            body.insert("datetime".into(), Value::String(datetime));
        }

        let collection = query
            .collection_id
            .as_deref()
            .or(opts.default_collection.as_deref());
        if let Some(collection) = collection {
            body.insert("collections".into(), json!([collection]));
        }

        body.insert("limit".into(), json!(query.limit.min(opts.max_page_size)));

        let mut cql2: Vec<Value> = opts.base_filter.iter().cloned().collect();
        if let (Some(max_cc), Some(filter)) = (query.max_cloud_cover, &opts.cloud_cover) {
            if filter.applies_to(collection) {
                match filter.style {
                    CloudCoverStyle::QueryExtension => {
                        body.insert("query".into(), json!({"eo:cloud_cover": {"lte": max_cc}}));
                    }
                    CloudCoverStyle::Cql2 => cql2.push(json!({
                        "op": "<=",
                        "args": [{"property": "eo:cloud_cover"}, max_cc]
                    })),
                }
            }
        }
        match cql2.len() {
            0 => {}
            1 => {
                body.insert("filter".into(), cql2.remove(0));
                body.insert("filter-lang".into(), json!("cql2-json"));
            }
            _ => {
                body.insert("filter".into(), json!({"op": "and", "args": cql2}));
                body.insert("filter-lang".into(), json!("cql2-json"));
            }
        }

        if opts.text_search {
            if let Some(text) = query.text_query.as_deref().filter(|t| !t.trim().is_empty()) {
                body.insert("q".into(), json!(text));
            }
        }

        Ok(Value::Object(body))
    }

    fn parse_features(&self, page: &Value, url: &str) -> CatalogResult<Vec<CanonicalItem>> {
        let features = page
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| CatalogError::Parse(format!("{}: response has no features array", url)))?;

        let mut items = Vec::with_capacity(features.len());
        for feature in features {
            match normalize_with(feature, &self.options.connector_id, &self.options.asset_rules) {
                Ok(item) => items.push(item),
                Err(e) => warn!(url = %url, error = %e, "Skipping malformed feature"),
            }
        }
        Ok(items)
    }
}

/// Request for the page a `rel=next` link points at.
fn next_page_request(page: &Value, previous_body: &Value, timeout: Duration) -> CatalogResult<Option<FetchRequest>> {
    let next = page
        .get("links")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|link| link.get("rel").and_then(Value::as_str) == Some("next"));

    let Some(link) = next else {
        return Ok(None);
    };
    let Some(href) = link.get("href").and_then(Value::as_str) else {
        return Ok(None);
    };

    let method = link.get("method").and_then(Value::as_str).unwrap_or("GET");
    if !method.eq_ignore_ascii_case("POST") {
        return Ok(Some(FetchRequest::get(href, timeout)));
    }

    // Merge the link body over the previous one.
    let mut body = previous_body.as_object().cloned().unwrap_or_default();
    if let Some(extra) = link.get("body").and_then(Value::as_object) {
        for (k, v) in extra {
            body.insert(k.clone(), v.clone());
        }
    }
    FetchRequest::post_json(href, &Value::Object(body), timeout).map(Some)
}

#[async_trait]
impl ConnectorAdapter for StacApiAdapter {
    #[instrument(skip(self, query), fields(connector = %self.options.connector_id, limit = query.limit))]
    async fn search(&self, query: &SearchQuery) -> CatalogResult<Vec<CanonicalItem>> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let body = self.build_search_body(query, Utc::now().date_naive())?;
        let search_url = self.options.endpoint(&self.options.search_path);
        debug!(url = %search_url, body = %body, "STAC search");

        let mut request = Some(FetchRequest::post_json(&search_url, &body, self.options.timeout)?);
        let mut last_body = body;
        let mut items: Vec<CanonicalItem> = Vec::new();
        let mut pages = 0;

        while let Some(next) = request.take() {
            if pages >= self.options.max_pages || items.len() >= query.limit {
                break;
            }
            let url = next.url.clone();
            if let Some(bytes) = &next.body {
                last_body = serde_json::from_slice(bytes)?;
            }

            let page = fetch_json(self.fetch.as_ref(), self.auth.apply(next).await?).await?;
            pages += 1;
            items.extend(self.parse_features(&page, &url)?);

            request = next_page_request(&page, &last_body, self.options.timeout)?;
        }

        items.truncate(query.limit);
        info!(items = items.len(), pages = pages, "STAC search completed");
        Ok(items)
    }

    async fn list_collections(&self) -> CatalogResult<Vec<CollectionInfo>> {
        if !self.options.static_collections.is_empty() {
            return Ok(self.options.static_collections.clone());
        }

        let url = self.options.endpoint("collections");
        let request = self.auth.apply(FetchRequest::get(&url, self.options.timeout)).await?;
        let doc = fetch_json(self.fetch.as_ref(), request).await?;
        let collections = doc
            .get("collections")
            .and_then(Value::as_array)
            .ok_or_else(|| CatalogError::Parse(format!("{}: no collections array", url)))?;

        Ok(collections
            .iter()
            .filter_map(|c| {
                let id = c.get("id")?.as_str()?;
                let mut info = CollectionInfo::new(
                    id,
                    c.get("title").and_then(Value::as_str).unwrap_or(id),
                );
                info.href = c
                    .get("links")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .find(|l| l.get("rel").and_then(Value::as_str) == Some("self"))
                    .and_then(|l| l.get("href").and_then(Value::as_str))
                    .map(str::to_string);
                Some(info)
            })
            .collect())
    }

    async fn authenticate(&self, credentials: &Credentials) -> CatalogResult<bool> {
        self.auth.authenticate(self.fetch.as_ref(), credentials).await
    }

    async fn deauthenticate(&self) {
        self.auth.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoFetch;

    #[async_trait]
    impl FetchPort for NoFetch {
        async fn fetch(&self, request: FetchRequest) -> CatalogResult<altair_common::FetchResponse> {
            Err(CatalogError::network(request.url, "offline"))
        }
    }

    fn adapter(options: StacApiOptions) -> StacApiAdapter {
        StacApiAdapter::new(Arc::new(NoFetch), options)
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_body_with_all_fields() {
        let mut options = StacApiOptions::new("copernicus", "https://stac.test");
        options.max_page_size = 1000;
        options.cloud_cover = Some(CloudCoverFilter {
            style: CloudCoverStyle::QueryExtension,
            collection_prefixes: vec!["sentinel-2".into()],
        });
        let query = SearchQuery::builder()
            .bbox(altair_common::BoundingBox::new(5.9, 45.8, 10.5, 47.8))
            .start_date(day("2024-01-01"))
            .end_date(day("2024-01-31"))
            .max_cloud_cover(20.0)
            .collection("sentinel-2-l2a")
            .limit(5000)
            .build()
            .unwrap();

        let body = adapter(options).build_search_body(&query, day("2024-06-01")).unwrap();
        assert_eq!(body["bbox"], json!([5.9, 45.8, 10.5, 47.8]));
        assert_eq!(body["datetime"], "2024-01-01T00:00:00Z/2024-01-31T23:59:59Z");
        assert_eq!(body["collections"], json!(["sentinel-2-l2a"]));
        assert_eq!(body["limit"], 1000);
        assert_eq!(body["query"], json!({"eo:cloud_cover": {"lte": 20.0}}));
        assert!(body.get("filter").is_none());
    }

    #[test]
    fn test_cloud_cover_skipped_for_other_collections() {
        let mut options = StacApiOptions::new("copernicus", "https://stac.test");
        options.cloud_cover = Some(CloudCoverFilter {
            style: CloudCoverStyle::QueryExtension,
            collection_prefixes: vec!["sentinel-2".into()],
        });
        let query = SearchQuery::builder()
            .collection("sentinel-1-grd")
            .max_cloud_cover(10.0)
            .build()
            .unwrap();
        let body = adapter(options).build_search_body(&query, day("2024-06-01")).unwrap();
        assert!(body.get("query").is_none());
    }

    #[test]
    fn test_cql2_filters_combined() {
        let mut options = StacApiOptions::new("planet", "https://api.test/data");
        options.base_filter = Some(json!({"op": ">=", "args": [{"property": "pl:clear_percent"}, 50]}));
        options.cloud_cover = Some(CloudCoverFilter {
            style: CloudCoverStyle::Cql2,
            collection_prefixes: vec![],
        });
        options.default_collection = Some("PSScene".into());

        let with_cc = SearchQuery::builder().max_cloud_cover(30.0).build().unwrap();
        let body = adapter(options.clone()).build_search_body(&with_cc, day("2024-06-01")).unwrap();
        assert_eq!(body["collections"], json!(["PSScene"]));
        assert_eq!(body["filter"]["op"], "and");
        assert_eq!(body["filter"]["args"].as_array().unwrap().len(), 2);
        assert_eq!(body["filter-lang"], "cql2-json");

        let without_cc = SearchQuery::default();
        let body = adapter(options).build_search_body(&without_cc, day("2024-06-01")).unwrap();
        assert_eq!(body["filter"]["op"], ">=");
    }

    #[test]
    fn test_required_bbox_and_lookback() {
        let mut options = StacApiOptions::new("copernicus", "https://stac.test");
        options.require_bbox = true;
        options.default_lookback_days = Some(30);
        let adapter = adapter(options);

        let err = adapter
            .build_search_body(&SearchQuery::default(), day("2024-06-01"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidQuery(_)));

        let query = SearchQuery::builder()
            .bbox(altair_common::BoundingBox::new(0.0, 0.0, 1.0, 1.0))
            .build()
            .unwrap();
        let body = adapter.build_search_body(&query, day("2024-06-01")).unwrap();
        assert_eq!(body["datetime"], "2024-05-02T00:00:00Z/2024-06-01T23:59:59Z");
    }

    #[test]
    fn test_open_ended_interval_and_text() {
        let mut options = StacApiOptions::new("s", "https://stac.test/");
        options.text_search = true;
        let query = SearchQuery::builder()
            .start_date(day("2024-01-01"))
            .text("harbour")
            .build()
            .unwrap();
        let body = adapter(options).build_search_body(&query, day("2024-06-01")).unwrap();
        assert_eq!(body["datetime"], "2024-01-01T00:00:00Z/..");
        assert_eq!(body["q"], "harbour");
    }

    #[test]
    fn test_next_page_post_merges_body() {
        let page = json!({
            "links": [{
                "rel": "next",
                "href": "https://stac.test/search",
                "method": "POST",
                "body": {"token": "page2"}
            }]
        });
        let previous = json!({"limit": 10, "collections": ["a"]});
        let request = next_page_request(&page, &previous, Duration::from_secs(1))
            .unwrap()
            .unwrap();
        let body: Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
        assert_eq!(body, json!({"limit": 10, "collections": ["a"], "token": "page2"}));

        let no_next = json!({"links": [{"rel": "self", "href": "x"}]});
        assert!(next_page_request(&no_next, &previous, Duration::from_secs(1))
            .unwrap()
            .is_none());
    }
}
