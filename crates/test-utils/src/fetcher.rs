//! In-memory [`FetchPort`] for exercising walkers and adapters offline.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use altair_common::{CatalogError, CatalogResult, FetchPort, FetchRequest, FetchResponse};

#[derive(Debug, Clone)]
enum Route {
    Respond {
        status: u16,
        body: Bytes,
        delay: Option<Duration>,
    },
    Fail(CatalogError),
}

/// Serves canned responses keyed by exact URL and records every request.
///
/// Unknown URLs answer HTTP 404.
#[derive(Debug, Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fetcher serving every `(url, document)` pair.
    pub fn with_documents<I>(documents: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let fetcher = Self::new();
        for (url, doc) in documents {
            fetcher.insert_json(&url, &doc);
        }
        fetcher
    }

    pub fn insert_json(&self, url: &str, doc: &Value) {
        self.insert_status(url, 200, doc.to_string());
    }

    pub fn insert_status(&self, url: &str, status: u16, body: impl Into<String>) {
        self.routes().insert(
            url.to_string(),
            Route::Respond {
                status,
                body: Bytes::from(body.into()),
                delay: None,
            },
        );
    }

    /// Serve `doc` only after `delay` has elapsed on the tokio clock.
    pub fn insert_delayed(&self, url: &str, doc: &Value, delay: Duration) {
        self.routes().insert(
            url.to_string(),
            Route::Respond {
                status: 200,
                body: Bytes::from(doc.to_string()),
                delay: Some(delay),
            },
        );
    }

    /// Fail at the transport level, as if no response was obtained.
    pub fn insert_failure(&self, url: &str, error: CatalogError) {
        self.routes().insert(url.to_string(), Route::Fail(error));
    }

    pub fn remove(&self, url: &str) {
        self.routes().remove(url);
    }

    /// URLs requested so far, in request order.
    pub fn fetched_urls(&self) -> Vec<String> {
        self.requests_log().iter().map(|r| r.url.clone()).collect()
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests_log().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.requests_log().iter().filter(|r| r.url == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests_log().len()
    }

    pub fn reset_calls(&self) {
        self.requests_log().clear();
    }

    fn routes(&self) -> std::sync::MutexGuard<'_, HashMap<String, Route>> {
        self.routes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn requests_log(&self) -> std::sync::MutexGuard<'_, Vec<FetchRequest>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl FetchPort for MockFetcher {
    async fn fetch(&self, request: FetchRequest) -> CatalogResult<FetchResponse> {
        let route = self.routes().get(&request.url).cloned();
        self.requests_log().push(request);

        match route {
            Some(Route::Respond { status, body, delay }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(FetchResponse { status, body })
            }
            Some(Route::Fail(error)) => Err(error),
            None => Ok(FetchResponse {
                status: 404,
                body: Bytes::from_static(b"not found"),
            }),
        }
    }
}
