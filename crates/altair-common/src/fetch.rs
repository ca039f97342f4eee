//! The injected HTTP capability.
//!
//! The middleware never talks to the network directly. Every request goes
//! through a [`FetchPort`] supplied by the caller, so proxying, TLS and
//! socket-level retries stay outside the core.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::error::{CatalogError, CatalogResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            headers: BTreeMap::new(),
            body: None,
            timeout,
        }
    }

    /// POST with a JSON body and matching content headers.
    pub fn post_json(url: impl Into<String>, body: &Value, timeout: Duration) -> CatalogResult<Self> {
        let bytes = serde_json::to_vec(body)?;
        Ok(Self {
            url: url.into(),
            method: Method::Post,
            headers: BTreeMap::from([
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ]),
            body: Some(Bytes::from(bytes)),
            timeout,
        })
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Raw response: HTTP status plus body bytes.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport capability consumed by walkers and adapters.
///
/// Implementations return `Err` only when no HTTP response was obtained
/// (connection failure, timeout). Non-2xx responses are returned as-is.
#[async_trait]
pub trait FetchPort: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> CatalogResult<FetchResponse>;
}

/// Issue a request and return the body of a successful response.
///
/// 401/403 map to `AuthRequired` and any other non-2xx status to `Network`.
pub async fn fetch_body(port: &dyn FetchPort, request: FetchRequest) -> CatalogResult<Bytes> {
    let url = request.url.clone();
    let response = port.fetch(request).await?;

    match response.status {
        200..=299 => Ok(response.body),
        401 | 403 => Err(CatalogError::AuthRequired(format!(
            "{} returned HTTP {}",
            url, response.status
        ))),
        status => Err(CatalogError::network(url, format!("HTTP {}", status))),
    }
}

/// Issue a request and decode a successful body as JSON.
///
/// Status mapping follows [`fetch_body`]; an undecodable body is `Parse`.
pub async fn fetch_json(port: &dyn FetchPort, request: FetchRequest) -> CatalogResult<Value> {
    let url = request.url.clone();
    let body = fetch_body(port, request).await?;
    serde_json::from_slice(&body).map_err(|e| CatalogError::Parse(format!("{}: {}", url, e)))
}

/// GET a URL and decode it as JSON.
pub async fn get_json(port: &dyn FetchPort, url: &str, timeout: Duration) -> CatalogResult<Value> {
    fetch_json(port, FetchRequest::get(url, timeout)).await
}

/// GET a URL and decode it as UTF-8 text.
pub async fn get_text(port: &dyn FetchPort, url: &str, timeout: Duration) -> CatalogResult<String> {
    let body = fetch_body(port, FetchRequest::get(url, timeout)).await?;
    String::from_utf8(body.to_vec()).map_err(|e| CatalogError::Parse(format!("{}: {}", url, e)))
}
