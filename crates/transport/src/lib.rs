//! HTTP transport for the catalog middleware.
//!
//! Provides [`ReqwestFetcher`], the default [`FetchPort`] implementation.
//!
//! Key features:
//! - Shared connection pool with per-request timeouts
//! - Exponential backoff retry on connection failures (never on HTTP statuses)
//! - Configurable user agent and connect timeout

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use altair_common::{CatalogError, CatalogResult, FetchPort, FetchRequest, FetchResponse, Method};

/// Configuration for the HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Upper bound for any single request when the caller passes none
    pub request_timeout_secs: u64,
    /// TCP/TLS connect timeout
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    pub pool_max_idle_per_host: usize,
    /// Retries after a connection failure (0 disables)
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay_ms: u64,
    /// Maximum retry delay
    pub max_retry_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            user_agent: format!("altair-search/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 4,
            max_retries: 2,
            initial_retry_delay_ms: 250,
            max_retry_delay_ms: 4_000,
        }
    }
}

impl TransportConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let delay = self.initial_retry_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_retry_delay_ms))
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to create HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// [`FetchPort`] backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    config: TransportConfig,
}

impl ReqwestFetcher {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(config.user_agent.clone())
            .tcp_nodelay(true)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn send_once(&self, request: &FetchRequest) -> Result<FetchResponse, reqwest::Error> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        let mut builder = builder
            .headers(header_map(request))
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(FetchResponse { status, body })
    }
}

#[async_trait]
impl FetchPort for ReqwestFetcher {
    #[instrument(skip(self, request), fields(url = %request.url, method = %request.method))]
    async fn fetch(&self, request: FetchRequest) -> CatalogResult<FetchResponse> {
        let mut attempt = 0;

        loop {
            match self.send_once(&request).await {
                Ok(response) => {
                    debug!(status = response.status, bytes = response.body.len(), "Fetched");
                    return Ok(response);
                }
                Err(e) if e.is_timeout() => {
                    return Err(CatalogError::Timeout {
                        url: request.url.clone(),
                        after: request.timeout,
                    });
                }
                Err(e) => {
                    attempt += 1;
                    if !e.is_connect() || attempt > self.config.max_retries {
                        return Err(CatalogError::network(&request.url, e));
                    }

                    let delay = self.config.retry_delay(attempt);
                    warn!(
                        error = %e,
                        retry = attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Invalid header names or values are dropped with a warning.
fn header_map(request: &FetchRequest) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(request.headers.len());
    for (name, value) in &request.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "Dropping invalid request header"),
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_backoff() {
        let config = TransportConfig::default();
        assert_eq!(config.retry_delay(1), Duration::from_millis(250));
        assert_eq!(config.retry_delay(2), Duration::from_millis(500));
        assert_eq!(config.retry_delay(3), Duration::from_millis(1_000));
        assert_eq!(config.retry_delay(40), Duration::from_millis(4_000));
    }

    #[test]
    fn test_config_defaults_from_partial_yaml() {
        let config: TransportConfig = serde_yaml::from_str("user_agent: test-agent\nmax_retries: 0").unwrap();
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn test_header_map_drops_invalid() {
        let request = FetchRequest::get("http://x", Duration::from_secs(1))
            .with_header("Authorization", "Bearer abc")
            .with_header("Bad Header", "v");
        let headers = header_map(&request);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["authorization"], "Bearer abc");
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let fetcher = ReqwestFetcher::new(TransportConfig {
            max_retries: 0,
            ..Default::default()
        })
        .unwrap();

        let err = fetcher
            .fetch(FetchRequest::get("http://127.0.0.1:1/catalog.json", Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(err.is_network());
    }
}
