//! Application configuration loading.

use std::path::Path;

use aggregator::AggregatorConfig;
use anyhow::{bail, Context, Result};
use connectors::ConnectorSpec;
use serde::Deserialize;
use transport::TransportConfig;

/// Top-level YAML document: HTTP client, aggregator tuning and providers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub aggregator: AggregatorConfig,

    #[serde(default)]
    pub connectors: Vec<ConnectorSpec>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;

        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config: {:?}", path))?;

        tracing::info!(
            connectors = config.connectors.len(),
            path = ?path,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        if config.aggregator.max_concurrent == 0 {
            bail!("aggregator.max_concurrent must be at least 1");
        }
        Ok(config)
    }

    /// Restrict the configured providers to `ids`, in configuration order.
    pub fn retain_connectors(&mut self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        self.connectors.retain(|spec| ids.iter().any(|id| id == &spec.id));
    }
}
