//! Earth-observation catalog search CLI.
//!
//! Loads provider definitions from YAML, registers one adapter per provider
//! and answers queries across all of them:
//! - `connectors` lists registered providers and their capabilities
//! - `search` fans a query out to every usable provider (or just one)
//! - `collections` lists collections of providers that expose them

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use aggregator::{ConnectorDescriptor, ConnectorRegistry, ParallelAggregator};
use altair_common::{BoundingBox, FetchPort, SearchQuery};
use transport::ReqwestFetcher;

use config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "altair-search")]
#[command(about = "Search several Earth-observation catalogs at once", long_about = None)]
struct Cli {
    /// Configuration file with transport, aggregator and connector settings
    #[arg(short, long, env = "ALTAIR_CONFIG", default_value = "config/connectors.yaml")]
    config: PathBuf,

    /// Only register these connectors (comma separated ids)
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered connectors
    Connectors,

    /// Search all usable connectors, or one with --connector
    Search {
        /// Bounding box as west,south,east,north
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        bbox: Option<BoundingBox>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Maximum cloud cover percentage
        #[arg(long)]
        max_cloud: Option<f64>,

        /// Collection id, or `source::collection` to target one connector
        #[arg(long)]
        collection: Option<String>,

        /// Free-text query
        #[arg(long)]
        text: Option<String>,

        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// Search only this connector
        #[arg(long)]
        connector: Option<String>,
    },

    /// List collections
    Collections {
        /// List only this connector's collections
        #[arg(long)]
        connector: Option<String>,

        /// Bypass the collection cache
        #[arg(long)]
        refresh: bool,
    },
}

fn parse_bbox(s: &str) -> Result<BoundingBox, String> {
    let bbox = BoundingBox::from_csv(s).map_err(|e| e.to_string())?;
    if !bbox.is_well_formed() {
        return Err(format!("invalid bounding box: {}", s));
    }
    Ok(bbox)
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match cli.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Build every configured connector, register it and authenticate the ones
/// whose credentials are present in the environment.
async fn build_registry(config: &AppConfig) -> Result<Arc<ConnectorRegistry>> {
    let fetcher: Arc<dyn FetchPort> =
        Arc::new(ReqwestFetcher::new(config.transport.clone()).context("Failed to create HTTP client")?);

    let built = connectors::build_all(&config.connectors, fetcher).context("Invalid connector configuration")?;
    let registry = Arc::new(ConnectorRegistry::new());

    for connector in &built {
        let descriptor = ConnectorDescriptor::new(
            connector.id.clone(),
            connector.display_name.clone(),
            connector.capabilities.clone(),
            connector.adapter.clone(),
        )
        .with_description(connector.description.clone());
        registry.register(descriptor).await?;

        let Some(credentials) = connector.credentials_from(|var| std::env::var(var).ok()) else {
            continue;
        };
        match registry.authenticate(&connector.id, &credentials).await {
            Ok(true) => info!(connector = %connector.id, "Authenticated"),
            Ok(false) => warn!(connector = %connector.id, "Credentials rejected"),
            Err(e) => warn!(connector = %connector.id, error = %e, "Authentication failed"),
        }
    }

    info!(connectors = registry.len().await, "Registry ready");
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli);

    let mut config = AppConfig::load(&cli.config)?;
    config.retain_connectors(&cli.only);
    if config.connectors.is_empty() {
        bail!("No connectors configured in {:?}", cli.config);
    }

    let registry = build_registry(&config).await?;
    let aggregator = ParallelAggregator::new(registry.clone(), config.aggregator.clone()).await;

    match cli.command {
        Commands::Connectors => {
            for descriptor in registry.list().await {
                let capabilities: Vec<String> = descriptor
                    .capabilities
                    .iter()
                    .map(|c| c.to_string())
                    .collect();
                println!(
                    "{:<12} {:<28} {:<6} {}",
                    descriptor.id,
                    descriptor.display_name,
                    if descriptor.is_usable() { "ready" } else { "locked" },
                    capabilities.join(",")
                );
            }
        }

        Commands::Search {
            bbox,
            start,
            end,
            max_cloud,
            collection,
            text,
            limit,
            connector,
        } => {
            let mut builder = SearchQuery::builder().limit(limit);
            if let Some(bbox) = bbox {
                builder = builder.bbox(bbox);
            }
            if let Some(start) = start {
                builder = builder.start_date(start);
            }
            if let Some(end) = end {
                builder = builder.end_date(end);
            }
            if let Some(percent) = max_cloud {
                builder = builder.max_cloud_cover(percent);
            }
            if let Some(collection) = collection {
                builder = builder.collection(collection);
            }
            if let Some(text) = text {
                builder = builder.text(text);
            }
            let query = builder.build().context("Invalid search query")?;

            let (items, status) = match connector {
                Some(id) => {
                    let items = registry
                        .search(&query, Some(&id))
                        .await
                        .with_context(|| format!("Search on {} failed", id))?;
                    let status = format!("Searched: {} ({})", id, items.len());
                    (items, status)
                }
                None => {
                    let (items, summary) = aggregator.search_all(&query).await;
                    (items, summary.to_string())
                }
            };

            let collection = json!({
                "type": "FeatureCollection",
                "features": items,
            });
            println!("{}", serde_json::to_string_pretty(&collection)?);
            eprintln!("{}", status);
        }

        Commands::Collections { connector, refresh } => {
            let collections = match connector {
                Some(id) => aggregator
                    .collections_for(&id, !refresh)
                    .await
                    .with_context(|| format!("Listing collections of {} failed", id))?,
                None if refresh => aggregator.refresh_collections().await,
                None => aggregator.get_all_collections(true).await,
            };
            println!("{}", serde_json::to_string_pretty(&collections)?);
            eprintln!("{} collections", collections.len());
        }
    }

    Ok(())
}
