use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use urbanlens::api::AppState;
use urbanlens::sources::{
    AirQualityClient, HttpClient, ImageryClient, PopulationClient, SourceClient, WeatherClient,
};
use urbanlens::{Aggregator, EnvironmentService, SnapshotCache, UrbanLensConfig, telemetry, web};

/// Environmental snapshot aggregation server
#[derive(Parser, Debug)]
#[command(name = "urbanlens", version)]
#[command(about = "Aggregates environmental data for a point and derives urban-planning indices")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "URBANLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,
}

fn build_sources(config: &UrbanLensConfig, http: &HttpClient) -> Vec<Arc<dyn SourceClient>> {
    let sources = &config.sources;
    let mut clients: Vec<Arc<dyn SourceClient>> = Vec::new();

    if sources.air_quality.enabled {
        clients.push(Arc::new(AirQualityClient::new(http.clone(), &sources.air_quality)));
    }
    if sources.weather.enabled {
        clients.push(Arc::new(WeatherClient::new(http.clone(), &sources.weather)));
    }
    if sources.population.enabled {
        clients.push(Arc::new(PopulationClient::new(http.clone(), &sources.population)));
    }
    if sources.imagery.enabled {
        clients.push(Arc::new(ImageryClient::new(http.clone(), &sources.imagery)));
    }
    clients
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = UrbanLensConfig::load_from_path(cli.config)
        .context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    telemetry::init(&config.logging)?;

    let http = HttpClient::new(config.aggregation.deadline(), config.aggregation.max_retries)
        .context("Failed to create HTTP client")?;
    let sources = build_sources(&config, &http);

    let aggregator = Aggregator::new(sources, config.aggregation.deadline());
    let cache = SnapshotCache::new(config.cache.ttl(), config.cache.max_entries);
    info!(
        "Configured {} sources, deadline {:?}, cache TTL {:?}, cache capacity {}",
        aggregator.source_count(),
        aggregator.deadline(),
        cache.ttl(),
        config.cache.max_entries
    );
    let service = EnvironmentService::new(aggregator, cache, config.cache.coordinate_precision);

    web::run(&config.server, AppState::new(Arc::new(service))).await
}
