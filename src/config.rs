//! Configuration management for the `UrbanLens` service
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::UrbanLensError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for the `UrbanLens` service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UrbanLensConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Upstream provider configuration
    pub sources: SourcesConfig,
    /// Fan-out configuration
    pub aggregation: AggregationConfig,
    /// Snapshot cache configuration
    pub cache: CacheConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally visible base URL of this service
    pub public_base_url: String,
    /// Upper bound for a whole request, in seconds
    pub request_timeout_seconds: u32,
}

/// Connection settings for one upstream provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub base_url: String,
    /// API token, if the provider requires one
    #[serde(default)]
    pub api_token: Option<String>,
    /// Per-call timeout in seconds
    #[serde(default = "default_source_timeout")]
    pub timeout_seconds: u32,
}

impl SourceConfig {
    fn with_base_url(base_url: &str) -> Self {
        Self {
            enabled: default_enabled(),
            base_url: base_url.to_string(),
            api_token: None,
            timeout_seconds: default_source_timeout(),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }

    /// Base URL without a trailing slash
    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Satellite imagery catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageryConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub base_url: String,
    /// Earthdata bearer token (optional for catalog search)
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_source_timeout")]
    pub timeout_seconds: u32,
    /// Catalog collection short name
    #[serde(default = "default_imagery_collection")]
    pub collection: String,
}

impl ImageryConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }

    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub air_quality: SourceConfig,
    pub weather: SourceConfig,
    pub population: SourceConfig,
    pub imagery: ImageryConfig,
}

/// Fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Shared end-to-end deadline for all sources, in seconds
    pub deadline_seconds: u32,
    /// Retries for transient HTTP failures per source call
    pub max_retries: u32,
}

impl AggregationConfig {
    #[must_use]
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_seconds.into())
    }
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache TTL in minutes
    pub ttl_minutes: u32,
    /// Decimal places of the coordinates in the cache fingerprint
    pub coordinate_precision: u32,
    /// Entry count at which the least recently used snapshot is evicted
    pub max_entries: usize,
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.ttl_minutes) * 60)
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

// Default value functions
fn default_enabled() -> bool {
    true
}

fn default_source_timeout() -> u32 {
    8
}

fn default_imagery_collection() -> String {
    "LANDSAT_OT_C2_L2".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_public_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout() -> u32 {
    30
}

fn default_deadline() -> u32 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_cache_ttl() -> u32 {
    15
}

fn default_coordinate_precision() -> u32 {
    2
}

fn default_cache_max_entries() -> usize {
    crate::cache::DEFAULT_MAX_ENTRIES
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: default_public_base_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for ImageryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: "https://cmr.earthdata.nasa.gov".to_string(),
            api_token: None,
            timeout_seconds: default_source_timeout(),
            collection: default_imagery_collection(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            air_quality: SourceConfig::with_base_url("https://api.waqi.info"),
            weather: SourceConfig::with_base_url("https://api.open-meteo.com/v1"),
            population: SourceConfig::with_base_url("https://api.worldbank.org/v2"),
            imagery: ImageryConfig::default(),
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            deadline_seconds: default_deadline(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_cache_ttl(),
            coordinate_precision: default_coordinate_precision(),
            max_entries: default_cache_max_entries(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl UrbanLensConfig {
    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. URBANLENS_SOURCES__AIR_QUALITY__API_TOKEN
        builder = builder.add_source(
            Environment::with_prefix("URBANLENS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: UrbanLensConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("urbanlens").join("config.toml"))
    }

    /// Apply default values to empty or zeroed configuration fields
    pub fn apply_defaults(&mut self) {
        if self.server.host.is_empty() {
            self.server.host = default_host();
        }
        if self.server.public_base_url.is_empty() {
            self.server.public_base_url = default_public_base_url();
        }
        if self.server.request_timeout_seconds == 0 {
            self.server.request_timeout_seconds = default_request_timeout();
        }
        for source in [
            &mut self.sources.air_quality,
            &mut self.sources.weather,
            &mut self.sources.population,
        ] {
            if source.timeout_seconds == 0 {
                source.timeout_seconds = default_source_timeout();
            }
            if source.api_token.as_deref().is_some_and(str::is_empty) {
                source.api_token = None;
            }
        }
        if self.sources.imagery.timeout_seconds == 0 {
            self.sources.imagery.timeout_seconds = default_source_timeout();
        }
        if self.sources.imagery.api_token.as_deref().is_some_and(str::is_empty) {
            self.sources.imagery.api_token = None;
        }
        if self.sources.imagery.collection.is_empty() {
            self.sources.imagery.collection = default_imagery_collection();
        }
        if self.aggregation.deadline_seconds == 0 {
            self.aggregation.deadline_seconds = default_deadline();
        }
        if self.cache.ttl_minutes == 0 {
            self.cache.ttl_minutes = default_cache_ttl();
        }
        if self.cache.max_entries == 0 {
            self.cache.max_entries = default_cache_max_entries();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        let timeouts = [
            ("air_quality", self.sources.air_quality.timeout_seconds),
            ("weather", self.sources.weather.timeout_seconds),
            ("population", self.sources.population.timeout_seconds),
            ("imagery", self.sources.imagery.timeout_seconds),
        ];
        for (name, timeout) in timeouts {
            if !(1..=120).contains(&timeout) {
                return Err(UrbanLensError::config(format!(
                    "Source '{name}' timeout must be between 1 and 120 seconds"
                ))
                .into());
            }
        }

        if !(1..=60).contains(&self.aggregation.deadline_seconds) {
            return Err(UrbanLensError::config(
                "Aggregation deadline must be between 1 and 60 seconds",
            )
            .into());
        }

        if self.aggregation.max_retries > 5 {
            return Err(UrbanLensError::config("Aggregation max retries cannot exceed 5").into());
        }

        if !(1..=1440).contains(&self.cache.ttl_minutes) {
            return Err(UrbanLensError::config(
                "Cache TTL must be between 1 and 1440 minutes (1 day)",
            )
            .into());
        }

        if self.cache.coordinate_precision > 6 {
            return Err(UrbanLensError::config(
                "Cache coordinate precision cannot exceed 6 decimal places",
            )
            .into());
        }

        if !(1..=1_000_000).contains(&self.cache.max_entries) {
            return Err(UrbanLensError::config(
                "Cache max entries must be between 1 and 1000000",
            )
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(UrbanLensError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(UrbanLensError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let urls = [
            ("air_quality", self.sources.air_quality.base_url.as_str()),
            ("weather", self.sources.weather.base_url.as_str()),
            ("population", self.sources.population.base_url.as_str()),
            ("imagery", self.sources.imagery.base_url.as_str()),
            ("public_base_url", self.server.public_base_url.as_str()),
        ];
        for (name, url) in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(UrbanLensError::config(format!(
                    "Base URL for '{name}' must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}
