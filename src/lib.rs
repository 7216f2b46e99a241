//! `UrbanLens` - environmental snapshots and urban-planning indices
//!
//! This library aggregates air quality, weather, population and satellite
//! data for a geographic point from independent upstream providers,
//! substitutes labelled fallbacks for whatever fails, and derives composite
//! indices from the result.

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod estimation;
pub mod metrics;
pub mod models;
pub mod service;
pub mod sources;
pub mod telemetry;
pub mod web;

// Re-export core types for public API
pub use aggregator::{AggregateReport, Aggregator};
pub use cache::{CacheEntry, SnapshotCache};
pub use config::UrbanLensConfig;
pub use error::UrbanLensError;
pub use metrics::DerivedMetrics;
pub use models::{Query, Snapshot, SourceId, SourceResult};
pub use service::{CacheStatus, EnvironmentService};
pub use sources::{SourceClient, SourceError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, UrbanLensError>;
