//! Data models for the UrbanLens service
//!
//! This module contains the core domain models organized by concern:
//! - Query: the normalized geographic point being described
//! - Environment: per-source payloads and their fallback values
//! - Snapshot: per-source results and the assembled snapshot

pub mod environment;
pub mod query;
pub mod snapshot;

// Re-export all public types for convenient access
pub use environment::{
    AirQuality, AqiStatus, DailyForecast, FALLBACK_SOURCE, GranuleInfo, Pollutants, Population,
    Satellite, Weather,
};
pub use query::{BoundingBox, Query, UnitSystem};
pub use snapshot::{
    Snapshot, SourceErrors, SourceId, SourceOutcome, SourcePayload, SourceResult, SourceStatus,
};
