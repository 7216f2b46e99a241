//! Satellite estimates from NASA CMR granule metadata
//!
//! CMR exposes only catalog metadata for a point, not pixel values. The most
//! recent granule's acquisition time, cloud cover and file size are handed to
//! [`crate::estimation`] to produce land surface temperature and NDVI.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{HttpClient, Result, SourceClient, SourceError};
use crate::config::ImageryConfig;
use crate::models::{GranuleInfo, Query, Satellite, SourceId, SourcePayload};

const SOURCE_LABEL: &str = "NASA CMR";
const PAGE_SIZE: u32 = 20;

pub struct ImageryClient {
    http: HttpClient,
    base_url: String,
    api_token: Option<String>,
    collection: String,
    timeout: Duration,
}

impl ImageryClient {
    #[must_use]
    pub fn new(http: HttpClient, config: &ImageryConfig) -> Self {
        Self {
            http,
            base_url: config.base().to_string(),
            api_token: config.api_token.clone(),
            collection: config.collection.clone(),
            timeout: config.timeout(),
        }
    }

    fn search_url(&self, query: &Query) -> String {
        format!(
            "{}/search/granules.json?short_name={}&point={},{}&sort_key%5B%5D=-start_date&page_size={}",
            self.base_url,
            urlencoding::encode(&self.collection),
            query.longitude,
            query.latitude,
            PAGE_SIZE
        )
    }
}

#[async_trait]
impl SourceClient for ImageryClient {
    fn id(&self) -> SourceId {
        SourceId::Satellite
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }

    #[instrument(name = "imagery_fetch", skip(self, query), fields(collection = %self.collection, lat = query.latitude, lon = query.longitude))]
    async fn fetch_payload(&self, query: &Query) -> Result<SourcePayload> {
        let response: SearchResponse = self
            .http
            .get_json(&self.search_url(query), self.api_token.as_deref())
            .await?;

        let granule = latest_granule(response.feed.entry)?;
        debug!(
            "Granule {} acquired {} ({:.0}% cloud, {:.1} MB)",
            granule.id, granule.acquired_at, granule.cloud_cover_pct, granule.size_mb
        );

        let satellite = Satellite::from_granule(query, granule, &self.collection, SOURCE_LABEL);
        for sample in [&satellite.land_surface_temperature, &satellite.vegetation_index] {
            if sample.low_confidence {
                warn!(
                    unit = %sample.unit,
                    confidence = sample.confidence_pct,
                    method = %sample.method,
                    "Low-confidence estimate"
                );
            }
        }
        Ok(SourcePayload::Satellite(satellite))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    feed: Feed,
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    title: Option<String>,
    time_start: Option<DateTime<Utc>>,
    cloud_cover: Option<Numeric>,
    granule_size: Option<Numeric>,
}

/// CMR serializes most numeric metadata as strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn value(&self) -> Option<f64> {
        match self {
            Numeric::Number(n) => Some(*n),
            Numeric::Text(s) => s.trim().parse().ok(),
        }
        .filter(|v: &f64| v.is_finite())
    }
}

/// Most recent granule by acquisition start; entries without a start time are skipped
fn latest_granule(entries: Vec<Entry>) -> Result<GranuleInfo> {
    let total = entries.len();
    entries
        .into_iter()
        .filter_map(|entry| {
            let acquired_at = entry.time_start?;
            Some(GranuleInfo {
                acquired_at,
                cloud_cover_pct: entry.cloud_cover.as_ref().and_then(Numeric::value).unwrap_or(100.0),
                size_mb: entry.granule_size.as_ref().and_then(Numeric::value).unwrap_or(0.0),
                id: entry.id,
                title: entry.title,
            })
        })
        .max_by_key(|granule| granule.acquired_at)
        .ok_or_else(|| {
            SourceError::NoData(format!(
                "no dated granules cover this point ({total} entries returned)"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::EstimationMethod;

    fn parse(json: &str) -> Result<GranuleInfo> {
        let response: SearchResponse = serde_json::from_str(json).unwrap();
        latest_granule(response.feed.entry)
    }

    #[test]
    fn test_selects_most_recent_granule() {
        let json = r#"{"feed": {"entry": [
            {"id": "G1", "title": "LC09_A", "time_start": "2024-06-01T15:30:00.000Z", "cloud_cover": "5", "granule_size": "900.5"},
            {"id": "G2", "title": "LC09_B", "time_start": "2024-07-03T15:30:00.000Z", "cloud_cover": "72.5", "granule_size": "12"},
            {"id": "G3", "time_start": "2024-05-20T15:30:00.000Z"}
        ]}}"#;
        let granule = parse(json).unwrap();
        assert_eq!(granule.id, "G2");
        assert_eq!(granule.cloud_cover_pct, 72.5);
        assert_eq!(granule.size_mb, 12.0);
    }

    #[test]
    fn test_missing_metadata_is_worst_case() {
        let json = r#"{"feed": {"entry": [{"id": "G3", "time_start": "2024-05-20T15:30:00Z", "cloud_cover": "n/a"}]}}"#;
        let granule = parse(json).unwrap();
        assert_eq!(granule.cloud_cover_pct, 100.0);
        assert_eq!(granule.size_mb, 0.0);
    }

    #[test]
    fn test_empty_feed_is_no_data() {
        assert!(matches!(parse(r#"{"feed": {"entry": []}}"#), Err(SourceError::NoData(_))));
        assert!(matches!(parse(r#"{"feed": {}}"#), Err(SourceError::NoData(_))));
    }

    #[test]
    fn test_granule_feeds_estimation() {
        let json = r#"{"feed": {"entry": [
            {"id": "G1", "time_start": "2024-07-03T15:30:00Z", "cloud_cover": 85, "granule_size": 3.2}
        ]}}"#;
        let granule = parse(json).unwrap();
        let query = Query::new(40.7128, -74.0060).unwrap();
        let satellite = Satellite::from_granule(&query, granule, "LANDSAT_OT_C2_L2", SOURCE_LABEL);

        assert_eq!(satellite.land_surface_temperature.method, EstimationMethod::Estimated);
        assert_eq!(satellite.land_surface_temperature.confidence_pct, 50);
        assert!(satellite.vegetation_index.low_confidence);
        assert_eq!(satellite.collection.as_deref(), Some("LANDSAT_OT_C2_L2"));
        assert!(!satellite.is_fallback());
    }

    #[test]
    fn test_search_url() {
        let http = HttpClient::new(Duration::from_secs(1), 0).unwrap();
        let client = ImageryClient::new(http, &crate::config::SourcesConfig::default().imagery);
        let url = client.search_url(&Query::new(40.5, -74.25).unwrap());
        assert_eq!(
            url,
            "https://cmr.earthdata.nasa.gov/search/granules.json?short_name=LANDSAT_OT_C2_L2&point=-74.25,40.5&sort_key%5B%5D=-start_date&page_size=20"
        );
    }
}
