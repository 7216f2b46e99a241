//! Air quality from the World Air Quality Index (WAQI) station feed

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{HttpClient, Result, SourceClient, SourceError};
use crate::config::SourceConfig;
use crate::models::{AirQuality, Pollutants, Query, SourceId, SourcePayload};

const SOURCE_LABEL: &str = "World Air Quality Index";

/// WAQI geo feed client
pub struct AirQualityClient {
    http: HttpClient,
    base_url: String,
    api_token: Option<String>,
    timeout: Duration,
}

impl AirQualityClient {
    #[must_use]
    pub fn new(http: HttpClient, config: &SourceConfig) -> Self {
        Self {
            http,
            base_url: config.base().to_string(),
            api_token: config.api_token.clone(),
            timeout: config.timeout(),
        }
    }
}

#[async_trait]
impl SourceClient for AirQualityClient {
    fn id(&self) -> SourceId {
        SourceId::AirQuality
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }

    #[instrument(name = "air_quality_fetch", skip(self, query), fields(lat = query.latitude, lon = query.longitude))]
    async fn fetch_payload(&self, query: &Query) -> Result<SourcePayload> {
        let token = self
            .api_token
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured("WAQI API token is missing".to_string()))?;

        let url = format!(
            "{}/feed/geo:{};{}/?token={}",
            self.base_url,
            query.latitude,
            query.longitude,
            urlencoding::encode(token)
        );
        let response: FeedResponse = self.http.get_json(&url, None).await?;
        let air_quality = response.into_air_quality()?;
        debug!("Station '{:?}' reports AQI {}", air_quality.station, air_quality.aqi);
        Ok(SourcePayload::AirQuality(air_quality))
    }
}

/// Response envelope; `data` is an object on success and a message otherwise
#[derive(Debug, Deserialize)]
struct FeedResponse {
    status: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct FeedData {
    aqi: AqiValue,
    city: Option<City>,
    #[serde(default)]
    iaqi: Iaqi,
    time: Option<FeedTime>,
}

/// WAQI reports `"-"` when a station has no current reading
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AqiValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct City {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Iaqi {
    pm25: Option<Reading>,
    pm10: Option<Reading>,
    o3: Option<Reading>,
    no2: Option<Reading>,
    so2: Option<Reading>,
    co: Option<Reading>,
}

#[derive(Debug, Deserialize)]
struct Reading {
    v: f64,
}

#[derive(Debug, Deserialize)]
struct FeedTime {
    iso: Option<DateTime<Utc>>,
}

impl FeedResponse {
    fn into_air_quality(self) -> Result<AirQuality> {
        if self.status != "ok" {
            let message = self
                .data
                .as_str()
                .map_or_else(|| self.status.clone(), str::to_string);
            return Err(SourceError::NoData(format!("WAQI: {message}")));
        }

        let data: FeedData = serde_json::from_value(self.data)
            .map_err(|e| SourceError::Malformed(format!("WAQI feed: {e}")))?;

        let aqi = match data.aqi {
            AqiValue::Number(value) if value.is_finite() && value >= 0.0 => value.round() as u32,
            AqiValue::Number(value) => {
                return Err(SourceError::Malformed(format!("WAQI AQI out of range: {value}")));
            }
            AqiValue::Text(text) => {
                return Err(SourceError::NoData(format!(
                    "station has no current AQI reading ('{text}')"
                )));
            }
        };

        let value = |reading: Option<Reading>| reading.map(|r| r.v);
        let pollutants = Pollutants {
            pm25: value(data.iaqi.pm25),
            pm10: value(data.iaqi.pm10),
            o3: value(data.iaqi.o3),
            no2: value(data.iaqi.no2),
            so2: value(data.iaqi.so2),
            co: value(data.iaqi.co),
        };

        let last_updated = data
            .time
            .and_then(|t| t.iso)
            .unwrap_or_else(Utc::now);

        Ok(AirQuality::new(
            aqi,
            pollutants,
            data.city.and_then(|c| c.name),
            last_updated,
            SOURCE_LABEL,
        ))
    }
}
