//! Per-source environmental payloads
//!
//! Each payload has a `source`-style label. Payloads synthesized because the
//! real fetch failed carry [`FALLBACK_SOURCE`] and are otherwise shaped
//! exactly like real data.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Query;
use crate::estimation::{self, EstimationInput, EstimationSample};
use crate::metrics;

/// Label carried by every synthesized payload
pub const FALLBACK_SOURCE: &str = "Fallback Data (API Unavailable)";

/// US EPA AQI category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiStatus {
    pub status: String,
    pub color: String,
    pub level: String,
}

impl AqiStatus {
    /// Category and health-impact text for an AQI value
    #[must_use]
    pub fn from_aqi(aqi: u32) -> (Self, &'static str) {
        let (status, color, level, impact) = match aqi {
            0..=50 => (
                "Good",
                "#00e400",
                "low",
                "Air quality is satisfactory and poses little or no risk.",
            ),
            51..=100 => (
                "Moderate",
                "#ffff00",
                "moderate",
                "Acceptable; unusually sensitive people should consider limiting prolonged outdoor exertion.",
            ),
            101..=150 => (
                "Unhealthy for Sensitive Groups",
                "#ff7e00",
                "elevated",
                "Members of sensitive groups may experience health effects.",
            ),
            151..=200 => (
                "Unhealthy",
                "#ff0000",
                "high",
                "Everyone may begin to experience health effects.",
            ),
            201..=300 => (
                "Very Unhealthy",
                "#8f3f97",
                "very high",
                "Health alert: the risk of health effects is increased for everyone.",
            ),
            _ => (
                "Hazardous",
                "#7e0023",
                "severe",
                "Health warning of emergency conditions: everyone is more likely to be affected.",
            ),
        };
        (
            Self {
                status: status.to_string(),
                color: color.to_string(),
                level: level.to_string(),
            },
            impact,
        )
    }
}

/// Individual pollutant readings (sub-index values as reported upstream)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pollutants {
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub o3: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub co: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQuality {
    pub aqi: u32,
    pub status: AqiStatus,
    pub pollutants: Pollutants,
    pub health_impact: String,
    pub station: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub source: String,
}

impl AirQuality {
    #[must_use]
    pub fn new(
        aqi: u32,
        pollutants: Pollutants,
        station: Option<String>,
        last_updated: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        let (status, impact) = AqiStatus::from_aqi(aqi);
        Self {
            aqi,
            status,
            pollutants,
            health_impact: impact.to_string(),
            station,
            last_updated,
            source: source.into(),
        }
    }

    #[must_use]
    pub fn fallback(now: DateTime<Utc>) -> Self {
        let pollutants = Pollutants {
            pm25: Some(12.0),
            pm10: Some(20.0),
            o3: Some(30.0),
            no2: Some(15.0),
            so2: Some(5.0),
            co: Some(0.5),
        };
        Self::new(45, pollutants, None, now, FALLBACK_SOURCE)
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == FALLBACK_SOURCE
    }
}

/// One day of forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub precipitation_sum: Option<f64>,
    pub description: String,
}

/// Current conditions; temperatures in Celsius, wind in km/h, precipitation in mm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    pub temperature: f64,
    pub humidity: Option<f64>,
    pub wind_speed: f64,
    pub precipitation: f64,
    pub description: String,
    pub forecast: Vec<DailyForecast>,
    pub heat_index: Option<f64>,
    pub last_updated: DateTime<Utc>,
    pub source: String,
}

impl Weather {
    #[must_use]
    pub fn fallback(now: DateTime<Utc>) -> Self {
        let temperature = 22.0;
        let humidity = Some(60.0);
        Self {
            temperature,
            humidity,
            wind_speed: 10.0,
            precipitation: 0.0,
            description: "Unknown".to_string(),
            forecast: Vec::new(),
            heat_index: metrics::heat_index(Some(temperature), humidity),
            last_updated: now,
            source: FALLBACK_SOURCE.to_string(),
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == FALLBACK_SOURCE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Population {
    /// People per square kilometer
    pub density: f64,
    /// Compound annual growth in percent
    pub growth_rate: Option<f64>,
    pub year_range: String,
    pub data_source: String,
    pub last_updated: DateTime<Utc>,
}

impl Population {
    #[must_use]
    pub fn fallback(now: DateTime<Utc>) -> Self {
        Self {
            density: 1000.0,
            growth_rate: Some(1.0),
            year_range: "N/A".to_string(),
            data_source: FALLBACK_SOURCE.to_string(),
            last_updated: now,
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.data_source == FALLBACK_SOURCE
    }
}

/// Metadata of the granule an estimate was derived from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GranuleInfo {
    pub id: String,
    pub title: Option<String>,
    pub acquired_at: DateTime<Utc>,
    pub cloud_cover_pct: f64,
    pub size_mb: f64,
}

/// Satellite-derived estimates for the query point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Satellite {
    pub land_surface_temperature: EstimationSample,
    pub vegetation_index: EstimationSample,
    pub granule: Option<GranuleInfo>,
    pub collection: Option<String>,
    pub source: String,
}

impl Satellite {
    /// Estimates derived from one granule
    #[must_use]
    pub fn from_granule(
        query: &Query,
        granule: GranuleInfo,
        collection: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let input = EstimationInput::new(
            granule.acquired_at,
            query.latitude,
            query.longitude,
            granule.cloud_cover_pct,
            granule.size_mb,
        );
        Self {
            land_surface_temperature: estimation::land_surface_temperature(&input),
            vegetation_index: estimation::vegetation_index(&input),
            granule: Some(granule),
            collection: Some(collection.into()),
            source: source.into(),
        }
    }

    /// Worst-case-quality estimates at `now`, so confidence sits at its floor
    #[must_use]
    pub fn fallback(query: &Query, now: DateTime<Utc>) -> Self {
        let input = EstimationInput::new(now, query.latitude, query.longitude, 100.0, 0.0);
        Self {
            land_surface_temperature: estimation::land_surface_temperature(&input),
            vegetation_index: estimation::vegetation_index(&input),
            granule: None,
            collection: None,
            source: FALLBACK_SOURCE.to_string(),
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == FALLBACK_SOURCE
    }
}
