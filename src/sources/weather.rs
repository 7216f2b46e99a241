//! Current conditions and daily forecast from Open-Meteo

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use super::{HttpClient, Result, SourceClient};
use crate::config::SourceConfig;
use crate::metrics;
use crate::models::{DailyForecast, Query, SourceId, SourcePayload, Weather};

const SOURCE_LABEL: &str = "Open-Meteo";
const FORECAST_DAYS: u8 = 5;

/// Open-Meteo forecast client
pub struct WeatherClient {
    http: HttpClient,
    base_url: String,
    timeout: Duration,
}

impl WeatherClient {
    #[must_use]
    pub fn new(http: HttpClient, config: &SourceConfig) -> Self {
        Self {
            http,
            base_url: config.base().to_string(),
            timeout: config.timeout(),
        }
    }

    fn forecast_url(&self, query: &Query) -> String {
        format!(
            "{}/forecast?latitude={}&longitude={}&current=temperature_2m,relative_humidity_2m,wind_speed_10m,precipitation,weather_code&daily=temperature_2m_max,temperature_2m_min,precipitation_sum,weather_code&timezone=UTC&forecast_days={}",
            self.base_url, query.latitude, query.longitude, FORECAST_DAYS
        )
    }
}

#[async_trait]
impl SourceClient for WeatherClient {
    fn id(&self) -> SourceId {
        SourceId::Weather
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }

    #[instrument(name = "weather_fetch", skip(self, query), fields(lat = query.latitude, lon = query.longitude))]
    async fn fetch_payload(&self, query: &Query) -> Result<SourcePayload> {
        let response: openmeteo::ForecastResponse =
            self.http.get_json(&self.forecast_url(query), None).await?;
        Ok(SourcePayload::Weather(response.into_weather()?))
    }
}

/// `OpenMeteo` API response structures and conversion utilities
mod openmeteo {
    use super::*;
    use crate::sources::SourceError;

    /// Forecast response from `OpenMeteo` API
    #[derive(Debug, Deserialize)]
    pub struct ForecastResponse {
        pub current: Option<CurrentData>,
        pub daily: Option<DailyData>,
    }

    /// Current weather data from `OpenMeteo`
    #[derive(Debug, Deserialize)]
    pub struct CurrentData {
        pub time: Option<String>,
        #[serde(rename = "temperature_2m")]
        pub temperature: f64,
        #[serde(rename = "relative_humidity_2m")]
        pub humidity: Option<f64>,
        #[serde(rename = "wind_speed_10m")]
        pub wind_speed: Option<f64>,
        pub precipitation: Option<f64>,
        pub weather_code: Option<u8>,
    }

    /// Daily weather data from `OpenMeteo`
    #[derive(Debug, Deserialize)]
    pub struct DailyData {
        pub time: Vec<String>,
        #[serde(rename = "temperature_2m_max", default)]
        pub temperature_max: Vec<Option<f64>>,
        #[serde(rename = "temperature_2m_min", default)]
        pub temperature_min: Vec<Option<f64>>,
        #[serde(rename = "precipitation_sum", default)]
        pub precipitation: Vec<Option<f64>>,
        #[serde(default)]
        pub weather_code: Vec<Option<u8>>,
    }

    impl ForecastResponse {
        pub fn into_weather(self) -> std::result::Result<Weather, SourceError> {
            let current = self.current.ok_or_else(|| {
                SourceError::NoData("no current weather data available from OpenMeteo".to_string())
            })?;

            let last_updated = current
                .time
                .as_deref()
                .and_then(|t| NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M").ok())
                .map_or_else(Utc::now, |dt| dt.and_utc());

            let forecast = self.daily.map(DailyData::into_forecast).unwrap_or_default();

            Ok(Weather {
                temperature: current.temperature,
                humidity: current.humidity,
                wind_speed: current.wind_speed.unwrap_or(0.0),
                precipitation: current.precipitation.unwrap_or(0.0),
                description: weather_code_to_description(current.weather_code.unwrap_or(u8::MAX))
                    .to_string(),
                forecast,
                heat_index: metrics::heat_index(Some(current.temperature), current.humidity),
                last_updated,
                source: SOURCE_LABEL.to_string(),
            })
        }
    }

    impl DailyData {
        fn into_forecast(self) -> Vec<DailyForecast> {
            let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();
            self.time
                .iter()
                .enumerate()
                .filter_map(|(i, day)| {
                    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
                    let code = self.weather_code.get(i).copied().flatten();
                    Some(DailyForecast {
                        date,
                        temperature_max: at(&self.temperature_max, i),
                        temperature_min: at(&self.temperature_min, i),
                        precipitation_sum: at(&self.precipitation, i),
                        description: weather_code_to_description(code.unwrap_or(u8::MAX))
                            .to_string(),
                    })
                })
                .collect()
        }
    }

    /// Convert `OpenMeteo` weather code to human-readable description
    #[must_use]
    pub fn weather_code_to_description(code: u8) -> &'static str {
        match code {
            0 => "Clear sky",
            1 => "Mainly clear",
            2 => "Partly cloudy",
            3 => "Overcast",
            45 => "Fog",
            48 => "Depositing rime fog",
            51 => "Light drizzle",
            53 => "Moderate drizzle",
            55 => "Dense drizzle",
            56 => "Light freezing drizzle",
            57 => "Dense freezing drizzle",
            61 => "Slight rain",
            63 => "Moderate rain",
            65 => "Heavy rain",
            66 => "Light freezing rain",
            67 => "Heavy freezing rain",
            71 => "Slight snow fall",
            73 => "Moderate snow fall",
            75 => "Heavy snow fall",
            77 => "Snow grains",
            80 => "Slight rain showers",
            81 => "Moderate rain showers",
            82 => "Violent rain showers",
            85 => "Slight snow showers",
            86 => "Heavy snow showers",
            95 => "Thunderstorm",
            96 => "Thunderstorm with slight hail",
            99 => "Thunderstorm with heavy hail",
            _ => "Unknown",
        }
    }
}
