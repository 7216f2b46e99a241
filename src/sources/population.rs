//! Population density from the World Bank indicators API

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{HttpClient, Result, SourceClient, SourceError};
use crate::config::SourceConfig;
use crate::models::{Population, Query, SourceId, SourcePayload};

const INDICATOR: &str = "EN.POP.DNST";
const SOURCE_LABEL: &str = "World Bank";
/// Years of history requested; the indicator lags a year or two behind
const WINDOW_YEARS: i32 = 10;

pub struct PopulationClient {
    http: HttpClient,
    base_url: String,
    timeout: Duration,
}

impl PopulationClient {
    #[must_use]
    pub fn new(http: HttpClient, config: &SourceConfig) -> Self {
        Self {
            http,
            base_url: config.base().to_string(),
            timeout: config.timeout(),
        }
    }

    fn indicator_url(&self, country: &str, end_year: i32) -> String {
        format!(
            "{}/country/{}/indicator/{}?format=json&date={}:{}&per_page=20",
            self.base_url,
            urlencoding::encode(country),
            INDICATOR,
            end_year - WINDOW_YEARS,
            end_year
        )
    }
}

#[async_trait]
impl SourceClient for PopulationClient {
    fn id(&self) -> SourceId {
        SourceId::Population
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }

    #[instrument(name = "population_fetch", skip(self, query), fields(country = ?query.country_hint))]
    async fn fetch_payload(&self, query: &Query) -> Result<SourcePayload> {
        let country = query.country_hint.as_deref().ok_or_else(|| {
            SourceError::MissingInput("population density needs a country code".to_string())
        })?;

        let url = self.indicator_url(country, Utc::now().year());
        let body: serde_json::Value = self.http.get_json(&url, None).await?;
        let population = parse_indicator(body)?;
        debug!(
            "{} density {:.1}/km² over {}",
            country, population.density, population.year_range
        );
        Ok(SourcePayload::Population(population))
    }
}

/// One yearly observation
#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorHeader {
    message: Vec<ApiMessage>,
}

/// The API answers `[header, rows]` on success and `[{"message": [...]}]` on error
fn parse_indicator(body: serde_json::Value) -> Result<Population> {
    let serde_json::Value::Array(mut parts) = body else {
        return Err(SourceError::Malformed("World Bank: expected a JSON array".to_string()));
    };

    if parts.len() < 2 {
        let message = parts
            .pop()
            .and_then(|header| serde_json::from_value::<ErrorHeader>(header).ok())
            .and_then(|h| h.message.into_iter().find_map(|m| m.value))
            .unwrap_or_else(|| "empty response".to_string());
        return Err(SourceError::NoData(format!("World Bank: {message}")));
    }

    let rows: Option<Vec<Observation>> = serde_json::from_value(parts.swap_remove(1))
        .map_err(|e| SourceError::Malformed(format!("World Bank rows: {e}")))?;

    let mut series: Vec<(i32, f64)> = rows
        .unwrap_or_default()
        .into_iter()
        .filter_map(|row| Some((row.date.parse().ok()?, row.value?)))
        .filter(|(_, value): &(i32, f64)| value.is_finite())
        .collect();
    series.sort_by_key(|(year, _)| *year);

    let (Some(&(first_year, first_value)), Some(&(last_year, last_value))) =
        (series.first(), series.last())
    else {
        return Err(SourceError::NoData(
            "World Bank reports no density values for this country".to_string(),
        ));
    };

    Ok(Population {
        density: last_value,
        growth_rate: growth_rate(first_year, first_value, last_year, last_value),
        year_range: format!("{first_year}-{last_year}"),
        data_source: SOURCE_LABEL.to_string(),
        last_updated: Utc::now(),
    })
}

/// Compound annual growth in percent, two decimals
fn growth_rate(first_year: i32, first: f64, last_year: i32, last: f64) -> Option<f64> {
    let years = last_year - first_year;
    if years <= 0 || first <= 0.0 {
        return None;
    }
    let rate = ((last / first).powf(1.0 / f64::from(years)) - 1.0) * 100.0;
    Some((rate * 100.0).round() / 100.0)
}
