//! HTTP API: `/aggregate` and `/health`

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query as QueryParams, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::CacheStats;
use crate::error::UrbanLensError;
use crate::metrics::{
    self, DerivedMetrics, PopulationDensity, UrbanHeatIsland, VegetationHealth,
};
use crate::models::{
    AirQuality, BoundingBox, Population, Query, Satellite, SourceErrors, UnitSystem, Weather,
};
use crate::service::{CacheStatus, EnvironmentService};

const CACHE_CONTROL: &str = "public, s-maxage=900, stale-while-revalidate=1800";
const KMH_PER_MPH: f64 = 1.609_344;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EnvironmentService>,
}

impl AppState {
    #[must_use]
    pub fn new(service: Arc<EnvironmentService>) -> Self {
        Self { service }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/aggregate", get(get_aggregate))
        .route("/health", get(get_health))
        .with_state(state)
}

/// Raw query-string parameters of `/aggregate`
#[derive(Debug, Default, Deserialize)]
pub struct AggregateParams {
    pub coords: Option<String>,
    pub location: Option<String>,
    pub country: Option<String>,
    pub bbox: Option<String>,
    pub radius: Option<String>,
    pub units: Option<String>,
}

impl AggregateParams {
    /// Validate and normalize into a [`Query`]
    pub fn into_query(self) -> crate::Result<Query> {
        let coords = self
            .coords
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| UrbanLensError::invalid_query("the 'coords' parameter is required"))?;

        let mut query = Query::from_coords(coords)?;

        if let Some(name) = non_empty(self.location) {
            query = query.with_location_name(name);
        }
        if let Some(country) = non_empty(self.country) {
            query = query.with_country(country);
        }

        if let Some(radius) = non_empty(self.radius) {
            let radius: f64 = radius.trim().parse().map_err(|_| {
                UrbanLensError::invalid_query(format!("radius must be a number, got '{radius}'"))
            })?;
            query = query.with_radius_km(radius)?;
        } else if let Some(bbox) = non_empty(self.bbox) {
            // A degenerate box (a single point) carries no extent
            let radius = BoundingBox::parse(&bbox)?.radius_km();
            if radius.is_finite() && radius > 0.0 {
                query = query.with_radius_km(radius)?;
            }
        }

        if let Some(units) = self.units {
            query = query.with_units(UnitSystem::parse(&units)?);
        }

        Ok(query)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Error body returned for requests that cannot be answered at all
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl IntoResponse for UrbanLensError {
    fn into_response(self) -> Response {
        warn!("Request failed: {}", self);
        let body = ApiError {
            error: self.label().to_string(),
            message: self.user_message(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ApiLocation {
    pub name: String,
    /// `[latitude, longitude]`
    pub coordinates: [f64; 2],
    pub country: Option<String>,
    #[serde(rename = "radiusKm")]
    pub radius_km: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUnits {
    pub system: UnitSystem,
    pub temperature: &'static str,
    pub wind_speed: &'static str,
}

impl From<UnitSystem> for ApiUnits {
    fn from(system: UnitSystem) -> Self {
        match system {
            UnitSystem::Metric => Self {
                system,
                temperature: "°C",
                wind_speed: "km/h",
            },
            UnitSystem::Imperial => Self {
                system,
                temperature: "°F",
                wind_speed: "mph",
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiForecastDay {
    pub date: NaiveDate,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub precipitation_sum: Option<f64>,
    pub description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiWeather {
    pub temperature: f64,
    pub humidity: Option<f64>,
    pub wind_speed: f64,
    pub precipitation: f64,
    pub description: String,
    pub forecast: Vec<ApiForecastDay>,
    pub heat_index: Option<f64>,
    pub last_updated: DateTime<Utc>,
    pub source: String,
}

impl ApiWeather {
    fn new(weather: &Weather, units: UnitSystem) -> Self {
        let temperature = |celsius: f64| match units {
            UnitSystem::Metric => celsius,
            UnitSystem::Imperial => round1(metrics::celsius_to_fahrenheit(celsius)),
        };
        let wind_speed = match units {
            UnitSystem::Metric => weather.wind_speed,
            UnitSystem::Imperial => round1(weather.wind_speed / KMH_PER_MPH),
        };

        Self {
            temperature: temperature(weather.temperature),
            humidity: weather.humidity,
            wind_speed,
            precipitation: weather.precipitation,
            description: weather.description.clone(),
            forecast: weather
                .forecast
                .iter()
                .map(|day| ApiForecastDay {
                    date: day.date,
                    temperature_max: day.temperature_max.map(temperature),
                    temperature_min: day.temperature_min.map(temperature),
                    precipitation_sum: day.precipitation_sum,
                    description: day.description.clone(),
                })
                .collect(),
            heat_index: weather.heat_index.map(temperature),
            last_updated: weather.last_updated,
            source: weather.source.clone(),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMetrics {
    pub urban_heat_island: Option<UrbanHeatIsland>,
    pub vegetation_health: Option<VegetationHealth>,
    pub air_quality_score: Option<f64>,
    pub population_density: Option<PopulationDensity>,
    pub environmental_health: f64,
}

impl From<&DerivedMetrics> for ApiMetrics {
    fn from(metrics: &DerivedMetrics) -> Self {
        Self {
            urban_heat_island: metrics.urban_heat_island.clone(),
            vegetation_health: metrics.vegetation_health.clone(),
            air_quality_score: metrics.air_quality_score,
            population_density: metrics.population_density.clone(),
            environmental_health: metrics.environmental_health,
        }
    }
}

/// Body of a successful `/aggregate` response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResponse {
    pub timestamp: DateTime<Utc>,
    pub location: ApiLocation,
    pub units: ApiUnits,
    pub air_quality: Option<AirQuality>,
    pub weather: Option<ApiWeather>,
    pub population: Option<Population>,
    pub satellite: Satellite,
    pub metrics: ApiMetrics,
    pub errors: SourceErrors,
}

async fn get_aggregate(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<AggregateParams>,
) -> Result<Response, UrbanLensError> {
    let query = params.into_query()?;
    let (entry, cache_status) = state.service.report(&query).await;
    let snapshot = &entry.snapshot;

    // Location echoes the request; the cached snapshot may stem from a nearby query
    let body = AggregateResponse {
        timestamp: snapshot.generated_at,
        location: ApiLocation {
            name: query.display_name(),
            coordinates: [query.latitude, query.longitude],
            country: query.country_hint.clone(),
            radius_km: query.radius_km,
        },
        units: query.units.into(),
        air_quality: Some(snapshot.air_quality.clone()),
        weather: Some(ApiWeather::new(&snapshot.weather, query.units)),
        population: Some(snapshot.population.clone()),
        satellite: snapshot.satellite.clone(),
        metrics: ApiMetrics::from(entry.metrics.as_ref()),
        errors: snapshot.errors.clone(),
    };

    info!(
        "Served {} ({}, {} source errors)",
        query.display_name(),
        cache_status.as_str(),
        snapshot.errors.count()
    );

    let mut response = Json(body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    headers.insert("x-cache", HeaderValue::from_static(cache_status.as_str()));
    Ok(response)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub cache: CacheStats,
}

async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
        cache: state.service.cache_stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn params(coords: &str) -> AggregateParams {
        AggregateParams {
            coords: Some(coords.to_string()),
            ..AggregateParams::default()
        }
    }

    #[test]
    fn test_into_query_with_all_params() {
        let query = AggregateParams {
            coords: Some("40.7128,-74.0060".into()),
            location: Some("New York".into()),
            country: Some(" us ".into()),
            radius: Some("12.5".into()),
            units: Some("imperial".into()),
            ..AggregateParams::default()
        }
        .into_query()
        .unwrap();

        assert_eq!(query.display_name(), "New York");
        assert_eq!(query.country_hint.as_deref(), Some("US"));
        assert_eq!(query.radius_km, Some(12.5));
        assert_eq!(query.units, UnitSystem::Imperial);
    }

    #[test]
    fn test_bbox_derives_radius() {
        let query = AggregateParams {
            bbox: Some("-74.1,40.6,-73.9,40.8".into()),
            ..params("40.7,-74.0")
        }
        .into_query()
        .unwrap();
        let radius = query.radius_km.unwrap();
        assert!(radius > 10.0 && radius < 20.0, "radius {radius}");
    }

    #[test]
    fn test_point_bbox_leaves_radius_unset() {
        let query = AggregateParams {
            bbox: Some("-74.0,40.7,-74.0,40.7".into()),
            ..params("40.7128,-74.0060")
        }
        .into_query()
        .unwrap();
        assert_eq!(query.radius_km, None);
    }

    #[rstest]
    #[case(AggregateParams::default())]
    #[case(params(""))]
    #[case(params("abc,def"))]
    #[case(params("40.7"))]
    #[case(AggregateParams { radius: Some("wide".into()), ..params("40.7,-74.0") })]
    #[case(AggregateParams { radius: Some("-3".into()), ..params("40.7,-74.0") })]
    #[case(AggregateParams { bbox: Some("1,2,3".into()), ..params("40.7,-74.0") })]
    #[case(AggregateParams { units: Some("kelvin".into()), ..params("40.7,-74.0") })]
    fn test_invalid_params(#[case] params: AggregateParams) {
        let err = params.into_query().unwrap_err();
        assert!(matches!(err, UrbanLensError::InvalidQuery { .. }));
    }

    #[test]
    fn test_out_of_range_coords_are_normalized() {
        let query = params("95,190").into_query().unwrap();
        assert_eq!((query.latitude, query.longitude), (90.0, -170.0));
    }

    #[test]
    fn test_imperial_weather_conversion() {
        let weather = Weather::fallback(Utc::now());
        let metric = ApiWeather::new(&weather, UnitSystem::Metric);
        let imperial = ApiWeather::new(&weather, UnitSystem::Imperial);

        assert_eq!(metric.temperature, 22.0);
        assert_eq!(imperial.temperature, 71.6);
        assert_eq!(metric.wind_speed, 10.0);
        assert_eq!(imperial.wind_speed, 6.2);
        assert_eq!(imperial.humidity, metric.humidity);
    }

    #[test]
    fn test_error_response_shape() {
        let response = UrbanLensError::invalid_query("bad coords").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
