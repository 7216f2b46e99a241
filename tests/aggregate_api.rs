//! Integration tests for the HTTP API, driven in-process against mock sources

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;

use urbanlens::api::{self, AppState};
use urbanlens::models::{
    AirQuality, GranuleInfo, Pollutants, Population, Query, Satellite, SourceId, SourcePayload,
    Weather,
};
use urbanlens::sources::{self, SourceClient, SourceError};
use urbanlens::{Aggregator, EnvironmentService, SnapshotCache};

/// Returns a fixed payload, or fails when `healthy` is false
struct MockSource {
    id: SourceId,
    healthy: bool,
}

fn payload(id: SourceId, query: &Query) -> SourcePayload {
    let now = Utc.with_ymd_and_hms(2024, 7, 15, 15, 0, 0).unwrap();
    match id {
        SourceId::AirQuality => SourcePayload::AirQuality(AirQuality::new(
            120,
            Pollutants::default(),
            Some("Test Station".to_string()),
            now,
            "mock",
        )),
        SourceId::Weather => SourcePayload::Weather(Weather {
            temperature: 24.0,
            humidity: Some(50.0),
            wind_speed: 16.0,
            precipitation: 0.0,
            description: "Clear sky".to_string(),
            forecast: Vec::new(),
            heat_index: Some(24.0),
            last_updated: now,
            source: "mock".to_string(),
        }),
        SourceId::Population => SourcePayload::Population(Population {
            density: 10_000.0,
            growth_rate: Some(0.5),
            year_range: "2014-2022".to_string(),
            data_source: "mock".to_string(),
            last_updated: now,
        }),
        SourceId::Satellite => SourcePayload::Satellite(Satellite::from_granule(
            query,
            GranuleInfo {
                id: "G1".to_string(),
                title: None,
                acquired_at: now,
                cloud_cover_pct: 10.0,
                size_mb: 800.0,
            },
            "LANDSAT_OT_C2_L2",
            "mock",
        )),
    }
}

#[async_trait]
impl SourceClient for MockSource {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn fetch_payload(&self, query: &Query) -> sources::Result<SourcePayload> {
        if self.healthy {
            Ok(payload(self.id, query))
        } else {
            Err(SourceError::Http {
                status: 503,
                message: "Service Unavailable".to_string(),
            })
        }
    }
}

fn app(failing: &[SourceId]) -> axum::Router {
    let sources: Vec<Arc<dyn SourceClient>> = SourceId::ALL
        .iter()
        .map(|id| {
            Arc::new(MockSource {
                id: *id,
                healthy: !failing.contains(id),
            }) as Arc<dyn SourceClient>
        })
        .collect();
    let aggregator = Aggregator::new(sources, Duration::from_secs(2));
    let service = EnvironmentService::new(aggregator, SnapshotCache::default(), 2);
    api::router(AppState::new(Arc::new(service)))
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_air_quality_failure_still_returns_complete_response() {
    let (status, headers, body) = get(
        app(&[SourceId::AirQuality]),
        "/aggregate?coords=40.7128,-74.0060&location=New%20York&country=us",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers["cache-control"],
        "public, s-maxage=900, stale-while-revalidate=1800"
    );

    assert!(body["errors"]["airQuality"].as_str().unwrap().contains("503"));
    assert!(body["errors"]["weather"].is_null());
    assert!(body["errors"]["population"].is_null());
    assert!(body["errors"]["landsat"].is_null());

    assert_eq!(body["airQuality"]["aqi"], 45);
    assert_eq!(body["airQuality"]["status"]["status"], "Good");
    assert_eq!(body["airQuality"]["source"], "Fallback Data (API Unavailable)");
    assert_eq!(body["weather"]["source"], "mock");

    // (77.5 + 96 + 90) / 3 with the fallback AQI of 45
    assert_eq!(body["metrics"]["environmentalHealth"], 88.0);
    assert_eq!(body["metrics"]["airQualityScore"], 77.5);

    assert_eq!(body["location"]["name"], "New York");
    assert_eq!(body["location"]["country"], "US");
}

#[tokio::test]
async fn test_all_sources_healthy() {
    let (status, _, body) = get(app(&[]), "/aggregate?coords=40.7128,-74.0060").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["airQuality"]["aqi"], 120);
    assert_eq!(
        body["airQuality"]["status"]["status"],
        "Unhealthy for Sensitive Groups"
    );
    assert_eq!(body["location"]["name"], "40.7128, -74.0060");
    assert_eq!(body["metrics"]["populationDensity"]["level"], "High");
    assert_eq!(body["metrics"]["urbanHeatIsland"]["level"], "Moderate");
    assert_eq!(body["satellite"]["landSurfaceTemperature"]["method"], "high-quality / clear-sky");
    assert_eq!(body["satellite"]["landSurfaceTemperature"]["confidencePct"], 100);
    for source in ["airQuality", "weather", "population", "landsat"] {
        assert!(body["errors"][source].is_null(), "{source} should not fail");
    }
}

#[tokio::test]
async fn test_second_request_is_served_from_cache() {
    let app = app(&[]);

    let (_, headers, first) = get(app.clone(), "/aggregate?coords=40.7128,-74.0060").await;
    assert_eq!(headers["x-cache"], "MISS");

    let (_, headers, second) = get(app.clone(), "/aggregate?coords=40.713,-74.006").await;
    assert_eq!(headers["x-cache"], "HIT");
    assert_eq!(first["timestamp"], second["timestamp"]);

    let (_, headers, _) = get(app.clone(), "/aggregate?coords=40.7128,-74.0060&units=imperial").await;
    assert_eq!(headers["x-cache"], "MISS");

    let (_, _, health) = get(app, "/health").await;
    assert_eq!(health["cache"]["hits"], 1);
    assert_eq!(health["cache"]["entries"], 2);
}

#[tokio::test]
async fn test_imperial_units() {
    let (_, _, body) = get(app(&[]), "/aggregate?coords=40.7128,-74.0060&units=imperial").await;
    assert_eq!(body["units"]["temperature"], "°F");
    assert_eq!(body["weather"]["temperature"], 75.2);
    assert_eq!(body["weather"]["windSpeed"], 9.9);
}

#[tokio::test]
async fn test_bad_coordinates_are_rejected() {
    for uri in ["/aggregate", "/aggregate?coords=north,east", "/aggregate?coords=1,2&units=kelvin"] {
        let (status, _, body) = get(app(&[]), uri).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        assert_eq!(body["error"], "Invalid query");
        assert!(body["message"].as_str().is_some());
    }
}

#[tokio::test]
async fn test_out_of_range_coordinates_are_normalized() {
    let (status, _, body) = get(app(&[]), "/aggregate?coords=95,190").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"]["coordinates"][0], 90.0);
    assert_eq!(body["location"]["coordinates"][1], -170.0);
}

#[tokio::test]
async fn test_point_bbox_is_answered_without_radius() {
    let (status, _, body) = get(
        app(&[]),
        "/aggregate?coords=40.7128,-74.0060&bbox=-74.0,40.7,-74.0,40.7",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["location"]["radiusKm"].is_null());
    assert_eq!(body["airQuality"]["aqi"], 120);
}

#[tokio::test]
async fn test_health() {
    let (status, _, body) = get(app(&[]), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], urbanlens::VERSION);
    assert_eq!(body["cache"]["entries"], 0);
}
