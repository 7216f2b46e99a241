//! Metadata-driven estimation of satellite-derived quantities
//!
//! No raster pixels are ever decoded. Given the metadata of one granule
//! (acquisition time, position, cloud cover, file size) the model composes a
//! handful of independent terms into a plausible physical value and reports
//! how far that value should be trusted.
//!
//! Everything here is pure and deterministic: identical inputs always yield
//! bit-identical samples.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Granules smaller than this are considered largely incomplete
pub const LOW_VOLUME_MB: f64 = 5.0;
/// Granules smaller than this are considered partially complete
pub const MEDIUM_VOLUME_MB: f64 = 20.0;
/// Confidence below this is surfaced as a low-confidence estimate
pub const LOW_CONFIDENCE_THRESHOLD: u8 = 60;

const MIN_CONFIDENCE: u8 = 50;
const HEAVY_CLOUD_PCT: f64 = 80.0;
const PARTIAL_CLOUD_PCT: f64 = 60.0;

const LST_MIN_C: f64 = -50.0;
const LST_MAX_C: f64 = 60.0;

/// Granule metadata the estimators work from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimationInput {
    pub acquired_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Cloud cover in percent, clamped to `0..=100`
    pub cloud_cover_pct: f64,
    /// Granule size in megabytes
    pub data_volume_mb: f64,
}

impl EstimationInput {
    #[must_use]
    pub fn new(
        acquired_at: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        cloud_cover_pct: f64,
        data_volume_mb: f64,
    ) -> Self {
        let cloud_cover_pct = if cloud_cover_pct.is_nan() {
            100.0
        } else {
            cloud_cover_pct.clamp(0.0, 100.0)
        };
        let data_volume_mb = if data_volume_mb.is_nan() {
            0.0
        } else {
            data_volume_mb.max(0.0)
        };
        Self {
            acquired_at,
            latitude,
            longitude,
            cloud_cover_pct,
            data_volume_mb,
        }
    }
}

/// How an estimate was obtained, from most to least trustworthy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimationMethod {
    #[serde(rename = "high-quality / clear-sky")]
    HighQuality,
    #[serde(rename = "moderate / partial-cloud")]
    Moderate,
    #[serde(rename = "estimated / cloud-interference")]
    Estimated,
}

impl EstimationMethod {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            EstimationMethod::HighQuality => "high-quality / clear-sky",
            EstimationMethod::Moderate => "moderate / partial-cloud",
            EstimationMethod::Estimated => "estimated / cloud-interference",
        }
    }
}

impl fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One estimated value with its quality annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimationSample {
    pub value: f64,
    pub unit: String,
    /// Always within `50..=100`
    pub confidence_pct: u8,
    pub method: EstimationMethod,
    /// Set when `confidence_pct` is below [`LOW_CONFIDENCE_THRESHOLD`]
    pub low_confidence: bool,
    pub basis_timestamp: DateTime<Utc>,
    pub basis_cloud_cover_pct: f64,
}

impl EstimationSample {
    fn new(value: f64, unit: &str, input: &EstimationInput) -> Self {
        let confidence_pct = confidence(input.cloud_cover_pct, input.data_volume_mb);
        Self {
            value,
            unit: unit.to_string(),
            confidence_pct,
            method: method(input.cloud_cover_pct, input.data_volume_mb),
            low_confidence: confidence_pct < LOW_CONFIDENCE_THRESHOLD,
            basis_timestamp: input.acquired_at,
            basis_cloud_cover_pct: input.cloud_cover_pct,
        }
    }
}

/// Known urban regions, used as an urban-heat-island proxy
#[derive(Debug, Clone, Copy)]
pub struct UrbanRegion {
    pub name: &'static str,
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

impl UrbanRegion {
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.south..=self.north).contains(&latitude) && (self.west..=self.east).contains(&longitude)
    }
}

pub const URBAN_REGIONS: &[UrbanRegion] = &[
    UrbanRegion { name: "New York", south: 40.49, north: 40.92, west: -74.27, east: -73.68 },
    UrbanRegion { name: "Los Angeles", south: 33.70, north: 34.34, west: -118.67, east: -118.15 },
    UrbanRegion { name: "Chicago", south: 41.64, north: 42.03, west: -87.94, east: -87.52 },
    UrbanRegion { name: "Mexico City", south: 19.18, north: 19.59, west: -99.36, east: -98.94 },
    UrbanRegion { name: "Sao Paulo", south: -23.80, north: -23.35, west: -46.83, east: -46.36 },
    UrbanRegion { name: "London", south: 51.28, north: 51.69, west: -0.51, east: 0.33 },
    UrbanRegion { name: "Paris", south: 48.72, north: 49.00, west: 2.14, east: 2.56 },
    UrbanRegion { name: "Cairo", south: 29.85, north: 30.20, west: 31.10, east: 31.50 },
    UrbanRegion { name: "Lagos", south: 6.39, north: 6.70, west: 3.10, east: 3.60 },
    UrbanRegion { name: "Delhi", south: 28.40, north: 28.88, west: 76.84, east: 77.35 },
    UrbanRegion { name: "Mumbai", south: 18.89, north: 19.27, west: 72.77, east: 72.99 },
    UrbanRegion { name: "Beijing", south: 39.75, north: 40.10, west: 116.20, east: 116.60 },
    UrbanRegion { name: "Tokyo", south: 35.50, north: 35.90, west: 139.50, east: 139.95 },
    UrbanRegion { name: "Sydney", south: -34.10, north: -33.70, west: 150.90, east: 151.35 },
];

/// Returns the urban region containing the point, if any
#[must_use]
pub fn urban_region(latitude: f64, longitude: f64) -> Option<&'static UrbanRegion> {
    URBAN_REGIONS
        .iter()
        .find(|region| region.contains(latitude, longitude))
}

/// Confidence for the given quality proxies, in `50..=100`.
///
/// Never increases as cloud cover increases.
#[must_use]
pub fn confidence(cloud_cover_pct: f64, data_volume_mb: f64) -> u8 {
    let mut confidence: i32 = 100;
    if cloud_cover_pct > HEAVY_CLOUD_PCT {
        confidence -= 30;
    } else if cloud_cover_pct >= PARTIAL_CLOUD_PCT {
        confidence -= 15;
    }
    if data_volume_mb < LOW_VOLUME_MB {
        confidence -= 20;
    } else if data_volume_mb < MEDIUM_VOLUME_MB {
        confidence -= 10;
    }
    u8::try_from(confidence.max(i32::from(MIN_CONFIDENCE))).unwrap_or(MIN_CONFIDENCE)
}

/// Method tier, selected by the same thresholds as [`confidence`]
#[must_use]
pub fn method(cloud_cover_pct: f64, data_volume_mb: f64) -> EstimationMethod {
    if cloud_cover_pct > HEAVY_CLOUD_PCT || data_volume_mb < LOW_VOLUME_MB {
        EstimationMethod::Estimated
    } else if cloud_cover_pct >= PARTIAL_CLOUD_PCT || data_volume_mb < MEDIUM_VOLUME_MB {
        EstimationMethod::Moderate
    } else {
        EstimationMethod::HighQuality
    }
}

/// +1 in the northern hemisphere summer, -1 in its winter; mirrored south of the equator
fn seasonal_phase(acquired_at: &DateTime<Utc>, latitude: f64) -> f64 {
    let day_of_year = f64::from(acquired_at.ordinal());
    let phase = (2.0 * PI * (day_of_year - 80.0) / 365.0).sin();
    if latitude < 0.0 { -phase } else { phase }
}

/// Local solar time in hours, derived from UTC and longitude
fn solar_hour(acquired_at: &DateTime<Utc>, longitude: f64) -> f64 {
    let utc_hours = f64::from(acquired_at.hour())
        + f64::from(acquired_at.minute()) / 60.0
        + f64::from(acquired_at.second()) / 3600.0;
    (utc_hours + longitude / 15.0).rem_euclid(24.0)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// Land surface temperature in degrees Celsius
#[must_use]
pub fn land_surface_temperature(input: &EstimationInput) -> EstimationSample {
    let abs_lat = input.latitude.abs();

    let seasonal_base = 30.0 - 0.4 * abs_lat;
    let seasonal_amplitude = 0.25 * abs_lat;
    let seasonal = seasonal_base + seasonal_amplitude * seasonal_phase(&input.acquired_at, input.latitude);

    let diurnal_amplitude = 2.0 + 8.0 * input.latitude.to_radians().cos();
    let hours_from_noon = solar_hour(&input.acquired_at, input.longitude) - 12.0;
    let diurnal = diurnal_amplitude * (2.0 * PI * hours_from_noon / 24.0).cos();

    let cloud = -0.08 * input.cloud_cover_pct;

    let locale = if urban_region(input.latitude, input.longitude).is_some() {
        3.0
    } else {
        0.0
    };

    let data_quality = if input.data_volume_mb < LOW_VOLUME_MB {
        -1.0
    } else if input.data_volume_mb < MEDIUM_VOLUME_MB {
        -0.5
    } else {
        0.5
    };

    let value = (seasonal + diurnal + cloud + locale + data_quality).clamp(LST_MIN_C, LST_MAX_C);
    EstimationSample::new(round_to(value, 1), "°C", input)
}

/// Normalized difference vegetation index
#[must_use]
pub fn vegetation_index(input: &EstimationInput) -> EstimationSample {
    let abs_lat = input.latitude.abs();

    // Greenness peaks in the tropics and fades toward the poles
    let seasonal_base = 0.6 - 0.005 * abs_lat;
    let seasonal_amplitude = 0.25 * (abs_lat / 90.0);
    let seasonal = seasonal_base + seasonal_amplitude * seasonal_phase(&input.acquired_at, input.latitude);

    let cloud = -0.002 * input.cloud_cover_pct;

    let locale = if urban_region(input.latitude, input.longitude).is_some() {
        -0.15
    } else {
        0.0
    };

    let data_quality = if input.data_volume_mb < LOW_VOLUME_MB {
        -0.02
    } else if input.data_volume_mb < MEDIUM_VOLUME_MB {
        -0.01
    } else {
        0.02
    };

    let value = (seasonal + cloud + locale + data_quality).clamp(-1.0, 1.0);
    EstimationSample::new(round_to(value, 3), "NDVI", input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn input(cloud: f64, volume: f64) -> EstimationInput {
        let acquired_at = Utc.with_ymd_and_hms(2024, 7, 15, 15, 30, 0).unwrap();
        EstimationInput::new(acquired_at, 40.7128, -74.0060, cloud, volume)
    }

    #[test]
    fn test_estimates_are_deterministic() {
        let a = land_surface_temperature(&input(35.0, 120.0));
        let b = land_surface_temperature(&input(35.0, 120.0));
        assert_eq!(a.value.to_bits(), b.value.to_bits());
        assert_eq!(a.confidence_pct, b.confidence_pct);
        assert_eq!(a.method, b.method);

        let a = vegetation_index(&input(35.0, 120.0));
        let b = vegetation_index(&input(35.0, 120.0));
        assert_eq!(a, b);
    }

    #[rstest]
    #[case(0.0, 500.0, 100, EstimationMethod::HighQuality)]
    #[case(59.9, 500.0, 100, EstimationMethod::HighQuality)]
    #[case(60.0, 500.0, 85, EstimationMethod::Moderate)]
    #[case(80.0, 500.0, 85, EstimationMethod::Moderate)]
    #[case(80.5, 500.0, 70, EstimationMethod::Estimated)]
    #[case(10.0, 10.0, 90, EstimationMethod::Moderate)]
    #[case(10.0, 1.0, 80, EstimationMethod::Estimated)]
    #[case(95.0, 1.0, 50, EstimationMethod::Estimated)]
    fn test_confidence_and_method(
        #[case] cloud: f64,
        #[case] volume: f64,
        #[case] expected_confidence: u8,
        #[case] expected_method: EstimationMethod,
    ) {
        let sample = land_surface_temperature(&input(cloud, volume));
        assert_eq!(sample.confidence_pct, expected_confidence);
        assert_eq!(sample.method, expected_method);
    }

    #[test]
    fn test_confidence_is_monotonic_in_cloud_cover() {
        for volume in [0.0, 7.5, 100.0] {
            let mut previous = u8::MAX;
            for step in 0..=200 {
                let cloud = f64::from(step) * 0.5;
                let current = confidence(cloud, volume);
                assert!(current <= previous, "confidence rose at cloud={cloud}, volume={volume}");
                assert!((50..=100).contains(&current));
                previous = current;
            }
        }
    }

    #[test]
    fn test_low_confidence_flag() {
        let sample = land_surface_temperature(&input(90.0, 1.0));
        assert_eq!(sample.confidence_pct, 50);
        assert!(sample.low_confidence);

        let sample = land_surface_temperature(&input(10.0, 100.0));
        assert!(!sample.low_confidence);
    }

    #[test]
    fn test_cloud_cover_lowers_temperature() {
        let clear = land_surface_temperature(&input(0.0, 100.0));
        let cloudy = land_surface_temperature(&input(50.0, 100.0));
        assert!((clear.value - cloudy.value - 4.0).abs() < 0.11);
    }

    #[test]
    fn test_urban_region_bonus() {
        let city_time = Utc.with_ymd_and_hms(2024, 7, 15, 15, 0, 0).unwrap();
        let city = land_surface_temperature(&EstimationInput::new(city_time, 40.7, -74.0, 0.0, 100.0));
        // Same latitude and local solar time, 15 degrees further west, outside any urban box
        let rural_time = Utc.with_ymd_and_hms(2024, 7, 15, 16, 0, 0).unwrap();
        let rural = land_surface_temperature(&EstimationInput::new(rural_time, 40.7, -89.0, 0.0, 100.0));
        assert!((city.value - rural.value - 3.0).abs() < 0.11);

        assert_eq!(urban_region(40.7128, -74.0060).map(|r| r.name), Some("New York"));
        assert!(urban_region(44.0, -100.0).is_none());
    }

    #[test]
    fn test_summer_is_warmer_than_winter_in_north() {
        let summer = Utc.with_ymd_and_hms(2024, 6, 21, 17, 0, 0).unwrap();
        let winter = Utc.with_ymd_and_hms(2024, 12, 21, 17, 0, 0).unwrap();
        let s = land_surface_temperature(&EstimationInput::new(summer, 45.0, -90.0, 10.0, 100.0));
        let w = land_surface_temperature(&EstimationInput::new(winter, 45.0, -90.0, 10.0, 100.0));
        assert!(s.value > w.value + 15.0);

        // Southern hemisphere is mirrored
        let s = land_surface_temperature(&EstimationInput::new(summer, -45.0, -90.0, 10.0, 100.0));
        let w = land_surface_temperature(&EstimationInput::new(winter, -45.0, -90.0, 10.0, 100.0));
        assert!(w.value > s.value + 15.0);
    }

    #[test]
    fn test_values_stay_in_physical_range() {
        for lat in [-90.0, -45.0, 0.0, 45.0, 90.0] {
            for cloud in [0.0, 100.0] {
                let acquired_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
                let input = EstimationInput::new(acquired_at, lat, 0.0, cloud, 0.0);
                let lst = land_surface_temperature(&input);
                assert!((LST_MIN_C..=LST_MAX_C).contains(&lst.value));
                let ndvi = vegetation_index(&input);
                assert!((-1.0..=1.0).contains(&ndvi.value));
            }
        }
    }

    #[test]
    fn test_input_sanitizing() {
        let acquired_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let input = EstimationInput::new(acquired_at, 0.0, 0.0, f64::NAN, -3.0);
        assert_eq!(input.cloud_cover_pct, 100.0);
        assert_eq!(input.data_volume_mb, 0.0);

        let input = EstimationInput::new(acquired_at, 0.0, 0.0, 140.0, 12.0);
        assert_eq!(input.cloud_cover_pct, 100.0);
    }

    #[test]
    fn test_method_serializes_as_label() {
        let json = serde_json::to_string(&EstimationMethod::Moderate).unwrap();
        assert_eq!(json, "\"moderate / partial-cloud\"");
    }
}
