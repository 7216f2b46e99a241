//! Composite urban-planning indices derived from a snapshot
//!
//! Each index is a pure function of its inputs and is independently
//! nullable: a missing input yields `None` rather than an error.

use serde::{Deserialize, Serialize};

use crate::models::Snapshot;

/// Fixed score for a reported AQI of exactly zero; an absent AQI is `None`, not zero
const AQI_ZERO_SCORE: f64 = 85.0;
/// Component score used when an input to the environmental health index is absent
const ABSENT_COMPONENT_SCORE: f64 = 50.0;
const COMFORT_TEMPERATURE_C: f64 = 22.0;

/// Urban heat island classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeatIslandLevel {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrbanHeatIsland {
    /// Estimated excess temperature in degrees Celsius
    pub intensity: f64,
    pub level: HeatIslandLevel,
}

/// Vegetation cover classification from NDVI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VegetationStatus {
    Dense,
    Moderate,
    Sparse,
    Barren,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VegetationHealth {
    pub ndvi: f64,
    pub status: VegetationStatus,
    pub confidence_pct: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DensityLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationDensity {
    /// People per square kilometer
    pub value: f64,
    pub level: DensityLevel,
}

/// Indices computed once per snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    /// Heat index in degrees Celsius
    pub heat_index: Option<f64>,
    pub urban_heat_island: Option<UrbanHeatIsland>,
    pub vegetation_health: Option<VegetationHealth>,
    pub air_quality_score: Option<f64>,
    pub population_density: Option<PopulationDensity>,
    /// 0-100; never absent since every component has a default
    pub environmental_health: f64,
}

impl DerivedMetrics {
    /// Derive every index from the snapshot's payloads
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let temperature = Some(snapshot.weather.temperature);
        let humidity = snapshot.weather.humidity;
        let aqi = Some(f64::from(snapshot.air_quality.aqi));
        let density = Some(snapshot.population.density);

        Self {
            heat_index: heat_index(temperature, humidity),
            urban_heat_island: temperature.map(urban_heat_island),
            vegetation_health: Some(vegetation_health(
                snapshot.satellite.vegetation_index.value,
                snapshot.satellite.vegetation_index.confidence_pct,
            )),
            air_quality_score: aqi.map(air_quality_score),
            population_density: density.map(population_density),
            environmental_health: environmental_health(aqi, temperature, density),
        }
    }
}

/// Heat index in Celsius using the NWS formulation.
///
/// Below 80°F the simple Steadman approximation applies, above it the
/// Rothfusz regression. Rounded to one decimal.
#[must_use]
pub fn heat_index(temperature_c: Option<f64>, humidity_pct: Option<f64>) -> Option<f64> {
    let t = celsius_to_fahrenheit(temperature_c?);
    let rh = humidity_pct?.clamp(0.0, 100.0);

    let simple = 0.5 * (t + 61.0 + (t - 68.0) * 1.2 + rh * 0.094);
    let hi_f = if (simple + t) / 2.0 < 80.0 {
        simple
    } else {
        -42.379 + 2.049_015_23 * t + 10.143_331_27 * rh
            - 0.224_755_41 * t * rh
            - 0.006_837_83 * t * t
            - 0.054_817_17 * rh * rh
            + 0.001_228_74 * t * t * rh
            + 0.000_852_82 * t * rh * rh
            - 0.000_001_99 * t * t * rh * rh
    };

    let hi_c = fahrenheit_to_celsius(hi_f);
    Some((hi_c * 10.0).round() / 10.0)
}

#[must_use]
pub fn urban_heat_island(temperature_c: f64) -> UrbanHeatIsland {
    let level = if temperature_c > 25.0 {
        HeatIslandLevel::High
    } else if temperature_c > 22.0 {
        HeatIslandLevel::Moderate
    } else {
        HeatIslandLevel::Low
    };
    UrbanHeatIsland {
        intensity: ((temperature_c - 20.0) * 0.3).round(),
        level,
    }
}

/// 0-100 score where 100 is cleanest air
#[must_use]
pub fn air_quality_score(aqi: f64) -> f64 {
    if aqi == 0.0 {
        return AQI_ZERO_SCORE;
    }
    (100.0 - aqi * 0.5).max(0.0)
}

#[must_use]
pub fn vegetation_health(ndvi: f64, confidence_pct: u8) -> VegetationHealth {
    let status = if ndvi >= 0.6 {
        VegetationStatus::Dense
    } else if ndvi >= 0.3 {
        VegetationStatus::Moderate
    } else if ndvi >= 0.1 {
        VegetationStatus::Sparse
    } else {
        VegetationStatus::Barren
    };
    VegetationHealth {
        ndvi,
        status,
        confidence_pct,
    }
}

#[must_use]
pub fn population_density(density: f64) -> PopulationDensity {
    let level = if density > 5000.0 {
        DensityLevel::High
    } else if density > 1000.0 {
        DensityLevel::Medium
    } else {
        DensityLevel::Low
    };
    PopulationDensity {
        value: density,
        level,
    }
}

/// Unweighted mean of air, temperature and density component scores, rounded.
///
/// A missing input contributes a neutral 50 instead of failing the index.
#[must_use]
pub fn environmental_health(
    aqi: Option<f64>,
    temperature_c: Option<f64>,
    population_density: Option<f64>,
) -> f64 {
    let air = aqi.map_or(ABSENT_COMPONENT_SCORE, air_quality_score);
    let temperature = temperature_c.map_or(ABSENT_COMPONENT_SCORE, |t| {
        (100.0 - (t - COMFORT_TEMPERATURE_C).abs() * 2.0).max(0.0)
    });
    let density = population_density.map_or(ABSENT_COMPONENT_SCORE, |d| (100.0 - d / 1000.0).max(0.0));

    ((air + temperature + density) / 3.0).round()
}

#[must_use]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

#[must_use]
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}
