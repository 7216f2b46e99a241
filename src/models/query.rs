//! Query model: the normalized geographic point a snapshot is built for

use haversine::{Location as HaversineLocation, Units, distance};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::UrbanLensError;

/// Unit system requested by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    /// Celsius and km/h
    #[default]
    Metric,
    /// Fahrenheit and mph
    Imperial,
}

impl UnitSystem {
    /// Parse a unit system token (case-insensitive, surrounding whitespace ignored)
    pub fn parse(raw: &str) -> crate::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "metric" | "si" => Ok(UnitSystem::Metric),
            "imperial" | "us" => Ok(UnitSystem::Imperial),
            other => Err(UrbanLensError::invalid_query(format!(
                "unknown unit system '{other}', expected 'metric' or 'imperial'"
            ))),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounding box in `west, south, east, north` order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Parse a `w,s,e,n` string
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let parts = parse_numbers(raw, "bbox")?;
        let [west, south, east, north] = parts[..] else {
            return Err(UrbanLensError::invalid_query(format!(
                "bbox must have four values 'w,s,e,n', got {}",
                parts.len()
            )));
        };
        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// Half the great-circle length of the box diagonal in kilometers
    #[must_use]
    pub fn radius_km(&self) -> f64 {
        let south_west = HaversineLocation {
            latitude: self.south,
            longitude: self.west,
        };
        let north_east = HaversineLocation {
            latitude: self.north,
            longitude: self.east,
        };
        distance(south_west, north_east, Units::Kilometers) / 2.0
    }
}

/// Immutable, normalized input of one aggregation
///
/// Latitude is clamped into `[-90, 90]` and longitude wrapped into
/// `[-180, 180)`. Non-finite coordinates are the only rejected input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub latitude: f64,
    pub longitude: f64,
    /// Display name for the location, if the caller supplied one
    pub location_name: Option<String>,
    /// Country code (ISO 3166-1), upper-cased
    pub country_hint: Option<String>,
    pub radius_km: Option<f64>,
    pub units: UnitSystem,
}

impl Query {
    /// Create a query for a point, normalizing out-of-range coordinates
    pub fn new(latitude: f64, longitude: f64) -> crate::Result<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(UrbanLensError::invalid_query(format!(
                "coordinates must be finite numbers, got ({latitude}, {longitude})"
            )));
        }
        Ok(Self {
            latitude: latitude.clamp(-90.0, 90.0),
            longitude: wrap_longitude(longitude),
            location_name: None,
            country_hint: None,
            radius_km: None,
            units: UnitSystem::default(),
        })
    }

    /// Parse a `lat,lng` coordinate pair
    pub fn from_coords(raw: &str) -> crate::Result<Self> {
        let parts = parse_numbers(raw, "coords")?;
        let [latitude, longitude] = parts[..] else {
            return Err(UrbanLensError::invalid_query(format!(
                "coords must be 'lat,lng', got {} values",
                parts.len()
            )));
        };
        Self::new(latitude, longitude)
    }

    #[must_use]
    pub fn with_location_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        self.location_name = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        let country = country.into();
        let trimmed = country.trim();
        self.country_hint = (!trimmed.is_empty()).then(|| trimmed.to_ascii_uppercase());
        self
    }

    /// Set the search radius; non-positive or non-finite radii are rejected
    pub fn with_radius_km(mut self, radius_km: f64) -> crate::Result<Self> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(UrbanLensError::invalid_query(format!(
                "radius must be a positive number of kilometers, got {radius_km}"
            )));
        }
        self.radius_km = Some(radius_km);
        Ok(self)
    }

    #[must_use]
    pub fn with_units(mut self, units: UnitSystem) -> Self {
        self.units = units;
        self
    }

    /// Name to show for this location
    #[must_use]
    pub fn display_name(&self) -> String {
        self.location_name
            .clone()
            .unwrap_or_else(|| self.format_coordinates())
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Round coordinates for cache key generation
    #[must_use]
    pub fn rounded_coordinates(&self, precision: u32) -> (f64, f64) {
        let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
        let lat = (self.latitude * multiplier).round() / multiplier;
        let lon = (self.longitude * multiplier).round() / multiplier;
        (lat, lon)
    }

    /// Cache fingerprint: rounded coordinates, whole-kilometer radius, unit set
    /// and country.
    ///
    /// The display name does not participate, and country is already
    /// normalized, so queries that only differ in formatting share an entry.
    #[must_use]
    pub fn fingerprint(&self, precision: u32) -> String {
        let (lat, mut lon) = self.rounded_coordinates(precision);
        // Rounding can push a longitude just west of the antimeridian onto +180
        if lon >= 180.0 {
            lon -= 360.0;
        }
        // -0.0 and 0.0 must hash the same
        let lat = lat + 0.0;
        let lon = lon + 0.0;
        let width = precision as usize;
        let radius = self
            .radius_km
            .map_or_else(|| "-".to_string(), |r| format!("{:.0}", r.round()));
        let country = self.country_hint.as_deref().unwrap_or("-");
        format!(
            "aggregate:{lat:.width$}:{lon:.width$}:r{radius}:{}:{country}",
            self.units
        )
    }
}

fn wrap_longitude(longitude: f64) -> f64 {
    (longitude + 180.0).rem_euclid(360.0) - 180.0
}

fn parse_numbers(raw: &str, field: &str) -> crate::Result<Vec<f64>> {
    raw.split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<f64>().map_err(|_| {
                UrbanLensError::invalid_query(format!("{field} contains a non-numeric value '{part}'"))
            })
        })
        .collect()
}
