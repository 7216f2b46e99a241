//! Per-source results and the snapshot assembled from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::warn;

use super::{AirQuality, Population, Query, Satellite, Weather};
use crate::sources::{ErrorKind, SourceError};

/// Identifies one upstream provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceId {
    AirQuality,
    Weather,
    Population,
    Satellite,
}

impl SourceId {
    pub const ALL: [SourceId; 4] = [
        SourceId::AirQuality,
        SourceId::Weather,
        SourceId::Population,
        SourceId::Satellite,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceId::AirQuality => "airQuality",
            SourceId::Weather => "weather",
            SourceId::Population => "population",
            SourceId::Satellite => "satellite",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceStatus {
    Ok,
    Failed,
    TimedOut,
}

/// Typed payload of a successful fetch
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePayload {
    AirQuality(AirQuality),
    Weather(Weather),
    Population(Population),
    Satellite(Satellite),
}

impl SourcePayload {
    #[must_use]
    pub fn source_id(&self) -> SourceId {
        match self {
            SourcePayload::AirQuality(_) => SourceId::AirQuality,
            SourcePayload::Weather(_) => SourceId::Weather,
            SourcePayload::Population(_) => SourceId::Population,
            SourcePayload::Satellite(_) => SourceId::Satellite,
        }
    }
}

/// Exactly one of payload, error or timeout
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Ok(SourcePayload),
    Failed(SourceError),
    TimedOut(Duration),
}

/// Outcome of one source fetch, immutable once produced
#[derive(Debug, Clone, PartialEq)]
pub struct SourceResult {
    pub source_id: SourceId,
    pub outcome: SourceOutcome,
    pub fetched_at: DateTime<Utc>,
}

impl SourceResult {
    #[must_use]
    pub fn ok(payload: SourcePayload) -> Self {
        Self {
            source_id: payload.source_id(),
            outcome: SourceOutcome::Ok(payload),
            fetched_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn failed(source_id: SourceId, error: SourceError) -> Self {
        Self {
            source_id,
            outcome: SourceOutcome::Failed(error),
            fetched_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn timed_out(source_id: SourceId, after: Duration) -> Self {
        Self {
            source_id,
            outcome: SourceOutcome::TimedOut(after),
            fetched_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn status(&self) -> SourceStatus {
        match self.outcome {
            SourceOutcome::Ok(_) => SourceStatus::Ok,
            SourceOutcome::Failed(_) => SourceStatus::Failed,
            SourceOutcome::TimedOut(_) => SourceStatus::TimedOut,
        }
    }

    /// Human-readable failure reason, `None` on success
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match &self.outcome {
            SourceOutcome::Ok(_) => None,
            SourceOutcome::Failed(error) => Some(error.to_string()),
            SourceOutcome::TimedOut(after) => Some(SourceError::Timeout(*after).to_string()),
        }
    }

    /// Coarse failure class, `None` on success
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            SourceOutcome::Ok(_) => None,
            SourceOutcome::Failed(error) => Some(error.kind()),
            SourceOutcome::TimedOut(_) => Some(ErrorKind::UpstreamTimeout),
        }
    }
}

/// Which sources failed and why; `None` means real data was used
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceErrors {
    pub air_quality: Option<String>,
    pub weather: Option<String>,
    pub population: Option<String>,
    pub landsat: Option<String>,
}

impl SourceErrors {
    fn slot(&mut self, source_id: SourceId) -> &mut Option<String> {
        match source_id {
            SourceId::AirQuality => &mut self.air_quality,
            SourceId::Weather => &mut self.weather,
            SourceId::Population => &mut self.population,
            SourceId::Satellite => &mut self.landsat,
        }
    }

    #[must_use]
    pub fn get(&self, source_id: SourceId) -> Option<&str> {
        match source_id {
            SourceId::AirQuality => self.air_quality.as_deref(),
            SourceId::Weather => self.weather.as_deref(),
            SourceId::Population => self.population.as_deref(),
            SourceId::Satellite => self.landsat.as_deref(),
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        SourceId::ALL
            .iter()
            .filter(|id| self.get(**id).is_some())
            .count()
    }
}

/// All source payloads for one query, structurally complete even under failure
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub query: Query,
    pub generated_at: DateTime<Utc>,
    pub air_quality: AirQuality,
    pub weather: Weather,
    pub population: Population,
    pub satellite: Satellite,
    /// One entry per source
    pub statuses: BTreeMap<SourceId, SourceStatus>,
    pub errors: SourceErrors,
}

impl Snapshot {
    /// Build a snapshot, substituting fallback payloads for every source
    /// that did not deliver one (including sources with no result at all).
    #[must_use]
    pub fn assemble(query: Query, results: Vec<SourceResult>, now: DateTime<Utc>) -> Self {
        let mut by_source: BTreeMap<SourceId, SourceResult> = BTreeMap::new();
        for result in results {
            by_source.insert(result.source_id, result);
        }

        let mut statuses = BTreeMap::new();
        let mut errors = SourceErrors::default();

        let mut air_quality = None;
        let mut weather = None;
        let mut population = None;
        let mut satellite = None;

        for source_id in SourceId::ALL {
            let result = by_source.remove(&source_id).unwrap_or_else(|| {
                SourceResult::failed(source_id, SourceError::NotConfigured(source_id.to_string()))
            });

            let (status, failure) = match result.outcome {
                SourceOutcome::Ok(payload) if payload.source_id() == source_id => {
                    match payload {
                        SourcePayload::AirQuality(p) => air_quality = Some(p),
                        SourcePayload::Weather(p) => weather = Some(p),
                        SourcePayload::Population(p) => population = Some(p),
                        SourcePayload::Satellite(p) => satellite = Some(p),
                    }
                    (SourceStatus::Ok, None)
                }
                SourceOutcome::Ok(payload) => (
                    SourceStatus::Failed,
                    Some(SourceError::Internal(format!(
                        "{} payload reported for {source_id}",
                        payload.source_id()
                    ))),
                ),
                SourceOutcome::Failed(error) => (SourceStatus::Failed, Some(error)),
                SourceOutcome::TimedOut(after) => {
                    (SourceStatus::TimedOut, Some(SourceError::Timeout(after)))
                }
            };

            if let Some(error) = &failure {
                warn!(
                    source = %source_id,
                    kind = ?error.kind(),
                    %error,
                    "Substituting fallback payload"
                );
            }
            statuses.insert(source_id, status);
            *errors.slot(source_id) = failure.map(|error| error.to_string());
        }

        Self {
            air_quality: air_quality.unwrap_or_else(|| AirQuality::fallback(now)),
            weather: weather.unwrap_or_else(|| Weather::fallback(now)),
            population: population.unwrap_or_else(|| Population::fallback(now)),
            satellite: satellite.unwrap_or_else(|| Satellite::fallback(&query, now)),
            query,
            generated_at: now,
            statuses,
            errors,
        }
    }

    /// True when no source delivered real data
    #[must_use]
    pub fn is_all_fallback(&self) -> bool {
        self.statuses.values().all(|s| *s != SourceStatus::Ok)
    }
}
