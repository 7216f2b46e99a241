//! Upstream environmental data sources
//!
//! Every provider implements [`SourceClient`]: one network call per query,
//! returning a typed payload or a typed failure. Sources know nothing about
//! each other; combining them is the aggregator's job.
//!
//! - Air quality: WAQI station feed
//! - Weather: Open-Meteo current conditions and daily forecast
//! - Population: World Bank population density indicator
//! - Imagery: NASA CMR granule metadata, turned into estimates

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::models::{Query, SourceId, SourcePayload, SourceResult};

pub mod air_quality;
pub mod error;
pub mod http;
pub mod imagery;
pub mod population;
pub mod weather;

pub use air_quality::AirQualityClient;
pub use error::{ErrorKind, SourceError};
pub use http::HttpClient;
pub use imagery::ImageryClient;
pub use population::PopulationClient;
pub use weather::WeatherClient;

pub type Result<T> = std::result::Result<T, SourceError>;

/// Uniform contract for one upstream provider
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn id(&self) -> SourceId;

    /// Per-call timeout, shorter than the aggregator's shared deadline.
    /// Exceeding it is a `Failed(Timeout)` result; only the shared deadline
    /// produces `TimedOut`.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Perform the network call and decode the payload
    async fn fetch_payload(&self, query: &Query) -> Result<SourcePayload>;

    /// Fetch without ever failing: every failure mode becomes part of the result
    async fn fetch(&self, query: &Query) -> SourceResult {
        let id = self.id();
        let started = Instant::now();

        let outcome = match self.timeout() {
            Some(limit) => match tokio::time::timeout(limit, self.fetch_payload(query)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(source = %id, "Source exceeded its own timeout of {:?}", limit);
                    return SourceResult::failed(id, SourceError::Timeout(limit));
                }
            },
            None => self.fetch_payload(query).await,
        };

        let elapsed = started.elapsed();
        match outcome {
            Ok(payload) if payload.source_id() == id => {
                info!(source = %id, "Fetched in {:.3}s", elapsed.as_secs_f64());
                SourceResult::ok(payload)
            }
            Ok(payload) => SourceResult::failed(
                id,
                SourceError::Internal(format!("{} payload returned by {id}", payload.source_id())),
            ),
            Err(error) => {
                warn!(source = %id, %error, "Fetch failed after {:.3}s", elapsed.as_secs_f64());
                SourceResult::failed(id, error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourceOutcome, SourceStatus, Weather};
    use chrono::Utc;

    struct Slow;

    #[async_trait]
    impl SourceClient for Slow {
        fn id(&self) -> SourceId {
            SourceId::Weather
        }

        fn timeout(&self) -> Option<Duration> {
            Some(Duration::from_millis(20))
        }

        async fn fetch_payload(&self, _query: &Query) -> Result<SourcePayload> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(SourcePayload::Weather(Weather::fallback(Utc::now())))
        }
    }

    struct Confused;

    #[async_trait]
    impl SourceClient for Confused {
        fn id(&self) -> SourceId {
            SourceId::AirQuality
        }

        async fn fetch_payload(&self, _query: &Query) -> Result<SourcePayload> {
            Ok(SourcePayload::Weather(Weather::fallback(Utc::now())))
        }
    }

    #[tokio::test]
    async fn test_per_source_timeout_is_a_failed_fetch() {
        let query = Query::new(0.0, 0.0).unwrap();
        let result = Slow.fetch(&query).await;
        assert_eq!(result.status(), SourceStatus::Failed);
        assert_eq!(result.source_id, SourceId::Weather);
        assert_eq!(result.outcome, SourceOutcome::Failed(SourceError::Timeout(Duration::from_millis(20))));
        assert_eq!(result.error_message().unwrap(), "Timed out after 20ms");
    }

    #[tokio::test]
    async fn test_wrong_payload_kind_is_a_failure() {
        let query = Query::new(0.0, 0.0).unwrap();
        let result = Confused.fetch(&query).await;
        assert_eq!(result.status(), SourceStatus::Failed);
        assert!(result.error_message().unwrap().contains("weather payload"));
    }
}
