//! Concurrent fan-out over all configured sources
//!
//! Each source runs on its own task. All tasks share a single deadline; a
//! task still running when it passes is aborted and reported as timed out.
//! Tasks are also aborted when the aggregation itself is dropped.
//! The aggregate never fails as a whole: whatever did not arrive is filled
//! in with fallback payloads by [`Snapshot::assemble`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::metrics::DerivedMetrics;
use crate::models::{Query, Snapshot, SourceResult};
use crate::sources::{SourceClient, SourceError};

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// A snapshot together with the indices derived from it
#[derive(Debug, Clone)]
pub struct AggregateReport {
    pub snapshot: Snapshot,
    pub metrics: DerivedMetrics,
}

/// Aborts the wrapped source task when dropped
struct AbortOnDrop(JoinHandle<SourceResult>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct Aggregator {
    sources: Vec<Arc<dyn SourceClient>>,
    deadline: Duration,
}

impl Aggregator {
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn SourceClient>>, deadline: Duration) -> Self {
        Self { sources, deadline }
    }

    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Query every source in parallel and assemble a complete snapshot
    #[instrument(skip(self, query), fields(coords = %query.format_coordinates(), sources = self.sources.len()))]
    pub async fn aggregate(&self, query: &Query) -> AggregateReport {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.deadline;

        let handles: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source_id = source.id();
                let source = Arc::clone(source);
                let query = query.clone();
                let task = tokio::spawn(async move { source.fetch(&query).await });
                (source_id, AbortOnDrop(task))
            })
            .collect();

        let results = futures::future::join_all(handles.into_iter().map(
            |(source_id, mut task)| async move {
                match tokio::time::timeout_at(deadline, &mut task.0).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_error)) => {
                        warn!(source = %source_id, "Source task failed: {}", join_error);
                        SourceResult::failed(
                            source_id,
                            SourceError::Internal(format!("source task failed: {join_error}")),
                        )
                    }
                    Err(_) => {
                        warn!(source = %source_id, "Source missed the shared deadline");
                        SourceResult::timed_out(source_id, self.deadline)
                    }
                }
            },
        ))
        .await;

        let snapshot = Snapshot::assemble(query.clone(), results, Utc::now());
        let metrics = DerivedMetrics::from_snapshot(&snapshot);
        info!(
            "Aggregated {} sources ({} failed) in {:.3}s",
            self.sources.len(),
            snapshot.errors.count(),
            started.elapsed().as_secs_f64()
        );

        AggregateReport { snapshot, metrics }
    }
}
