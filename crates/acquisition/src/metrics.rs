//! Acquisition metrics.
//!
//! Counts are kept locally (for job summaries and tests) and mirrored to
//! the `metrics` facade, which is a no-op unless a recorder is installed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::{counter, histogram};
use serde::Serialize;

/// Metrics collector shared by the fetchers and pipelines of one process.
#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
    tiles_fetched: AtomicU64,
    tile_retries: AtomicU64,
    tile_failures: AtomicU64,
    direct_fetches: AtomicU64,
    escalations: AtomicU64,
    budget_exceeded: AtomicU64,
    datasets_succeeded: AtomicU64,
    datasets_failed: AtomicU64,
    datasets_skipped: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub tiles_fetched: u64,
    pub tile_retries: u64,
    pub tile_failures: u64,
    pub direct_fetches: u64,
    pub escalations: u64,
    pub budget_exceeded: u64,
    pub datasets_succeeded: u64,
    pub datasets_failed: u64,
    pub datasets_skipped: u64,
}

impl AcquisitionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tile_fetched(&self) {
        self.tiles_fetched.fetch_add(1, Ordering::Relaxed);
        counter!("acquisition_tiles_fetched_total").increment(1);
    }

    pub fn record_tile_retry(&self, kind: &'static str) {
        self.tile_retries.fetch_add(1, Ordering::Relaxed);
        counter!("acquisition_tile_retries_total", "kind" => kind).increment(1);
    }

    pub fn record_tile_failure(&self) {
        self.tile_failures.fetch_add(1, Ordering::Relaxed);
        counter!("acquisition_tile_failures_total").increment(1);
    }

    pub fn record_direct_fetch(&self) {
        self.direct_fetches.fetch_add(1, Ordering::Relaxed);
        counter!("acquisition_direct_fetches_total").increment(1);
    }

    /// A direct request hit the size limit and was re-planned as tiles.
    pub fn record_escalation(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
        counter!("acquisition_escalations_total").increment(1);
    }

    pub fn record_budget_exceeded(&self) {
        self.budget_exceeded.fetch_add(1, Ordering::Relaxed);
        counter!("acquisition_pixel_budget_exceeded_total").increment(1);
    }

    pub fn record_dataset(&self, status: DatasetStatus, duration: Duration) {
        let counter_ref = match status {
            DatasetStatus::Succeeded => &self.datasets_succeeded,
            DatasetStatus::Failed => &self.datasets_failed,
            DatasetStatus::Skipped => &self.datasets_skipped,
        };
        counter_ref.fetch_add(1, Ordering::Relaxed);

        let label = status.as_str();
        counter!("acquisition_datasets_total", "status" => label).increment(1);
        if status != DatasetStatus::Skipped {
            histogram!("acquisition_dataset_duration_seconds", "status" => label)
                .record(duration.as_secs_f64());
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tiles_fetched: self.tiles_fetched.load(Ordering::Relaxed),
            tile_retries: self.tile_retries.load(Ordering::Relaxed),
            tile_failures: self.tile_failures.load(Ordering::Relaxed),
            direct_fetches: self.direct_fetches.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
            budget_exceeded: self.budget_exceeded.load(Ordering::Relaxed),
            datasets_succeeded: self.datasets_succeeded.load(Ordering::Relaxed),
            datasets_failed: self.datasets_failed.load(Ordering::Relaxed),
            datasets_skipped: self.datasets_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Outcome label for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl DatasetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = AcquisitionMetrics::new();
        metrics.record_tile_fetched();
        metrics.record_tile_fetched();
        metrics.record_tile_retry("transient");
        metrics.record_dataset(DatasetStatus::Skipped, Duration::ZERO);
        metrics.record_dataset(DatasetStatus::Succeeded, Duration::from_secs(3));

        let snap = metrics.snapshot();
        assert_eq!(snap.tiles_fetched, 2);
        assert_eq!(snap.tile_retries, 1);
        assert_eq!(snap.datasets_skipped, 1);
        assert_eq!(snap.datasets_succeeded, 1);
        assert_eq!(snap.datasets_failed, 0);
    }
}
