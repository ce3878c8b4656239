//! Conversion metrics.
//!
//! Counters are atomics; duration samples live behind a mutex for
//! percentile snapshots.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Maximum number of duration samples kept in memory.
const MAX_DURATION_SAMPLES: usize = 1000;

/// Conversion metrics collector.
#[derive(Debug)]
pub struct ConversionMetrics {
    /// Requests entering the pipeline.
    pub requests_started: AtomicU64,
    /// Requests resolved without conversion.
    pub direct_imports: AtomicU64,
    /// Requests converted by a backend.
    pub conversions_succeeded: AtomicU64,
    /// Requests terminating in `Failed`.
    pub requests_failed: AtomicU64,
    /// Backend attempts that hit their timeout.
    pub backend_timeouts: AtomicU64,
    /// Requests terminating in `ManualRequired`.
    pub manual_required: AtomicU64,
    /// Meshes promoted to closed solids.
    pub solids_promoted: AtomicU64,
    /// Meshes degraded to shells.
    pub shells_degraded: AtomicU64,
    /// Recent request durations for percentile snapshots.
    duration_samples: Mutex<Vec<Duration>>,
}

impl ConversionMetrics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self {
            requests_started: AtomicU64::new(0),
            direct_imports: AtomicU64::new(0),
            conversions_succeeded: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            backend_timeouts: AtomicU64::new(0),
            manual_required: AtomicU64::new(0),
            solids_promoted: AtomicU64::new(0),
            shells_degraded: AtomicU64::new(0),
            duration_samples: Mutex::new(Vec::with_capacity(MAX_DURATION_SAMPLES)),
        }
    }

    /// Record a request start.
    pub fn record_started(&self) {
        self.requests_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a direct (no-conversion) resolution.
    pub fn record_direct(&self, duration: Duration) {
        self.direct_imports.fetch_add(1, Ordering::Relaxed);
        self.add_duration_sample(duration);
    }

    /// Record a successful backend conversion.
    pub fn record_converted(&self, duration: Duration) {
        self.conversions_succeeded.fetch_add(1, Ordering::Relaxed);
        self.add_duration_sample(duration);
    }

    /// Record a terminal failure.
    pub fn record_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one backend attempt timing out.
    pub fn record_timeout(&self) {
        self.backend_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a manual-required terminal.
    pub fn record_manual(&self) {
        self.manual_required.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a promotion outcome.
    pub fn record_promotion(&self, solid: bool) {
        if solid {
            self.solids_promoted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.shells_degraded.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn add_duration_sample(&self, duration: Duration) {
        if let Ok(mut samples) = self.duration_samples.lock() {
            if samples.len() >= MAX_DURATION_SAMPLES {
                samples.remove(0);
            }
            samples.push(duration);
        }
    }

    /// Point-in-time snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let durations = self
            .duration_samples
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();

        let (p50, p95, p99) = Self::percentiles(&durations);

        MetricsSnapshot {
            requests_started: self.requests_started.load(Ordering::Relaxed),
            direct_imports: self.direct_imports.load(Ordering::Relaxed),
            conversions_succeeded: self.conversions_succeeded.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            backend_timeouts: self.backend_timeouts.load(Ordering::Relaxed),
            manual_required: self.manual_required.load(Ordering::Relaxed),
            solids_promoted: self.solids_promoted.load(Ordering::Relaxed),
            shells_degraded: self.shells_degraded.load(Ordering::Relaxed),
            duration_p50_ms: p50.map(|d| d.as_millis() as u64),
            duration_p95_ms: p95.map(|d| d.as_millis() as u64),
            duration_p99_ms: p99.map(|d| d.as_millis() as u64),
            sample_count: durations.len() as u64,
        }
    }

    fn percentiles(
        durations: &[Duration],
    ) -> (Option<Duration>, Option<Duration>, Option<Duration>) {
        if durations.is_empty() {
            return (None, None, None);
        }

        let mut sorted = durations.to_vec();
        sorted.sort();
        let len = sorted.len();

        let p50 = sorted.get(len * 50 / 100).copied();
        let p95 = sorted.get(len * 95 / 100).copied();
        let p99 = sorted.get(len.saturating_sub(1) * 99 / 100).copied();

        (p50, p95, p99)
    }
}

impl Default for ConversionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable snapshot of conversion metrics.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    /// Requests entering the pipeline.
    pub requests_started: u64,
    /// Requests resolved without conversion.
    pub direct_imports: u64,
    /// Requests converted by a backend.
    pub conversions_succeeded: u64,
    /// Requests terminating in `Failed`.
    pub requests_failed: u64,
    /// Backend attempts that hit their timeout.
    pub backend_timeouts: u64,
    /// Requests terminating in `ManualRequired`.
    pub manual_required: u64,
    /// Meshes promoted to closed solids.
    pub solids_promoted: u64,
    /// Meshes degraded to shells.
    pub shells_degraded: u64,
    /// P50 request duration in milliseconds.
    pub duration_p50_ms: Option<u64>,
    /// P95 request duration in milliseconds.
    pub duration_p95_ms: Option<u64>,
    /// P99 request duration in milliseconds.
    pub duration_p99_ms: Option<u64>,
    /// Number of duration samples collected.
    pub sample_count: u64,
}
