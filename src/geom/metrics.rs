//! Opt-in timing hooks for normal synthesis.
//!
//! Timing is only collected when the `smoothing_metrics` feature is enabled and
//! the target is not WASM (`std::time::Instant` is unavailable there). Otherwise
//! every call compiles down to running the wrapped closure.
//!
//! ```ignore
//! let mut metrics = SmoothingMetrics::default();
//! metrics.begin();
//! let index = metrics.time(TimingBucket::IndexBuild, || build_index(&mesh));
//! if let Some(report) = metrics.end() {
//!     println!("index build: {} ns", report.index_build_ns);
//! }
//! ```

use serde::Serialize;

/// Phases of a synthesis call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Per-face cross products into the scratch buffer.
    FaceNormals,
    /// Bounding box and tolerance derivation.
    Epsilon,
    /// Registering corners and sorting the spatial index.
    IndexBuild,
    /// Per-corner queries and averaging.
    Smoothing,
}

/// Cumulative nanoseconds per [`TimingBucket`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SmoothingTimingReport {
    pub face_normals_ns: u64,
    pub epsilon_ns: u64,
    pub index_build_ns: u64,
    pub smoothing_ns: u64,
}

impl SmoothingTimingReport {
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.face_normals_ns
            .saturating_add(self.epsilon_ns)
            .saturating_add(self.index_build_ns)
            .saturating_add(self.smoothing_ns)
    }

    /// Total time in milliseconds, for display.
    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }
}

/// Accumulator for timing one synthesis call.
///
/// When metrics are disabled [`end`](Self::end) returns `None`.
#[derive(Debug, Default)]
pub struct SmoothingMetrics {
    #[cfg(all(feature = "smoothing_metrics", not(target_arch = "wasm32")))]
    report: SmoothingTimingReport,
}

impl SmoothingMetrics {
    /// Reset all counters.
    pub fn begin(&mut self) {
        #[cfg(all(feature = "smoothing_metrics", not(target_arch = "wasm32")))]
        {
            self.report = SmoothingTimingReport::default();
        }
    }

    #[must_use]
    pub fn end(&self) -> Option<SmoothingTimingReport> {
        #[cfg(all(feature = "smoothing_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "smoothing_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Run `f` and add its wall time to `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "smoothing_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = start.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64;
            self.add_to_bucket(bucket, nanos);
            result
        }

        #[cfg(not(all(feature = "smoothing_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }

    #[cfg(all(feature = "smoothing_metrics", not(target_arch = "wasm32")))]
    fn add_to_bucket(&mut self, bucket: TimingBucket, nanos: u64) {
        let slot = match bucket {
            TimingBucket::FaceNormals => &mut self.report.face_normals_ns,
            TimingBucket::Epsilon => &mut self.report.epsilon_ns,
            TimingBucket::IndexBuild => &mut self.report.index_build_ns,
            TimingBucket::Smoothing => &mut self.report.smoothing_ns,
        };
        *slot = slot.saturating_add(nanos);
    }
}
