//! Queue telemetry.
//!
//! Counts submitted, completed and failed kernels, executed work-groups,
//! and keeps a histogram of kernel device time.

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub mod export;

#[cfg(feature = "telemetry")]
pub use metrics::{Metrics, MetricsSnapshot};

#[cfg(feature = "telemetry")]
pub use export::{ConsoleExporter, JsonExporter, MetricsExporter};

// Stub implementations when telemetry is disabled
#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    use std::time::Instant;

    #[derive(Debug, Clone, Default)]
    pub struct Metrics;

    impl Metrics {
        pub fn new() -> Self {
            Self
        }
        pub fn record_submit(&self, _: usize) {}
        pub fn record_completion(&self, _: u64, _: bool) {}
        pub fn record_work(&self, _: usize, _: usize) {}
        pub fn snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
        pub fn reset(&self) {}
    }

    #[derive(Debug, Clone, Default)]
    pub struct MetricsSnapshot {
        pub timestamp: Option<Instant>,
        pub kernels_submitted: u64,
        pub kernels_completed: u64,
        pub kernels_failed: u64,
        pub work_groups_executed: u64,
        pub work_items_executed: u64,
        pub bytes_accessed: u64,
        pub avg_kernel_ns: u64,
        pub p50_kernel_ns: u64,
        pub p95_kernel_ns: u64,
        pub p99_kernel_ns: u64,
        pub max_kernel_ns: u64,
        pub tasks_executed: u64,
        pub tasks_stolen: u64,
        pub kernel_panics: u64,
    }
}

#[cfg(not(feature = "telemetry"))]
pub use metrics::{Metrics, MetricsSnapshot};
