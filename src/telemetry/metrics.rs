//! Per-queue execution metrics.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters and a kernel-duration histogram for one queue.
#[derive(Debug)]
pub struct Metrics {
    kernels_submitted: AtomicU64,
    kernels_completed: AtomicU64,
    kernels_failed: AtomicU64,

    work_groups_executed: AtomicU64,
    work_items_executed: AtomicU64,
    bytes_accessed: AtomicU64,

    // device time from start to end, nanoseconds
    kernel_histogram: RwLock<Histogram<u64>>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        // 3 significant figures, up to one hour in nanoseconds
        let histogram = Histogram::new_with_max(3_600_000_000_000, 3)
            .expect("histogram bounds are constant and valid");

        Self {
            kernels_submitted: AtomicU64::new(0),
            kernels_completed: AtomicU64::new(0),
            kernels_failed: AtomicU64::new(0),
            work_groups_executed: AtomicU64::new(0),
            work_items_executed: AtomicU64::new(0),
            bytes_accessed: AtomicU64::new(0),
            kernel_histogram: RwLock::new(histogram),
            start_time: Instant::now(),
        }
    }

    pub fn record_submit(&self, bytes_accessed: usize) {
        self.kernels_submitted.fetch_add(1, Ordering::Relaxed);
        self.bytes_accessed
            .fetch_add(bytes_accessed as u64, Ordering::Relaxed);
    }

    pub fn record_completion(&self, duration_ns: u64, failed: bool) {
        if failed {
            self.kernels_failed.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.kernels_completed.fetch_add(1, Ordering::Relaxed);
        let _ = self.kernel_histogram.write().record(duration_ns.max(1));
    }

    pub fn record_work(&self, work_groups: usize, work_items: usize) {
        self.work_groups_executed
            .fetch_add(work_groups as u64, Ordering::Relaxed);
        self.work_items_executed
            .fetch_add(work_items as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let histogram = self.kernel_histogram.read();

        MetricsSnapshot {
            timestamp: Instant::now(),
            uptime: self.start_time.elapsed(),
            kernels_submitted: self.kernels_submitted.load(Ordering::Relaxed),
            kernels_completed: self.kernels_completed.load(Ordering::Relaxed),
            kernels_failed: self.kernels_failed.load(Ordering::Relaxed),
            work_groups_executed: self.work_groups_executed.load(Ordering::Relaxed),
            work_items_executed: self.work_items_executed.load(Ordering::Relaxed),
            bytes_accessed: self.bytes_accessed.load(Ordering::Relaxed),
            avg_kernel_ns: if histogram.len() > 0 {
                histogram.mean() as u64
            } else {
                0
            },
            p50_kernel_ns: histogram.value_at_quantile(0.50),
            p95_kernel_ns: histogram.value_at_quantile(0.95),
            p99_kernel_ns: histogram.value_at_quantile(0.99),
            max_kernel_ns: histogram.max(),
            tasks_executed: 0,
            tasks_stolen: 0,
            kernel_panics: 0,
        }
    }

    pub fn reset(&self) {
        self.kernels_submitted.store(0, Ordering::Relaxed);
        self.kernels_completed.store(0, Ordering::Relaxed);
        self.kernels_failed.store(0, Ordering::Relaxed);
        self.work_groups_executed.store(0, Ordering::Relaxed);
        self.work_items_executed.store(0, Ordering::Relaxed);
        self.bytes_accessed.store(0, Ordering::Relaxed);
        self.kernel_histogram.write().reset();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: Instant,
    pub uptime: std::time::Duration,
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
    /// Compute-unit pool counters, filled in by the owning queue.
    pub tasks_executed: u64,
    pub tasks_stolen: u64,
    pub kernel_panics: u64,
}

impl MetricsSnapshot {
    /// Kernels submitted but not yet finished either way.
    pub fn in_flight(&self) -> u64 {
        self.kernels_submitted
            .saturating_sub(self.kernels_completed + self.kernels_failed)
    }

    pub fn kernels_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.kernels_completed as f64 / seconds
    }
}
