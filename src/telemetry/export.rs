//! Metrics export to JSON and the console.

use super::metrics::MetricsSnapshot;
use crate::error::{Error, Result};
use std::path::PathBuf;

/// Trait for exporting metrics to different formats
pub trait MetricsExporter: Send + Sync {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()>;
}

/// Writes snapshots as pretty JSON, to a file or stdout.
#[derive(Debug, Clone, Default)]
pub struct JsonExporter {
    output_path: Option<PathBuf>,
}

impl JsonExporter {
    pub fn to_file(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: Some(output_path.into()),
        }
    }

    pub fn to_stdout() -> Self {
        Self { output_path: None }
    }

    pub fn render(snapshot: &MetricsSnapshot) -> Result<String> {
        let serializable = SerializableSnapshot::from(snapshot);
        serde_json::to_string_pretty(&serializable)
            .map_err(|e| Error::telemetry(format!("JSON serialization failed: {}", e)))
    }
}

impl MetricsExporter for JsonExporter {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let json = Self::render(snapshot)?;

        match &self.output_path {
            Some(path) => std::fs::write(path, json)?,
            None => println!("{}", json),
        }

        Ok(())
    }
}

#[derive(Debug, Clone, serde::Serialize)]
struct SerializableSnapshot {
    uptime_secs: f64,
    kernels_submitted: u64,
    kernels_completed: u64,
    kernels_failed: u64,
    work_groups_executed: u64,
    work_items_executed: u64,
    bytes_accessed: u64,
    avg_kernel_us: f64,
    p50_kernel_us: f64,
    p95_kernel_us: f64,
    p99_kernel_us: f64,
    max_kernel_us: f64,
    kernels_per_second: f64,
    tasks_executed: u64,
    tasks_stolen: u64,
    kernel_panics: u64,
}

impl From<&MetricsSnapshot> for SerializableSnapshot {
    fn from(snapshot: &MetricsSnapshot) -> Self {
        Self {
            uptime_secs: snapshot.uptime.as_secs_f64(),
            kernels_submitted: snapshot.kernels_submitted,
            kernels_completed: snapshot.kernels_completed,
            kernels_failed: snapshot.kernels_failed,
            work_groups_executed: snapshot.work_groups_executed,
            work_items_executed: snapshot.work_items_executed,
            bytes_accessed: snapshot.bytes_accessed,
            avg_kernel_us: snapshot.avg_kernel_ns as f64 / 1_000.0,
            p50_kernel_us: snapshot.p50_kernel_ns as f64 / 1_000.0,
            p95_kernel_us: snapshot.p95_kernel_ns as f64 / 1_000.0,
            p99_kernel_us: snapshot.p99_kernel_ns as f64 / 1_000.0,
            max_kernel_us: snapshot.max_kernel_ns as f64 / 1_000.0,
            kernels_per_second: snapshot.kernels_per_second(),
            tasks_executed: snapshot.tasks_executed,
            tasks_stolen: snapshot.tasks_stolen,
            kernel_panics: snapshot.kernel_panics,
        }
    }
}

/// Export metrics to console (stdout)
#[derive(Debug, Clone, Default)]
pub struct ConsoleExporter {
    verbose: bool,
}

impl ConsoleExporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl MetricsExporter for ConsoleExporter {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        println!("=== Queue Metrics ===");
        println!("Uptime: {:.2}s", snapshot.uptime.as_secs_f64());
        println!("Kernels submitted: {}", snapshot.kernels_submitted);
        println!("Kernels completed: {}", snapshot.kernels_completed);
        println!("Kernels failed: {}", snapshot.kernels_failed);
        println!("Work-groups executed: {}", snapshot.work_groups_executed);
        println!("Kernel panics: {}", snapshot.kernel_panics);

        if self.verbose {
            println!("\nKernel device time:");
            println!("  Average: {:.2}μs", snapshot.avg_kernel_ns as f64 / 1_000.0);
            println!("  P50: {:.2}μs", snapshot.p50_kernel_ns as f64 / 1_000.0);
            println!("  P95: {:.2}μs", snapshot.p95_kernel_ns as f64 / 1_000.0);
            println!("  P99: {:.2}μs", snapshot.p99_kernel_ns as f64 / 1_000.0);
            println!("  Max: {:.2}μs", snapshot.max_kernel_ns as f64 / 1_000.0);
            println!(
                "  Accessed: {:.2}MB",
                snapshot.bytes_accessed as f64 / (1024.0 * 1024.0)
            );
            println!(
                "\nTasks: {} executed, {} stolen",
                snapshot.tasks_executed, snapshot.tasks_stolen
            );
        }

        println!("=====================");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn dummy_snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Instant::now(),
            uptime: Duration::from_secs(10),
            kernels_submitted: 3,
            kernels_completed: 3,
            kernels_failed: 0,
            work_groups_executed: 33,
            work_items_executed: 8448,
            bytes_accessed: 4 * 1024 * 1024,
            avg_kernel_ns: 1000,
            p50_kernel_ns: 900,
            p95_kernel_ns: 1500,
            p99_kernel_ns: 2000,
            max_kernel_ns: 5000,
            tasks_executed: 40,
            tasks_stolen: 6,
            kernel_panics: 0,
        }
    }

    #[test]
    fn test_console_exporter() {
        let exporter = ConsoleExporter::new(true);
        assert!(exporter.export(&dummy_snapshot()).is_ok());
    }

    #[test]
    fn test_render_json() {
        let json = JsonExporter::render(&dummy_snapshot()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["work_groups_executed"], 33);
        assert_eq!(value["max_kernel_us"], 5.0);
        assert_eq!(value["tasks_stolen"], 6);
    }

    #[test]
    fn test_json_exporter_file() {
        let path = std::env::temp_dir().join("veda_cl_metrics_test.json");
        let exporter = JsonExporter::to_file(&path);

        assert!(exporter.export(&dummy_snapshot()).is_ok());
        assert!(path.exists());

        let _ = std::fs::remove_file(&path);
    }
}
