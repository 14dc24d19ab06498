//! Event status names and device-time measurements.

use crate::error::{Error, Result};
use crate::event::{Event, EventStatus};

pub fn status_name(event: &Event) -> String {
    event.status().name().to_string()
}

/// Name of an OpenCL-style raw status code.
pub fn status_name_raw(raw: i32) -> String {
    match EventStatus::from_raw(raw) {
        Some(status) => status.name().to_string(),
        None => format!("unknown({})", raw),
    }
}

/// Device time between start and end of a completed, profiled event.
pub fn elapsed_nanos(event: &Event) -> Result<u64> {
    if !event.profiling_enabled() {
        return Err(Error::profiling(format!(
            "profiling is disabled for kernel '{}'",
            event.name()
        )));
    }

    let ts = event.timestamps().ok_or_else(|| {
        Error::profiling(format!(
            "kernel '{}' is {}, not complete",
            event.name(),
            event.status()
        ))
    })?;

    Ok(ts.end.saturating_sub(ts.start))
}

pub fn elapsed_millis(event: &Event) -> Result<f64> {
    Ok(elapsed_nanos(event)? as f64 / 1.0e6)
}

/// Throughput in GB/s for `bytes` moved in `millis`. `None` when no time
/// was measured.
pub fn bandwidth_gbps(bytes: usize, millis: f64) -> Option<f64> {
    (millis > 0.0).then(|| bytes as f64 / millis / 1.0e6)
}

/// All timing of one event, for reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventProfile {
    /// Time between submission and start of execution.
    pub queued_nanos: u64,
    pub elapsed_nanos: u64,
}

impl EventProfile {
    pub fn of(event: &Event) -> Result<Self> {
        let elapsed = elapsed_nanos(event)?;
        let ts = event
            .timestamps()
            .ok_or_else(|| Error::profiling("timestamps disappeared"))?;

        Ok(Self {
            queued_nanos: ts.start.saturating_sub(ts.submit),
            elapsed_nanos: elapsed,
        })
    }

    pub fn elapsed_millis(&self) -> f64 {
        self.elapsed_nanos as f64 / 1.0e6
    }
}
