//! Completion handles for submitted kernels.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static EVENT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of one submission. Ordered: a status only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventStatus {
    Submitted,
    Running,
    Complete,
}

impl EventStatus {
    /// OpenCL-compatible raw code.
    pub fn as_raw(self) -> i32 {
        match self {
            EventStatus::Complete => 0,
            EventStatus::Running => 1,
            EventStatus::Submitted => 2,
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(EventStatus::Complete),
            1 => Some(EventStatus::Running),
            2 => Some(EventStatus::Submitted),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EventStatus::Submitted => "submitted",
            EventStatus::Running => "running",
            EventStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Device-clock timestamps in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamps {
    pub submit: u64,
    pub start: u64,
    pub end: u64,
}

/// Handle to one submitted command. Clones observe the same command.
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

struct EventInner {
    id: u64,
    name: String,
    profiling: bool,
    state: Mutex<EventState>,
    completed: Condvar,
}

#[derive(Debug)]
struct EventState {
    status: EventStatus,
    timestamps: Timestamps,
    error: Option<String>,
}

impl Event {
    pub(crate) fn new(name: impl Into<String>, submit_ns: u64, profiling: bool) -> Self {
        Self {
            inner: Arc::new(EventInner {
                id: EVENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
                name: name.into(),
                profiling,
                state: Mutex::new(EventState {
                    status: EventStatus::Submitted,
                    timestamps: Timestamps {
                        submit: submit_ns,
                        start: 0,
                        end: 0,
                    },
                    error: None,
                }),
                completed: Condvar::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Name of the kernel this event tracks.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn profiling_enabled(&self) -> bool {
        self.inner.profiling
    }

    pub fn status(&self) -> EventStatus {
        self.inner.state.lock().status
    }

    pub fn is_complete(&self) -> bool {
        self.status() == EventStatus::Complete
    }

    /// Timestamps, available once the event is complete.
    pub fn timestamps(&self) -> Option<Timestamps> {
        let state = self.inner.state.lock();
        (state.status == EventStatus::Complete).then_some(state.timestamps)
    }

    /// Failure message of a completed command, if it failed.
    pub fn error(&self) -> Option<String> {
        self.inner.state.lock().error.clone()
    }

    /// Block until complete; a failed command turns into [`Error::Execution`].
    pub fn wait(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        while state.status != EventStatus::Complete {
            self.inner.completed.wait(&mut state);
        }

        match &state.error {
            None => Ok(()),
            Some(msg) => Err(Error::execution(format!(
                "kernel '{}' failed: {}",
                self.inner.name, msg
            ))),
        }
    }

    pub(crate) fn mark_running(&self, start_ns: u64) {
        let mut state = self.inner.state.lock();
        if state.status == EventStatus::Submitted {
            state.status = EventStatus::Running;
            state.timestamps.start = start_ns;
            tracing::trace!(event = self.inner.id, kernel = %self.inner.name, "running");
        }
    }

    pub(crate) fn mark_complete(&self, end_ns: u64, error: Option<String>) {
        let mut state = self.inner.state.lock();
        if state.status == EventStatus::Complete {
            return;
        }
        if state.status == EventStatus::Submitted {
            state.status = EventStatus::Running;
            state.timestamps.start = end_ns;
        }

        state.status = EventStatus::Complete;
        state.timestamps.end = end_ns.max(state.timestamps.start);
        state.error = error;
        drop(state);

        tracing::trace!(event = self.inner.id, kernel = %self.inner.name, "complete");
        self.inner.completed.notify_all();
    }
}

/// Wait for every event; the first failure is returned after all have finished.
pub fn wait_all<'a, I>(events: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut first_error = None;
    for event in events {
        if let Err(e) = event.wait() {
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        None => Ok(()),
        Some(e) => Err(e),
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Event {}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Event")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("status", &state.status)
            .field("timestamps", &state.timestamps)
            .field("error", &state.error)
            .finish()
    }
}
