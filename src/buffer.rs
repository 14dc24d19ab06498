//! Device-resident buffers and the access requests that guard them.
//!
//! Every buffer remembers the last event that wrote it and the events that
//! read it since. A new submission depends on those events according to the
//! mode it declares, which is how the queue orders kernels without any
//! explicit event chaining.

use crate::error::{Error, Result};
use crate::event::Event;
use crate::scalar::Scalar;
use crate::util::AtomicScalar;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static BUFFER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Declared intent of a kernel towards a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
    /// Write every element without needing the previous contents.
    DiscardWrite,
    ReadWrite,
    /// Work-group scratch memory; never valid for a global buffer.
    LocalScratch,
}

impl AccessMode {
    pub fn can_read(self) -> bool {
        matches!(
            self,
            AccessMode::Read | AccessMode::ReadWrite | AccessMode::LocalScratch
        )
    }

    pub fn can_write(self) -> bool {
        !matches!(self, AccessMode::Read)
    }

    /// Whether the previous contents must be made available to the kernel.
    pub fn needs_prior_contents(self) -> bool {
        matches!(
            self,
            AccessMode::Read | AccessMode::Write | AccessMode::ReadWrite
        )
    }

    /// Combine two requests against the same buffer in one launch.
    pub fn merge(self, other: AccessMode) -> AccessMode {
        let reads = self.can_read() || other.can_read();
        let writes = self.can_write() || other.can_write();
        let keeps = self.needs_prior_contents() || other.needs_prior_contents();

        match (reads, writes) {
            (true, true) => AccessMode::ReadWrite,
            (false, true) if keeps => AccessMode::Write,
            (false, true) => AccessMode::DiscardWrite,
            _ => AccessMode::Read,
        }
    }
}

/// Host-side access intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAccess {
    ReadOnly,
    ReadWrite,
}

/// Events that touched a buffer, for dependency tracking.
#[derive(Debug, Default)]
pub(crate) struct AccessHistory {
    last_write: Option<Event>,
    reads: Vec<Event>,
}

impl AccessHistory {
    /// Events a new access in `mode` must wait for.
    pub(crate) fn dependencies(&self, mode: AccessMode) -> Vec<Event> {
        let mut deps: Vec<Event> = self.last_write.iter().cloned().collect();
        if mode.can_write() {
            deps.extend(self.reads.iter().cloned());
        }
        deps.retain(|e| !e.is_complete() || e.error().is_some());
        deps
    }

    pub(crate) fn record(&mut self, mode: AccessMode, event: &Event) {
        // a failed writer stays so later accesses still see the failure
        if matches!(&self.last_write, Some(e) if e.is_complete() && e.error().is_none()) {
            self.last_write = None;
        }

        if mode.can_write() {
            self.last_write = Some(event.clone());
            self.reads.clear();
        } else {
            self.reads.retain(|e| !e.is_complete());
            self.reads.push(event.clone());
        }
    }

    fn outstanding(&self) -> Vec<Event> {
        self.last_write
            .iter()
            .chain(self.reads.iter())
            .cloned()
            .collect()
    }
}

pub(crate) type SharedHistory = Arc<Mutex<AccessHistory>>;

pub(crate) struct Storage<T> {
    id: u64,
    cells: Box<[AtomicScalar<T>]>,
    history: SharedHistory,
}

/// A fixed-size sequence of `T` that kernels and the host access through
/// declared requests.
///
/// Dropping a buffer blocks until every kernel that accesses it is complete.
pub struct Buffer<T: Scalar> {
    storage: Arc<Storage<T>>,
}

impl<T: Scalar> Buffer<T> {
    /// Allocate `len` elements. Contents are unspecified until written
    /// (currently zero).
    pub fn new(len: usize) -> Self {
        Self::from_cells((0..len).map(|_| AtomicScalar::default()).collect())
    }

    pub fn from_slice(data: &[T]) -> Self {
        Self::from_cells(data.iter().map(|&v| AtomicScalar::new(v)).collect())
    }

    fn from_cells(cells: Box<[AtomicScalar<T>]>) -> Self {
        let id = BUFFER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(buffer = id, len = cells.len(), "allocated buffer");
        Self {
            storage: Arc::new(Storage {
                id,
                cells,
                history: Arc::new(Mutex::new(AccessHistory::default())),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.storage.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn id(&self) -> u64 {
        self.storage.id
    }

    pub fn size_bytes(&self) -> usize {
        self.len() * std::mem::size_of::<T>()
    }

    /// Blocking host view. Waits for the last writer (and, for
    /// [`HostAccess::ReadWrite`], every reader) and reports their failure.
    ///
    /// The view is recorded against the buffer like a kernel access: kernels
    /// submitted while it is alive that conflict with it (any access for a
    /// read-write view, writes for a read-only one) wait until it is dropped.
    pub fn host_access(&self, access: HostAccess) -> Result<HostView<'_, T>> {
        let mode = match access {
            HostAccess::ReadOnly => AccessMode::Read,
            HostAccess::ReadWrite => AccessMode::ReadWrite,
        };

        let event = Event::new("host_access", 0, false);
        let deps = {
            let mut history = self.storage.history.lock();
            let deps = history.dependencies(mode);
            history.record(mode, &event);
            deps
        };
        event.mark_running(0);

        if let Err(e) = crate::event::wait_all(deps.iter()) {
            event.mark_complete(0, Some(e.to_string()));
            return Err(e);
        }

        tracing::trace!(buffer = self.storage.id, ?access, "host view opened");

        Ok(HostView {
            cells: &self.storage.cells,
            access,
            event,
        })
    }

    /// Convenience: wait for writers and copy the contents out.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        Ok(self.host_access(HostAccess::ReadOnly)?.to_vec())
    }

    pub(crate) fn accessor(&self, mode: AccessMode) -> Accessor<T> {
        Accessor {
            storage: Arc::clone(&self.storage),
            mode,
        }
    }

    pub(crate) fn history(&self) -> SharedHistory {
        Arc::clone(&self.storage.history)
    }
}

impl<T: Scalar> Drop for Buffer<T> {
    fn drop(&mut self) {
        let outstanding = self.storage.history.lock().outstanding();
        for event in outstanding {
            // failures were already reported to whoever waited on the event
            let _ = event.wait();
        }
    }
}

impl<T: Scalar> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.storage.id)
            .field("len", &self.len())
            .finish()
    }
}

/// Kernel-side handle to a buffer, scoped to one launch.
///
/// Reading through a write-only accessor, writing through a read-only
/// one, or indexing out of range panics inside the kernel, which fails
/// the launch.
pub struct Accessor<T> {
    storage: Arc<Storage<T>>,
    mode: AccessMode,
}

impl<T: Scalar> Accessor<T> {
    pub fn len(&self) -> usize {
        self.storage.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    #[inline]
    pub fn read(&self, index: usize) -> T {
        assert!(
            self.mode.can_read(),
            "read through a {:?} accessor of buffer {}",
            self.mode,
            self.storage.id
        );
        self.storage.cells[index].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn write(&self, index: usize, value: T) {
        assert!(
            self.mode.can_write(),
            "write through a {:?} accessor of buffer {}",
            self.mode,
            self.storage.id
        );
        self.storage.cells[index].store(value, Ordering::Relaxed);
    }
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            mode: self.mode,
        }
    }
}

impl<T> fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("buffer", &self.storage.id)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Host view obtained from [`Buffer::host_access`].
///
/// Conflicting kernels are held back until the view is dropped.
pub struct HostView<'a, T> {
    cells: &'a [AtomicScalar<T>],
    access: HostAccess,
    event: Event,
}

impl<'a, T: Scalar> HostView<'a, T> {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.cells.get(index).map(|c| c.load(Ordering::Acquire))
    }

    pub fn set(&self, index: usize, value: T) -> Result<()> {
        if self.access != HostAccess::ReadWrite {
            return Err(Error::invalid_access("host view is read-only"));
        }
        let cell = self.cells.get(index).ok_or_else(|| {
            Error::invalid_access(format!(
                "index {} out of range for buffer of {} elements",
                index,
                self.cells.len()
            ))
        })?;
        cell.store(value, Ordering::Release);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.cells.iter().map(|c| c.load(Ordering::Acquire))
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

impl<'a, T> Drop for HostView<'a, T> {
    fn drop(&mut self) {
        self.event.mark_complete(0, None);
    }
}

impl<'a, T> fmt::Debug for HostView<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostView")
            .field("len", &self.cells.len())
            .field("access", &self.access)
            .finish()
    }
}
