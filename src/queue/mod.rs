//! In-order-submission command queue bound to one device.
//!
//! Submissions are recorded through a [`Handler`]: the command group
//! declares its buffer accesses and exactly one kernel launch. The queue
//! derives dependencies from those declarations, hands the command to its
//! dispatcher thread and returns an [`Event`] immediately.

mod dispatch;

use crate::buffer::{AccessMode, Accessor, Buffer};
use crate::config::Config;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::executor::{ComputeUnitPool, PanicHandler};
use crate::kernel::{AccessDecl, GroupKernel, Item, KernelBody, KernelDescriptor, NdRange, Range};
use crate::runtime::Runtime;
use crate::scalar::Scalar;
use crate::telemetry::{Metrics, MetricsSnapshot};
use crossbeam_channel::{unbounded, Sender};
use dispatch::{Command, Dispatcher};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Execution context bound to one device.
///
/// Dependency recording is atomic per queue only. Sharing buffers between
/// queues is unsupported: two queues submitting over the same buffers in
/// opposite order can record a dependency cycle and stall both dispatchers.
pub struct ComputeQueue {
    device: Device,
    config: Config,
    pool: Arc<ComputeUnitPool>,
    panic_handler: Arc<PanicHandler>,
    sender: Option<Sender<Command>>,
    dispatcher: Option<JoinHandle<()>>,
    pending: Mutex<Vec<Event>>,
    // dependency collection and history recording must be atomic per submission
    submit_lock: Mutex<()>,
    metrics: Arc<Metrics>,
}

impl ComputeQueue {
    /// Select a device from `runtime` with the config's override and bind to it.
    pub fn new(runtime: &Runtime, config: &Config) -> Result<Self> {
        config.validate()?;
        let device = runtime.select_device(&config.selector)?;
        Self::with_device(device, config.clone())
    }

    pub fn with_device(device: Device, config: Config) -> Result<Self> {
        config.validate()?;

        let pool = Arc::new(ComputeUnitPool::new(&device, &config)?);
        let panic_handler = Arc::new(PanicHandler::new(config.panic_strategy));
        let metrics = Arc::new(Metrics::new());
        let (sender, receiver) = unbounded();

        let dispatcher = Dispatcher {
            device: device.clone(),
            pool: Arc::clone(&pool),
            panic_handler: Arc::clone(&panic_handler),
            metrics: Arc::clone(&metrics),
            flat_chunks_per_unit: config.flat_chunks_per_unit,
        };

        let handle = thread::Builder::new()
            .name(format!("{}-dispatch", config.thread_name_prefix))
            .spawn(move || dispatcher.run(receiver))
            .map_err(|e| Error::execution(format!("failed to spawn dispatcher: {}", e)))?;

        tracing::info!(
            device = device.name(),
            platform = device.platform_name(),
            compute_units = device.compute_units(),
            profiling = config.enable_profiling,
            "queue created"
        );

        Ok(Self {
            device,
            config,
            pool,
            panic_handler,
            sender: Some(sender),
            dispatcher: Some(handle),
            pending: Mutex::new(Vec::new()),
            submit_lock: Mutex::new(()),
            metrics,
        })
    }

    /// Record a command group and submit it.
    ///
    /// ```no_run
    /// # use veda_cl::prelude::*;
    /// # fn main() -> veda_cl::Result<()> {
    /// let queue = ComputeQueue::new(&Runtime::discover(), &Config::default())?;
    /// let data = Buffer::<i32>::new(1024);
    /// let event = queue.submit(|h| {
    ///     let out = h.access(&data, AccessMode::DiscardWrite)?;
    ///     h.parallel_for(Range::new(1024), move |item| out.write(item.id(), 17));
    ///     Ok(())
    /// })?;
    /// event.wait()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn submit<F>(&self, record: F) -> Result<Event>
    where
        F: FnOnce(&mut Handler) -> Result<()>,
    {
        let mut handler = Handler::new(&self.device);
        record(&mut handler)?;
        self.submit_descriptor(handler.finish()?)
    }

    /// Submit an already-built kernel descriptor.
    pub fn submit_descriptor(&self, descriptor: KernelDescriptor) -> Result<Event> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| Error::execution("queue is shut down"))?;

        let KernelDescriptor {
            name,
            accesses,
            body,
        } = descriptor;

        if let KernelBody::Grouped { range, .. } = &body {
            let max = self.device.max_work_group_size();
            if range.local() > max {
                return Err(Error::invalid_range(format!(
                    "work-group size {} exceeds device maximum {}",
                    range.local(),
                    max
                )));
            }
        }

        let _guard = self.submit_lock.lock();

        let event = Event::new(
            name,
            self.device.clock().now_ns(),
            self.config.enable_profiling,
        );

        let mut deps: Vec<Event> = Vec::new();
        let mut bytes = 0;
        for decl in &accesses {
            let mut history = decl.history.lock();
            for dep in history.dependencies(decl.mode) {
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
            history.record(decl.mode, &event);
            bytes += decl.bytes;
        }

        tracing::debug!(
            kernel = event.name(),
            event = event.id(),
            deps = deps.len(),
            work_items = body.work_items(),
            work_groups = body.work_groups(),
            "submit"
        );

        self.metrics.record_submit(bytes);
        {
            let mut pending = self.pending.lock();
            pending.retain(|e| !e.is_complete());
            pending.push(event.clone());
        }

        sender
            .send(Command {
                event: event.clone(),
                deps,
                body,
            })
            .map_err(|_| Error::execution("dispatcher has stopped"))?;

        Ok(event)
    }

    /// Wait for every submitted command; returns the first failure.
    pub fn drain(&self) -> Result<()> {
        let pending = std::mem::take(&mut *self.pending.lock());
        crate::event::wait_all(pending.iter())
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn profiling_enabled(&self) -> bool {
        self.config.enable_profiling
    }

    pub fn num_compute_units(&self) -> usize {
        self.pool.num_threads()
    }

    /// Queue counters plus the compute-unit pool and panic counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_executed: self.pool.tasks_executed(),
            tasks_stolen: self.pool.tasks_stolen(),
            kernel_panics: self.panic_handler.panic_count() as u64,
            ..self.metrics.snapshot()
        }
    }
}

impl Drop for ComputeQueue {
    fn drop(&mut self) {
        if let Err(e) = self.drain() {
            tracing::debug!(error = %e, "queue dropped with failed commands");
        }

        drop(self.sender.take());
        if let Some(handle) = self.dispatcher.take() {
            if handle.join().is_err() {
                tracing::error!(device = self.device.name(), "dispatcher thread panicked");
            }
        }
    }
}

impl fmt::Debug for ComputeQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeQueue")
            .field("device", &self.device.name())
            .field("compute_units", &self.pool.num_threads())
            .field("profiling", &self.config.enable_profiling)
            .finish()
    }
}

/// Records one command group: buffer accesses plus a single kernel launch.
pub struct Handler<'q> {
    device: &'q Device,
    name: Option<String>,
    accesses: Vec<AccessDecl>,
    body: Option<KernelBody>,
    launches: usize,
}

impl<'q> Handler<'q> {
    fn new(device: &'q Device) -> Self {
        Self {
            device,
            name: None,
            accesses: Vec::new(),
            body: None,
            launches: 0,
        }
    }

    /// Declare an access to `buffer` and get the kernel-side accessor.
    ///
    /// Requesting the same buffer twice merges the declared modes; each
    /// accessor keeps the mode it was requested with.
    pub fn access<T: Scalar>(&mut self, buffer: &Buffer<T>, mode: AccessMode) -> Result<Accessor<T>> {
        let (decl, accessor) = AccessDecl::request(buffer, mode)?;

        match self.accesses.iter_mut().find(|d| d.buffer == decl.buffer) {
            Some(existing) => existing.mode = existing.mode.merge(mode),
            None => self.accesses.push(decl),
        }

        Ok(accessor)
    }

    /// Name the kernel for events, logs and errors.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn parallel_for<F>(&mut self, range: Range, f: F)
    where
        F: Fn(Item) + Send + Sync + 'static,
    {
        self.launches += 1;
        self.body = Some(KernelBody::flat(range, f));
    }

    pub fn parallel_for_nd<K: GroupKernel>(&mut self, range: NdRange, kernel: K) {
        self.launches += 1;
        self.body = Some(KernelBody::grouped(range, kernel));
    }

    fn finish(self) -> Result<KernelDescriptor> {
        let body = self
            .body
            .ok_or_else(|| Error::argument("command group did not launch a kernel"))?;

        if self.launches > 1 {
            return Err(Error::argument(format!(
                "command group launched {} kernels; exactly one is allowed",
                self.launches
            )));
        }

        let name = self.name.unwrap_or_else(|| match &body {
            KernelBody::Flat { .. } => "parallel_for".to_string(),
            KernelBody::Grouped { .. } => "parallel_for_nd".to_string(),
        });

        Ok(KernelDescriptor {
            name,
            accesses: self.accesses,
            body,
        })
    }
}

impl fmt::Debug for Handler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("device", &self.device.name())
            .field("name", &self.name)
            .field("accesses", &self.accesses)
            .field("body", &self.body)
            .finish()
    }
}
