// dispatcher thread: resolves dependencies and fans launches out to the pool
use crate::device::Device;
use crate::event::Event;
use crate::executor::{ComputeUnitPool, PanicHandler, Task};
use crate::kernel::{Item, KernelBody};
use crate::telemetry::Metrics;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) struct Command {
    pub event: Event,
    pub deps: Vec<Event>,
    pub body: KernelBody,
}

pub(crate) struct Dispatcher {
    pub device: Device,
    pub pool: Arc<ComputeUnitPool>,
    pub panic_handler: Arc<PanicHandler>,
    pub metrics: Arc<Metrics>,
    pub flat_chunks_per_unit: usize,
}

impl Dispatcher {
    pub fn run(self, commands: Receiver<Command>) {
        for command in commands.iter() {
            self.dispatch(command);
        }
        tracing::debug!(device = self.device.name(), "dispatcher stopped");
    }

    fn dispatch(&self, command: Command) {
        let Command { event, deps, body } = command;

        // commands are taken in submission order, so waiting here never
        // waits on something submitted later
        let mut failed_dep = None;
        for dep in &deps {
            if dep.wait().is_err() {
                failed_dep.get_or_insert_with(|| format!("dependency '{}' failed", dep.name()));
            }
        }

        let clock = self.device.clock();
        let start = clock.now_ns();
        event.mark_running(start);

        if let Some(msg) = failed_dep {
            self.metrics.record_completion(0, true);
            event.mark_complete(clock.now_ns(), Some(msg));
            return;
        }

        let tasks = self.build_tasks(&event, start, body);
        if tasks.is_empty() {
            self.metrics.record_completion(0, false);
            event.mark_complete(clock.now_ns(), None);
            return;
        }

        tracing::debug!(kernel = event.name(), tasks = tasks.len(), "launching");
        self.pool.submit_batch(tasks);
    }

    fn build_tasks(&self, event: &Event, start: u64, body: KernelBody) -> Vec<Task> {
        match body {
            KernelBody::Flat { range, func } => {
                let n = range.global();
                if n == 0 {
                    return Vec::new();
                }

                let chunks = (self.pool.num_threads() * self.flat_chunks_per_unit).clamp(1, n);
                let chunk_size = (n + chunks - 1) / chunks;
                let bounds: Vec<(usize, usize)> = (0..n)
                    .step_by(chunk_size)
                    .map(|lo| (lo, (lo + chunk_size).min(n)))
                    .collect();

                self.metrics.record_work(0, n);
                let launch = self.launch(event, start, bounds.len());

                bounds
                    .into_iter()
                    .map(|(lo, hi)| {
                        let launch = Arc::clone(&launch);
                        let func = Arc::clone(&func);
                        Task::new(move || {
                            launch.run(
                                || {
                                    for id in lo..hi {
                                        func(Item::new(id, n));
                                    }
                                },
                                || format!("work-items {}..{}", lo, hi),
                            );
                        })
                    })
                    .collect()
            }
            KernelBody::Grouped { range, func } => {
                let groups = range.group_count();
                if groups == 0 {
                    return Vec::new();
                }

                self.metrics.record_work(groups, range.global());
                let launch = self.launch(event, start, groups);

                (0..groups)
                    .map(|group| {
                        let launch = Arc::clone(&launch);
                        let func = Arc::clone(&func);
                        Task::new(move || {
                            launch.run(|| func(group), || format!("work-group {}", group));
                        })
                    })
                    .collect()
            }
        }
    }

    fn launch(&self, event: &Event, start: u64, tasks: usize) -> Arc<Launch> {
        Arc::new(Launch {
            event: event.clone(),
            start,
            device: self.device.clone(),
            remaining: AtomicUsize::new(tasks),
            error: Mutex::new(None),
            panic_handler: Arc::clone(&self.panic_handler),
            metrics: Arc::clone(&self.metrics),
        })
    }
}

/// Shared state of one in-flight launch; the last task to finish completes
/// the event.
struct Launch {
    event: Event,
    start: u64,
    device: Device,
    remaining: AtomicUsize,
    error: Mutex<Option<String>>,
    panic_handler: Arc<PanicHandler>,
    metrics: Arc<Metrics>,
}

impl Launch {
    fn run<F, D>(&self, work: F, describe: D)
    where
        F: FnOnce(),
        D: FnOnce() -> String,
    {
        if let Err(info) = self.panic_handler.execute(work) {
            let mut error = self.error.lock();
            if error.is_none() {
                *error = Some(format!("{} panicked: {}", describe(), info.message));
            }
        }

        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finish();
        }
    }

    fn finish(&self) {
        let end = self.device.clock().now_ns();
        let error = self.error.lock().take();

        self.metrics
            .record_completion(end.saturating_sub(self.start), error.is_some());

        if let Some(msg) = &error {
            tracing::warn!(kernel = self.event.name(), error = %msg, "kernel failed");
        } else {
            tracing::debug!(kernel = self.event.name(), "kernel complete");
        }

        self.event.mark_complete(end, error);
    }
}
