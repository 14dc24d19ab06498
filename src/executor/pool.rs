use super::task::Task;
use super::worker::{Worker, WorkerId, WorkerState};
use crate::config::Config;
use crate::device::Device;
use crate::error::{Error, Result};
use crossbeam_deque::{Injector, Stealer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[cfg(target_os = "linux")]
fn pin_thread_to_core(core_id: usize) {
    unsafe {
        let mut cpuset: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core_id, &mut cpuset);
        let result = libc::sched_setaffinity(
            0, // current thread
            std::mem::size_of::<libc::cpu_set_t>(),
            &cpuset,
        );
        if result != 0 {
            tracing::warn!(
                thread = std::thread::current().name().unwrap_or("unknown"),
                core = core_id,
                "failed to pin compute unit to core"
            );
        }
    }
}

/// One worker thread per compute unit of a device.
pub struct ComputeUnitPool {
    workers: Vec<WorkerHandle>,
    injector: Arc<Injector<Task>>,
    stealers: Vec<Stealer<Task>>,
    shutdown: Arc<AtomicBool>,
    num_threads: usize,
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
    unparker: thread::Thread,
    state: Arc<WorkerState>,
}

impl ComputeUnitPool {
    pub fn new(device: &Device, config: &Config) -> Result<Self> {
        let num_threads = device.compute_units();
        if num_threads == 0 {
            return Err(Error::config("device has no compute units"));
        }

        let injector = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(num_threads);
        let mut stealers = Vec::with_capacity(num_threads);

        for id in 0..num_threads {
            let worker = Worker::new(id);
            stealers.push(worker.local_queue.stealer());
            workers.push(worker);
        }

        let mut handles = Vec::with_capacity(num_threads);

        for worker in workers {
            let id = worker.id;
            let state = Arc::clone(&worker.state);
            let stealers_clone = stealers.clone();
            let injector_clone = injector.clone();
            let shutdown_clone = shutdown.clone();
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);

            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let pin_workers = config.pin_workers;
            let spawned = builder.spawn(move || {
                #[cfg(target_os = "linux")]
                if pin_workers {
                    pin_thread_to_core(id);
                }
                #[cfg(not(target_os = "linux"))]
                let _ = pin_workers;

                worker.run(stealers_clone, injector_clone, shutdown_clone);
            });

            let thread = match spawned {
                Ok(thread) => thread,
                Err(e) => {
                    // stop whatever already started before reporting
                    shutdown.store(true, Ordering::Release);
                    for handle in &mut handles {
                        stop_worker(handle);
                    }
                    return Err(Error::execution(format!(
                        "failed to spawn compute unit {}: {}",
                        id, e
                    )));
                }
            };

            let unparker = thread.thread().clone();

            handles.push(WorkerHandle {
                id,
                thread: Some(thread),
                unparker,
                state,
            });
        }

        tracing::debug!(device = device.name(), workers = num_threads, "compute units started");

        Ok(Self {
            workers: handles,
            injector,
            stealers,
            shutdown,
            num_threads,
        })
    }

    /// Queue every task, then wake every worker.
    pub(crate) fn submit_batch(&self, tasks: Vec<Task>) {
        for task in tasks {
            self.injector.push(task);
        }
        for worker in &self.workers {
            worker.unparker.unpark();
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Tasks run by all compute units since the pool started.
    pub fn tasks_executed(&self) -> u64 {
        self.workers
            .iter()
            .map(|w| w.state.tasks_executed.load(Ordering::Relaxed))
            .sum()
    }

    /// Tasks a compute unit took from another unit's local queue.
    pub fn tasks_stolen(&self) -> u64 {
        self.workers
            .iter()
            .map(|w| w.state.tasks_stolen.load(Ordering::Relaxed))
            .sum()
    }

    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);

        for worker in &mut self.workers {
            stop_worker(worker);
        }
    }
}

fn stop_worker(worker: &mut WorkerHandle) {
    worker.unparker.unpark();
    if let Some(thread) = worker.thread.take() {
        if thread.join().is_err() {
            tracing::error!(worker = worker.id, "compute unit thread panicked");
        }
    }
}

impl Drop for ComputeUnitPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ComputeUnitPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeUnitPool")
            .field("num_threads", &self.num_threads)
            .field("stealers", &self.stealers.len())
            .finish()
    }
}
