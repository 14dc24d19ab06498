//! VEDA-CL - a small heterogeneous-compute execution harness
//!
//! Select a compute device, allocate device-resident buffers, launch
//! data-parallel kernels on a command queue and measure them with
//! device-clock timestamps. Devices are executed in-process: each one is
//! backed by a pool with one worker thread per compute unit.
//!
//! # Quick Start
//!
//! ```no_run
//! use veda_cl::prelude::*;
//!
//! # fn main() -> veda_cl::Result<()> {
//! let runtime = Runtime::discover();
//! let queue = ComputeQueue::new(&runtime, &Config::from_env()?)?;
//!
//! let data = Buffer::<i32>::new(1_000_000);
//! veda_cl::samples::init_constant(&queue, &data, 17)?;
//!
//! let reduction = ReductionEngine::new(&queue).reduce(&data, 256, 4)?;
//! assert_eq!(reduction.value()?, 17_000_000);
//! println!("pass 1: {:.3}ms", elapsed_millis(&reduction.pass1)?);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Device selection**: default ranking or `SYCL_*` / `OCL_*` overrides
//! - **Declarative ordering**: kernels are ordered by the buffer accesses they declare
//! - **Work-groups with barriers**: grouped kernels run stage by stage with local scratch
//! - **Profiling**: submit/start/end timestamps on every event
//! - **Telemetry**: per-queue metrics with JSON export (optional)

#![warn(missing_debug_implementations)]

pub mod buffer;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod executor;
pub mod kernel;
pub mod prelude;
pub mod profiling;
pub mod queue;
pub mod reduce;
pub mod runtime;
pub mod samples;
pub mod scalar;
pub mod telemetry;
pub mod util;

pub use buffer::{AccessMode, Accessor, Buffer, HostAccess, HostView};
pub use config::{Config, ConfigBuilder};
pub use device::{Device, DeviceKind, Platform, SelectorOverride};
pub use error::{Error, Result};
pub use event::{Event, EventStatus, Timestamps};
pub use kernel::{GroupKernel, Item, LocalScratch, NdItem, NdRange, Range};
pub use queue::{ComputeQueue, Handler};
pub use reduce::{Reduction, ReductionEngine};
pub use runtime::Runtime;
