pub use crate::buffer::{AccessMode, Accessor, Buffer, HostAccess};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::device::{Device, DeviceKind, SelectorOverride};
pub use crate::error::{Error, Result};
pub use crate::event::{wait_all, Event, EventStatus};
pub use crate::kernel::{GroupKernel, Item, LocalScratch, NdItem, NdRange, Range};
pub use crate::profiling::{elapsed_millis, elapsed_nanos, status_name};
pub use crate::queue::{ComputeQueue, Handler};
pub use crate::reduce::{Reduction, ReductionEngine};
pub use crate::runtime::Runtime;
pub use crate::scalar::Scalar;

#[cfg(feature = "telemetry")]
pub use crate::telemetry::{Metrics, MetricsSnapshot};
