//! Compute-unit execution.
//!
//! Each device is backed by a pool with one worker thread per compute
//! unit. Workers pull tasks from a shared injector and steal from each
//! other; a task is a chunk of a flat launch or one whole work-group.

pub mod panic_handler;
pub mod pool;
pub mod task;
pub mod worker;

pub use panic_handler::{PanicHandler, PanicInfo, PanicStrategy};
pub use pool::ComputeUnitPool;

pub(crate) use task::Task;
