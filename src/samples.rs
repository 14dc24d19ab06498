//! Kernels and helpers shared by the command-line tools.

use crate::buffer::{AccessMode, Buffer, HostAccess};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::kernel::Range;
use crate::queue::ComputeQueue;
use crate::runtime::Runtime;
use crate::scalar::Scalar;
use std::fmt::Write as _;

/// Fill `buffer` with `value`.
pub fn init_constant<T: Scalar>(queue: &ComputeQueue, buffer: &Buffer<T>, value: T) -> Result<Event> {
    let nels = buffer.len();
    queue.submit(|h| {
        let vec = h.access(buffer, AccessMode::DiscardWrite)?;
        h.set_name("vecinit");
        h.parallel_for(Range::new(nels), move |item| vec.write(item.id(), value));
        Ok(())
    })
}

/// Fill element `i` with `nels - i`.
pub fn init_descending(queue: &ComputeQueue, buffer: &Buffer<i32>) -> Result<Event> {
    let nels = i32::try_from(buffer.len())
        .map_err(|_| Error::argument(format!("{} elements do not fit in i32", buffer.len())))?;

    queue.submit(|h| {
        let vec = h.access(buffer, AccessMode::DiscardWrite)?;
        h.set_name("vecinit");
        h.parallel_for(Range::new(nels as usize), move |item| {
            let i = item.id() as i32;
            vec.write(item.id(), nels - i);
        });
        Ok(())
    })
}

/// Check the result of [`init_descending`] through a read-only host view.
pub fn verify_descending(buffer: &Buffer<i32>) -> Result<()> {
    let view = buffer.host_access(HostAccess::ReadOnly)?;
    let nels = view.len() as i64;

    for (i, computed) in view.iter().enumerate() {
        let expected = nels - i as i64;
        if i64::from(computed) != expected {
            return Err(Error::verification(format!(
                "init failed at {}: {} != {}",
                i, computed, expected
            )));
        }
    }
    Ok(())
}

pub fn verify_sum<T: Scalar>(computed: T, expected: T) -> Result<()> {
    if computed != expected {
        return Err(Error::verification(format!(
            "wrong sum: {:?} != {:?}",
            computed, expected
        )));
    }
    Ok(())
}

/// Platforms and their devices as a tree:
///
/// ```text
/// Platform #0: VEDA CPU platform
///  `-- Device #0: x86_64 CPU (8 threads)
/// ```
pub fn platform_tree(runtime: &Runtime) -> String {
    let mut out = String::new();
    for (i, platform) in runtime.platforms().iter().enumerate() {
        let _ = writeln!(out, "Platform #{}: {}", i, platform.name());

        let nd = platform.devices().len();
        for (j, device) in platform.devices().iter().enumerate() {
            let connector = if j + 1 == nd { '`' } else { '+' };
            let _ = writeln!(out, " {}-- Device #{}: {}", connector, j, device.name());
        }
    }
    out
}

/// Install the fmt subscriber for the binaries; `RUST_LOG` overrides `warn`.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
