//! Two-pass tree reduction (sum).
//!
//! Pass 1 launches `nwg` work-groups of `lws` work-items over the input.
//! Each work-item accumulates a grid-stride slice of the input, the group
//! collapses its partials in local scratch with a halving tree, and local
//! item 0 writes the group total to `partials[group]`. Pass 2 runs the same
//! kernel as a single work-group over `partials`, leaving the sum in
//! `partials[0]`.

use crate::buffer::{AccessMode, Accessor, Buffer, HostAccess};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::kernel::{GroupKernel, LocalScratch, NdItem, NdRange};
use crate::queue::ComputeQueue;
use crate::scalar::Scalar;

/// Work-group sum kernel.
#[derive(Debug)]
pub struct ReduceKernel<T: Scalar> {
    input: Accessor<T>,
    output: Accessor<T>,
    nels: usize,
}

impl<T: Scalar> ReduceKernel<T> {
    pub fn new(input: Accessor<T>, output: Accessor<T>, nels: usize) -> Self {
        Self {
            input,
            output,
            nels,
        }
    }

    fn rounds(local_range: usize) -> usize {
        local_range.trailing_zeros() as usize
    }
}

impl<T: Scalar> GroupKernel for ReduceKernel<T> {
    type Local = T;
    type Private = T;

    // accumulate, one stage per tree round, then the group write
    fn stages(&self, local_range: usize) -> usize {
        Self::rounds(local_range) + 2
    }

    fn run(&self, stage: usize, item: &NdItem, acc: &mut T, local: &mut LocalScratch<T>) {
        let li = item.local_id();
        let rounds = Self::rounds(item.local_range());

        if stage == 0 {
            let stride = item.global_range();
            let mut gi = item.global_id();
            while gi < self.nels {
                *acc = *acc + self.input.read(gi);
                gi += stride;
            }
            local[li] = *acc;
        } else if stage <= rounds {
            let active = item.local_range() >> stage;
            if li < active {
                *acc = *acc + local[li + active];
                local[li] = *acc;
            }
        } else if li == 0 {
            self.output.write(item.group(), *acc);
        }
    }
}

/// One reduction launch: `nels` elements of `input` into `nwg` totals in `output`.
///
/// `input` and `output` may be the same buffer.
#[derive(Debug)]
pub struct ReductionJob<'a, T: Scalar> {
    pub name: &'static str,
    pub input: &'a Buffer<T>,
    pub output: &'a Buffer<T>,
    pub nels: usize,
    pub lws: usize,
    pub nwg: usize,
}

impl<'a, T: Scalar> ReductionJob<'a, T> {
    pub fn launch(&self, queue: &ComputeQueue) -> Result<Event> {
        let global = self
            .nwg
            .checked_mul(self.lws)
            .ok_or_else(|| Error::argument("global size overflows"))?;
        let range = NdRange::new(global, self.lws)?;

        if self.output.len() < self.nwg {
            return Err(Error::argument(format!(
                "output holds {} elements but {} work-groups write to it",
                self.output.len(),
                self.nwg
            )));
        }
        if self.input.len() < self.nels {
            return Err(Error::argument(format!(
                "input holds {} elements, fewer than the {} to reduce",
                self.input.len(),
                self.nels
            )));
        }

        queue.submit(|h| {
            let input = h.access(self.input, AccessMode::Read)?;
            let output = h.access(self.output, AccessMode::Write)?;
            h.set_name(self.name);
            h.parallel_for_nd(range, ReduceKernel::new(input, output, self.nels));
            Ok(())
        })
    }
}

/// Result of [`ReductionEngine::reduce`].
#[derive(Debug)]
pub struct Reduction<T: Scalar> {
    pub partials: Buffer<T>,
    pub pass1: Event,
    pub pass2: Event,
    pub nwg: usize,
    pub lws: usize,
}

impl<T: Scalar> Reduction<T> {
    /// Blocking host read of the final sum.
    pub fn value(&self) -> Result<T> {
        self.partials
            .host_access(HostAccess::ReadOnly)?
            .get(0)
            .ok_or_else(|| Error::execution("reduction produced no partials"))
    }
}

/// Runs the two-pass reduction on one queue.
#[derive(Debug)]
pub struct ReductionEngine<'q> {
    queue: &'q ComputeQueue,
}

impl<'q> ReductionEngine<'q> {
    pub fn new(queue: &'q ComputeQueue) -> Self {
        Self { queue }
    }

    /// Work-group count for a per-compute-unit multiplier.
    pub fn work_groups(&self, nwg_per_cu: usize) -> Result<usize> {
        if nwg_per_cu == 0 {
            return Err(Error::argument("work-groups per compute unit must be >= 1"));
        }
        nwg_per_cu
            .checked_mul(self.queue.device().compute_units())
            .ok_or_else(|| Error::argument("work-group count overflows"))
    }

    pub fn reduce<T: Scalar>(
        &self,
        input: &Buffer<T>,
        lws: usize,
        nwg_per_cu: usize,
    ) -> Result<Reduction<T>> {
        let max = self.queue.device().max_work_group_size();
        if lws == 0 {
            return Err(Error::argument("work-group size must be >= 1"));
        }
        if !lws.is_power_of_two() {
            return Err(Error::argument(format!(
                "work-group size {} is not a power of two",
                lws
            )));
        }
        if lws > max {
            return Err(Error::argument(format!(
                "work-group size {} exceeds device maximum {}",
                lws, max
            )));
        }
        let nwg = self.work_groups(nwg_per_cu)?;

        tracing::debug!(nels = input.len(), lws, nwg, "reduce");

        let partials = Buffer::<T>::new(nwg);

        let pass1 = ReductionJob {
            name: "reduce_pass1",
            input,
            output: &partials,
            nels: input.len(),
            lws,
            nwg,
        }
        .launch(self.queue)?;

        let pass2 = ReductionJob {
            name: "reduce_pass2",
            input: &partials,
            output: &partials,
            nels: nwg,
            lws,
            nwg: 1,
        }
        .launch(self.queue)?;

        Ok(Reduction {
            partials,
            pass1,
            pass2,
            nwg,
            lws,
        })
    }
}
