//! Launch shapes, work-item indices and kernel bodies.
//!
//! A flat kernel is a closure called once per work-item. A grouped kernel
//! implements [`GroupKernel`]: it is split into barrier-delimited stages,
//! and every work-item of a work-group finishes stage `s` before any
//! work-item starts stage `s + 1`. That ordering is the barrier, and it
//! also publishes every [`LocalScratch`] write of one stage to the next.

use crate::buffer::{AccessMode, Accessor, Buffer, SharedHistory};
use crate::error::{Error, Result};
use crate::scalar::Scalar;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

/// Flat 1-D launch of `global` work-items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    global: usize,
}

impl Range {
    pub fn new(global: usize) -> Self {
        Self { global }
    }

    pub fn global(&self) -> usize {
        self.global
    }
}

/// Grouped 1-D launch: `global / local` work-groups of `local` work-items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdRange {
    global: usize,
    local: usize,
}

impl NdRange {
    pub fn new(global: usize, local: usize) -> Result<Self> {
        if local == 0 {
            return Err(Error::invalid_range("work-group size must be > 0"));
        }
        if global % local != 0 {
            return Err(Error::invalid_range(format!(
                "global size {} is not a multiple of work-group size {}",
                global, local
            )));
        }
        Ok(Self { global, local })
    }

    pub fn global(&self) -> usize {
        self.global
    }

    pub fn local(&self) -> usize {
        self.local
    }

    pub fn group_count(&self) -> usize {
        self.global / self.local
    }
}

/// Index of a work-item in a flat launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    id: usize,
    range: usize,
}

impl Item {
    pub(crate) fn new(id: usize, range: usize) -> Self {
        Self { id, range }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn range(&self) -> usize {
        self.range
    }
}

/// Index of a work-item in a grouped launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdItem {
    group: usize,
    local_id: usize,
    local_range: usize,
    global_range: usize,
}

impl NdItem {
    pub fn global_id(&self) -> usize {
        self.group * self.local_range + self.local_id
    }

    pub fn local_id(&self) -> usize {
        self.local_id
    }

    pub fn group(&self) -> usize {
        self.group
    }

    pub fn local_range(&self) -> usize {
        self.local_range
    }

    pub fn global_range(&self) -> usize {
        self.global_range
    }

    pub fn group_range(&self) -> usize {
        self.global_range / self.local_range
    }
}

/// Per-work-group scratch memory, one slot per work-item.
///
/// Contents are unspecified at the start of a work-group; kernels must
/// write a slot before reading it.
#[derive(Debug)]
pub struct LocalScratch<T> {
    data: Vec<T>,
}

impl<T: Scalar> LocalScratch<T> {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            data: vec![T::ZERO; len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T> Index<usize> for LocalScratch<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.data[index]
    }
}

impl<T> IndexMut<usize> for LocalScratch<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.data[index]
    }
}

/// A kernel executed by work-groups with barriers between stages.
pub trait GroupKernel: Send + Sync + 'static {
    /// Element type of the work-group's scratch memory.
    type Local: Scalar;

    /// Per-work-item state carried across barriers.
    type Private: Default + Send;

    /// Number of barrier-delimited stages for a given work-group size.
    fn stages(&self, local_range: usize) -> usize;

    /// Run `stage` for one work-item.
    fn run(
        &self,
        stage: usize,
        item: &NdItem,
        private: &mut Self::Private,
        local: &mut LocalScratch<Self::Local>,
    );
}

pub(crate) type FlatFn = Arc<dyn Fn(Item) + Send + Sync>;
pub(crate) type GroupFn = Arc<dyn Fn(usize) + Send + Sync>;

/// Type-erased kernel body.
#[derive(Clone)]
pub enum KernelBody {
    Flat { range: Range, func: FlatFn },
    Grouped { range: NdRange, func: GroupFn },
}

impl KernelBody {
    pub fn flat<F>(range: Range, f: F) -> Self
    where
        F: Fn(Item) + Send + Sync + 'static,
    {
        KernelBody::Flat {
            range,
            func: Arc::new(f),
        }
    }

    /// Erase a [`GroupKernel`] into a closure that runs one whole work-group.
    pub fn grouped<K: GroupKernel>(range: NdRange, kernel: K) -> Self {
        let func = move |group: usize| {
            let local_range = range.local();
            let mut scratch = LocalScratch::<K::Local>::new(local_range);
            let mut private: Vec<K::Private> =
                (0..local_range).map(|_| K::Private::default()).collect();

            for stage in 0..kernel.stages(local_range) {
                for (local_id, state) in private.iter_mut().enumerate() {
                    let item = NdItem {
                        group,
                        local_id,
                        local_range,
                        global_range: range.global(),
                    };
                    kernel.run(stage, &item, state, &mut scratch);
                }
            }
        };

        KernelBody::Grouped {
            range,
            func: Arc::new(func),
        }
    }

    pub fn work_items(&self) -> usize {
        match self {
            KernelBody::Flat { range, .. } => range.global(),
            KernelBody::Grouped { range, .. } => range.global(),
        }
    }

    pub fn work_groups(&self) -> usize {
        match self {
            KernelBody::Flat { .. } => 0,
            KernelBody::Grouped { range, .. } => range.group_count(),
        }
    }
}

impl fmt::Debug for KernelBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelBody::Flat { range, .. } => f.debug_struct("Flat").field("range", range).finish(),
            KernelBody::Grouped { range, .. } => {
                f.debug_struct("Grouped").field("range", range).finish()
            }
        }
    }
}

/// One declared buffer access of a launch.
#[derive(Clone)]
pub struct AccessDecl {
    pub(crate) buffer: u64,
    pub(crate) mode: AccessMode,
    pub(crate) bytes: usize,
    pub(crate) history: SharedHistory,
}

impl AccessDecl {
    /// Declare `mode` on `buffer` and get the matching kernel-side accessor.
    pub fn request<T: Scalar>(buffer: &Buffer<T>, mode: AccessMode) -> Result<(Self, Accessor<T>)> {
        if mode == AccessMode::LocalScratch {
            return Err(Error::invalid_access(
                "local scratch is allocated per work-group, not requested from a buffer",
            ));
        }

        let decl = Self {
            buffer: buffer.id(),
            mode,
            bytes: buffer.size_bytes(),
            history: buffer.history(),
        };
        Ok((decl, buffer.accessor(mode)))
    }

    pub fn buffer(&self) -> u64 {
        self.buffer
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl fmt::Debug for AccessDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessDecl")
            .field("buffer", &self.buffer)
            .field("mode", &self.mode)
            .field("bytes", &self.bytes)
            .finish()
    }
}

/// A complete unit of work: entry name, declared accesses and body.
#[derive(Debug, Clone)]
pub struct KernelDescriptor {
    pub(crate) name: String,
    pub(crate) accesses: Vec<AccessDecl>,
    pub(crate) body: KernelBody,
}

impl KernelDescriptor {
    pub fn new(name: impl Into<String>, accesses: Vec<AccessDecl>, body: KernelBody) -> Self {
        Self {
            name: name.into(),
            accesses,
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accesses(&self) -> &[AccessDecl] {
        &self.accesses
    }

    pub fn body(&self) -> &KernelBody {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_nd_range_validation() {
        assert!(NdRange::new(64, 0).is_err());
        assert!(NdRange::new(65, 8).is_err());

        let nd = NdRange::new(64, 8).unwrap();
        assert_eq!(nd.group_count(), 8);
        assert_eq!(NdRange::new(0, 8).unwrap().group_count(), 0);
    }

    #[test]
    fn test_nd_item_indices() {
        let item = NdItem {
            group: 3,
            local_id: 5,
            local_range: 8,
            global_range: 64,
        };
        assert_eq!(item.global_id(), 29);
        assert_eq!(item.group_range(), 8);
    }

    struct StageRecorder {
        log: Arc<Mutex<Vec<(usize, usize)>>>,
    }

    impl GroupKernel for StageRecorder {
        type Local = i32;
        type Private = ();

        fn stages(&self, _local_range: usize) -> usize {
            2
        }

        fn run(&self, stage: usize, item: &NdItem, _: &mut (), _: &mut LocalScratch<i32>) {
            self.log.lock().push((stage, item.local_id()));
        }
    }

    #[test]
    fn test_stages_act_as_barriers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let body = KernelBody::grouped(
            NdRange::new(4, 4).unwrap(),
            StageRecorder { log: log.clone() },
        );

        match body {
            KernelBody::Grouped { func, .. } => func(0),
            _ => unreachable!(),
        }

        let log = log.lock();
        assert_eq!(log.len(), 8);
        // every stage-0 entry precedes every stage-1 entry
        let last_zero = log.iter().rposition(|(s, _)| *s == 0).unwrap();
        let first_one = log.iter().position(|(s, _)| *s == 1).unwrap();
        assert!(last_zero < first_one);
    }

    struct PrivateCarry {
        out: Arc<Mutex<Vec<i32>>>,
    }

    impl GroupKernel for PrivateCarry {
        type Local = i32;
        type Private = i32;

        fn stages(&self, _local_range: usize) -> usize {
            2
        }

        fn run(&self, stage: usize, item: &NdItem, acc: &mut i32, local: &mut LocalScratch<i32>) {
            let li = item.local_id();
            if stage == 0 {
                *acc = li as i32 * 10;
                local[li] = *acc;
            } else {
                let neighbour = local[(li + 1) % local.len()];
                self.out.lock().push(*acc + neighbour);
            }
        }
    }

    #[test]
    fn test_private_and_local_survive_barrier() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let body = KernelBody::grouped(
            NdRange::new(3, 3).unwrap(),
            PrivateCarry { out: out.clone() },
        );
        if let KernelBody::Grouped { func, .. } = body {
            func(0);
        }
        assert_eq!(*out.lock(), vec![10, 30, 20]);
    }
}
