//! Platforms, devices and device selection.

pub mod selector;

pub use selector::{EnvGeneration, SelectionTarget, SelectorOverride};

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Broad class of a device, used by the default ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Cpu,
    Gpu,
    Accelerator,
    Host,
}

impl DeviceKind {
    pub fn name(self) -> &'static str {
        match self {
            DeviceKind::Cpu => "cpu",
            DeviceKind::Gpu => "gpu",
            DeviceKind::Accelerator => "accelerator",
            DeviceKind::Host => "host",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a device sits in the runtime's enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceLocation {
    Platform { platform: usize, device: usize },
    Host,
}

/// Monotonic nanosecond clock shared by every event of one device.
#[derive(Debug)]
pub struct DeviceClock {
    epoch: Instant,
}

impl DeviceClock {
    fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub fn now_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }
}

/// Plain description of a device, turned into a [`Device`] by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: String,
    pub kind: DeviceKind,
    pub compute_units: usize,
    pub max_work_group_size: usize,
}

impl DeviceDescriptor {
    pub const DEFAULT_MAX_WORK_GROUP_SIZE: usize = 1024;

    pub fn new(name: impl Into<String>, kind: DeviceKind, compute_units: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            compute_units,
            max_work_group_size: Self::DEFAULT_MAX_WORK_GROUP_SIZE,
        }
    }

    pub fn max_work_group_size(mut self, size: usize) -> Self {
        self.max_work_group_size = size;
        self
    }
}

/// Plain description of a platform and its devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDescriptor {
    pub name: String,
    pub vendor: String,
    pub devices: Vec<DeviceDescriptor>,
}

impl PlatformDescriptor {
    pub fn new(name: impl Into<String>, vendor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vendor: vendor.into(),
            devices: Vec::new(),
        }
    }

    pub fn device(mut self, device: DeviceDescriptor) -> Self {
        self.devices.push(device);
        self
    }
}

/// A selectable compute device. Cheap to clone; clones are the same device.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    descriptor: DeviceDescriptor,
    platform_name: String,
    location: DeviceLocation,
    clock: DeviceClock,
}

impl Device {
    pub(crate) fn new(
        descriptor: DeviceDescriptor,
        platform_name: impl Into<String>,
        location: DeviceLocation,
    ) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                descriptor,
                platform_name: platform_name.into(),
                location,
                clock: DeviceClock::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.descriptor.name
    }

    pub fn kind(&self) -> DeviceKind {
        self.inner.descriptor.kind
    }

    pub fn is_host(&self) -> bool {
        self.kind() == DeviceKind::Host
    }

    pub fn compute_units(&self) -> usize {
        self.inner.descriptor.compute_units
    }

    pub fn max_work_group_size(&self) -> usize {
        self.inner.descriptor.max_work_group_size
    }

    pub fn platform_name(&self) -> &str {
        &self.inner.platform_name
    }

    pub fn location(&self) -> DeviceLocation {
        self.inner.location
    }

    pub fn clock(&self) -> &DeviceClock {
        &self.inner.clock
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Device {}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("compute_units", &self.compute_units())
            .field("platform", &self.platform_name())
            .field("location", &self.location())
            .finish()
    }
}

/// A named group of devices.
#[derive(Debug, Clone)]
pub struct Platform {
    name: String,
    vendor: String,
    devices: Vec<Device>,
}

impl Platform {
    pub(crate) fn from_descriptor(index: usize, descriptor: PlatformDescriptor) -> Self {
        let devices = descriptor
            .devices
            .into_iter()
            .enumerate()
            .map(|(device, d)| {
                Device::new(
                    d,
                    descriptor.name.clone(),
                    DeviceLocation::Platform {
                        platform: index,
                        device,
                    },
                )
            })
            .collect();

        Self {
            name: descriptor.name,
            vendor: descriptor.vendor,
            devices,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }
}
