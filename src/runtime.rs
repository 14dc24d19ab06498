use crate::device::selector;
use crate::device::{
    Device, DeviceDescriptor, DeviceKind, DeviceLocation, Platform, PlatformDescriptor,
    SelectorOverride,
};
use crate::error::{Error, Result};

pub const HOST_DEVICE_NAME: &str = "VEDA host device";
pub const CPU_PLATFORM_NAME: &str = "VEDA CPU platform";
pub const VENDOR: &str = "VEDA";

/// The set of platforms and devices visible to this process.
#[derive(Debug, Clone)]
pub struct Runtime {
    platforms: Vec<Platform>,
    host: Device,
}

impl Runtime {
    /// Enumerate the machine: one CPU platform whose only device has one
    /// compute unit per logical CPU, plus the host device.
    pub fn discover() -> Self {
        let cpus = num_cpus::get().max(1);
        let cpu = DeviceDescriptor::new(
            format!("{} CPU ({} threads)", std::env::consts::ARCH, cpus),
            DeviceKind::Cpu,
            cpus,
        );

        Self::build(vec![PlatformDescriptor::new(CPU_PLATFORM_NAME, VENDOR).device(cpu)])
    }

    /// Build a runtime from an explicit topology.
    pub fn with_platforms(platforms: Vec<PlatformDescriptor>) -> Result<Self> {
        for (p, platform) in platforms.iter().enumerate() {
            for (d, device) in platform.devices.iter().enumerate() {
                if device.compute_units == 0 {
                    return Err(Error::config(format!(
                        "device #{} on platform #{} has no compute units",
                        d, p
                    )));
                }
                if device.max_work_group_size == 0 {
                    return Err(Error::config(format!(
                        "device #{} on platform #{} has a zero max work-group size",
                        d, p
                    )));
                }
            }
        }

        Ok(Self::build(platforms))
    }

    fn build(platforms: Vec<PlatformDescriptor>) -> Self {
        let platforms = platforms
            .into_iter()
            .enumerate()
            .map(|(i, p)| Platform::from_descriptor(i, p))
            .collect();

        let host = Device::new(
            DeviceDescriptor::new(HOST_DEVICE_NAME, DeviceKind::Host, 1),
            "host",
            DeviceLocation::Host,
        );

        Self { platforms, host }
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn host_device(&self) -> &Device {
        &self.host
    }

    /// Every device in enumeration order; the host device comes last.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.platforms
            .iter()
            .flat_map(|p| p.devices().iter())
            .chain(std::iter::once(&self.host))
    }

    pub fn select_device(&self, over: &SelectorOverride) -> Result<Device> {
        selector::select(&self.platforms, &self.host, over)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_has_cpu_and_host() {
        let rt = Runtime::discover();
        assert_eq!(rt.platforms().len(), 1);
        assert_eq!(rt.platforms()[0].name(), CPU_PLATFORM_NAME);
        assert!(rt.platforms()[0].devices()[0].compute_units() >= 1);
        assert!(rt.devices().last().unwrap().is_host());
    }

    #[test]
    fn test_default_selection_skips_host() {
        let rt = Runtime::discover();
        let device = rt.select_device(&SelectorOverride::none()).unwrap();
        assert_eq!(device.kind(), DeviceKind::Cpu);
    }

    #[test]
    fn test_rejects_zero_compute_units() {
        let result = Runtime::with_platforms(vec![PlatformDescriptor::new("p", "v")
            .device(DeviceDescriptor::new("broken", DeviceKind::Gpu, 0))]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_topology_falls_back_to_host_by_default() {
        let rt = Runtime::with_platforms(Vec::new()).unwrap();
        let device = rt.select_device(&SelectorOverride::none()).unwrap();
        assert!(device.is_host());

        assert!(matches!(
            rt.select_device(&SelectorOverride::explicit(0, 0)),
            Err(Error::Selection(_))
        ));
    }
}
