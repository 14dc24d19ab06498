//! Device selection as a pure scoring function.
//!
//! Every candidate gets a score; the strictly highest wins and ties go to
//! enumeration order. With no override the ranking is by device kind. With
//! an override the requested device scores 100 and every other device -1,
//! so a bad index is an error rather than a silent fallback.

use super::{Device, DeviceKind, DeviceLocation, Platform};
use crate::error::{Error, Result};

/// Which generation of environment variables supplied an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvGeneration {
    /// `SYCL_PLATFORM` / `SYCL_DEVICE`
    #[default]
    Sycl,
    /// `OCL_PLATFORM` / `OCL_DEVICE`; platform `-1` means the host device.
    Legacy,
}

impl EnvGeneration {
    pub fn platform_var(self) -> &'static str {
        match self {
            EnvGeneration::Sycl => "SYCL_PLATFORM",
            EnvGeneration::Legacy => "OCL_PLATFORM",
        }
    }

    pub fn device_var(self) -> &'static str {
        match self {
            EnvGeneration::Sycl => "SYCL_DEVICE",
            EnvGeneration::Legacy => "OCL_DEVICE",
        }
    }
}

/// Explicit platform/device request. Both absent means "use the default ranking".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectorOverride {
    pub platform: Option<i64>,
    pub device: Option<i64>,
    pub generation: EnvGeneration,
}

impl SelectorOverride {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn explicit(platform: i64, device: i64) -> Self {
        Self {
            platform: Some(platform),
            device: Some(device),
            generation: EnvGeneration::Sycl,
        }
    }

    pub fn is_active(&self) -> bool {
        self.platform.is_some() || self.device.is_some()
    }

    /// Read the override from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the override through `lookup`. `SYCL_*` wins over `OCL_*`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        for generation in [EnvGeneration::Sycl, EnvGeneration::Legacy] {
            let platform = lookup(generation.platform_var());
            let device = lookup(generation.device_var());
            if platform.is_none() && device.is_none() {
                continue;
            }

            return Ok(Self {
                platform: parse_index(generation.platform_var(), platform)?,
                device: parse_index(generation.device_var(), device)?,
                generation,
            });
        }

        Ok(Self::none())
    }

    /// Validate the override against the enumerated platforms.
    pub fn resolve(&self, platforms: &[Platform]) -> Result<SelectionTarget> {
        if !self.is_active() {
            return Ok(SelectionTarget::Default);
        }

        let platform = self.platform.unwrap_or(0);
        let device = self.device.unwrap_or(0);

        if platform == -1 && self.generation == EnvGeneration::Legacy {
            return Ok(SelectionTarget::Host);
        }

        let p = checked_index(platform, platforms.len()).ok_or_else(|| {
            Error::selection(format!(
                "cannot select platform #{} ({}): {}",
                platform,
                self.generation.platform_var(),
                valid_range(platforms.len(), "platforms")
            ))
        })?;

        let devices = platforms[p].devices().len();
        let d = checked_index(device, devices).ok_or_else(|| {
            Error::selection(format!(
                "cannot select device #{} on platform #{} ({}): {}",
                device,
                p,
                self.generation.device_var(),
                valid_range(devices, "devices")
            ))
        })?;

        Ok(SelectionTarget::Device {
            platform: p,
            device: d,
        })
    }
}

/// A validated selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTarget {
    Default,
    Host,
    Device { platform: usize, device: usize },
}

/// Score of `candidate` under `target`; higher is better, negative means rejected.
pub fn score(candidate: &Device, target: &SelectionTarget) -> i32 {
    match *target {
        SelectionTarget::Default => default_score(candidate.kind()),
        SelectionTarget::Host => {
            if candidate.is_host() {
                1000
            } else {
                -1
            }
        }
        SelectionTarget::Device { platform, device } => {
            if candidate.location() == (DeviceLocation::Platform { platform, device }) {
                100
            } else {
                -1
            }
        }
    }
}

/// Built-in ranking used when no override is present.
pub fn default_score(kind: DeviceKind) -> i32 {
    match kind {
        DeviceKind::Gpu => 500,
        DeviceKind::Accelerator => 400,
        DeviceKind::Cpu => 300,
        DeviceKind::Host => 100,
    }
}

/// Pick one device: platform devices in order, then the host device.
pub fn select(platforms: &[Platform], host: &Device, over: &SelectorOverride) -> Result<Device> {
    let target = over.resolve(platforms)?;

    let mut best: Option<(&Device, i32)> = None;
    let candidates = platforms
        .iter()
        .flat_map(|p| p.devices().iter())
        .chain(std::iter::once(host));

    for candidate in candidates {
        let s = score(candidate, &target);
        match best {
            Some((_, top)) if s <= top => {}
            _ => best = Some((candidate, s)),
        }
    }

    match best {
        Some((device, s)) if s >= 0 => {
            tracing::info!(
                device = device.name(),
                platform = device.platform_name(),
                score = s,
                "selected device"
            );
            Ok(device.clone())
        }
        _ => Err(Error::selection("no device accepted by the selector")),
    }
}

fn parse_index(var: &str, value: Option<String>) -> Result<Option<i64>> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| Error::config(format!("{} must be an integer, got {:?}", var, raw))),
    }
}

fn checked_index(index: i64, len: usize) -> Option<usize> {
    usize::try_from(index).ok().filter(|&i| i < len)
}

fn valid_range(len: usize, what: &str) -> String {
    if len == 0 {
        format!("no {} available", what)
    } else {
        format!("valid range is 0..={}", len - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceDescriptor, PlatformDescriptor};
    use std::collections::HashMap;

    fn topology() -> (Vec<Platform>, Device) {
        let platforms = vec![
            Platform::from_descriptor(
                0,
                PlatformDescriptor::new("cpu-platform", "veda")
                    .device(DeviceDescriptor::new("cpu0", DeviceKind::Cpu, 4)),
            ),
            Platform::from_descriptor(
                1,
                PlatformDescriptor::new("accel-platform", "veda")
                    .device(DeviceDescriptor::new("gpu0", DeviceKind::Gpu, 8))
                    .device(DeviceDescriptor::new("gpu1", DeviceKind::Gpu, 16)),
            ),
        ];
        let host = Device::new(
            DeviceDescriptor::new("host", DeviceKind::Host, 1),
            "host",
            DeviceLocation::Host,
        );
        (platforms, host)
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_prefers_first_gpu() {
        let (platforms, host) = topology();
        let device = select(&platforms, &host, &SelectorOverride::none()).unwrap();
        assert_eq!(device.name(), "gpu0");
    }

    #[test]
    fn test_explicit_selection() {
        let (platforms, host) = topology();
        let device = select(&platforms, &host, &SelectorOverride::explicit(1, 1)).unwrap();
        assert_eq!(device.name(), "gpu1");

        let device = select(&platforms, &host, &SelectorOverride::explicit(0, 0)).unwrap();
        assert_eq!(device.name(), "cpu0");
    }

    #[test]
    fn test_missing_index_defaults_to_zero() {
        let (platforms, host) = topology();
        let over = SelectorOverride {
            platform: Some(1),
            device: None,
            generation: EnvGeneration::Sycl,
        };
        assert_eq!(select(&platforms, &host, &over).unwrap().name(), "gpu0");

        let over = SelectorOverride {
            platform: None,
            device: Some(0),
            generation: EnvGeneration::Sycl,
        };
        assert_eq!(select(&platforms, &host, &over).unwrap().name(), "cpu0");
    }

    #[test]
    fn test_out_of_range_platform_fails() {
        let (platforms, host) = topology();
        let err = select(&platforms, &host, &SelectorOverride::explicit(2, 0)).unwrap_err();
        match err {
            Error::Selection(msg) => {
                assert!(msg.contains("#2"), "{}", msg);
                assert!(msg.contains("0..=1"), "{}", msg);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_device_fails() {
        let (platforms, host) = topology();
        let err = select(&platforms, &host, &SelectorOverride::explicit(0, 1)).unwrap_err();
        match err {
            Error::Selection(msg) => {
                assert!(msg.contains("device #1"), "{}", msg);
                assert!(msg.contains("0..=0"), "{}", msg);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_legacy_minus_one_selects_host() {
        let (platforms, host) = topology();
        let over = SelectorOverride::from_lookup(lookup(&[("OCL_PLATFORM", "-1")])).unwrap();
        assert_eq!(over.generation, EnvGeneration::Legacy);
        let device = select(&platforms, &host, &over).unwrap();
        assert!(device.is_host());
    }

    #[test]
    fn test_sycl_minus_one_is_rejected() {
        let (platforms, host) = topology();
        let over = SelectorOverride::from_lookup(lookup(&[("SYCL_PLATFORM", "-1")])).unwrap();
        assert!(matches!(
            select(&platforms, &host, &over),
            Err(Error::Selection(_))
        ));
    }

    #[test]
    fn test_sycl_variables_take_precedence() {
        let over = SelectorOverride::from_lookup(lookup(&[
            ("SYCL_DEVICE", "1"),
            ("OCL_PLATFORM", "0"),
            ("OCL_DEVICE", "0"),
        ]))
        .unwrap();
        assert_eq!(over.generation, EnvGeneration::Sycl);
        assert_eq!(over.platform, None);
        assert_eq!(over.device, Some(1));
    }

    #[test]
    fn test_non_numeric_env_is_config_error() {
        let result = SelectorOverride::from_lookup(lookup(&[("OCL_DEVICE", "gpu")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_no_env_means_default() {
        let over = SelectorOverride::from_lookup(lookup(&[])).unwrap();
        assert!(!over.is_active());
    }

    #[test]
    fn test_scores_under_override() {
        let (platforms, host) = topology();
        let target = SelectorOverride::explicit(1, 0).resolve(&platforms).unwrap();
        assert_eq!(score(&platforms[1].devices()[0], &target), 100);
        assert_eq!(score(&platforms[1].devices()[1], &target), -1);
        assert_eq!(score(&platforms[0].devices()[0], &target), -1);
        assert_eq!(score(&host, &target), -1);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let (platforms, host) = topology();
        let over = SelectorOverride::explicit(1, 1);
        let first = select(&platforms, &host, &over).unwrap();
        for _ in 0..10 {
            assert_eq!(select(&platforms, &host, &over).unwrap(), first);
        }
    }
}
