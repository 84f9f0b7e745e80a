//! Device ranking policies

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::DeviceDescriptor;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown sort mode '{0}' (valid: compute, throughput, memory, native)")]
pub struct ParseSortModeError(String);

/// Ranking policy applied to the device list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortMode {
    /// Architecture major, minor, throughput, memory
    #[serde(rename = "compute")]
    ComputeCapability,
    /// Throughput, memory, architecture major, minor
    #[serde(rename = "throughput")]
    Throughput,
    /// Memory, throughput, architecture major, minor
    #[serde(rename = "memory")]
    Memory,
    /// Discovery order
    #[default]
    #[serde(rename = "native")]
    NativeOrder,
}

impl SortMode {
    /// Total order for this policy.
    ///
    /// Every key ranks the higher value first; the trailing native id
    /// tie-break is ascending.
    pub fn compare(self, a: &DeviceDescriptor, b: &DeviceDescriptor) -> Ordering {
        let (l, r) = (&a.capability, &b.capability);
        let major = || r.major.cmp(&l.major);
        let minor = || r.minor.cmp(&l.minor);
        let throughput = || b.throughput_score.cmp(&a.throughput_score);
        let memory = || r.total_memory.cmp(&l.total_memory);

        let ranked = match self {
            SortMode::ComputeCapability => major()
                .then_with(minor)
                .then_with(throughput)
                .then_with(memory),
            SortMode::Throughput => throughput()
                .then_with(memory)
                .then_with(major)
                .then_with(minor),
            SortMode::Memory => memory()
                .then_with(throughput)
                .then_with(major)
                .then_with(minor),
            SortMode::NativeOrder => Ordering::Equal,
        };

        ranked.then_with(|| a.native_id.cmp(&b.native_id))
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortMode::ComputeCapability => write!(f, "compute"),
            SortMode::Throughput => write!(f, "throughput"),
            SortMode::Memory => write!(f, "memory"),
            SortMode::NativeOrder => write!(f, "native"),
        }
    }
}

impl FromStr for SortMode {
    type Err = ParseSortModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compute" => Ok(SortMode::ComputeCapability),
            "throughput" | "flops" => Ok(SortMode::Throughput),
            "memory" => Ok(SortMode::Memory),
            "native" | "none" => Ok(SortMode::NativeOrder),
            _ => Err(ParseSortModeError(s.to_string())),
        }
    }
}

/// Reorder devices in place according to `mode`
pub fn sort_devices(devices: &mut [DeviceDescriptor], mode: SortMode) {
    devices.sort_by(|a, b| mode.compare(a, b));
}
