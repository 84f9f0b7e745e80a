//! GPU device descriptors and throughput scoring

use serde::{Deserialize, Serialize};

const MB: u64 = 1024 * 1024;

/// Cores per multiprocessor, keyed by compute capability (major, minor)
const CORES_PER_MULTIPROCESSOR: &[((u32, u32), u32)] = &[
    ((1, 0), 8),
    ((1, 1), 8),
    ((1, 2), 8),
    ((1, 3), 8),
    ((2, 0), 32),
    ((2, 1), 48),
    ((3, 0), 192),
    ((3, 2), 192),
    ((3, 5), 192),
    ((3, 7), 192),
    ((5, 0), 128),
    ((5, 2), 128),
    ((5, 3), 128),
    ((6, 0), 64),
    ((6, 1), 128),
    ((6, 2), 128),
    ((7, 0), 64),
    ((7, 2), 64),
    ((7, 5), 64),
    ((8, 0), 64),
    ((8, 6), 128),
    ((8, 7), 128),
    ((8, 9), 128),
    ((9, 0), 128),
];

/// Architecture descriptor reported by the platform for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Device name
    pub name: String,
    /// Compute capability major revision
    pub major: u32,
    /// Compute capability minor revision
    pub minor: u32,
    /// Total global memory in bytes
    pub total_memory: u64,
    /// Core clock rate in platform units (kHz for CUDA)
    pub clock_rate: u32,
    /// Number of multiprocessors
    pub multiprocessors: u32,
}

impl Capability {
    /// Total memory in megabytes, rounded up
    pub fn memory_mb(&self) -> u64 {
        self.total_memory.div_ceil(MB)
    }

    /// Compute capability as "major.minor"
    pub fn compute_capability(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }
}

/// Cores per multiprocessor for an architecture revision, 0 when unknown
pub fn cores_per_unit(major: u32, minor: u32) -> u32 {
    CORES_PER_MULTIPROCESSOR
        .iter()
        .find(|(revision, _)| *revision == (major, minor))
        .map(|(_, cores)| *cores)
        .unwrap_or(0)
}

/// Theoretical throughput: multiprocessors x cores/unit x clock rate.
///
/// Saturates at `u64::MAX` for descriptors too large to score exactly.
pub fn throughput_score(capability: &Capability) -> u64 {
    u64::from(capability.multiprocessors)
        .saturating_mul(u64::from(cores_per_unit(capability.major, capability.minor)))
        .saturating_mul(u64::from(capability.clock_rate))
}

/// One discovered compute device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Index assigned by the platform at discovery
    pub native_id: usize,
    pub capability: Capability,
    /// Ranking score, computed once at discovery
    pub throughput_score: u64,
}

impl DeviceDescriptor {
    pub fn new(native_id: usize, capability: Capability) -> Self {
        let throughput_score = throughput_score(&capability);
        Self {
            native_id,
            capability,
            throughput_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability(major: u32, minor: u32, multiprocessors: u32, clock_rate: u32) -> Capability {
        Capability {
            name: "Test GPU".to_string(),
            major,
            minor,
            total_memory: 4 * 1024 * MB,
            clock_rate,
            multiprocessors,
        }
    }

    #[test]
    fn test_cores_per_unit() {
        assert_eq!(cores_per_unit(1, 3), 8);
        assert_eq!(cores_per_unit(2, 0), 32);
        assert_eq!(cores_per_unit(2, 1), 48);
        assert_eq!(cores_per_unit(3, 5), 192);
        assert_eq!(cores_per_unit(5, 0), 128);
        assert_eq!(cores_per_unit(8, 6), 128);
    }

    #[test]
    fn test_unknown_architecture_scores_zero() {
        assert_eq!(cores_per_unit(4, 0), 0);
        assert_eq!(throughput_score(&capability(4, 0, 80, 1_500_000)), 0);
    }

    #[test]
    fn test_throughput_score() {
        assert_eq!(throughput_score(&capability(3, 5, 15, 745)), 2_145_600);
        assert_eq!(throughput_score(&capability(5, 0, 20, 1000)), 2_560_000);
        assert_eq!(throughput_score(&capability(2, 0, 8, 1500)), 384_000);
    }

    #[test]
    fn test_oversized_descriptor_saturates() {
        let huge = capability(3, 5, u32::MAX, u32::MAX);
        assert_eq!(throughput_score(&huge), u64::MAX);

        // Still ranks above any exact score
        let fast = capability(9, 0, 132, 1_980_000);
        assert!(throughput_score(&huge) > throughput_score(&fast));
    }

    #[test]
    fn test_descriptor_computes_score() {
        let dev = DeviceDescriptor::new(2, capability(5, 0, 20, 1000));
        assert_eq!(dev.native_id, 2);
        assert_eq!(dev.throughput_score, 2_560_000);
    }

    #[test]
    fn test_memory_rounds_up_to_whole_megabyte() {
        let mut cap = capability(3, 5, 15, 745);
        cap.total_memory = 3_145_728;
        assert_eq!(cap.memory_mb(), 3);
        cap.total_memory = 3_145_729;
        assert_eq!(cap.memory_mb(), 4);
        cap.total_memory = 0;
        assert_eq!(cap.memory_mb(), 0);
    }
}
