//! ArrayForge CUDA Device Registry
//!
//! Discovers CUDA devices, ranks them by a selectable policy and tracks the
//! active device targeted by the rest of the CUDA backend.

mod device;
mod error;
mod info;
mod platform;
mod registry;
mod shared;
mod sort;

#[cfg(feature = "cuda")]
mod cuda;

pub use device::{cores_per_unit, throughput_score, Capability, DeviceDescriptor};
pub use error::DeviceError;
pub use info::{format_toolkit_version, parse_nvidia_proc_version, report_header, system_description};
pub use platform::{Platform, SimulatedPlatform};
pub use registry::{DeviceRegistry, RegistryConfig, ScopedDevice};
pub use shared::SharedRegistry;
pub use sort::{ParseSortModeError, SortMode};

#[cfg(feature = "cuda")]
pub use cuda::{global, CudaPlatform};

/// Check if a CUDA device is available
pub fn is_cuda_available() -> bool {
    #[cfg(feature = "cuda")]
    {
        cuda::global().is_ok()
    }
    #[cfg(not(feature = "cuda"))]
    {
        false
    }
}
