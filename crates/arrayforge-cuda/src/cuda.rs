//! CUDA driver platform backed by cudarc

use std::collections::HashMap;
use std::sync::Arc;

use cudarc::driver::sys::{self, CUdevice_attribute};
use cudarc::driver::{result, CudaDevice, DriverError};
use parking_lot::Mutex;
use tracing::debug;

use crate::device::Capability;
use crate::error::DeviceError;
use crate::info::parse_nvidia_proc_version;
use crate::platform::Platform;
use crate::registry::DeviceRegistry;
use crate::shared::SharedRegistry;

/// Toolkit version the bindings are generated against (`cuda-12050`)
const CUDA_TOOLKIT_VERSION: u32 = 12050;

const NVIDIA_PROC_VERSION: &str = "/proc/driver/nvidia/version";

static GLOBAL: SharedRegistry<CudaPlatform> = SharedRegistry::new();

/// Process-wide registry of CUDA devices, discovered on first call
pub fn global() -> Result<&'static DeviceRegistry<CudaPlatform>, DeviceError> {
    GLOBAL.get_or_discover(|| DeviceRegistry::discover(CudaPlatform::new()?))
}

fn driver_error(call: &'static str) -> impl FnOnce(DriverError) -> DeviceError {
    move |e| DeviceError::driver(call, format!("{:?}", e))
}

/// CUDA driver API platform
#[derive(Default)]
pub struct CudaPlatform {
    /// Primary contexts retained so far, by native id
    contexts: Mutex<HashMap<usize, Arc<CudaDevice>>>,
}

impl std::fmt::Debug for CudaPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaPlatform")
            .field("contexts", &self.contexts.lock().len())
            .finish()
    }
}

impl CudaPlatform {
    /// Initialize the driver API
    pub fn new() -> Result<Self, DeviceError> {
        result::init().map_err(driver_error("cuInit"))?;
        Ok(Self::default())
    }

    fn attribute(
        device: sys::CUdevice,
        attribute: CUdevice_attribute,
    ) -> Result<u32, DeviceError> {
        let value = unsafe { result::device::get_attribute(device, attribute) }
            .map_err(driver_error("cuDeviceGetAttribute"))?;
        Ok(value.max(0) as u32)
    }

    fn driver_api_version(&self) -> Result<i32, DeviceError> {
        let mut version = 0;
        unsafe { sys::lib().cuDriverGetVersion(&mut version) }
            .result()
            .map_err(driver_error("cuDriverGetVersion"))?;
        Ok(version)
    }
}

impl Platform for CudaPlatform {
    fn device_count(&self) -> Result<usize, DeviceError> {
        let count = result::device::get_count().map_err(driver_error("cuDeviceGetCount"))?;
        Ok(count.max(0) as usize)
    }

    fn capability(&self, native_id: usize) -> Result<Capability, DeviceError> {
        let device = result::device::get(native_id as i32).map_err(driver_error("cuDeviceGet"))?;
        let name = result::device::get_name(device).map_err(driver_error("cuDeviceGetName"))?;
        let total_memory = unsafe { result::device::total_mem(device) }
            .map_err(driver_error("cuDeviceTotalMem"))?;

        Ok(Capability {
            name,
            major: Self::attribute(
                device,
                CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR,
            )?,
            minor: Self::attribute(
                device,
                CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR,
            )?,
            total_memory: total_memory as u64,
            clock_rate: Self::attribute(device, CUdevice_attribute::CU_DEVICE_ATTRIBUTE_CLOCK_RATE)?,
            multiprocessors: Self::attribute(
                device,
                CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT,
            )?,
        })
    }

    fn set_device(&self, native_id: usize) -> Result<(), DeviceError> {
        let mut contexts = self.contexts.lock();
        let device = match contexts.get(&native_id) {
            Some(device) => Arc::clone(device),
            None => {
                let device = CudaDevice::new(native_id)
                    .map_err(driver_error("cuDevicePrimaryCtxRetain"))?;
                debug!("Retained primary context for CUDA device {}", native_id);
                contexts.insert(native_id, Arc::clone(&device));
                device
            }
        };
        device.bind_to_thread().map_err(driver_error("cuCtxSetCurrent"))
    }

    fn toolkit_version(&self) -> Result<u32, DeviceError> {
        Ok(CUDA_TOOLKIT_VERSION)
    }

    fn driver_version(&self) -> Option<String> {
        std::fs::read_to_string(NVIDIA_PROC_VERSION)
            .ok()
            .and_then(|contents| parse_nvidia_proc_version(&contents))
            .or_else(|| {
                self.driver_api_version()
                    .ok()
                    .map(|v| format!("CUDA Driver Version: {}", v))
            })
    }
}
