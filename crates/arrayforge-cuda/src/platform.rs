//! Native platform abstraction
//!
//! The registry talks to the driver only through [`Platform`], so discovery
//! and selection can run against real hardware or a simulated device set.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::device::Capability;
use crate::error::DeviceError;

/// Driver operations needed for device discovery and selection
pub trait Platform: Send + Sync {
    /// Number of devices visible to the driver
    fn device_count(&self) -> Result<usize, DeviceError>;

    /// Capability descriptor for a native device index
    fn capability(&self, native_id: usize) -> Result<Capability, DeviceError>;

    /// Make a native device the target of subsequent compute calls
    fn set_device(&self, native_id: usize) -> Result<(), DeviceError>;

    /// Toolkit version encoded as `1000 * major + 10 * minor`
    fn toolkit_version(&self) -> Result<u32, DeviceError>;

    /// Human-readable driver version, if the platform can report one
    fn driver_version(&self) -> Option<String>;
}

impl<P: Platform + ?Sized> Platform for Box<P> {
    fn device_count(&self) -> Result<usize, DeviceError> {
        (**self).device_count()
    }

    fn capability(&self, native_id: usize) -> Result<Capability, DeviceError> {
        (**self).capability(native_id)
    }

    fn set_device(&self, native_id: usize) -> Result<(), DeviceError> {
        (**self).set_device(native_id)
    }

    fn toolkit_version(&self) -> Result<u32, DeviceError> {
        (**self).toolkit_version()
    }

    fn driver_version(&self) -> Option<String> {
        (**self).driver_version()
    }
}

/// In-memory platform with a fixed device set
#[derive(Debug)]
pub struct SimulatedPlatform {
    devices: Vec<Capability>,
    toolkit_version: u32,
    driver_version: Option<String>,
    fail_switches: AtomicBool,
    switches: Mutex<Vec<usize>>,
    count_queries: AtomicUsize,
}

impl SimulatedPlatform {
    /// Create a platform exposing `devices` in native order
    pub fn new(devices: Vec<Capability>) -> Self {
        Self {
            devices,
            toolkit_version: 12050,
            driver_version: None,
            fail_switches: AtomicBool::new(false),
            switches: Mutex::new(Vec::new()),
            count_queries: AtomicUsize::new(0),
        }
    }

    pub fn with_toolkit_version(mut self, version: u32) -> Self {
        self.toolkit_version = version;
        self
    }

    pub fn with_driver_version(mut self, version: impl Into<String>) -> Self {
        self.driver_version = Some(version.into());
        self
    }

    /// Make every following `set_device` call fail
    pub fn fail_switches(&self, fail: bool) {
        self.fail_switches.store(fail, Ordering::SeqCst);
    }

    /// Native ids passed to successful `set_device` calls, oldest first
    pub fn switches(&self) -> Vec<usize> {
        self.switches.lock().clone()
    }

    /// How many times the device count was queried
    pub fn count_queries(&self) -> usize {
        self.count_queries.load(Ordering::SeqCst)
    }
}

impl Platform for SimulatedPlatform {
    fn device_count(&self) -> Result<usize, DeviceError> {
        self.count_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.devices.len())
    }

    fn capability(&self, native_id: usize) -> Result<Capability, DeviceError> {
        self.devices
            .get(native_id)
            .cloned()
            .ok_or_else(|| DeviceError::driver("cuDeviceGet", "CUDA_ERROR_INVALID_DEVICE"))
    }

    fn set_device(&self, native_id: usize) -> Result<(), DeviceError> {
        if self.fail_switches.load(Ordering::SeqCst) {
            return Err(DeviceError::driver("cuCtxSetCurrent", "CUDA_ERROR_INVALID_CONTEXT"));
        }
        if native_id >= self.devices.len() {
            return Err(DeviceError::driver("cuCtxSetCurrent", "CUDA_ERROR_INVALID_DEVICE"));
        }
        self.switches.lock().push(native_id);
        Ok(())
    }

    fn toolkit_version(&self) -> Result<u32, DeviceError> {
        Ok(self.toolkit_version)
    }

    fn driver_version(&self) -> Option<String> {
        self.driver_version.clone()
    }
}
