//! Device registry: discovery, ranking and active-device selection

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::device::{Capability, DeviceDescriptor};
use crate::error::DeviceError;
use crate::info::{device_summary, platform_summary, report_header};
use crate::platform::Platform;
use crate::sort::{self, SortMode};

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Ranking applied right after discovery
    pub sort_mode: SortMode,
    /// Ordered position activated after discovery
    pub initial_device: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            sort_mode: SortMode::NativeOrder,
            initial_device: 0,
        }
    }
}

#[derive(Debug)]
struct RegistryState {
    devices: Vec<DeviceDescriptor>,
    /// Native id of the active device
    active: usize,
}

impl RegistryState {
    /// Single range check shared by every positional accessor
    fn device_at(&self, position: usize) -> Result<&DeviceDescriptor, DeviceError> {
        self.devices
            .get(position)
            .ok_or(DeviceError::InvalidDevice {
                position,
                count: self.devices.len(),
            })
    }

    fn position_of(&self, native_id: usize) -> Option<usize> {
        self.devices.iter().position(|d| d.native_id == native_id)
    }

    fn active_position(&self) -> usize {
        // `active` always names a discovered device
        self.position_of(self.active).unwrap_or_default()
    }
}

/// Discovered compute devices plus the active-device selection.
///
/// Discovery happens once, in the constructor; the device set is fixed
/// afterwards. The active device is tracked by native id, so reordering the
/// list never changes which device is active.
#[derive(Debug)]
pub struct DeviceRegistry<P: Platform> {
    platform: P,
    state: RwLock<RegistryState>,
}

impl<P: Platform> DeviceRegistry<P> {
    /// Discover devices with the default configuration
    pub fn discover(platform: P) -> Result<Self, DeviceError> {
        Self::with_config(platform, &RegistryConfig::default())
    }

    /// Discover devices, rank them and activate the configured device
    pub fn with_config(platform: P, config: &RegistryConfig) -> Result<Self, DeviceError> {
        let count = platform.device_count()?;
        if count == 0 {
            return Err(DeviceError::NoDevice);
        }

        info!("Found {} CUDA device(s)", count);

        let mut devices = Vec::with_capacity(count);
        for native_id in 0..count {
            let device = DeviceDescriptor::new(native_id, platform.capability(native_id)?);
            debug!(
                "Device {}: {} (compute {}, {} MB, score {})",
                native_id,
                device.capability.name,
                device.capability.compute_capability(),
                device.capability.memory_mb(),
                device.throughput_score
            );
            devices.push(device);
        }

        if config.initial_device >= count {
            return Err(DeviceError::InvalidConfig {
                initial_device: config.initial_device,
                count,
            });
        }

        sort::sort_devices(&mut devices, config.sort_mode);

        let first = devices.first().map(|d| d.native_id).ok_or(DeviceError::NoDevice)?;
        let registry = Self {
            platform,
            state: RwLock::new(RegistryState {
                devices,
                active: first,
            }),
        };
        registry.set_active_device(config.initial_device)?;

        Ok(registry)
    }

    /// Underlying platform
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Number of discovered devices
    pub fn device_count(&self) -> usize {
        self.state.read().devices.len()
    }

    /// Ordered position of the active device
    pub fn active_device_id(&self) -> usize {
        self.state.read().active_position()
    }

    /// Native id of the active device
    pub fn active_native_id(&self) -> usize {
        self.state.read().active
    }

    /// Native id of the device at `position`
    pub fn native_id(&self, position: usize) -> Result<usize, DeviceError> {
        self.state.read().device_at(position).map(|d| d.native_id)
    }

    /// Capability descriptor of the device at `position`
    pub fn capability_of(&self, position: usize) -> Result<Capability, DeviceError> {
        self.state
            .read()
            .device_at(position)
            .map(|d| d.capability.clone())
    }

    /// Snapshot of the devices in ranked order
    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        self.state.read().devices.clone()
    }

    /// Reorder the device list; the active device is unchanged
    pub fn sort_devices(&self, mode: SortMode) {
        let mut state = self.state.write();
        sort::sort_devices(&mut state.devices, mode);
        debug!("Devices sorted by {}", mode);
    }

    /// Activate the device at `position`.
    ///
    /// Returns the previously active position so the caller can restore it.
    /// A failed native switch leaves the previous device active.
    pub fn set_active_device(&self, position: usize) -> Result<usize, DeviceError> {
        self.switch_to(position).map(|(previous, _)| previous)
    }

    /// Activate the device at `position` until the returned guard is dropped
    pub fn scoped_device(&self, position: usize) -> Result<ScopedDevice<'_, P>, DeviceError> {
        let (_, previous_native) = self.switch_to(position)?;
        Ok(ScopedDevice {
            registry: self,
            previous_native,
        })
    }

    /// Switch under one write lock, returning the previous (position, native id)
    fn switch_to(&self, position: usize) -> Result<(usize, usize), DeviceError> {
        let mut state = self.state.write();
        let previous = (state.active_position(), state.active);
        let native_id = state.device_at(position)?.native_id;

        self.platform.set_device(native_id)?;
        state.active = native_id;

        info!("Active CUDA device: position {} (native {})", position, native_id);
        Ok(previous)
    }

    fn restore_native(&self, native_id: usize) -> Result<(), DeviceError> {
        let mut state = self.state.write();
        if state.position_of(native_id).is_none() {
            return Err(DeviceError::InvalidDevice {
                position: native_id,
                count: state.devices.len(),
            });
        }
        self.platform.set_device(native_id)?;
        state.active = native_id;
        Ok(())
    }

    /// Toolkit and driver line
    pub fn platform_summary(&self) -> Result<String, DeviceError> {
        let toolkit = self.platform.toolkit_version()?;
        let driver = self.platform.driver_version();
        Ok(platform_summary(toolkit, driver.as_deref()))
    }

    /// One-line description of the device at `position`
    pub fn device_summary(&self, position: usize) -> Result<String, DeviceError> {
        let state = self.state.read();
        let device = state.device_at(position)?;
        let active = device.native_id == state.active;
        Ok(device_summary(position, &device.capability, active))
    }

    /// Library header, platform line and every device line
    pub fn full_report(&self) -> Result<String, DeviceError> {
        let mut report = report_header();
        report.push_str(&self.platform_summary()?);

        let state = self.state.read();
        for (position, device) in state.devices.iter().enumerate() {
            let active = device.native_id == state.active;
            report.push_str(&device_summary(position, &device.capability, active));
        }
        Ok(report)
    }
}

/// Guard returned by [`DeviceRegistry::scoped_device`].
///
/// Reactivates the previously active device on drop. A failed restore is
/// logged, never raised.
#[must_use = "the previous device is restored as soon as the guard is dropped"]
pub struct ScopedDevice<'a, P: Platform> {
    registry: &'a DeviceRegistry<P>,
    previous_native: usize,
}

impl<P: Platform> ScopedDevice<'_, P> {
    /// Native id restored on drop
    pub fn previous_native_id(&self) -> usize {
        self.previous_native
    }
}

impl<P: Platform> Drop for ScopedDevice<'_, P> {
    fn drop(&mut self) {
        if let Err(e) = self.registry.restore_native(self.previous_native) {
            warn!(
                "Failed to restore CUDA device (native {}): {}",
                self.previous_native, e
            );
        }
    }
}
