//! Single-initialization registry cell

use std::sync::OnceLock;

use crate::error::DeviceError;
use crate::platform::Platform;
use crate::registry::DeviceRegistry;

/// Holds a registry discovered on first access.
///
/// Discovery runs exactly once even when several threads race to trigger it.
/// A failed discovery is kept as well: every caller receives the same error
/// and discovery is never retried.
pub struct SharedRegistry<P: Platform> {
    cell: OnceLock<Result<DeviceRegistry<P>, DeviceError>>,
}

impl<P: Platform> SharedRegistry<P> {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Return the registry, running `discover` if this is the first access
    pub fn get_or_discover<F>(&self, discover: F) -> Result<&DeviceRegistry<P>, DeviceError>
    where
        F: FnOnce() -> Result<DeviceRegistry<P>, DeviceError>,
    {
        self.cell.get_or_init(discover).as_ref().map_err(Clone::clone)
    }

    /// The registry, if discovery already ran and succeeded
    pub fn get(&self) -> Option<&DeviceRegistry<P>> {
        self.cell.get().and_then(|r| r.as_ref().ok())
    }
}

impl<P: Platform> Default for SharedRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use crate::device::Capability;
    use crate::platform::SimulatedPlatform;

    fn platform() -> SimulatedPlatform {
        SimulatedPlatform::new(vec![Capability {
            name: "Tesla T4".to_string(),
            major: 7,
            minor: 5,
            total_memory: 15 * 1024 * 1024 * 1024,
            clock_rate: 1_590_000,
            multiprocessors: 40,
        }])
    }

    #[test]
    fn test_concurrent_first_access_discovers_once() {
        let shared = SharedRegistry::new();
        let discoveries = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let registry = shared
                        .get_or_discover(|| {
                            discoveries.fetch_add(1, Ordering::SeqCst);
                            DeviceRegistry::discover(platform())
                        })
                        .unwrap();
                    assert_eq!(registry.device_count(), 1);
                });
            }
        });

        assert_eq!(discoveries.load(Ordering::SeqCst), 1);
        let registry = shared.get().unwrap();
        assert_eq!(registry.platform().count_queries(), 1);
        assert_eq!(registry.platform().switches(), vec![0]);
    }

    #[test]
    fn test_all_callers_share_one_registry() {
        let shared = SharedRegistry::new();
        let first = shared.get_or_discover(|| DeviceRegistry::discover(platform())).unwrap();
        let second = shared.get_or_discover(|| DeviceRegistry::discover(platform())).unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_failed_discovery_is_permanent() {
        let shared: SharedRegistry<SimulatedPlatform> = SharedRegistry::new();
        let attempts = AtomicUsize::new(0);
        let discover = || {
            attempts.fetch_add(1, Ordering::SeqCst);
            DeviceRegistry::discover(SimulatedPlatform::new(vec![]))
        };

        assert_eq!(shared.get_or_discover(discover).unwrap_err(), DeviceError::NoDevice);
        assert_eq!(shared.get_or_discover(discover).unwrap_err(), DeviceError::NoDevice);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(shared.get().is_none());
    }
}
