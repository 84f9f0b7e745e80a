//! Device registry errors

use thiserror::Error;

/// Errors raised by device discovery, lookup and selection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("No CUDA-capable devices found")]
    NoDevice,
    #[error("CUDA error in {call}: {message}")]
    Driver {
        /// Native call that failed
        call: &'static str,
        message: String,
    },
    #[error("Invalid device position {position} (device count: {count})")]
    InvalidDevice { position: usize, count: usize },
    #[error("Configured initial device {initial_device} is out of range (device count: {count})")]
    InvalidConfig { initial_device: usize, count: usize },
}

impl DeviceError {
    /// Build a driver error for the named native call
    pub fn driver(call: &'static str, message: impl Into<String>) -> Self {
        DeviceError::Driver {
            call,
            message: message.into(),
        }
    }

    /// Whether the error leaves the backend without a usable device.
    ///
    /// Out-of-range lookups are local to the caller; everything else means
    /// construction or a context switch failed and will not succeed on retry.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DeviceError::InvalidDevice { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(DeviceError::NoDevice.is_fatal());
        assert!(DeviceError::driver("cuDeviceGetCount", "CUDA_ERROR_NOT_INITIALIZED").is_fatal());
        assert!(!DeviceError::InvalidDevice { position: 3, count: 2 }.is_fatal());
        assert!(DeviceError::InvalidConfig { initial_device: 3, count: 2 }.is_fatal());
    }

    #[test]
    fn test_driver_message_names_call_site() {
        let err = DeviceError::driver("cuCtxSetCurrent", "CUDA_ERROR_INVALID_CONTEXT");
        assert_eq!(
            err.to_string(),
            "CUDA error in cuCtxSetCurrent: CUDA_ERROR_INVALID_CONTEXT"
        );
    }
}
