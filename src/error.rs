//! Classified errors for the BLE session core.
//!
//! The recoverable classes are absorbed at the component boundary where they
//! occur and leave observable empty state; only `Platform` is expected to
//! propagate out of a public operation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BleError {
    /// The radio is off or the peer is unreachable. Recoverable: the session
    /// is left with no connection.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Service or characteristic enumeration failed at the platform layer.
    /// Recoverable: the child list is left empty.
    #[error("attribute enumeration failed: {0}")]
    AttributeEnumerationFailed(String),

    /// The characteristic does not support the requested operation
    /// (typically notify or write). Recoverable: skip and continue.
    #[error("operation not supported by the characteristic")]
    UnsupportedOperation,

    /// The platform denied access to the characteristic. Commonly a device
    /// that advertises notify support it does not actually have.
    #[error("access to the characteristic was denied")]
    PermissionDenied,

    /// The device watcher is already scanning.
    #[error("device watcher is already running")]
    AlreadyRunning,

    /// Unexpected platform failure. Not absorbed anywhere; better to fail
    /// loudly than to keep mutating state after the stack misbehaved.
    #[error("platform error: {0}")]
    Platform(String),
}

impl BleError {
    /// True for the two write-path failures that skip the current character
    /// and continue with the rest of the sequence.
    pub fn is_skippable_write_failure(&self) -> bool {
        matches!(
            self,
            BleError::UnsupportedOperation | BleError::PermissionDenied
        )
    }
}
