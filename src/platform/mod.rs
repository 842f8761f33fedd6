//! Capability seams for the platform BLE stack.
//!
//! The session core only ever talks to these traits; the production
//! implementation over `bluest` lives in [`bluest_backend`], and the tests
//! drive the core through in-memory fakes. Backend-owned tasks deliver
//! asynchronous events through plain `mpsc` senders and are torn down with a
//! [`CancellationToken`]; they never touch session state directly.

pub mod bluest_backend;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::BleError;
use crate::types::DiscoveryEvent;

/// Discovery and connect capability of the local adapter.
#[async_trait]
pub trait BleBackend: Send + Sync {
    /// Starts a platform scan. Add/update/remove/completed events flow into
    /// `sink` from a backend-owned task until `cancel` fires or the sink
    /// closes.
    async fn scan(
        &self,
        sink: mpsc::UnboundedSender<DiscoveryEvent>,
        cancel: CancellationToken,
    ) -> Result<(), BleError>;

    /// Resolves a connected device handle from a discovery identity.
    /// A powered-off radio or unreachable peer is reported as
    /// [`BleError::DeviceUnavailable`].
    async fn connect(&self, device_id: &str) -> Result<Arc<dyn PeerDevice>, BleError>;
}

/// A connected peripheral.
#[async_trait]
pub trait PeerDevice: Send + Sync {
    fn id(&self) -> String;
    fn name(&self) -> String;

    /// Enumerates the device's top-level GATT services.
    async fn services(&self) -> Result<Vec<Arc<dyn ServiceHandle>>, BleError>;

    /// Releases the platform device handle.
    async fn disconnect(&self) -> Result<(), BleError>;
}

/// A GATT service on a connected peripheral.
#[async_trait]
pub trait ServiceHandle: Send + Sync {
    fn id(&self) -> String;
    fn display_name(&self) -> String;

    /// Enumerates the service's characteristics.
    async fn characteristics(&self) -> Result<Vec<Arc<dyn CharacteristicHandle>>, BleError>;
}

/// A GATT characteristic, the read/write/notify endpoint of the session.
#[async_trait]
pub trait CharacteristicHandle: Send + Sync {
    fn id(&self) -> String;
    fn display_name(&self) -> String;

    /// Writes bytes with response; resolves once the peer confirms receipt.
    async fn write_value(&self, data: &[u8]) -> Result<(), BleError>;

    /// Enables notifications (the platform writes the notify configuration
    /// descriptor) and forwards raw payloads into `sink` from a
    /// backend-owned task until `cancel` fires. A characteristic without
    /// notify support fails with [`BleError::UnsupportedOperation`]; a
    /// capability mismatch with [`BleError::PermissionDenied`].
    async fn subscribe(
        &self,
        sink: mpsc::UnboundedSender<Vec<u8>>,
        cancel: CancellationToken,
    ) -> Result<(), BleError>;
}
