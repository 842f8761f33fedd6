//! Shared value types for the session core: discovered-device and GATT
//! attribute records, and the events marshaled onto the owner context.

use std::fmt;
use std::sync::Arc;

use crate::platform::{CharacteristicHandle, ServiceHandle};

/// A discovered BLE device as shown in the device list.
///
/// Identity is the opaque platform `id`; name, address and RSSI are
/// informational and may be updated in place while scanning.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DeviceRecord {
    /// Platform-stable unique identifier for the device
    pub id: String,
    /// Advertised name; the watcher never admits records with an empty name
    pub name: String,
    /// MAC address where the platform exposes one, "N/A" otherwise
    pub address: String,
    /// Last observed signal strength
    pub rssi: Option<i16>,
}

impl DeviceRecord {
    pub fn new(id: String, name: String, address: String, rssi: Option<i16>) -> Self {
        Self {
            id,
            name,
            address,
            rssi,
        }
    }

    /// Merges the mutable fields of an update into this record. Identity is
    /// never touched.
    pub fn apply_update(&mut self, update: &DeviceUpdate) {
        if let Some(name) = &update.name {
            if !name.is_empty() {
                self.name = name.clone();
            }
        }
        if let Some(rssi) = update.rssi {
            self.rssi = Some(rssi);
        }
    }
}

/// Partial update for an already-discovered device.
#[derive(Debug, Clone, Default)]
pub struct DeviceUpdate {
    pub id: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

/// Raw discovery events delivered by the platform scan.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    DeviceAdded(DeviceRecord),
    DeviceUpdated(DeviceUpdate),
    DeviceRemoved { id: String },
    EnumerationCompleted,
}

/// Whether an attribute record names a service or a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AttributeKind {
    Service,
    Characteristic,
}

/// A GATT service or characteristic enumerated from the current connection.
///
/// Owns the capability handle to the underlying platform object; the record
/// is only valid for the lifetime of the connection that produced it.
#[derive(Clone)]
pub struct AttributeRecord {
    id: String,
    kind: AttributeKind,
    display_name: String,
    handle: AttributeHandle,
}

#[derive(Clone)]
enum AttributeHandle {
    Service(Arc<dyn ServiceHandle>),
    Characteristic(Arc<dyn CharacteristicHandle>),
}

impl AttributeRecord {
    pub fn service(handle: Arc<dyn ServiceHandle>) -> Self {
        Self {
            id: handle.id(),
            kind: AttributeKind::Service,
            display_name: handle.display_name(),
            handle: AttributeHandle::Service(handle),
        }
    }

    pub fn characteristic(handle: Arc<dyn CharacteristicHandle>) -> Self {
        Self {
            id: handle.id(),
            kind: AttributeKind::Characteristic,
            display_name: handle.display_name(),
            handle: AttributeHandle::Characteristic(handle),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub(crate) fn service_handle(&self) -> Option<Arc<dyn ServiceHandle>> {
        match &self.handle {
            AttributeHandle::Service(h) => Some(h.clone()),
            AttributeHandle::Characteristic(_) => None,
        }
    }

    pub(crate) fn characteristic_handle(&self) -> Option<Arc<dyn CharacteristicHandle>> {
        match &self.handle {
            AttributeHandle::Service(_) => None,
            AttributeHandle::Characteristic(h) => Some(h.clone()),
        }
    }
}

impl fmt::Debug for AttributeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeRecord")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Events marshaled from platform tasks onto the single owner context.
///
/// Every event carries the watcher generation or connection epoch it was
/// issued under so the dispatcher can drop stale deliveries.
#[derive(Debug)]
pub enum SessionEvent {
    Discovery {
        generation: u64,
        event: DiscoveryEvent,
    },
    Notification {
        epoch: u64,
        payload: Vec<u8>,
    },
}
