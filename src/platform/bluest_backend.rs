//! Production capability implementation over the `bluest` cross-platform
//! BLE stack.
//!
//! Scan and notification deliveries are pumped by backend-owned tasks into
//! the sinks handed down from the core; the shared device map keeps the raw
//! `bluest::Device` handles so a discovery identity can later be resolved
//! into a connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, Device, Service};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use regex::Regex;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::constants::{gatt_display_name, SCAN_ENUMERATION_WINDOW};
use crate::error::BleError;
use crate::platform::{BleBackend, CharacteristicHandle, PeerDevice, ServiceHandle};
use crate::types::{DeviceRecord, DeviceUpdate, DiscoveryEvent};

pub struct BluestBackend {
    adapter: Adapter,
    /// Raw device handles keyed by the opaque platform id
    devices: Arc<Mutex<HashMap<String, Device>>>,
}

impl BluestBackend {
    pub async fn new() -> Result<Self, BleError> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| BleError::Platform("no Bluetooth adapter found".to_string()))?;
        adapter.wait_available().await.map_err(classify)?;
        info!("Bluetooth adapter is available");
        Ok(Self {
            adapter,
            devices: Arc::new(Mutex::new(HashMap::new())),
        })
    }
}

#[async_trait]
impl BleBackend for BluestBackend {
    async fn scan(
        &self,
        sink: mpsc::UnboundedSender<DiscoveryEvent>,
        cancel: CancellationToken,
    ) -> Result<(), BleError> {
        self.devices.lock().unwrap().clear();

        let adapter = self.adapter.clone();
        let devices = self.devices.clone();
        tokio::spawn(async move {
            if let Err(e) = scan_task(adapter, devices, sink, cancel).await {
                error!("scan task failed: {}", e);
            }
        });
        Ok(())
    }

    async fn connect(&self, device_id: &str) -> Result<Arc<dyn PeerDevice>, BleError> {
        let device = {
            let devices = self.devices.lock().unwrap();
            devices.get(device_id).cloned()
        }
        .ok_or_else(|| BleError::DeviceUnavailable(format!("unknown device id {}", device_id)))?;

        if !device.is_connected().await {
            info!("initiating connection to {}", device_id);
            self.adapter
                .connect_device(&device)
                .await
                .map_err(classify)?;
        }
        Ok(Arc::new(BluestPeer {
            adapter: self.adapter.clone(),
            device,
        }))
    }
}

async fn scan_task(
    adapter: Adapter,
    devices: Arc<Mutex<HashMap<String, Device>>>,
    sink: mpsc::UnboundedSender<DiscoveryEvent>,
    cancel: CancellationToken,
) -> Result<(), BleError> {
    // Devices that are already connected never advertise; surface them
    // before the live scan starts.
    match adapter.connected_devices().await {
        Ok(connected) => {
            for device in connected {
                let record = record_for(&device, None);
                devices.lock().unwrap().insert(record.id.clone(), device);
                let _ = sink.send(DiscoveryEvent::DeviceAdded(record));
            }
        }
        Err(e) => warn!("connected-device sweep failed: {}", e),
    }

    info!("starting BLE scan");
    let mut stream = adapter.scan(&[]).await.map_err(classify)?;

    let window = tokio::time::sleep(SCAN_ENUMERATION_WINDOW);
    tokio::pin!(window);
    let mut window_elapsed = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = &mut window, if !window_elapsed => {
                window_elapsed = true;
                if sink.send(DiscoveryEvent::EnumerationCompleted).is_err() {
                    break;
                }
            }
            item = stream.next() => match item {
                Some(sighting) => {
                    let device = sighting.device;
                    let rssi = sighting.rssi;
                    let id = device.id().to_string();
                    let known = devices.lock().unwrap().contains_key(&id);
                    let event = if known {
                        DiscoveryEvent::DeviceUpdated(DeviceUpdate {
                            id,
                            name: device.name().ok(),
                            rssi,
                        })
                    } else {
                        debug!("sighted {} (rssi {:?})", id, rssi);
                        let record = record_for(&device, rssi);
                        devices.lock().unwrap().insert(id, device);
                        DiscoveryEvent::DeviceAdded(record)
                    };
                    if sink.send(event).is_err() {
                        break;
                    }
                }
                None => {
                    info!("scan stream ended");
                    break;
                }
            },
        }
    }

    if !window_elapsed {
        let _ = sink.send(DiscoveryEvent::EnumerationCompleted);
    }
    info!("scan task finished");
    Ok(())
}

fn record_for(device: &Device, rssi: Option<i16>) -> DeviceRecord {
    let id = device.id().to_string();
    let name = device.name().unwrap_or_default();
    let address = extract_mac_address(&id).unwrap_or_else(|| "N/A".to_string());
    DeviceRecord::new(id, name, address, rssi)
}

/// Pulls a MAC address out of the platform id where one is embedded
/// (Windows and Linux; macOS ids are opaque UUIDs).
fn extract_mac_address(device_id_str: &str) -> Option<String> {
    let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").unwrap();
    re.find_iter(device_id_str)
        .last()
        .map(|m| m.as_str().to_string().to_uppercase())
}

struct BluestPeer {
    adapter: Adapter,
    device: Device,
}

#[async_trait]
impl PeerDevice for BluestPeer {
    fn id(&self) -> String {
        self.device.id().to_string()
    }

    fn name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown".to_string())
    }

    async fn services(&self) -> Result<Vec<Arc<dyn ServiceHandle>>, BleError> {
        let services = self
            .device
            .services()
            .await
            .map_err(classify_enumeration)?;
        Ok(services
            .into_iter()
            .map(|service| Arc::new(BluestService { service }) as Arc<dyn ServiceHandle>)
            .collect())
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        if self.device.is_connected().await {
            info!("disconnecting from {}", self.device.id());
            self.adapter
                .disconnect_device(&self.device)
                .await
                .map_err(classify)?;
        }
        Ok(())
    }
}

struct BluestService {
    service: Service,
}

#[async_trait]
impl ServiceHandle for BluestService {
    fn id(&self) -> String {
        self.service.uuid().to_string()
    }

    fn display_name(&self) -> String {
        gatt_display_name(&self.service.uuid())
    }

    async fn characteristics(&self) -> Result<Vec<Arc<dyn CharacteristicHandle>>, BleError> {
        let characteristics = self
            .service
            .characteristics()
            .await
            .map_err(classify_enumeration)?;
        Ok(characteristics
            .into_iter()
            .map(|characteristic| {
                Arc::new(BluestCharacteristic { characteristic }) as Arc<dyn CharacteristicHandle>
            })
            .collect())
    }
}

struct BluestCharacteristic {
    characteristic: Characteristic,
}

#[async_trait]
impl CharacteristicHandle for BluestCharacteristic {
    fn id(&self) -> String {
        self.characteristic.uuid().to_string()
    }

    fn display_name(&self) -> String {
        gatt_display_name(&self.characteristic.uuid())
    }

    async fn write_value(&self, data: &[u8]) -> Result<(), BleError> {
        self.characteristic.write(data).await.map_err(classify)
    }

    async fn subscribe(
        &self,
        sink: mpsc::UnboundedSender<Vec<u8>>,
        cancel: CancellationToken,
    ) -> Result<(), BleError> {
        let properties = self.characteristic.properties().await.map_err(classify)?;
        if !properties.notify && !properties.indicate {
            return Err(BleError::UnsupportedOperation);
        }

        let characteristic = self.characteristic.clone();
        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(async move {
            // notify() performs the configuration descriptor write; dropping
            // the stream reverts it. The stream borrows the characteristic,
            // so enabling has to happen inside the task that owns it.
            let mut stream = match characteristic.notify().await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(classify(e)));
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    item = stream.next() => match item {
                        Some(Ok(payload)) => {
                            if sink.send(payload).is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            error!("notification stream error: {}", e);
                            break;
                        }
                        None => break,
                    },
                }
            }
            debug!("notification stream ended");
        });

        ready_rx
            .await
            .map_err(|_| BleError::Platform("notification task exited early".to_string()))?
    }
}

fn classify(err: bluest::Error) -> BleError {
    use bluest::error::ErrorKind;

    match err.kind() {
        ErrorKind::NotSupported => BleError::UnsupportedOperation,
        ErrorKind::NotAuthorized => BleError::PermissionDenied,
        ErrorKind::AdapterUnavailable
        | ErrorKind::ConnectionFailed
        | ErrorKind::NotConnected
        | ErrorKind::NotReady
        | ErrorKind::Timeout => BleError::DeviceUnavailable(err.to_string()),
        _ => BleError::Platform(err.to_string()),
    }
}

/// Like [`classify`], but folds loud failures into the recoverable
/// enumeration class: the original behavior is an empty child list, not a
/// fault.
fn classify_enumeration(err: bluest::Error) -> BleError {
    match classify(err) {
        BleError::Platform(msg) | BleError::DeviceUnavailable(msg) => {
            BleError::AttributeEnumerationFailed(msg)
        }
        other => other,
    }
}
