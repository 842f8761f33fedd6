//! Connection ownership and GATT attribute selection.
//!
//! At most one connection is live process-wide. Selecting a device releases
//! the previous connection (subscription cancelled, device handle
//! disconnected, derived attribute records dropped) before the new one is
//! acquired, as a single transition. Each connection carries an epoch number
//! so notification payloads from a superseded connection can be recognized
//! and dropped at the dispatch point.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::BleError;
use crate::platform::{BleBackend, PeerDevice};
use crate::types::{AttributeRecord, SessionEvent};

/// The single active notification registration of a connection.
struct Subscription {
    characteristic_id: String,
    cancel: CancellationToken,
}

/// An owned, live device connection and everything derived from it.
struct Connection {
    epoch: u64,
    device: Arc<dyn PeerDevice>,
    subscription: Option<Subscription>,
}

pub struct SessionManager {
    backend: Arc<dyn BleBackend>,
    connection: Option<Connection>,
    services: Vec<AttributeRecord>,
    characteristics: Vec<AttributeRecord>,
    selected_characteristic: Option<AttributeRecord>,
    next_epoch: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn BleBackend>, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            backend,
            connection: None,
            services: Vec::new(),
            characteristics: Vec::new(),
            selected_characteristic: None,
            next_epoch: 0,
            events,
        }
    }

    /// Connects to a discovered device and enumerates its services.
    ///
    /// The previous connection is released first regardless of whether the
    /// new id resolves. An unreachable device (radio off, peer out of range)
    /// is absorbed: the session is left with no connection and empty lists,
    /// and the call still returns `Ok`.
    pub async fn select_device(&mut self, device_id: &str) -> Result<(), BleError> {
        self.release().await;

        let device = match self.backend.connect(device_id).await {
            Ok(device) => device,
            Err(BleError::DeviceUnavailable(reason)) => {
                warn!("device {} unavailable: {}", device_id, reason);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.next_epoch += 1;
        info!("connected to {} ({})", device.name(), device.id());
        let handle = device.clone();
        self.connection = Some(Connection {
            epoch: self.next_epoch,
            device,
            subscription: None,
        });

        match handle.services().await {
            Ok(services) => {
                self.services = services.into_iter().map(AttributeRecord::service).collect();
                info!("enumerated {} service(s)", self.services.len());
            }
            Err(e) => {
                // Recoverable: the consumer sees an empty service list.
                warn!("service enumeration failed, showing none: {}", e);
            }
        }
        Ok(())
    }

    /// Enumerates the characteristics of one of the current services.
    ///
    /// Enumeration failures at the platform layer are a per-device,
    /// recoverable class: the characteristic list is left empty and the
    /// session stays usable.
    pub async fn select_service(&mut self, service_id: &str) -> Result<(), BleError> {
        self.characteristics.clear();
        self.selected_characteristic = None;

        let Some(record) = self
            .services
            .iter()
            .find(|s| s.id() == service_id)
            .cloned()
        else {
            debug!("service {} is not in the current enumeration", service_id);
            return Ok(());
        };
        let Some(handle) = record.service_handle() else {
            return Ok(());
        };

        match handle.characteristics().await {
            Ok(chars) => {
                self.characteristics = chars
                    .into_iter()
                    .map(AttributeRecord::characteristic)
                    .collect();
                info!(
                    "enumerated {} characteristic(s) under {}",
                    self.characteristics.len(),
                    record.display_name()
                );
            }
            Err(e) => {
                warn!(
                    "characteristic enumeration failed under {}: {}",
                    record.display_name(),
                    e
                );
            }
        }
        Ok(())
    }

    /// Selects a characteristic as the terminal endpoint and tries to enable
    /// notifications on it.
    ///
    /// Three outcomes, all of which leave the characteristic selected and
    /// usable for writes: notifications wired up; the characteristic lacks
    /// notify support; or the platform denies access. Only unexpected
    /// platform failures propagate.
    pub async fn select_characteristic(&mut self, characteristic_id: &str) -> Result<(), BleError> {
        let Some(record) = self
            .characteristics
            .iter()
            .find(|c| c.id() == characteristic_id)
            .cloned()
        else {
            debug!(
                "characteristic {} is not in the current enumeration",
                characteristic_id
            );
            return Ok(());
        };
        let Some(handle) = record.characteristic_handle() else {
            return Ok(());
        };
        let Some(connection) = self.connection.as_mut() else {
            return Ok(());
        };

        // At most one subscription: replace whatever was registered before.
        if let Some(previous) = connection.subscription.take() {
            debug!(
                "dropping previous subscription on {}",
                previous.characteristic_id
            );
            previous.cancel.cancel();
        }

        self.selected_characteristic = Some(record.clone());

        let cancel = CancellationToken::new();
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        match handle.subscribe(raw_tx, cancel.clone()).await {
            Ok(()) => {
                let epoch = connection.epoch;
                let events = self.events.clone();
                let pump_cancel = cancel.clone();
                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            _ = pump_cancel.cancelled() => break,
                            payload = raw_rx.recv() => match payload {
                                Some(payload) => {
                                    if events
                                        .send(SessionEvent::Notification { epoch, payload })
                                        .is_err()
                                    {
                                        break;
                                    }
                                }
                                None => break,
                            },
                        }
                    }
                });
                connection.subscription = Some(Subscription {
                    characteristic_id: record.id().to_string(),
                    cancel,
                });
                info!("notifications enabled on {}", record.display_name());
            }
            Err(BleError::UnsupportedOperation) => {
                info!(
                    "{} does not support notifications; writes only",
                    record.display_name()
                );
            }
            Err(BleError::PermissionDenied) => {
                warn!(
                    "notification access denied on {}; writes only",
                    record.display_name()
                );
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Releases the current connection, if any: the subscription is
    /// cancelled, the device handle disconnected and all derived attribute
    /// records dropped.
    pub async fn release(&mut self) {
        self.services.clear();
        self.characteristics.clear();
        self.selected_characteristic = None;

        if let Some(mut connection) = self.connection.take() {
            if let Some(subscription) = connection.subscription.take() {
                debug!("unsubscribing from {}", subscription.characteristic_id);
                subscription.cancel.cancel();
            }
            if let Err(e) = connection.device.disconnect().await {
                warn!("failed to release the device handle cleanly: {}", e);
            }
        }
    }

    /// True when `epoch` belongs to the connection that is still current.
    pub fn is_current_epoch(&self, epoch: u64) -> bool {
        self.connection.as_ref().map(|c| c.epoch) == Some(epoch)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connected_device_id(&self) -> Option<String> {
        self.connection.as_ref().map(|c| c.device.id())
    }

    pub fn has_subscription(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| c.subscription.is_some())
            .unwrap_or(false)
    }

    pub fn services(&self) -> &[AttributeRecord] {
        &self.services
    }

    pub fn characteristics(&self) -> &[AttributeRecord] {
        &self.characteristics
    }

    pub fn selected_characteristic(&self) -> Option<&AttributeRecord> {
        self.selected_characteristic.as_ref()
    }
}
