//! In-memory fakes for the platform capability traits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use bleuart::error::BleError;
use bleuart::platform::{BleBackend, CharacteristicHandle, PeerDevice, ServiceHandle};
use bleuart::types::DiscoveryEvent;

/// Backend with a scripted scan and a fixed set of connectable peers.
/// Connecting to an id without a peer behaves like an unreachable device.
pub struct MockBackend {
    pub peers: Mutex<HashMap<String, Arc<MockPeer>>>,
    pub scan_script: Mutex<Vec<DiscoveryEvent>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            peers: Mutex::new(HashMap::new()),
            scan_script: Mutex::new(Vec::new()),
        })
    }

    pub fn add_peer(&self, peer: Arc<MockPeer>) {
        self.peers.lock().unwrap().insert(peer.id.clone(), peer);
    }

    pub fn script_scan(&self, events: Vec<DiscoveryEvent>) {
        *self.scan_script.lock().unwrap() = events;
    }
}

#[async_trait]
impl BleBackend for MockBackend {
    async fn scan(
        &self,
        sink: mpsc::UnboundedSender<DiscoveryEvent>,
        _cancel: CancellationToken,
    ) -> Result<(), BleError> {
        for event in self.scan_script.lock().unwrap().drain(..) {
            let _ = sink.send(event);
        }
        Ok(())
    }

    async fn connect(&self, device_id: &str) -> Result<Arc<dyn PeerDevice>, BleError> {
        let peer = self.peers.lock().unwrap().get(device_id).cloned();
        match peer {
            Some(peer) => {
                peer.connects.fetch_add(1, Ordering::SeqCst);
                Ok(peer)
            }
            None => Err(BleError::DeviceUnavailable(format!(
                "peer {} unreachable",
                device_id
            ))),
        }
    }
}

pub struct MockPeer {
    pub id: String,
    pub name: String,
    pub services: Vec<Arc<MockService>>,
    pub fail_service_enumeration: bool,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl MockPeer {
    pub fn new(id: &str, services: Vec<Arc<MockService>>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            name: format!("{} peer", id),
            services,
            fail_service_enumeration: false,
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        })
    }

    pub fn failing_enumeration(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            name: format!("{} peer", id),
            services: Vec::new(),
            fail_service_enumeration: true,
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PeerDevice for MockPeer {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    async fn services(&self) -> Result<Vec<Arc<dyn ServiceHandle>>, BleError> {
        if self.fail_service_enumeration {
            return Err(BleError::AttributeEnumerationFailed(
                "peer dropped the link".to_string(),
            ));
        }
        Ok(self
            .services
            .iter()
            .map(|s| s.clone() as Arc<dyn ServiceHandle>)
            .collect())
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockService {
    pub id: String,
    pub characteristics: Vec<Arc<MockCharacteristic>>,
    pub fail_enumeration: bool,
}

impl MockService {
    pub fn new(id: &str, characteristics: Vec<Arc<MockCharacteristic>>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            characteristics,
            fail_enumeration: false,
        })
    }

    pub fn failing(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            characteristics: Vec::new(),
            fail_enumeration: true,
        })
    }
}

#[async_trait]
impl ServiceHandle for MockService {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn display_name(&self) -> String {
        self.id.clone()
    }

    async fn characteristics(&self) -> Result<Vec<Arc<dyn CharacteristicHandle>>, BleError> {
        if self.fail_enumeration {
            return Err(BleError::AttributeEnumerationFailed(
                "attribute read failed".to_string(),
            ));
        }
        Ok(self
            .characteristics
            .iter()
            .map(|c| c.clone() as Arc<dyn CharacteristicHandle>)
            .collect())
    }
}

/// How a mock characteristic answers a subscription attempt.
#[derive(Clone, Copy)]
pub enum SubscribeBehavior {
    Accept,
    Unsupported,
    Denied,
}

pub struct MockCharacteristic {
    pub id: String,
    pub subscribe_behavior: SubscribeBehavior,
    pub writes: Mutex<Vec<Vec<u8>>>,
    pub write_attempts: AtomicUsize,
    /// 0-based write attempt indices that fail as unsupported
    pub fail_writes_on: Vec<usize>,
    pub sinks: Mutex<Vec<mpsc::UnboundedSender<Vec<u8>>>>,
    pub cancels: Mutex<Vec<CancellationToken>>,
}

impl MockCharacteristic {
    pub fn new(id: &str, subscribe_behavior: SubscribeBehavior) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            subscribe_behavior,
            writes: Mutex::new(Vec::new()),
            write_attempts: AtomicUsize::new(0),
            fail_writes_on: Vec::new(),
            sinks: Mutex::new(Vec::new()),
            cancels: Mutex::new(Vec::new()),
        })
    }

    pub fn with_failing_writes(
        id: &str,
        subscribe_behavior: SubscribeBehavior,
        fail_writes_on: Vec<usize>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            subscribe_behavior,
            writes: Mutex::new(Vec::new()),
            write_attempts: AtomicUsize::new(0),
            fail_writes_on,
            sinks: Mutex::new(Vec::new()),
            cancels: Mutex::new(Vec::new()),
        })
    }

    /// Delivers a notification payload through the most recent
    /// subscription.
    pub fn push_notification(&self, payload: &[u8]) {
        if let Some(sink) = self.sinks.lock().unwrap().last() {
            let _ = sink.send(payload.to_vec());
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.cancels.lock().unwrap().len()
    }
}

#[async_trait]
impl CharacteristicHandle for MockCharacteristic {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn display_name(&self) -> String {
        self.id.clone()
    }

    async fn write_value(&self, data: &[u8]) -> Result<(), BleError> {
        let attempt = self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes_on.contains(&attempt) {
            return Err(BleError::UnsupportedOperation);
        }
        self.writes.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn subscribe(
        &self,
        sink: mpsc::UnboundedSender<Vec<u8>>,
        cancel: CancellationToken,
    ) -> Result<(), BleError> {
        match self.subscribe_behavior {
            SubscribeBehavior::Unsupported => Err(BleError::UnsupportedOperation),
            SubscribeBehavior::Denied => Err(BleError::PermissionDenied),
            SubscribeBehavior::Accept => {
                self.sinks.lock().unwrap().push(sink);
                self.cancels.lock().unwrap().push(cancel);
                Ok(())
            }
        }
    }
}
