//! Device discovery lifecycle and the discovered-device registry.
//!
//! The watcher owns the scan pump task and a display-ordered registry keyed
//! by device id. Every start hands out a fresh generation number; discovery
//! events are tagged with it at the platform boundary and [`DeviceWatcher::apply`]
//! drops anything tagged with a superseded generation, which is the race
//! guard for events still in flight when the watcher is stopped or
//! restarted.

use std::sync::Arc;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::BleError;
use crate::platform::BleBackend;
use crate::types::{DeviceRecord, DeviceUpdate, DiscoveryEvent, SessionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Stopped,
    Scanning,
}

pub struct DeviceWatcher {
    /// Discovery-ordered registry; lookup is always by id, never by position
    devices: Vec<DeviceRecord>,
    state: WatcherState,
    /// Monotonically increasing; bumped on every start
    generation: u64,
    /// Generation whose events are currently accepted; `None` while stopped
    active: Option<u64>,
    cancel_token: CancellationToken,
    pump_task: Option<JoinHandle<()>>,
    enumeration_complete: bool,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl DeviceWatcher {
    pub fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            devices: Vec::new(),
            state: WatcherState::Stopped,
            generation: 0,
            active: None,
            cancel_token: CancellationToken::new(),
            pump_task: None,
            enumeration_complete: false,
            events,
        }
    }

    /// Starts a discovery scan under a fresh generation.
    ///
    /// The registry starts over empty, matching the platform watcher
    /// lifecycle: a restart implicitly releases everything discovered
    /// before.
    pub async fn start(&mut self, backend: &Arc<dyn BleBackend>) -> Result<(), BleError> {
        if self.state == WatcherState::Scanning {
            return Err(BleError::AlreadyRunning);
        }

        self.devices.clear();
        self.enumeration_complete = false;
        self.generation += 1;
        self.cancel_token = CancellationToken::new();

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        backend.scan(raw_tx, self.cancel_token.clone()).await?;

        let generation = self.generation;
        let events = self.events.clone();
        let cancel = self.cancel_token.clone();
        self.pump_task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    ev = raw_rx.recv() => match ev {
                        Some(event) => {
                            if events
                                .send(SessionEvent::Discovery { generation, event })
                                .is_err()
                            {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        }));

        self.active = Some(generation);
        self.state = WatcherState::Scanning;
        info!("device watcher started (generation {})", generation);
        Ok(())
    }

    /// Stops the scan and invalidates the current generation, so any event
    /// already in flight is discarded when it reaches [`DeviceWatcher::apply`].
    /// The registry keeps its contents until the next start.
    pub fn stop(&mut self) {
        if self.state == WatcherState::Stopped {
            return;
        }
        self.cancel_token.cancel();
        self.pump_task = None;
        self.active = None;
        self.state = WatcherState::Stopped;
        info!(
            "device watcher stopped; {} device(s) in the registry",
            self.devices.len()
        );
    }

    /// Applies a marshaled discovery event. Must only be called from the
    /// owner context.
    pub fn apply(&mut self, generation: u64, event: DiscoveryEvent) {
        if self.active != Some(generation) {
            debug!(
                "dropping discovery event from superseded watcher (generation {})",
                generation
            );
            return;
        }
        match event {
            DiscoveryEvent::DeviceAdded(record) => self.on_added(record),
            DiscoveryEvent::DeviceUpdated(update) => self.on_updated(update),
            DiscoveryEvent::DeviceRemoved { id } => self.on_removed(&id),
            DiscoveryEvent::EnumerationCompleted => self.on_enumeration_completed(),
        }
    }

    fn on_added(&mut self, record: DeviceRecord) {
        // Make sure the device name isn't blank or already present.
        if record.name.is_empty() {
            debug!("ignoring nameless device {}", record.id);
            return;
        }
        if self.find(&record.id).is_some() {
            debug!("ignoring duplicate discovery of {}", record.id);
            return;
        }
        info!("discovered {} ({})", record.name, record.id);
        self.devices.push(record);
    }

    fn on_updated(&mut self, update: DeviceUpdate) {
        match self.devices.iter_mut().find(|d| d.id == update.id) {
            Some(record) => record.apply_update(&update),
            // The device may have been filtered out on add; nothing to do.
            None => debug!("update for unknown device {} ignored", update.id),
        }
    }

    fn on_removed(&mut self, id: &str) {
        if let Some(pos) = self.devices.iter().position(|d| d.id == id) {
            let record = self.devices.remove(pos);
            info!("device {} ({}) went away", record.name, record.id);
        }
    }

    fn on_enumeration_completed(&mut self) {
        self.enumeration_complete = true;
        info!("enumeration completed: {} device(s)", self.devices.len());
    }

    pub fn find(&self, id: &str) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn enumeration_complete(&self) -> bool {
        self.enumeration_complete
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
