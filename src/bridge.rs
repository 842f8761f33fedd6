//! Owner-context facade wiring the watcher, session and terminal together.
//!
//! A single consumer owns a [`UartBridge`] plus the event receiver returned
//! by [`UartBridge::new`], and feeds every received [`SessionEvent`] into
//! [`UartBridge::apply`]. That consumer is the one serialized execution
//! context in the system; platform tasks only ever talk to it through the
//! channel, so no locking is needed around registry or session state.

use std::sync::Arc;

use log::debug;
use tokio::sync::mpsc;

use crate::error::BleError;
use crate::platform::BleBackend;
use crate::session::SessionManager;
use crate::terminal::TerminalChannel;
use crate::types::SessionEvent;
use crate::watcher::DeviceWatcher;

pub struct UartBridge {
    backend: Arc<dyn BleBackend>,
    watcher: DeviceWatcher,
    session: SessionManager,
    terminal: TerminalChannel,
}

impl UartBridge {
    /// Builds the bridge and hands the marshaling channel's receiving end to
    /// the owner context.
    pub fn new(backend: Arc<dyn BleBackend>) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = Self {
            watcher: DeviceWatcher::new(tx.clone()),
            session: SessionManager::new(backend.clone(), tx),
            terminal: TerminalChannel::new(),
            backend,
        };
        (bridge, rx)
    }

    pub async fn start_scan(&mut self) -> Result<(), BleError> {
        self.watcher.start(&self.backend).await
    }

    pub fn stop_scan(&mut self) {
        self.watcher.stop();
    }

    /// Connects to a discovered device; the terminal is detached until a
    /// characteristic of the new connection is selected.
    pub async fn select_device(&mut self, device_id: &str) -> Result<(), BleError> {
        self.terminal.set_target(None);
        self.session.select_device(device_id).await
    }

    pub async fn select_service(&mut self, service_id: &str) -> Result<(), BleError> {
        self.terminal.set_target(None);
        self.session.select_service(service_id).await
    }

    /// Selects the terminal endpoint and wires the notification
    /// subscription. The terminal becomes writable in every non-fatal
    /// outcome, with or without notifications.
    pub async fn select_characteristic(&mut self, characteristic_id: &str) -> Result<(), BleError> {
        self.terminal.set_target(None);
        self.session.select_characteristic(characteristic_id).await?;
        let target = self
            .session
            .selected_characteristic()
            .and_then(|record| record.characteristic_handle());
        self.terminal.set_target(target);
        Ok(())
    }

    /// Queues operator input and drains it through the write pipeline.
    pub async fn send_text(&mut self, text: &str) -> Result<(), BleError> {
        self.terminal.push_input(text);
        self.terminal.transmit().await
    }

    /// Dispatches one marshaled event. This is the only place state mutation
    /// meets asynchronous platform deliveries, and where stale generations
    /// and epochs are dropped.
    pub fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Discovery { generation, event } => self.watcher.apply(generation, event),
            SessionEvent::Notification { epoch, payload } => {
                if self.session.is_current_epoch(epoch) {
                    self.terminal.push_notification(&payload);
                } else {
                    debug!(
                        "dropping notification from a superseded connection (epoch {})",
                        epoch
                    );
                }
            }
        }
    }

    /// Stops scanning and releases the connection and its resources.
    pub async fn shutdown(&mut self) {
        self.watcher.stop();
        self.terminal.set_target(None);
        self.session.release().await;
    }

    pub fn watcher(&self) -> &DeviceWatcher {
        &self.watcher
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn terminal(&self) -> &TerminalChannel {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut TerminalChannel {
        &mut self.terminal
    }
}
