//! BLE UART terminal core.
//!
//! Discover nearby BLE peripherals, browse a selected device's GATT
//! service/characteristic tree, subscribe to notifications, and exchange a
//! byte stream with a chosen characteristic one character at a time. All
//! registry and session state lives on a single owner context; platform
//! callbacks are marshaled into it through one event channel.

pub mod bridge;
pub mod codec;
pub mod constants;
pub mod error;
pub mod platform;
pub mod session;
pub mod terminal;
pub mod types;
pub mod watcher;

pub use bridge::UartBridge;
pub use error::BleError;
pub use session::SessionManager;
pub use terminal::TerminalChannel;
pub use types::{
    AttributeKind, AttributeRecord, DeviceRecord, DeviceUpdate, DiscoveryEvent, SessionEvent,
};
pub use watcher::{DeviceWatcher, WatcherState};
