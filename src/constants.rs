//! Well-known GATT identifiers and tuning values.

use std::time::Duration;

use uuid::Uuid;

/// Standard Bluetooth service UUIDs
pub const UUID_GENERIC_ACCESS_SERVICE: Uuid =
    Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb);
pub const UUID_GENERIC_ATTRIBUTE_SERVICE: Uuid =
    Uuid::from_u128(0x00001801_0000_1000_8000_00805f9b34fb);
pub const UUID_DEVICE_INFORMATION_SERVICE: Uuid =
    Uuid::from_u128(0x0000180a_0000_1000_8000_00805f9b34fb);
pub const UUID_BATTERY_SERVICE: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

/// Standard Bluetooth characteristic UUIDs
pub const UUID_DEVICE_NAME: Uuid = Uuid::from_u128(0x00002a00_0000_1000_8000_00805f9b34fb);
pub const UUID_BATTERY_LEVEL: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

/// Nordic UART service, the de facto BLE serial profile
pub const UUID_NUS_SERVICE: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);
pub const UUID_NUS_RX_CHAR: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);
pub const UUID_NUS_TX_CHAR: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

/// How long a scan runs before the watcher reports enumeration as logically
/// complete. Sightings keep flowing after this until the scan is stopped.
pub const SCAN_ENUMERATION_WINDOW: Duration = Duration::from_secs(10);

const GATT_NAMES: [(Uuid, &str); 9] = [
    (UUID_GENERIC_ACCESS_SERVICE, "Generic Access"),
    (UUID_GENERIC_ATTRIBUTE_SERVICE, "Generic Attribute"),
    (UUID_DEVICE_INFORMATION_SERVICE, "Device Information"),
    (UUID_BATTERY_SERVICE, "Battery Service"),
    (UUID_DEVICE_NAME, "Device Name"),
    (UUID_BATTERY_LEVEL, "Battery Level"),
    (UUID_NUS_SERVICE, "Nordic UART Service"),
    (UUID_NUS_RX_CHAR, "Nordic UART RX"),
    (UUID_NUS_TX_CHAR, "Nordic UART TX"),
];

/// Returns a friendly name for a handful of well-known GATT UUIDs, falling
/// back to the UUID's own string form.
pub fn gatt_display_name(uuid: &Uuid) -> String {
    GATT_NAMES
        .iter()
        .find(|(known, _)| known == uuid)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| uuid.to_string())
}
