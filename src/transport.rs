/*!
 # Transport seam

 The device session talks to the radio only through these traits.
 [`crate::BtleplugTransport`] implements them on top of btleplug, tests use an
 in-memory fake.
*/

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::Result;

/// Candidate characteristics the session writes commands to, in probe order
pub const WRITE_CHARACTERISTIC_UUIDS: &[Uuid] =
    &[Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb)];
/// Candidate characteristics the device notifies on, in probe order
pub const NOTIFY_CHARACTERISTIC_UUIDS: &[Uuid] =
    &[Uuid::from_u128(0x0000ff02_0000_1000_8000_00805f9b34fb)];

/// Called with the raw bytes of every notification
pub type NotificationCallback = Arc<dyn Fn(Vec<u8>) + Send + Sync>;
/// Called when the link drops, whoever initiated it
pub type DisconnectCallback = Arc<dyn Fn() + Send + Sync>;

/// A device found by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub address: String,
    pub name: Option<String>,
}

/// A resolved GATT characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle {
    pub uuid: Uuid,
}

/// Platform BLE stack
#[async_trait]
pub trait Transport: Send + Sync {
    /// Finds the device with the given MAC address.
    /// Fails with [`crate::Error::DeviceNotFound`] when it is out of range.
    async fn scan_for_device(&self, mac_address: &str) -> Result<DeviceHandle>;

    /// Manufacturer data of the last advertisement seen from the device
    async fn read_last_advertisement(&self, mac_address: &str) -> Result<Vec<u8>>;

    /// Opens a link. `on_disconnect` fires whenever the link goes down.
    async fn connect(
        &self,
        device: &DeviceHandle,
        on_disconnect: DisconnectCallback,
    ) -> Result<Box<dyn Connection>>;
}

/// An open link to one device
#[async_trait]
pub trait Connection: Send + Sync {
    async fn resolve_characteristic(&self, uuid: Uuid) -> Result<Option<CharacteristicHandle>>;

    async fn write(&self, characteristic: &CharacteristicHandle, data: &[u8]) -> Result<()>;

    async fn subscribe(
        &self,
        characteristic: &CharacteristicHandle,
        callback: NotificationCallback,
    ) -> Result<()>;

    async fn unsubscribe(&self, characteristic: &CharacteristicHandle) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}
