use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use crate::codec::to_hex;
use crate::identity::Model;
use crate::transport::{
    CharacteristicHandle, Connection, DeviceHandle, DisconnectCallback, NotificationCallback,
    Transport,
};
use crate::{Error, Result};

/// Advertised name prefix of every LEDnetWF device
pub const NAME_PREFIX: &str = "LEDnetWF";

const SCAN_TIMEOUT: Duration = Duration::from_secs(10);
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Gets the default Bluetooth adapter
#[instrument(skip(manager))]
async fn get_central(manager: &Manager) -> Result<Adapter> {
    debug!("Getting default Bluetooth adapter");
    let adapters = manager.adapters().await?;
    let Some(adapter) = adapters.into_iter().next() else {
        error!("No Bluetooth adapters found");
        return Err(Error::NoBluetoothAdapters);
    };
    debug!("Using Bluetooth adapter");
    Ok(adapter)
}

/// Maps btleplug errors onto the retry classes the session understands
fn classify(e: btleplug::Error, address: &str) -> Error {
    match e {
        btleplug::Error::DeviceNotFound => Error::DeviceNotFound(address.to_string()),
        btleplug::Error::NotConnected | btleplug::Error::TimedOut(_) => {
            Error::Transient(e.to_string())
        }
        other => Error::BtlePlugError(other),
    }
}

fn matches_address(peripheral: &Peripheral, address: &str) -> bool {
    let address = address.to_lowercase();
    peripheral.address().to_string().to_lowercase() == address
        || peripheral.id().to_string().to_lowercase() == address
}

/// Picks the vendor record from the manufacturer data, falling back to any record
fn vendor_record(manufacturer_data: &HashMap<u16, Vec<u8>>) -> Option<Vec<u8>> {
    manufacturer_data
        .values()
        .find(|data| {
            data.first()
                .is_some_and(|b| Model::from_firmware_major(*b).is_ok())
        })
        .or_else(|| manufacturer_data.values().next())
        .cloned()
}

/// A LEDnetWF device seen during discovery
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub address: String,
    pub name: String,
    pub rssi: Option<i16>,
    /// `None` if the advertisement carries no supported model byte
    pub model: Option<Model>,
}

/// [`Transport`] backed by the platform BLE stack through btleplug
pub struct BtleplugTransport {
    adapter: Adapter,
    peripherals: Mutex<HashMap<String, Peripheral>>,
}

impl BtleplugTransport {
    /// Opens the first Bluetooth adapter
    #[instrument]
    pub async fn new() -> Result<Self> {
        info!("Initializing BLE transport");
        let manager = Manager::new().await?;
        let adapter = get_central(&manager).await?;
        Ok(Self {
            adapter,
            peripherals: Mutex::new(HashMap::new()),
        })
    }

    /// Scans for `duration` and lists every device named `LEDnetWF*`
    #[instrument(skip(self))]
    pub async fn discover(&self, duration: Duration) -> Result<Vec<DiscoveredDevice>> {
        info!("Scanning for LEDnetWF devices for {:?}", duration);
        self.adapter.start_scan(ScanFilter::default()).await?;
        time::sleep(duration).await;
        self.adapter.stop_scan().await?;

        let mut found = Vec::new();
        let mut cache = self.peripherals.lock().await;
        for p in self.adapter.peripherals().await? {
            let Ok(Some(props)) = p.properties().await else {
                continue;
            };
            let Some(name) = props.local_name else {
                continue;
            };
            if !name.starts_with(NAME_PREFIX) {
                continue;
            }

            let model = vendor_record(&props.manufacturer_data)
                .and_then(|data| data.first().copied())
                .and_then(|b| Model::from_firmware_major(b).ok());
            let address = p.address().to_string();
            debug!("Found {} at {} ({:?})", name, address, model);
            cache.insert(address.to_lowercase(), p);
            found.push(DiscoveredDevice {
                address,
                name,
                rssi: props.rssi,
                model,
            });
        }

        info!("Found {} LEDnetWF device(s)", found.len());
        Ok(found)
    }

    /// Returns the cached peripheral or scans for it
    async fn peripheral(&self, address: &str) -> Result<Peripheral> {
        if let Some(p) = self.peripherals.lock().await.get(&address.to_lowercase()) {
            return Ok(p.clone());
        }

        info!("Scanning for {}...", address);
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| classify(e, address))?;

        let start_time = time::Instant::now();
        while start_time.elapsed() < SCAN_TIMEOUT {
            let peripherals = self.adapter.peripherals().await?;
            trace!("Found {} BLE peripherals so far", peripherals.len());

            if let Some(p) = peripherals.into_iter().find(|p| matches_address(p, address)) {
                self.adapter.stop_scan().await?;
                debug!("Found device {}", address);
                self.peripherals
                    .lock()
                    .await
                    .insert(address.to_lowercase(), p.clone());
                return Ok(p);
            }

            time::sleep(SCAN_POLL_INTERVAL).await;
        }

        self.adapter.stop_scan().await?;
        warn!(
            "Device {} not found within {} seconds",
            address,
            SCAN_TIMEOUT.as_secs()
        );
        Err(Error::DeviceNotFound(address.to_string()))
    }
}

#[async_trait]
impl Transport for BtleplugTransport {
    async fn scan_for_device(&self, mac_address: &str) -> Result<DeviceHandle> {
        let p = self.peripheral(mac_address).await?;
        let name = p
            .properties()
            .await
            .map_err(|e| classify(e, mac_address))?
            .and_then(|props| props.local_name);
        Ok(DeviceHandle {
            address: mac_address.to_string(),
            name,
        })
    }

    async fn read_last_advertisement(&self, mac_address: &str) -> Result<Vec<u8>> {
        let p = self.peripheral(mac_address).await?;
        let props = p
            .properties()
            .await
            .map_err(|e| classify(e, mac_address))?
            .ok_or_else(|| Error::InvalidAdvertisement("no properties".into()))?;
        let data = vendor_record(&props.manufacturer_data)
            .ok_or_else(|| Error::InvalidAdvertisement("no manufacturer data".into()))?;
        debug!("Manufacturer data of {}: {}", mac_address, to_hex(&data));
        Ok(data)
    }

    #[instrument(skip(self, on_disconnect))]
    async fn connect(
        &self,
        device: &DeviceHandle,
        on_disconnect: DisconnectCallback,
    ) -> Result<Box<dyn Connection>> {
        let address = device.address.as_str();
        let peripheral = self.peripheral(address).await?;

        info!("Connecting to device...");
        if !peripheral.is_connected().await? {
            peripheral
                .connect()
                .await
                .map_err(|e| classify(e, address))?;
        }
        debug!("Discovering services...");
        peripheral
            .discover_services()
            .await
            .map_err(|e| classify(e, address))?;

        let adapter = self.adapter.clone();
        let peripheral_id = peripheral.id();
        let watcher = tokio::spawn(async move {
            match adapter.events().await {
                Ok(mut events) => {
                    while let Some(event) = events.next().await {
                        if let CentralEvent::DeviceDisconnected(id) = event {
                            if id == peripheral_id {
                                debug!("Device {:?} disconnected", id);
                                on_disconnect();
                                break;
                            }
                        }
                    }
                }
                Err(e) => warn!("Could not subscribe to adapter events: {}", e),
            }
        });

        Ok(Box::new(BtleplugConnection {
            address: device.address.clone(),
            peripheral,
            tasks: parking_lot::Mutex::new(vec![watcher]),
        }))
    }
}

struct BtleplugConnection {
    address: String,
    peripheral: Peripheral,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl BtleplugConnection {
    fn characteristic(&self, uuid: Uuid) -> Result<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| Error::CharacteristicNotFound(uuid.to_string()))
    }
}

impl Drop for BtleplugConnection {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

#[async_trait]
impl Connection for BtleplugConnection {
    async fn resolve_characteristic(&self, uuid: Uuid) -> Result<Option<CharacteristicHandle>> {
        Ok(self
            .peripheral
            .characteristics()
            .iter()
            .find(|c| c.uuid == uuid)
            .map(|c| CharacteristicHandle { uuid: c.uuid }))
    }

    async fn write(&self, characteristic: &CharacteristicHandle, data: &[u8]) -> Result<()> {
        let ch = self.characteristic(characteristic.uuid)?;
        let write_type = if ch.properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) {
            WriteType::WithoutResponse
        } else {
            WriteType::WithResponse
        };
        trace!("Writing {:?} to {}: {}", write_type, ch.uuid, to_hex(data));
        self.peripheral
            .write(&ch, data, write_type)
            .await
            .map_err(|e| classify(e, &self.address))
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicHandle,
        callback: NotificationCallback,
    ) -> Result<()> {
        let ch = self.characteristic(characteristic.uuid)?;
        self.peripheral
            .subscribe(&ch)
            .await
            .map_err(|e| classify(e, &self.address))?;

        let mut notifications = self.peripheral.notifications().await?;
        let uuid = ch.uuid;
        let task = tokio::spawn(async move {
            while let Some(n) = notifications.next().await {
                if n.uuid == uuid {
                    callback(n.value);
                }
            }
            debug!("Notification stream for {} ended", uuid);
        });
        self.tasks.lock().push(task);
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: &CharacteristicHandle) -> Result<()> {
        let ch = self.characteristic(characteristic.uuid)?;
        self.peripheral
            .unsubscribe(&ch)
            .await
            .map_err(|e| classify(e, &self.address))
    }

    async fn disconnect(&self) -> Result<()> {
        let result = self
            .peripheral
            .disconnect()
            .await
            .map_err(|e| classify(e, &self.address));
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        result
    }
}
