#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lednetwf_ble::transport::{DisconnectCallback, NotificationCallback};
use lednetwf_ble::{
    CharacteristicHandle, Connection, DeviceConfig, DeviceHandle, Error, LedNetWfDevice, Result,
    RetryPolicy, Transport,
};
use uuid::Uuid;

pub const MAC: &str = "AA:BB:CC:DD:EE:FF";
pub const WRITE_UUID: Uuid = Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb);
pub const NOTIFY_UUID: Uuid = Uuid::from_u128(0x0000ff02_0000_1000_8000_00805f9b34fb);

/// Ring light, off, showing red, 28 LEDs
pub const RING_ADVERTISEMENT: [u8; 27] = [
    0x53, 0x05, 0x08, 0x65, 0xf0, 0x0c, 0xda, 0x81, 0x00, 0x1d, 0x0f, 0x02, 0x01, 0x01, 0x24,
    0x61, 0xf0, 0x00, 0xfc, 0x00, 0x00, 0x00, 0x02, 0x00, 0x1c, 0x00, 0x00,
];

/// Strip light, on, running plain effect 3
pub const STRIP_ADVERTISEMENT: [u8; 27] = [
    0x56, 0x05, 0x08, 0x65, 0xf0, 0x0c, 0xda, 0x81, 0x00, 0x1d, 0x0f, 0x02, 0x01, 0x01, 0x23,
    0x25, 0x03, 0x00, 0x32, 0x64, 0x00, 0x00, 0x02, 0x00, 0x30, 0x00, 0x00,
];

/// Scripted connect failure
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Transient,
    NotFound,
    Fatal,
}

impl Failure {
    fn into_error(self) -> Error {
        match self {
            Failure::Transient => Error::Transient("link busy".into()),
            Failure::NotFound => Error::DeviceNotFound(MAC.into()),
            Failure::Fatal => Error::Unsupported("adapter gone".into()),
        }
    }
}

/// Shared record of everything the fake saw
#[derive(Default)]
pub struct Recorder {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub unsubscribes: AtomicUsize,
    pub writes: Mutex<Vec<Vec<u8>>>,
    /// Failures returned by the next writes, which are then not recorded
    pub write_failures: Mutex<VecDeque<Failure>>,
    pub notify: Mutex<Option<NotificationCallback>>,
    pub on_disconnect: Mutex<Option<DisconnectCallback>>,
}

/// In-memory [`Transport`] for session tests
pub struct MockTransport {
    pub advertisement: Vec<u8>,
    pub recorder: Arc<Recorder>,
    pub connect_failures: Mutex<VecDeque<Failure>>,
    pub connect_delay: Duration,
    pub missing_notify: bool,
}

impl MockTransport {
    pub fn new(advertisement: &[u8]) -> Self {
        Self {
            advertisement: advertisement.to_vec(),
            recorder: Arc::new(Recorder::default()),
            connect_failures: Mutex::new(VecDeque::new()),
            connect_delay: Duration::ZERO,
            missing_notify: false,
        }
    }

    pub fn ring() -> Self {
        Self::new(&RING_ADVERTISEMENT)
    }

    pub fn strip() -> Self {
        Self::new(&STRIP_ADVERTISEMENT)
    }

    pub fn fail_connects(self, failures: &[Failure]) -> Self {
        self.connect_failures.lock().unwrap().extend(failures);
        self
    }

    pub fn fail_writes(self, failures: &[Failure]) -> Self {
        self.recorder.write_failures.lock().unwrap().extend(failures);
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn connects(&self) -> usize {
        self.recorder.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.recorder.disconnects.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.recorder.writes.lock().unwrap().clone()
    }

    /// Writes after the handshake and LED settings query
    pub fn command_writes(&self) -> Vec<Vec<u8>> {
        self.writes()
            .into_iter()
            .filter(|w| w.get(7) == Some(&0x0b))
            .collect()
    }

    /// Delivers a notification the way the device sends it
    pub fn notify_hex(&self, hex: &str) {
        let frame = format!("{{\"code\":0,\"payload\":\"{hex}\"}}");
        let callback = self.recorder.notify.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(frame.into_bytes());
        }
    }

    /// Simulates the device dropping the link
    pub fn drop_link(&self) {
        let callback = self.recorder.on_disconnect.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn scan_for_device(&self, mac_address: &str) -> Result<DeviceHandle> {
        Ok(DeviceHandle {
            address: mac_address.to_string(),
            name: Some("LEDnetWF020033".into()),
        })
    }

    async fn read_last_advertisement(&self, _mac_address: &str) -> Result<Vec<u8>> {
        Ok(self.advertisement.clone())
    }

    async fn connect(
        &self,
        _device: &DeviceHandle,
        on_disconnect: DisconnectCallback,
    ) -> Result<Box<dyn Connection>> {
        self.recorder.connects.fetch_add(1, Ordering::SeqCst);
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        if let Some(failure) = self.connect_failures.lock().unwrap().pop_front() {
            return Err(failure.into_error());
        }
        *self.recorder.on_disconnect.lock().unwrap() = Some(on_disconnect);
        Ok(Box::new(MockConnection {
            recorder: self.recorder.clone(),
            missing_notify: self.missing_notify,
        }))
    }
}

struct MockConnection {
    recorder: Arc<Recorder>,
    missing_notify: bool,
}

#[async_trait]
impl Connection for MockConnection {
    async fn resolve_characteristic(&self, uuid: Uuid) -> Result<Option<CharacteristicHandle>> {
        let known = uuid == WRITE_UUID || (uuid == NOTIFY_UUID && !self.missing_notify);
        Ok(known.then_some(CharacteristicHandle { uuid }))
    }

    async fn write(&self, characteristic: &CharacteristicHandle, data: &[u8]) -> Result<()> {
        assert_eq!(characteristic.uuid, WRITE_UUID);
        if let Some(failure) = self.recorder.write_failures.lock().unwrap().pop_front() {
            return Err(failure.into_error());
        }
        self.recorder.writes.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicHandle,
        callback: NotificationCallback,
    ) -> Result<()> {
        assert_eq!(characteristic.uuid, NOTIFY_UUID);
        *self.recorder.notify.lock().unwrap() = Some(callback);
        Ok(())
    }

    async fn unsubscribe(&self, _characteristic: &CharacteristicHandle) -> Result<()> {
        self.recorder.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.recorder.notify.lock().unwrap().take();
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.recorder.disconnects.fetch_add(1, Ordering::SeqCst);
        let callback = self.recorder.on_disconnect.lock().unwrap().take();
        if let Some(callback) = callback {
            callback();
        }
        Ok(())
    }
}

/// Fast retries so failure tests do not wait on the real backoff
pub fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        backoff: Duration::from_millis(1),
    }
}

pub async fn session(transport: Arc<MockTransport>, config: DeviceConfig) -> LedNetWfDevice {
    LedNetWfDevice::with_options(transport, config, None, quick_retry())
        .await
        .expect("session from advertisement")
}

pub fn config() -> DeviceConfig {
    DeviceConfig::new(MAC)
}

/// Config with a fully known LED topology, so no settings query is sent
pub fn known_topology_config() -> DeviceConfig {
    DeviceConfig {
        led_count: Some(28),
        chip_type: Some(lednetwf_ble::ChipType::Ws2812b),
        color_order: Some(lednetwf_ble::ColorOrder::Grb),
        ..DeviceConfig::new(MAC)
    }
}
