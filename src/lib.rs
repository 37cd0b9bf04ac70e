/*!
 # LEDnetWF Bluetooth LED Controller Library

 A Rust library for controlling "LEDnetWF" Bluetooth LE light strips and rings.
 Supports the ring model (firmware major `0x53`) and the strip model
 (firmware major `0x56`), which speak two different packet dialects.

 ## Features

 * Power on/off control
 * HS and RGB color control
 * Color temperature control
 * Brightness adjustment
 * Effects, including strip static and sound reactive effects
 * Effect speed control
 * LED strip topology (LED count, chip type, color order)
 * Automatic reconnect and idle disconnect

 ## Example

 ```rust,no_run
 use std::sync::Arc;
 use lednetwf_ble::*;

 #[tokio::main]
 async fn main() -> Result<()> {
     // Initialize tracing for logs
     tracing_subscriber::fmt::init();

     let transport = Arc::new(BtleplugTransport::new().await?);
     let config = DeviceConfig::new("AA:BB:CC:DD:EE:FF");

     // Builds the session from the last advertisement, no connection yet
     let device = LedNetWfDevice::new(transport, config).await?;

     // Every command connects on demand
     device.turn_on().await?;
     device.set_hs_color((0, 100), Some(255)).await?; // Red
     device.set_brightness(128).await?;

     device.stop().await;
     Ok(())
 }
 ```
*/

use thiserror::Error;

/// Custom error types for the LEDnetWF controller library
#[derive(Error, Debug)]
pub enum Error {
    /// No Bluetooth adapters found
    #[error("No Bluetooth adapters found")]
    NoBluetoothAdapters,

    /// The device is out of range or the address is unknown
    #[error("Device {0} not found")]
    DeviceNotFound(String),

    /// Failed to find required BLE characteristic
    #[error("Could not find required BLE characteristic: {0}")]
    CharacteristicNotFound(String),

    /// BLE error that is expected to clear up on retry
    #[error("Transient BLE error: {0}")]
    Transient(String),

    /// BLE communication error
    #[error("BLE communication error: {0}")]
    BleError(String),

    /// Firmware major byte that matches neither the ring nor the strip model
    #[error("Unsupported model {0:#04x}")]
    UnsupportedModel(u8),

    /// Manufacturer data record that cannot be decoded
    #[error("Invalid advertisement: {0}")]
    InvalidAdvertisement(String),

    /// Effect name or id unknown to the device model
    #[error("Effect {0} is not supported by this model")]
    EffectNotSupported(String),

    /// Command that the device model cannot express
    #[error("Unsupported command: {0}")]
    Unsupported(String),

    /// Missing or invalid LED configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Malformed notification
    #[error(transparent)]
    Parse(#[from] codec::ParseError),

    /// Error from btleplug
    #[error(transparent)]
    BtlePlugError(#[from] btleplug::Error),

    /// Config store I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Config store serialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// How the retry policy treats an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Retry after the policy's backoff
    Backoff,
    /// Retry straight away
    Immediate,
    /// Give up and propagate
    Never,
}

impl Error {
    /// Classifies the error for [`RetryPolicy`]
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Error::Transient(_) => RetryClass::Backoff,
            Error::BleError(_) | Error::BtlePlugError(_) => RetryClass::Immediate,
            _ => RetryClass::Never,
        }
    }
}

// Import needed for Result type extension
pub type Result<T> = std::result::Result<T, Error>;

pub mod ble;
pub mod codec;
pub mod color;
pub mod config;
pub mod device;
pub mod effects;
pub mod identity;
pub mod retry;
pub mod state;
pub mod transport;

// Re-export key types
pub use ble::{BtleplugTransport, DiscoveredDevice};
pub use codec::{Command, DecodedEvent, ParseError};
pub use config::{
    ChipType, ColorOrder, ConfigStore, DeviceConfig, JsonConfigStore, LedSettingsLayout,
    MemoryConfigStore,
};
pub use device::LedNetWfDevice;
pub use effects::{effect_id, effect_list, effect_name, EffectKind, EFFECT_OFF};
pub use identity::{DeviceIdentity, Model};
pub use retry::RetryPolicy;
pub use state::{ColorMode, DeviceState, MAX_KELVIN, MIN_KELVIN};
pub use transport::{CharacteristicHandle, Connection, DeviceHandle, Transport};
