/*!
 # Model detection

 LEDnetWF devices advertise a manufacturer data record whose first byte is the
 firmware major version, which doubles as the model discriminator. From byte
 12 onwards the record carries the same fields as a `0x81` status frame, so a
 session can show the light's state before it ever connects.
*/

use std::fmt;

use tracing::debug;

use crate::codec::{self, StatusReport};
use crate::{Error, Result};

/// Offset of the embedded status frame inside the manufacturer data
const STATUS_OFFSET: usize = 12;
/// Manufacturer data must reach the LED count byte
const MIN_ADVERTISEMENT_LEN: usize = 25;

/// Supported hardware families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    /// Ring light with cold/warm white, firmware major `0x53`
    Ring,
    /// RGB strip, firmware major `0x56`
    Strip,
}

impl Model {
    /// Firmware major byte of the ring model
    pub const RING_FIRMWARE: u8 = 0x53;
    /// Firmware major byte of the strip model
    pub const STRIP_FIRMWARE: u8 = 0x56;

    /// Maps the firmware major byte to a model
    pub fn from_firmware_major(byte: u8) -> Result<Model> {
        match byte {
            Self::RING_FIRMWARE => Ok(Model::Ring),
            Self::STRIP_FIRMWARE => Ok(Model::Strip),
            other => Err(Error::UnsupportedModel(other)),
        }
    }

    pub fn firmware_major(self) -> u8 {
        match self {
            Model::Ring => Self::RING_FIRMWARE,
            Model::Strip => Self::STRIP_FIRMWARE,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Ring => write!(f, "ring ({:#04x})", Self::RING_FIRMWARE),
            Model::Strip => write!(f, "strip ({:#04x})", Self::STRIP_FIRMWARE),
        }
    }
}

/// Immutable identity learned from the advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub model: Model,
    pub firmware_major: u8,
    /// Formatted as `XXXX.XX` from bytes 8-10
    pub firmware_minor: String,
}

/// Decoded manufacturer data record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub identity: DeviceIdentity,
    pub status: StatusReport,
}

impl Advertisement {
    /// Decodes a manufacturer data record.
    ///
    /// Example record of a ring light that is off, showing red, with 28 LEDs:
    /// `53 05 08 65 f0 0c da 81 00 1d 0f 02 01 01 24 61 f0 00 fc 00 00 00 02 00 1c 00 00`
    pub fn parse(data: &[u8]) -> Result<Advertisement> {
        if data.len() < MIN_ADVERTISEMENT_LEN {
            return Err(Error::InvalidAdvertisement(format!(
                "expected at least {} bytes, got {}",
                MIN_ADVERTISEMENT_LEN,
                data.len()
            )));
        }

        let model = Model::from_firmware_major(data[0])?;
        let identity = DeviceIdentity {
            model,
            firmware_major: data[0],
            firmware_minor: format!("{:02X}{:02X}.{:02X}", data[8], data[9], data[10]),
        };
        let status = codec::decode_status_body(&data[STATUS_OFFSET..])?;

        debug!(
            "Advertisement: model {}, firmware {}/{}, status {:?}",
            identity.model, identity.firmware_major, identity.firmware_minor, status
        );
        Ok(Advertisement { identity, status })
    }
}
