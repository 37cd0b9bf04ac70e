/*!
 # Device configuration

 Persisted per-device settings and the enums describing LED topology. The
 session treats these values as defaults: anything the device reports about
 itself wins until a settings write succeeds.
*/

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::identity::Model;
use crate::Result;

/// Default idle time before the link is released, in seconds
pub const DEFAULT_IDLE_DISCONNECT_SECONDS: u64 = 120;

/// LED driver IC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChipType {
    Ws2812b,
    Sm16703,
    Sm16704,
    Ws2811,
    Ucs1903,
    Sk6812,
    Sk6812Rgbw,
    Ink1003,
    Ucs2904b,
    Jy1903,
    Ws2812e,
}

const RING_CHIP_TYPES: &[(ChipType, u8)] = &[
    (ChipType::Ws2812b, 0x01),
    (ChipType::Sm16703, 0x02),
    (ChipType::Sm16704, 0x03),
    (ChipType::Ws2811, 0x04),
    (ChipType::Ucs1903, 0x05),
    (ChipType::Sk6812, 0x06),
    (ChipType::Sk6812Rgbw, 0x07),
    (ChipType::Ink1003, 0x08),
    (ChipType::Ucs2904b, 0x09),
];

const STRIP_CHIP_TYPES: &[(ChipType, u8)] = &[
    (ChipType::Ws2812b, 0x01),
    (ChipType::Sm16703, 0x02),
    (ChipType::Sm16704, 0x03),
    (ChipType::Ws2811, 0x04),
    (ChipType::Ucs1903, 0x05),
    (ChipType::Sk6812, 0x06),
    (ChipType::Sk6812Rgbw, 0x07),
    (ChipType::Ink1003, 0x08),
    (ChipType::Ucs2904b, 0x09),
    (ChipType::Jy1903, 0x0a),
    (ChipType::Ws2812e, 0x0b),
];

impl ChipType {
    fn table(model: Model) -> &'static [(ChipType, u8)] {
        match model {
            Model::Ring => RING_CHIP_TYPES,
            Model::Strip => STRIP_CHIP_TYPES,
        }
    }

    /// Chip types the model accepts
    pub fn supported(model: Model) -> impl Iterator<Item = ChipType> {
        Self::table(model).iter().map(|(chip, _)| *chip)
    }

    /// Wire value for this chip on the given model, `None` if unsupported
    pub fn to_wire(self, model: Model) -> Option<u8> {
        Self::table(model)
            .iter()
            .find(|(chip, _)| *chip == self)
            .map(|(_, value)| *value)
    }

    pub fn from_wire(model: Model, value: u8) -> Option<ChipType> {
        Self::table(model)
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(chip, _)| *chip)
    }

    pub fn name(self) -> &'static str {
        match self {
            ChipType::Ws2812b => "WS2812B",
            ChipType::Sm16703 => "SM16703",
            ChipType::Sm16704 => "SM16704",
            ChipType::Ws2811 => "WS2811",
            ChipType::Ucs1903 => "UCS1903",
            ChipType::Sk6812 => "SK6812",
            ChipType::Sk6812Rgbw => "SK6812RGBW",
            ChipType::Ink1003 => "INK1003",
            ChipType::Ucs2904b => "UCS2904B",
            ChipType::Jy1903 => "JY1903",
            ChipType::Ws2812e => "WS2812E",
        }
    }
}

impl fmt::Display for ChipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChipType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        STRIP_CHIP_TYPES
            .iter()
            .map(|(chip, _)| *chip)
            .find(|chip| chip.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown chip type: {s}"))
    }
}

/// Physical wiring order of the sub-pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColorOrder {
    Rgb,
    Rbg,
    Grb,
    Gbr,
    Brg,
    Bgr,
}

const COLOR_ORDERS: [ColorOrder; 6] = [
    ColorOrder::Rgb,
    ColorOrder::Rbg,
    ColorOrder::Grb,
    ColorOrder::Gbr,
    ColorOrder::Brg,
    ColorOrder::Bgr,
];

impl ColorOrder {
    pub fn all() -> &'static [ColorOrder] {
        &COLOR_ORDERS
    }

    pub fn to_wire(self) -> u8 {
        match self {
            ColorOrder::Rgb => 0x00,
            ColorOrder::Rbg => 0x01,
            ColorOrder::Grb => 0x02,
            ColorOrder::Gbr => 0x03,
            ColorOrder::Brg => 0x04,
            ColorOrder::Bgr => 0x05,
        }
    }

    pub fn from_wire(value: u8) -> Option<ColorOrder> {
        COLOR_ORDERS.iter().copied().find(|o| o.to_wire() == value)
    }

    pub fn name(self) -> &'static str {
        match self {
            ColorOrder::Rgb => "RGB",
            ColorOrder::Rbg => "RBG",
            ColorOrder::Grb => "GRB",
            ColorOrder::Gbr => "GBR",
            ColorOrder::Brg => "BRG",
            ColorOrder::Bgr => "BGR",
        }
    }
}

impl fmt::Display for ColorOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        COLOR_ORDERS
            .iter()
            .copied()
            .find(|order| order.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown color order: {s}"))
    }
}

/// Byte offsets of the strip model's LED settings reply.
///
/// The LED count is always the big-endian pair at bytes 2-3, multiplied by
/// the segment count. Firmware revisions disagree on where the remaining
/// fields sit, so they are configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedSettingsLayout {
    pub segments: usize,
    pub chip_type: usize,
    pub color_order: usize,
}

impl LedSettingsLayout {
    /// segments@5, chip@6, order@7
    pub const CURRENT: LedSettingsLayout = LedSettingsLayout {
        segments: 5,
        chip_type: 6,
        color_order: 7,
    };

    /// Older firmware: segments and chip share byte 5, order@6
    pub const LEGACY: LedSettingsLayout = LedSettingsLayout {
        segments: 5,
        chip_type: 5,
        color_order: 6,
    };

    /// Smallest frame that holds every field
    pub fn min_len(&self) -> usize {
        [4, self.segments, self.chip_type, self.color_order]
            .into_iter()
            .max()
            .map_or(0, |max| max + 1)
    }
}

impl Default for LedSettingsLayout {
    fn default() -> Self {
        Self::CURRENT
    }
}

fn default_idle_disconnect() -> u64 {
    DEFAULT_IDLE_DISCONNECT_SECONDS
}

/// Per-device settings supplied by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub mac_address: String,
    #[serde(default)]
    pub led_count: Option<u16>,
    #[serde(default)]
    pub chip_type: Option<ChipType>,
    #[serde(default)]
    pub color_order: Option<ColorOrder>,
    /// Seconds of inactivity before disconnecting, 0 keeps the link open
    #[serde(default = "default_idle_disconnect")]
    pub idle_disconnect_delay_seconds: u64,
    #[serde(default)]
    pub led_settings_layout: LedSettingsLayout,
}

impl DeviceConfig {
    pub fn new(mac_address: impl Into<String>) -> Self {
        Self {
            mac_address: mac_address.into(),
            led_count: None,
            chip_type: None,
            color_order: None,
            idle_disconnect_delay_seconds: DEFAULT_IDLE_DISCONNECT_SECONDS,
            led_settings_layout: LedSettingsLayout::default(),
        }
    }
}

/// Persistence for [`DeviceConfig`], keyed by MAC address
pub trait ConfigStore: Send + Sync {
    fn load(&self, mac_address: &str) -> Result<Option<DeviceConfig>>;
    fn save(&self, config: &DeviceConfig) -> Result<()>;
}

/// Keeps configs in memory only
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    configs: Mutex<HashMap<String, DeviceConfig>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self, mac_address: &str) -> Result<Option<DeviceConfig>> {
        Ok(self
            .configs
            .lock()
            .get(&mac_address.to_lowercase())
            .cloned())
    }

    fn save(&self, config: &DeviceConfig) -> Result<()> {
        self.configs
            .lock()
            .insert(config.mac_address.to_lowercase(), config.clone());
        Ok(())
    }
}

/// Stores every device's config in one JSON object keyed by MAC address
#[derive(Debug)]
pub struct JsonConfigStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, DeviceConfig>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self, mac_address: &str) -> Result<Option<DeviceConfig>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(&mac_address.to_lowercase()))
    }

    fn save(&self, config: &DeviceConfig) -> Result<()> {
        let _guard = self.lock.lock();
        let mut all = self.read_all()?;
        all.insert(config.mac_address.to_lowercase(), config.clone());
        std::fs::write(&self.path, serde_json::to_string_pretty(&all)?)?;
        debug!("Saved config for {} to {}", config.mac_address, self.path.display());
        Ok(())
    }
}
