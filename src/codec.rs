/*!
 # Packet codec

 Builds outbound command packets and decodes inbound notifications. Nothing
 in here performs I/O.

 Every outbound packet shares an 8-byte header:

 ```text
 0-1  sequence number, big-endian, stamped by the session just before writing
 2    0x80
 3-4  0x00 0x00
 5    payload length
 6    payload length + 1
 7    0x0b for commands, 0x0a for queries
 ```

 Some packets end in a checksum byte, `sum(payload) & 0xff` over everything
 between the header and the checksum itself.

 Notifications are ASCII: a JSON-ish envelope whose last quoted string holds
 the hex-encoded payload.
*/

use std::fmt::Write as _;

use tracing::debug;

use crate::config::{ChipType, ColorOrder, LedSettingsLayout};
use crate::effects::EffectKind;
use crate::identity::Model;
use crate::{Error, Result};

/// Offset of the first payload byte in every outbound packet
pub const HEADER_LEN: usize = 8;

const HANDSHAKE: [u8; 12] = [
    0x00, 0x01, 0x80, 0x00, 0x00, 0x04, 0x05, 0x0a, 0x81, 0x8a, 0x8b, 0x96,
];
const QUERY_LED_SETTINGS: [u8; 13] = [
    0x00, 0x02, 0x80, 0x00, 0x00, 0x05, 0x06, 0x0a, 0x63, 0x12, 0x21, 0xf0, 0x86,
];
const POWER: [u8; 21] = [
    0x00, 0x01, 0x80, 0x00, 0x00, 0x0d, 0x0e, 0x0b, 0x3b, 0x23, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x32, 0x00, 0x00, 0x90,
];
const HS_COLOR: [u8; 21] = [
    0x00, 0x00, 0x80, 0x00, 0x00, 0x0d, 0x0e, 0x0b, 0x3b, 0xa1, 0x00, 0x64, 0x64, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
const COLOR_TEMP: [u8; 21] = [
    0x00, 0x10, 0x80, 0x00, 0x00, 0x0d, 0x0e, 0x0b, 0x3b, 0xb1, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x3d,
];
const RING_EFFECT: [u8; 12] = [
    0x00, 0x06, 0x80, 0x00, 0x00, 0x04, 0x05, 0x0b, 0x38, 0x01, 0x32, 0x64,
];
const STRIP_EFFECT: [u8; 13] = [
    0x00, 0x00, 0x80, 0x00, 0x00, 0x05, 0x06, 0x0b, 0x42, 0x01, 0x32, 0x64, 0xd9,
];
const STRIP_STATIC: [u8; 21] = [
    0x00, 0x00, 0x80, 0x00, 0x00, 0x0d, 0x0e, 0x0b, 0x41, 0x01, 0xff, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x32, 0x64, 0x00, 0xf0, 0xc7,
];
const STRIP_MUSIC: [u8; 21] = [
    0x00, 0x00, 0x80, 0x00, 0x00, 0x0d, 0x0e, 0x0b, 0x73, 0x01, 0x26, 0x01, 0xff, 0x00, 0x00,
    0x00, 0x00, 0xff, 0x64, 0x32, 0x2f,
];
const RING_LED_SETTINGS: [u8; 14] = [
    0x00, 0x00, 0x80, 0x00, 0x00, 0x06, 0x07, 0x0b, 0x62, 0x00, 0x00, 0x00, 0xf0, 0x52,
];
const STRIP_LED_SETTINGS: [u8; 19] = [
    0x00, 0x00, 0x80, 0x00, 0x00, 0x0b, 0x0c, 0x0b, 0x62, 0x00, 0x64, 0x00, 0x03, 0x01, 0x00,
    0x64, 0x03, 0xf0, 0x21,
];

/// Power byte values shared by commands and status frames
const POWER_ON: u8 = 0x23;
const POWER_OFF: u8 = 0x24;

/// Shape id used to draw a single solid color on the strip model
pub const SOLID_COLOR_SHAPE: u8 = 0x01;

/// High-level commands understood by both models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Sent once after the first connection of a session
    Handshake,
    /// Asks the device for its LED count, chip type and color order
    QueryLedSettings,
    TurnOn,
    TurnOff,
    /// Hue in degrees (0-360), saturation and brightness in percent
    HsColor {
        hue: u16,
        saturation: u8,
        brightness_percent: u8,
    },
    /// Ring only. `temp_percent` runs from warm (0) to cool (100)
    ColorTemp {
        temp_percent: u8,
        brightness_percent: u8,
    },
    /// Registry effect id. `color` is used by strip static and music effects
    Effect {
        id: u16,
        speed: u8,
        brightness_percent: u8,
        color: (u8, u8, u8),
    },
    /// Strip only
    SolidColor {
        rgb: (u8, u8, u8),
        brightness_percent: u8,
    },
    LedSettings {
        led_count: u16,
        chip_type: ChipType,
        color_order: ColorOrder,
    },
}

impl Command {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Handshake => "handshake",
            Command::QueryLedSettings => "query_led_settings",
            Command::TurnOn => "turn_on",
            Command::TurnOff => "turn_off",
            Command::HsColor { .. } => "hs_color",
            Command::ColorTemp { .. } => "color_temp",
            Command::Effect { .. } => "effect",
            Command::SolidColor { .. } => "solid_color",
            Command::LedSettings { .. } => "led_settings",
        }
    }

    /// Builds the packet for `model` with a zero sequence number
    pub fn encode(&self, model: Model) -> Result<Vec<u8>> {
        let packet = match *self {
            Command::Handshake => HANDSHAKE.to_vec(),
            Command::QueryLedSettings => QUERY_LED_SETTINGS.to_vec(),
            Command::TurnOn => power_packet(POWER_ON),
            Command::TurnOff => power_packet(POWER_OFF),
            Command::HsColor {
                hue,
                saturation,
                brightness_percent,
            } => {
                let mut p = HS_COLOR.to_vec();
                p[10] = crate::color::hue_to_wire_byte(hue);
                p[11] = saturation.min(100);
                p[12] = brightness_percent.min(100);
                p
            }
            Command::ColorTemp {
                temp_percent,
                brightness_percent,
            } => {
                if model != Model::Ring {
                    return Err(Error::Unsupported(format!(
                        "color temperature on {model}"
                    )));
                }
                let mut p = COLOR_TEMP.to_vec();
                p[13] = temp_percent.min(100);
                p[14] = brightness_percent.min(100);
                p
            }
            Command::Effect {
                id,
                speed,
                brightness_percent,
                color,
            } => effect_packet(model, id, speed.min(100), brightness_percent.min(100), color)?,
            Command::SolidColor {
                rgb,
                brightness_percent,
            } => {
                if model != Model::Strip {
                    return Err(Error::Unsupported(format!("solid RGB color on {model}")));
                }
                static_packet(SOLID_COLOR_SHAPE, rgb, 0x32, brightness_percent.min(100))
            }
            Command::LedSettings {
                led_count,
                chip_type,
                color_order,
            } => led_settings_packet(model, led_count, chip_type, color_order)?,
        };
        Ok(packet)
    }
}

fn power_packet(power: u8) -> Vec<u8> {
    let mut p = POWER.to_vec();
    p[9] = power;
    seal(&mut p);
    p
}

fn effect_packet(
    model: Model,
    id: u16,
    speed: u8,
    brightness_percent: u8,
    color: (u8, u8, u8),
) -> Result<Vec<u8>> {
    let kind = EffectKind::from_id(id);
    match (model, kind) {
        (Model::Ring, EffectKind::Plain(effect)) => {
            let mut p = RING_EFFECT.to_vec();
            p[9] = effect;
            p[10] = speed;
            p[11] = brightness_percent;
            Ok(p)
        }
        (Model::Ring, _) => Err(Error::EffectNotSupported(format!("{id:#06x}"))),
        (Model::Strip, EffectKind::Plain(effect)) => {
            let mut p = STRIP_EFFECT.to_vec();
            p[9] = effect;
            p[10] = speed;
            p[11] = brightness_percent;
            seal(&mut p);
            Ok(p)
        }
        (Model::Strip, EffectKind::Static(shape)) => {
            Ok(static_packet(shape, color, speed, brightness_percent))
        }
        (Model::Strip, EffectKind::Music(music)) => {
            let mut p = STRIP_MUSIC.to_vec();
            p[11] = music;
            p[12] = color.0;
            p[13] = color.1;
            p[14] = color.2;
            p[18] = brightness_percent;
            p[19] = speed;
            seal(&mut p);
            Ok(p)
        }
    }
}

fn static_packet(shape: u8, rgb: (u8, u8, u8), speed: u8, brightness_percent: u8) -> Vec<u8> {
    let mut p = STRIP_STATIC.to_vec();
    p[9] = shape;
    p[10] = rgb.0;
    p[11] = rgb.1;
    p[12] = rgb.2;
    p[13..16].fill(0);
    p[16] = speed;
    p[17] = brightness_percent;
    seal(&mut p);
    p
}

fn led_settings_packet(
    model: Model,
    led_count: u16,
    chip_type: ChipType,
    color_order: ColorOrder,
) -> Result<Vec<u8>> {
    let chip = chip_type
        .to_wire(model)
        .ok_or_else(|| Error::Config(format!("chip type {chip_type} is not supported on {model}")))?;
    if led_count == 0 {
        return Err(Error::Config("LED count must be at least 1".into()));
    }

    let packet = match model {
        Model::Ring => {
            let count = u8::try_from(led_count).map_err(|_| {
                Error::Config(format!("ring lights support at most 255 LEDs, got {led_count}"))
            })?;
            let mut p = RING_LED_SETTINGS.to_vec();
            p[9] = count;
            p[10] = chip;
            p[11] = color_order.to_wire();
            seal(&mut p);
            p
        }
        Model::Strip => {
            let mut p = STRIP_LED_SETTINGS.to_vec();
            p[9..11].copy_from_slice(&led_count.to_be_bytes());
            // single segment
            p[11..13].copy_from_slice(&1u16.to_be_bytes());
            p[13] = chip;
            p[14] = color_order.to_wire();
            p[15] = (led_count & 0xff) as u8;
            p[16] = 0x01;
            seal(&mut p);
            p
        }
    };
    Ok(packet)
}

/// `sum(bytes) & 0xff`
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Writes the checksum of the payload into the last byte
pub fn seal(packet: &mut [u8]) {
    let Some(last) = packet.len().checked_sub(1) else {
        return;
    };
    if last <= HEADER_LEN {
        return;
    }
    packet[last] = checksum(&packet[HEADER_LEN..last]);
}

/// Overwrites bytes 0-1 with the sequence number
pub fn stamp_sequence(packet: &mut [u8], sequence: u16) {
    if packet.len() >= 2 {
        packet[..2].copy_from_slice(&sequence.to_be_bytes());
    }
}

/// Per-session outbound sequence number, wrapping at 65536
#[derive(Debug, Default, Clone)]
pub struct SequenceCounter {
    next: u16,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current number and advances
    pub fn next(&mut self) -> u16 {
        let current = self.next;
        self.next = self.next.wrapping_add(1);
        current
    }

    pub fn peek(&self) -> u16 {
        self.next
    }
}

/// Space-separated uppercase hex, for logging packets
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02X}");
    }
    out
}

/// Reasons a notification frame is dropped
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("notification holds no quoted payload")]
    NoPayload,

    #[error("payload is not valid hex: {0}")]
    InvalidHex(String),

    #[error("frame too short: needed {needed} bytes, got {len}")]
    Truncated { needed: usize, len: usize },

    #[error("unknown frame type {0:#04x}")]
    UnknownFrame(u8),

    #[error("unknown chip type {0:#04x}")]
    UnknownChipType(u8),

    #[error("unknown color order {0:#04x}")]
    UnknownColorOrder(u8),
}

/// What the light reports it is doing. Values are raw wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMode {
    /// Static HS color, `rgb` at full intensity times brightness
    Color { rgb: (u8, u8, u8) },
    /// Ring white mode
    White {
        temp_percent: u8,
        brightness_percent: u8,
    },
    /// Strip solid color, `rgb` already scaled by brightness
    Rgb { rgb: (u8, u8, u8) },
    /// Strip static effect with a foreground color
    StaticEffect {
        shape: u8,
        rgb: (u8, u8, u8),
        brightness_percent: u8,
    },
    /// Strip sound reactive effect
    Music { id: u8, brightness_percent: u8 },
    /// Entry from the plain effect list
    Effect {
        id: u8,
        brightness_percent: u8,
        speed_percent: u8,
    },
    /// Mode or sub-mode this library does not know
    Unknown { mode: u8, selected: u8 },
}

/// Decoded `0x81` status frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    /// `None` when the power byte is neither on nor off
    pub power: Option<bool>,
    pub mode: StatusMode,
    pub led_count: u8,
}

/// One decoded notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedEvent {
    Status(StatusReport),
    LedSettings {
        led_count: u16,
        chip_type: ChipType,
        color_order: ColorOrder,
    },
}

const STATUS_FRAME: u8 = 0x81;
const LED_SETTINGS_FRAME: u8 = 0x63;
const STATUS_LEN: usize = 13;
const RING_LED_SETTINGS_LEN: usize = 5;

const MODE_STATIC: u8 = 0x61;
const MODE_MUSIC: u8 = 0x62;
const MODE_EFFECT: u8 = 0x25;

/// Returns the text between the last two double quotes.
///
/// Bytes that are not valid UTF-8 are skipped.
pub fn extract_payload(raw: &[u8]) -> std::result::Result<String, ParseError> {
    let text: String = String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect();
    let last = text.rfind('"').ok_or(ParseError::NoPayload)?;
    let first = text[..last].rfind('"').ok_or(ParseError::NoPayload)?;
    Ok(text[first + 1..last].to_string())
}

/// Parses hex text, ignoring whitespace
pub fn decode_hex(text: &str) -> std::result::Result<Vec<u8>, ParseError> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(ParseError::InvalidHex(text.to_string()));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| ParseError::InvalidHex(text.to_string()))
        })
        .collect()
}

/// Decodes a raw notification from the notify characteristic
pub fn parse_notification(
    raw: &[u8],
    model: Model,
    layout: &LedSettingsLayout,
) -> std::result::Result<DecodedEvent, ParseError> {
    let payload = decode_hex(&extract_payload(raw)?)?;
    debug!("Notification payload: {}", to_hex(&payload));
    decode_payload(&payload, model, layout)
}

/// Decodes an already unwrapped payload
pub fn decode_payload(
    payload: &[u8],
    model: Model,
    layout: &LedSettingsLayout,
) -> std::result::Result<DecodedEvent, ParseError> {
    let first = *payload.first().ok_or(ParseError::Truncated { needed: 1, len: 0 })?;

    if first == STATUS_FRAME {
        return decode_status_body(payload).map(DecodedEvent::Status);
    }

    match model {
        Model::Ring if first == LED_SETTINGS_FRAME => {
            require(payload, RING_LED_SETTINGS_LEN)?;
            let chip_type = ChipType::from_wire(model, payload[3])
                .ok_or(ParseError::UnknownChipType(payload[3]))?;
            let color_order =
                ColorOrder::from_wire(payload[4]).ok_or(ParseError::UnknownColorOrder(payload[4]))?;
            Ok(DecodedEvent::LedSettings {
                led_count: u16::from(payload[2]),
                chip_type,
                color_order,
            })
        }
        Model::Strip if payload.get(1) == Some(&LED_SETTINGS_FRAME) => {
            require(payload, layout.min_len())?;
            let per_segment = u32::from(u16::from_be_bytes([payload[2], payload[3]]));
            let segments = u32::from(payload[layout.segments]);
            let led_count = u16::try_from(per_segment * segments).unwrap_or(u16::MAX);
            let chip = payload[layout.chip_type];
            let order = payload[layout.color_order];
            let chip_type =
                ChipType::from_wire(model, chip).ok_or(ParseError::UnknownChipType(chip))?;
            let color_order =
                ColorOrder::from_wire(order).ok_or(ParseError::UnknownColorOrder(order))?;
            debug!(
                "Strip LED settings: {} segment(s), {} LEDs, {}, {}",
                segments, led_count, chip_type, color_order
            );
            Ok(DecodedEvent::LedSettings {
                led_count,
                chip_type,
                color_order,
            })
        }
        _ => Err(ParseError::UnknownFrame(first)),
    }
}

/// Decodes the body shared by status frames and advertisements.
///
/// Byte 0 and 1 are not inspected, so the body can start at any frame type.
pub fn decode_status_body(body: &[u8]) -> std::result::Result<StatusReport, ParseError> {
    require(body, STATUS_LEN)?;

    let power = match body[2] {
        POWER_ON => Some(true),
        POWER_OFF => Some(false),
        _ => None,
    };
    let mode_byte = body[3];
    let selected = body[4];
    let rgb = (body[6], body[7], body[8]);

    let mode = match mode_byte {
        MODE_STATIC => match selected {
            0xf0 => StatusMode::Color { rgb },
            0x0f => StatusMode::White {
                temp_percent: body[9],
                brightness_percent: body[5],
            },
            SOLID_COLOR_SHAPE => StatusMode::Rgb { rgb },
            0x02..=0x0a => StatusMode::StaticEffect {
                shape: selected,
                rgb,
                brightness_percent: body[5],
            },
            _ => StatusMode::Unknown {
                mode: mode_byte,
                selected,
            },
        },
        MODE_MUSIC => StatusMode::Music {
            id: selected,
            brightness_percent: body[6],
        },
        MODE_EFFECT => StatusMode::Effect {
            id: selected,
            brightness_percent: body[6],
            speed_percent: body[7],
        },
        _ => StatusMode::Unknown {
            mode: mode_byte,
            selected,
        },
    };

    Ok(StatusReport {
        power,
        mode,
        led_count: body[12],
    })
}

fn require(bytes: &[u8], needed: usize) -> std::result::Result<(), ParseError> {
    if bytes.len() < needed {
        return Err(ParseError::Truncated {
            needed,
            len: bytes.len(),
        });
    }
    Ok(())
}
