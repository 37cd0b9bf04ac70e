/*!
 # Device state

 The last known snapshot of what a light is doing. Only the device session
 writes to it, either optimistically after a command was written or
 authoritatively when a notification is decoded.

 The setters keep the color fields consistent with `color_mode`: at most one
 of `hs_color`, `rgb_color` and `color_temp_kelvin` is set, and none of them
 while an effect runs.
*/

use crate::codec::{DecodedEvent, StatusMode, StatusReport};
use crate::color;
use crate::config::{ChipType, ColorOrder, DeviceConfig};
use crate::effects::{self, EffectKind, EFFECT_OFF, EFFECT_UNKNOWN};
use crate::identity::Model;

/// Warmest white of the ring light
pub const MIN_KELVIN: u32 = 2700;
/// Coolest white of the ring light
pub const MAX_KELVIN: u32 = 6500;
/// Effect speed until the device reports one
pub const DEFAULT_EFFECT_SPEED: u8 = 0x64;

/// Which color field is authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    Hs,
    Rgb,
    ColorTemp,
    /// An effect runs, only brightness can be changed
    Brightness,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    /// `None` until the light was reachable once
    pub is_on: Option<bool>,
    pub color_mode: ColorMode,
    /// Hue in degrees and saturation in percent
    pub hs_color: Option<(u16, u8)>,
    pub rgb_color: Option<(u8, u8, u8)>,
    /// 0-255
    pub brightness: u8,
    pub color_temp_kelvin: Option<u32>,
    /// `None` means no effect is running
    pub effect: Option<String>,
    /// 0-100
    pub effect_speed: u8,
    /// Foreground color of the running strip static or sound reactive effect
    pub effect_color: Option<(u8, u8, u8)>,
    pub led_count: Option<u16>,
    pub chip_type: Option<ChipType>,
    pub color_order: Option<ColorOrder>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            is_on: None,
            color_mode: ColorMode::Unknown,
            hs_color: None,
            rgb_color: None,
            brightness: u8::MAX,
            color_temp_kelvin: None,
            effect: None,
            effect_speed: DEFAULT_EFFECT_SPEED,
            effect_color: None,
            led_count: None,
            chip_type: None,
            color_order: None,
        }
    }
}

impl DeviceState {
    /// Empty state carrying the configured LED topology
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            led_count: config.led_count,
            chip_type: config.chip_type,
            color_order: config.color_order,
            ..Self::default()
        }
    }

    /// Effect name, or [`EFFECT_OFF`]
    pub fn effect_or_off(&self) -> &str {
        self.effect.as_deref().unwrap_or(EFFECT_OFF)
    }

    /// Best guess at the color currently shown, for effects that take one
    pub fn current_rgb(&self) -> Option<(u8, u8, u8)> {
        match self.color_mode {
            ColorMode::Rgb => self.rgb_color,
            ColorMode::Hs => self
                .hs_color
                .map(|(h, s)| color::hsv_to_rgb(h, s, 100)),
            _ => self.effect_color,
        }
    }

    pub fn set_power(&mut self, on: bool) {
        self.is_on = Some(on);
    }

    pub fn set_hs(&mut self, hs: (u16, u8), brightness: u8) {
        self.clear_colors();
        self.color_mode = ColorMode::Hs;
        self.hs_color = Some((hs.0.min(360), hs.1.min(100)));
        self.brightness = brightness;
    }

    pub fn set_rgb(&mut self, rgb: (u8, u8, u8), brightness: u8) {
        self.clear_colors();
        self.color_mode = ColorMode::Rgb;
        self.rgb_color = Some(rgb);
        self.brightness = brightness;
    }

    pub fn set_color_temp(&mut self, kelvin: u32, brightness: u8) {
        self.clear_colors();
        self.color_mode = ColorMode::ColorTemp;
        self.color_temp_kelvin = Some(kelvin.clamp(MIN_KELVIN, MAX_KELVIN));
        self.brightness = brightness;
    }

    /// Records a running effect. Colors are cleared.
    pub fn set_effect(&mut self, name: impl Into<String>, brightness: u8, color: Option<(u8, u8, u8)>) {
        self.clear_colors();
        self.color_mode = ColorMode::Brightness;
        self.effect = Some(name.into());
        self.effect_color = color;
        self.brightness = brightness;
    }

    pub fn set_effect_speed(&mut self, speed: u8) {
        self.effect_speed = speed.min(100);
    }

    pub fn set_led_settings(&mut self, led_count: u16, chip_type: ChipType, color_order: ColorOrder) {
        self.led_count = Some(led_count);
        self.chip_type = Some(chip_type);
        self.color_order = Some(color_order);
    }

    fn clear_colors(&mut self) {
        self.hs_color = None;
        self.rgb_color = None;
        self.color_temp_kelvin = None;
        self.effect = None;
        self.effect_color = None;
    }

    /// Merges a decoded notification
    pub fn apply(&mut self, event: &DecodedEvent, model: Model) {
        match event {
            DecodedEvent::Status(report) => self.apply_status(report, model),
            DecodedEvent::LedSettings {
                led_count,
                chip_type,
                color_order,
            } => self.set_led_settings(*led_count, *chip_type, *color_order),
        }
    }

    /// Merges a status frame, from a notification or an advertisement.
    ///
    /// The LED count in a status frame is only a single byte, so it is used
    /// only while the count is unknown.
    pub fn apply_status(&mut self, report: &StatusReport, model: Model) {
        if let Some(on) = report.power {
            self.is_on = Some(on);
        }

        match report.mode {
            StatusMode::Color { rgb } => {
                let (h, s, v) = color::rgb_to_hsv(rgb.0, rgb.1, rgb.2);
                self.set_hs((h, s), color::percent_to_brightness(v));
            }
            StatusMode::White {
                temp_percent,
                brightness_percent,
            } => {
                let kelvin = color::percent_to_kelvin(temp_percent, MIN_KELVIN, MAX_KELVIN);
                self.set_color_temp(kelvin, color::percent_to_brightness(brightness_percent));
            }
            StatusMode::Rgb { rgb } => {
                let brightness = self.brightness;
                self.set_rgb(color::unscale_rgb(rgb, brightness), brightness);
            }
            StatusMode::StaticEffect {
                shape,
                rgb,
                brightness_percent,
            } => {
                let name = effects::effect_name(model, EffectKind::static_id(shape));
                self.set_effect(name, color::percent_to_brightness(brightness_percent), Some(rgb));
            }
            StatusMode::Music {
                id,
                brightness_percent,
            } => {
                let name = effects::effect_name(model, EffectKind::music_id(id));
                self.set_effect(name, color::percent_to_brightness(brightness_percent), None);
            }
            StatusMode::Effect {
                id,
                brightness_percent,
                speed_percent,
            } => {
                let name = effects::effect_name(model, u16::from(id));
                self.set_effect(name, color::percent_to_brightness(brightness_percent), None);
                self.set_effect_speed(speed_percent);
            }
            StatusMode::Unknown { .. } => {
                let brightness = self.brightness;
                self.set_effect(EFFECT_UNKNOWN, brightness, None);
            }
        }

        if self.led_count.is_none() && report.led_count > 0 {
            self.led_count = Some(u16::from(report.led_count));
        }
    }
}
