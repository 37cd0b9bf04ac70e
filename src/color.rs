/*!
 # Color and unit conversions

 Conversions between the representations the host uses (RGB, hue in degrees,
 brightness 0-255, kelvin) and the ones the device puts on the wire
 (percentages and a halved hue byte).

 All conversions truncate rather than round. Devices report colors that were
 produced with the same truncating arithmetic, so rounding would make freshly
 decoded state disagree with what was sent.
*/

/// Lowest brightness byte the device accepts; 0 and 1 are rejected
pub const MIN_BRIGHTNESS: u8 = 2;

/// Converts RGB (0-255 each) to HSV as `(hue 0-360, saturation 0-100, value 0-100)`
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u16, u8, u8) {
    let r = f64::from(r) / 255.0;
    let g = f64::from(g) / 255.0;
    let b = f64::from(b) / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let v = max;
    if max == min {
        return (0, 0, (v * 100.0) as u8);
    }

    let delta = max - min;
    let s = delta / max;
    let rc = (max - r) / delta;
    let gc = (max - g) / delta;
    let bc = (max - b) / delta;
    let h = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    let h = (h / 6.0).rem_euclid(1.0);

    ((h * 360.0) as u16, (s * 100.0) as u8, (v * 100.0) as u8)
}

/// Converts HSV (`hue 0-360`, `saturation 0-100`, `value 0-100`) to RGB
pub fn hsv_to_rgb(hue: u16, saturation: u8, value: u8) -> (u8, u8, u8) {
    let h = f64::from(hue % 360) / 360.0;
    let s = f64::from(saturation.min(100)) / 100.0;
    let v = f64::from(value.min(100)) / 100.0;
    if s == 0.0 {
        let c = (v * 255.0) as u8;
        return (c, c, c);
    }

    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match i as u8 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    ((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8)
}

/// Resolves the brightness to send and its percentage.
///
/// Falls back to `current` when nothing was requested, and to full
/// brightness when `current` is unknown as well. The byte is clamped to
/// `2..=255`. The percentage never drops below 1 so a dim light is not sent
/// as "0%".
pub fn normalize_brightness(requested: Option<u8>, current: Option<u8>) -> (u8, u8) {
    let value = requested.or(current).unwrap_or(u8::MAX).max(MIN_BRIGHTNESS);
    (value, brightness_to_percent(value).max(1))
}

/// Brightness byte to percent, `floor(value * 100 / 255)`
pub fn brightness_to_percent(value: u8) -> u8 {
    (u32::from(value) * 100 / 255) as u8
}

/// Percent (clamped to 100) to brightness byte, `floor(percent * 255 / 100)`
pub fn percent_to_brightness(percent: u8) -> u8 {
    (u32::from(percent.min(100)) * 255 / 100) as u8
}

/// Maps a color temperature onto the device's 0 (warm) to 100 (cool) scale
pub fn kelvin_to_percent(kelvin: u32, min_kelvin: u32, max_kelvin: u32) -> u8 {
    if max_kelvin <= min_kelvin {
        return 0;
    }
    let kelvin = kelvin.clamp(min_kelvin, max_kelvin);
    ((kelvin - min_kelvin) * 100 / (max_kelvin - min_kelvin)) as u8
}

/// Inverse of [`kelvin_to_percent`]
pub fn percent_to_kelvin(percent: u8, min_kelvin: u32, max_kelvin: u32) -> u32 {
    let percent = u32::from(percent.min(100));
    min_kelvin + percent * max_kelvin.saturating_sub(min_kelvin) / 100
}

/// Halves a hue (0-360) so it fits in one byte.
///
/// Odd hues lose one degree: `wire_byte_to_hue(hue_to_wire_byte(h))` gives
/// back `h` only for even `h`. That is the precision of the protocol.
pub fn hue_to_wire_byte(hue: u16) -> u8 {
    (hue.min(360) / 2) as u8
}

/// Doubles a hue byte back to degrees
pub fn wire_byte_to_hue(byte: u8) -> u16 {
    u16::from(byte.min(180)) * 2
}

/// Scales a full-intensity color down by a brightness byte
pub fn scale_rgb(rgb: (u8, u8, u8), brightness: u8) -> (u8, u8, u8) {
    let scale = |c: u8| (u32::from(c) * u32::from(brightness) / 255) as u8;
    (scale(rgb.0), scale(rgb.1), scale(rgb.2))
}

/// Recovers the full-intensity color from one the device scaled by `brightness`.
///
/// This is lossy for dim lights. A brightness of zero leaves the color as
/// reported and every channel is clamped to 255.
pub fn unscale_rgb(rgb: (u8, u8, u8), brightness: u8) -> (u8, u8, u8) {
    if brightness == 0 {
        return rgb;
    }
    let unscale = |c: u8| (u32::from(c) * 255 / u32::from(brightness)).min(255) as u8;
    (unscale(rgb.0), unscale(rgb.1), unscale(rgb.2))
}
