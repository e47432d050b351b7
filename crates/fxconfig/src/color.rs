use serde::Serialize;

/// Straight-alpha color with components in `0.0..=1.0`.
///
/// Packed colors always travel as `0xAARRGGBB` (alpha in the top byte). Every
/// effect unpacks through [`Color::from_argb`]; there is no second byte order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Unpacks a `0xAARRGGBB` value.
    pub fn from_argb(packed: u32) -> Self {
        let channel = |shift: u32| ((packed >> shift) & 0xFF) as f32 / 255.0;
        Self {
            r: channel(16),
            g: channel(8),
            b: channel(0),
            a: channel(24),
        }
    }

    /// Packs back into `0xAARRGGBB`, rounding each channel to the nearest byte.
    pub fn to_argb(self) -> u32 {
        let byte = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u32;
        (byte(self.a) << 24) | (byte(self.r) << 16) | (byte(self.g) << 8) | byte(self.b)
    }

    /// Component order expected by `vec4` uniforms.
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Parses a color literal into the packed `0xAARRGGBB` form.
///
/// Accepted spellings:
///
/// * `rgba(RRGGBBAA)` and `rgb(RRGGBB)` hex forms
/// * `rgba(r, g, b, a)` / `rgb(r, g, b)` with `0-255` channels and a `0.0-1.0` alpha
/// * `0xAARRGGBB` hex literals
/// * plain decimal integers, taken as already packed
pub fn parse_color(raw: &str) -> Result<u32, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("color must not be empty".to_string());
    }

    let lower = trimmed.to_ascii_lowercase();
    if let Some(body) = strip_call(&lower, "rgba") {
        return parse_rgba_body(body, true);
    }
    if let Some(body) = strip_call(&lower, "rgb") {
        return parse_rgba_body(body, false);
    }
    if let Some(hex) = lower.strip_prefix("0x") {
        return u32::from_str_radix(hex, 16)
            .map_err(|err| format!("invalid hex color '{trimmed}': {err}"));
    }

    lower
        .parse::<i64>()
        .map_err(|_| format!("unrecognised color '{trimmed}'"))
        .and_then(|value| {
            u32::try_from(value).map_err(|_| format!("color '{trimmed}' is out of range"))
        })
}

fn strip_call<'a>(input: &'a str, name: &str) -> Option<&'a str> {
    input
        .strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
}

fn parse_rgba_body(body: &str, with_alpha: bool) -> Result<u32, String> {
    if body.contains(',') {
        return parse_rgba_components(body, with_alpha);
    }

    let expected = if with_alpha { 8 } else { 6 };
    if body.len() != expected {
        return Err(format!(
            "expected {expected} hex digits inside color call, got '{body}'"
        ));
    }
    let value =
        u32::from_str_radix(body, 16).map_err(|err| format!("invalid hex color '{body}': {err}"))?;
    if with_alpha {
        // RRGGBBAA -> AARRGGBB
        Ok(value.rotate_right(8))
    } else {
        Ok(0xFF00_0000 | value)
    }
}

fn parse_rgba_components(body: &str, with_alpha: bool) -> Result<u32, String> {
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    let expected = if with_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return Err(format!(
            "expected {expected} comma separated channels, got {}",
            parts.len()
        ));
    }

    let mut channels = [0u32; 3];
    for (slot, part) in channels.iter_mut().zip(&parts) {
        let value: u32 = part
            .parse()
            .map_err(|_| format!("invalid color channel '{part}'"))?;
        if value > 255 {
            return Err(format!("color channel {value} exceeds 255"));
        }
        *slot = value;
    }

    let alpha = if with_alpha {
        let value: f32 = parts[3]
            .parse()
            .map_err(|_| format!("invalid alpha '{}'", parts[3]))?;
        if !(0.0..=1.0).contains(&value) {
            return Err(format!("alpha {value} must be within 0.0 and 1.0"));
        }
        (value * 255.0).round() as u32
    } else {
        0xFF
    };

    Ok((alpha << 24) | (channels[0] << 16) | (channels[1] << 8) | channels[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_hex_call_is_stored_as_argb() {
        assert_eq!(parse_color("rgba(c8200000)").unwrap(), 0x00c8_2000);
        assert_eq!(parse_color("rgba(ff8800dd)").unwrap(), 0xddff_8800);
        assert_eq!(parse_color("RGB(102030)").unwrap(), 0xff10_2030);
    }

    #[test]
    fn component_form_matches_hex_form() {
        let components = parse_color("rgba(255, 136, 0, 1.0)").unwrap();
        assert_eq!(components, parse_color("rgba(ff8800ff)").unwrap());
    }

    #[test]
    fn raw_literals_are_taken_as_packed() {
        assert_eq!(parse_color("0x80ff0000").unwrap(), 0x80ff_0000);
        assert_eq!(parse_color("4278190080").unwrap(), 0xff00_0000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_color("").is_err());
        assert!(parse_color("rgba(zz)").is_err());
        assert!(parse_color("rgb(300, 0, 0)").is_err());
        assert!(parse_color("-1").is_err());
    }

    #[test]
    fn unpacks_alpha_from_top_byte() {
        let color = Color::from_argb(0x80ff_0000);
        assert!((color.r - 1.0).abs() < 1e-6);
        assert_eq!(color.g, 0.0);
        assert_eq!(color.b, 0.0);
        assert!((color.a - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(color.to_argb(), 0x80ff_0000);
    }
}
