use std::fmt;
use std::str::FromStr;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// An RGBA fill color parsed from CSS notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub Rgba<u8>);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid color: {0}")]
pub struct ColorParseError(String);

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color(Rgba([r, g, b, 255]))
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color(Rgba([r, g, b, a]))
    }

    pub fn alpha(&self) -> u8 {
        self.0 .0[3]
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    /// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)` and `rgba(r, g, b, a)`
    /// where `a` is in 0..=1.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim().to_ascii_lowercase();
        let invalid = || ColorParseError(s.to_string());

        if let Some(hex) = input.strip_prefix('#') {
            let digits: Vec<u8> = hex
                .chars()
                .map(|c| c.to_digit(16).map(|d| d as u8))
                .collect::<Option<_>>()
                .ok_or_else(invalid)?;
            return match digits.len() {
                3 => Ok(Color::rgb(
                    digits[0] * 17,
                    digits[1] * 17,
                    digits[2] * 17,
                )),
                6 | 8 => {
                    let bytes: Vec<u8> = digits.chunks(2).map(|p| p[0] * 16 + p[1]).collect();
                    let alpha = bytes.get(3).copied().unwrap_or(255);
                    Ok(Color::rgba(bytes[0], bytes[1], bytes[2], alpha))
                }
                _ => Err(invalid()),
            };
        }

        let (args, has_alpha) = if let Some(rest) = input.strip_prefix("rgba(") {
            (rest, true)
        } else if let Some(rest) = input.strip_prefix("rgb(") {
            (rest, false)
        } else {
            return Err(invalid());
        };
        let args = args.strip_suffix(')').ok_or_else(invalid)?;
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        if parts.len() != if has_alpha { 4 } else { 3 } {
            return Err(invalid());
        }

        let channel = |p: &str| -> Result<u8, ColorParseError> {
            let value: f32 = p.parse().map_err(|_| invalid())?;
            Ok(value.round().clamp(0.0, 255.0) as u8)
        };
        let alpha = if has_alpha {
            let value: f32 = parts[3].parse().map_err(|_| invalid())?;
            (value.clamp(0.0, 1.0) * 255.0).round() as u8
        } else {
            255
        };

        Ok(Color::rgba(
            channel(parts[0])?,
            channel(parts[1])?,
            channel(parts[2])?,
            alpha,
        ))
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0 .0;
        if a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
        }
    }
}

/// Source-over composite of `src` onto `dst`, with `coverage` scaling the
/// source alpha (glyph anti-aliasing).
pub fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>, coverage: f32) {
    let sa = (src.0[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    if sa >= 1.0 {
        *dst = src;
        dst.0[3] = 255;
        return;
    }

    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let s = src.0[c] as f32;
        let d = dst.0[c] as f32;
        dst.0[c] = ((s * sa + d * da * (1.0 - sa)) / out_a).round() as u8;
    }
    dst.0[3] = (out_a * 255.0).round() as u8;
}

/// Fills an axis-aligned rectangle, clipped to the canvas.
pub fn fill_rect(canvas: &mut RgbaImage, x: i64, y: i64, w: u32, h: u32, color: Color) {
    let x0 = x.max(0) as u32;
    let y0 = y.max(0) as u32;
    let x1 = ((x + w as i64).max(0) as u32).min(canvas.width());
    let y1 = ((y + h as i64).max(0) as u32).min(canvas.height());

    for py in y0..y1 {
        for px in x0..x1 {
            blend_pixel(canvas.get_pixel_mut(px, py), color.0, 1.0);
        }
    }
}
