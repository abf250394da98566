//! CSS color strings for palette entries
//!
//! Palette colors in `prendr.toml` may be written as `[r, g, b, a]` arrays
//! or as any CSS color: `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`,
//! functional notation (`rgb()`, `hsl()`, ...) or a named color.

use image::Rgba;
use lightningcss::traits::Parse;
use lightningcss::values::color::{CssColor, FloatColor};
use thiserror::Error;

/// Error type for color parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("empty color string")]
    Empty,
    /// Hex colors take 3, 4, 6 or 8 digits
    #[error("invalid hex color length {0}, expected 3, 4, 6, or 8")]
    InvalidLength(usize),
    #[error("invalid hex character '{0}'")]
    InvalidHex(char),
    /// Anything lightningcss rejects or cannot express in sRGB
    #[error("CSS parse error: {0}")]
    CssParse(String),
}

/// Parse a CSS color string into an RGBA color.
///
/// # Examples
///
/// ```
/// use pixelrendr::color::parse_color;
///
/// assert_eq!(parse_color("#F00").unwrap(), image::Rgba([255, 0, 0, 255]));
/// assert_eq!(parse_color("#00000000").unwrap(), image::Rgba([0, 0, 0, 0]));
/// assert_eq!(parse_color("rgb(0, 255, 0)").unwrap(), image::Rgba([0, 255, 0, 255]));
/// assert_eq!(parse_color("blue").unwrap(), image::Rgba([0, 0, 255, 255]));
/// ```
pub fn parse_color(s: &str) -> Result<Rgba<u8>, ColorError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ColorError::Empty);
    }
    match s.strip_prefix('#') {
        Some(hex) => parse_hex(hex),
        None => parse_css(s),
    }
}

fn parse_hex(hex: &str) -> Result<Rgba<u8>, ColorError> {
    let digits = hex
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8).ok_or(ColorError::InvalidHex(c)))
        .collect::<Result<Vec<u8>, _>>()?;

    let channels: Vec<u8> = match digits.len() {
        // Short forms double each digit
        3 | 4 => digits.iter().map(|d| d * 17).collect(),
        6 | 8 => digits.chunks_exact(2).map(|pair| pair[0] * 16 + pair[1]).collect(),
        len => return Err(ColorError::InvalidLength(len)),
    };

    let alpha = channels.get(3).copied().unwrap_or(255);
    Ok(Rgba([channels[0], channels[1], channels[2], alpha]))
}

fn parse_css(s: &str) -> Result<Rgba<u8>, ColorError> {
    let color = CssColor::parse_string(s).map_err(|e| ColorError::CssParse(e.to_string()))?;
    let rgb = color
        .to_rgb()
        .map_err(|_| ColorError::CssParse(format!("cannot convert '{}' to RGB", s)))?;

    match rgb {
        CssColor::RGBA(c) => Ok(Rgba([c.red, c.green, c.blue, c.alpha])),
        CssColor::Float(float) => match float.as_ref() {
            FloatColor::RGB(c) => {
                let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                Ok(Rgba([channel(c.r), channel(c.g), channel(c.b), channel(c.alpha)]))
            }
            _ => Err(ColorError::CssParse(format!("'{}' is not an sRGB color", s))),
        },
        _ => Err(ColorError::CssParse(format!("'{}' is not an sRGB color", s))),
    }
}
