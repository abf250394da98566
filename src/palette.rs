//! Palettes and fixed-width palette digit encoding
//!
//! Compressed sprites refer to colors by their palette index, written as a
//! zero-padded decimal group. The group width depends only on the palette
//! size: a palette of 2 colors uses 1 digit per pixel, 16 colors use 2.

use image::Rgba;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::RenderError;

/// Fully transparent black, forced to index 0 by [`generate_palette`].
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// An ordered list of RGBA colors addressed by index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<[u8; 4]>", into = "Vec<[u8; 4]>")]
pub struct Palette {
    colors: Vec<Rgba<u8>>,
    digit_width: usize,
}

impl Palette {
    /// Create a palette, computing its digit width.
    pub fn new(colors: Vec<Rgba<u8>>) -> Self {
        let digit_width = digit_width(colors.len());
        Self { colors, digit_width }
    }

    /// Create a palette from raw `[r, g, b, a]` arrays.
    pub fn from_arrays(colors: &[[u8; 4]]) -> Self {
        Self::new(colors.iter().map(|c| Rgba(*c)).collect())
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Number of decimal digits used to write one index of this palette.
    pub fn digit_width(&self) -> usize {
        self.digit_width
    }

    pub fn get(&self, index: usize) -> Option<Rgba<u8>> {
        self.colors.get(index).copied()
    }

    pub fn colors(&self) -> &[Rgba<u8>] {
        &self.colors
    }

    /// Colors as plain `[r, g, b, a]` arrays.
    pub fn to_arrays(&self) -> Vec<[u8; 4]> {
        self.colors.iter().map(|c| c.0).collect()
    }

    /// Look up a color, failing when the index is past the end.
    pub fn color(&self, index: usize) -> Result<Rgba<u8>, RenderError> {
        self.get(index)
            .ok_or(RenderError::PaletteIndexOutOfRange { index, len: self.colors.len() })
    }
}

impl From<Vec<[u8; 4]>> for Palette {
    fn from(colors: Vec<[u8; 4]>) -> Self {
        Palette::from_arrays(&colors)
    }
}

impl From<Palette> for Vec<[u8; 4]> {
    fn from(palette: Palette) -> Self {
        palette.to_arrays()
    }
}

/// Digit width for a palette of `palette_size` colors.
///
/// This is `floor(log10(palette_size)) + 1`, with a minimum of 1.
///
/// # Examples
///
/// ```
/// use pixelrendr::palette::digit_width;
///
/// assert_eq!(digit_width(0), 1);
/// assert_eq!(digit_width(9), 1);
/// assert_eq!(digit_width(10), 2);
/// assert_eq!(digit_width(256), 3);
/// ```
pub fn digit_width(palette_size: usize) -> usize {
    let mut width = 1;
    let mut remaining = palette_size;
    while remaining >= 10 {
        remaining /= 10;
        width += 1;
    }
    width
}

/// Zero-pad `index` on the left to `width` characters.
///
/// Indices wider than `width` are written in full.
pub fn encode_index(index: usize, width: usize) -> String {
    format!("{:0width$}", index, width = width)
}

/// Parse a digit group into a palette index.
///
/// `offset` is the group's position in the source, used in error reports.
pub fn parse_group(group: &str, offset: usize) -> Result<usize, RenderError> {
    if group.is_empty() || !group.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RenderError::malformed(offset, format!("invalid digit group '{}'", group)));
    }
    group
        .parse()
        .map_err(|_| RenderError::malformed(offset, format!("digit group '{}' overflows", group)))
}

/// Decode one digit group to its palette color.
pub fn decode_group(group: &str, palette: &Palette) -> Result<Rgba<u8>, RenderError> {
    let index = parse_group(group, 0)?;
    palette.color(index)
}

/// Derive a palette from raw RGBA pixel data.
///
/// Colors are deduplicated on the full RGBA value, so two pixels with the
/// same RGB but different alpha get separate entries and keep their alpha
/// through an encode/decode round trip. Grayscale colors (r == g == b) come first,
/// ascending by intensity; the remaining colors follow sorted descending
/// by red, then green, then blue, then alpha. Any fully transparent pixel
/// (or `force_zero_color`) puts `[0, 0, 0, 0]` at index 0.
pub fn generate_palette(data: &[u8], force_zero_color: bool) -> Palette {
    let mut force_zero = force_zero_color;
    let mut seen: HashSet<[u8; 4]> = HashSet::new();
    let mut grayscale: Vec<[u8; 4]> = Vec::new();
    let mut general: Vec<[u8; 4]> = Vec::new();

    for chunk in data.chunks_exact(4) {
        let color = [chunk[0], chunk[1], chunk[2], chunk[3]];
        if color[3] == 0 {
            force_zero = true;
            continue;
        }
        if !seen.insert(color) {
            continue;
        }
        if color[0] == color[1] && color[1] == color[2] {
            grayscale.push(color);
        } else {
            general.push(color);
        }
    }

    // Stable sorts keep first-seen order for equal keys
    grayscale.sort_by_key(|c| c[0]);
    general.sort_by(|a, b| b.cmp(a));

    let mut colors = Vec::with_capacity(grayscale.len() + general.len() + 1);
    if force_zero {
        colors.push(TRANSPARENT.0);
    }
    colors.extend(grayscale);
    colors.extend(general);

    Palette::from_arrays(&colors)
}
