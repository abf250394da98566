//! Encoder: raw RGBA pixels -> compressed sprite string
//!
//! Every pixel is snapped to its nearest palette color. The indices that
//! are actually used become an inline palette (`p[...]`) so the body can
//! use the narrowest digit width, and runs are collapsed into
//! `x<digit><count>,` repeats.

use log::debug;
use std::collections::{BTreeMap, HashMap};

use crate::error::RenderError;
use crate::palette::{digit_width, encode_index, Palette};

/// Index of the palette color closest to `pixel`.
///
/// Distance is the summed absolute channel difference. The palette is
/// scanned from its last entry down and only a strictly smaller distance
/// replaces the best match, so on a tie the higher index is kept.
/// Returns 0 for an empty palette.
pub fn closest_in_palette(pixel: &[u8], palette: &Palette) -> usize {
    let mut best_index = 0;
    let mut best_diff = u32::MAX;

    for (index, color) in palette.colors().iter().enumerate().rev() {
        let diff: u32 = pixel
            .iter()
            .zip(color.0.iter())
            .map(|(a, b)| (*a as i32 - *b as i32).unsigned_abs())
            .sum();
        if diff < best_diff {
            best_diff = diff;
            best_index = index;
        }
    }

    best_index
}

/// Palette index of every pixel, plus how often each index occurs.
pub fn get_pixels(data: &[u8], palette: &Palette) -> (Vec<usize>, BTreeMap<usize, usize>) {
    let mut pixels = Vec::with_capacity(data.len() / 4);
    let mut occurrences = BTreeMap::new();

    for chunk in data.chunks_exact(4) {
        let index = closest_in_palette(chunk, palette);
        pixels.push(index);
        *occurrences.entry(index).or_insert(0) += 1;
    }

    (pixels, occurrences)
}

/// The compact palette of indices a sprite actually uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteMapping {
    /// Used default-palette indices, ascending
    pub palette: Vec<usize>,
    /// Default index -> position in `palette`
    pub numbers: HashMap<usize, usize>,
    /// Digit width of the compact palette
    pub digit_width: usize,
}

pub fn map_palette(occurrences: &BTreeMap<usize, usize>) -> PaletteMapping {
    let palette: Vec<usize> = occurrences.keys().copied().collect();
    let numbers = palette.iter().enumerate().map(|(position, index)| (*index, position)).collect();
    PaletteMapping { digit_width: digit_width(palette.len()), palette, numbers }
}

/// Run-length encode indices against a compact palette.
///
/// A run longer than `max(3, round(4 / digit_width))` is written as a
/// repeat; shorter runs are written out digit by digit.
pub fn combine_pixels(pixels: &[usize], mapping: &PaletteMapping) -> String {
    let width = mapping.digit_width;
    let threshold = ((4.0 / width as f64).round() as usize).max(3);

    let header: Vec<String> = mapping.palette.iter().map(|index| encode_index(*index, width)).collect();
    let mut output = format!("p[{}]", header.join(","));

    let mut i = 0;
    while i < pixels.len() {
        let current = pixels[i];
        let mut count = 1;
        while i + count < pixels.len() && pixels[i + count] == current {
            count += 1;
        }

        let position = mapping.numbers.get(&current).copied().unwrap_or(0);
        let digit = encode_index(position, width);
        if count > threshold {
            output.push('x');
            output.push_str(&digit);
            output.push_str(&count.to_string());
            output.push(',');
        } else {
            for _ in 0..count {
                output.push_str(&digit);
            }
        }
        i += count;
    }

    output
}

/// Encodes images against a fixed palette.
#[derive(Debug, Clone, Copy)]
pub struct Encoder<'a> {
    palette: &'a Palette,
}

impl<'a> Encoder<'a> {
    pub fn new(palette: &'a Palette) -> Self {
        Self { palette }
    }

    /// Encode `width * height` RGBA pixels.
    pub fn encode(&self, data: &[u8], width: u32, height: u32) -> Result<String, RenderError> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(RenderError::InvalidPixelData { width, height, len: data.len() });
        }
        if self.palette.is_empty() {
            return Err(RenderError::InvalidSettings("cannot encode against an empty palette".to_string()));
        }

        let (pixels, occurrences) = get_pixels(data, self.palette);
        let mapping = map_palette(&occurrences);
        let encoded = combine_pixels(&pixels, &mapping);
        debug!(
            "encoded {}x{} image with {} colors into {} bytes",
            width,
            height,
            mapping.palette.len(),
            encoded.len()
        );
        Ok(encoded)
    }
}
