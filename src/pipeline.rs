//! Decode pipelines: compressed source -> raw pixels -> sized pixels
//!
//! Decoding runs in two independently cached stages:
//!
//! - The **base** pipeline expands a compressed source string into a flat
//!   RGBA buffer at full resolution, with horizontal scaling applied. It
//!   is cached per source node and depends on the palette.
//! - The **dims** pipeline repeats rows for vertical scaling and applies
//!   flips requested by the key. It is cached per node, key and
//!   requested dimensions.
//!
//! Each pipeline is an ordered list of pure stage functions plus a cache.

use log::{debug, trace};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RenderError;
use crate::filter::Filter;
use crate::library::NodeId;
use crate::models::{Section, SpriteAttributes};
use crate::palette::{digit_width, encode_index, parse_group, Palette};

/// Inputs shared by every base stage.
#[derive(Debug, Clone)]
pub struct BaseContext<'a> {
    pub palette: &'a Palette,
    pub scale: u32,
    pub filters: Vec<&'a Filter>,
}

/// A base stage rewriting a digit stream.
pub type TextStage = fn(&str, &BaseContext) -> Result<String, RenderError>;

/// Cache key of the base stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BaseKey {
    pub node: NodeId,
    pub section: Option<Section>,
}

/// Compressed source -> full-resolution pixel buffer.
#[derive(Debug, Clone)]
pub struct BasePipeline {
    stages: Vec<(&'static str, TextStage)>,
    cache: HashMap<BaseKey, Rc<[u8]>>,
}

impl Default for BasePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl BasePipeline {
    pub fn new() -> Self {
        Self {
            stages: vec![("unravel", unravel), ("filter", apply_filters), ("expand", expand)],
            cache: HashMap::new(),
        }
    }

    /// Names of the text stages, in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|(name, _)| *name).collect()
    }

    /// Run the pipeline, returning the cached buffer when there is one.
    pub fn process(
        &mut self,
        key: BaseKey,
        source: &str,
        ctx: &BaseContext,
    ) -> Result<Rc<[u8]>, RenderError> {
        if let Some(cached) = self.cache.get(&key) {
            trace!("base cache hit for {:?}", key);
            return Ok(Rc::clone(cached));
        }
        debug!("base stage for {:?} ({} source bytes)", key, source.len());
        let pixels: Rc<[u8]> = self.run(source, ctx)?.into();
        self.cache.insert(key, Rc::clone(&pixels));
        Ok(pixels)
    }

    /// Run the pipeline without caching.
    pub fn run(&self, source: &str, ctx: &BaseContext) -> Result<Vec<u8>, RenderError> {
        let mut digits = source.to_string();
        for (_, stage) in &self.stages {
            digits = stage(&digits, ctx)?;
        }
        to_pixels(&digits, ctx)
    }

    pub fn contains(&self, key: &BaseKey) -> bool {
        self.cache.contains_key(key)
    }

    /// Drop one cached buffer.
    pub fn remove(&mut self, key: &BaseKey) {
        self.cache.remove(key);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Drop every cached buffer belonging to `node`.
    pub fn clear_node(&mut self, node: NodeId) {
        self.cache.retain(|key, _| key.node != node);
    }
}

/// Expand the compressed grammar into a stream of default-width digits.
///
/// Tokens:
/// - a digit group of the active width: one literal palette index
/// - `x<group><count>,`: `group` repeated `count` times
/// - `p[i0,i1,...]`: switch to an inline palette of default indices; the
///   active width becomes the digit width of that palette
/// - `p`: switch back to the default palette
///
/// A trailing group shorter than the active width is ignored.
pub fn unravel(source: &str, ctx: &BaseContext) -> Result<String, RenderError> {
    if let Some(offset) = source.bytes().position(|b| !b.is_ascii()) {
        return Err(RenderError::malformed(offset, "non-ASCII character in source"));
    }
    let bytes = source.as_bytes();
    let default_width = ctx.palette.digit_width();
    let mut inline_palette: Option<Vec<usize>> = None;
    let mut width = default_width;
    let mut output = String::with_capacity(bytes.len() * default_width);
    let mut loc = 0;

    let to_default = |index: usize, inline: &Option<Vec<usize>>| -> Result<String, RenderError> {
        let index = match inline {
            Some(reference) => {
                let mapped = *reference.get(index).ok_or(RenderError::PaletteIndexOutOfRange {
                    index,
                    len: reference.len(),
                })?;
                // Inline entries index the default palette
                if mapped >= ctx.palette.len() {
                    return Err(RenderError::PaletteIndexOutOfRange {
                        index: mapped,
                        len: ctx.palette.len(),
                    });
                }
                mapped
            }
            None => index,
        };
        Ok(encode_index(index, default_width))
    };

    while loc < bytes.len() {
        match bytes[loc] {
            b'x' => {
                let start = loc + 1;
                let end = find_byte(bytes, b',', start)
                    .ok_or_else(|| RenderError::malformed(loc, "unterminated repeat, expected ','"))?;
                if end < start + width {
                    return Err(RenderError::malformed(loc, "repeat is missing its digit group"));
                }
                let index = parse_group(&source[start..start + width], start)?;
                let count_text = &source[start + width..end];
                if count_text.is_empty() {
                    return Err(RenderError::malformed(loc, "repeat is missing its count"));
                }
                let count: usize = count_text.parse().map_err(|_| {
                    RenderError::malformed(start + width, format!("invalid repeat count '{}'", count_text))
                })?;
                let digit = to_default(index, &inline_palette)?;
                for _ in 0..count {
                    output.push_str(&digit);
                }
                loc = end + 1;
            }
            b'p' => {
                if bytes.get(loc + 1) == Some(&b'[') {
                    let end = find_byte(bytes, b']', loc + 2).ok_or_else(|| {
                        RenderError::malformed(loc, "unterminated palette, expected ']'")
                    })?;
                    let body = &source[loc + 2..end];
                    let entries = if body.is_empty() {
                        Vec::new()
                    } else {
                        let mut offset = loc + 2;
                        let mut entries = Vec::new();
                        for entry in body.split(',') {
                            entries.push(parse_group(entry, offset)?);
                            offset += entry.len() + 1;
                        }
                        entries
                    };
                    width = digit_width(entries.len());
                    inline_palette = Some(entries);
                    loc = end + 1;
                } else {
                    inline_palette = None;
                    width = default_width;
                    loc += 1;
                }
            }
            _ => {
                if loc + width > bytes.len() {
                    break;
                }
                let index = parse_group(&source[loc..loc + width], loc)?;
                output.push_str(&to_default(index, &inline_palette)?);
                loc += width;
            }
        }
    }

    Ok(output)
}

fn find_byte(bytes: &[u8], needle: u8, from: usize) -> Option<usize> {
    bytes.get(from..)?.iter().position(|b| *b == needle).map(|pos| pos + from)
}

/// Apply every filter of the context, in order.
pub fn apply_filters(digits: &str, ctx: &BaseContext) -> Result<String, RenderError> {
    let width = ctx.palette.digit_width();
    let mut output = digits.to_string();
    for filter in &ctx.filters {
        output = filter.apply(&output, width, ctx.palette.len())?;
    }
    Ok(output)
}

/// Repeat each digit group `scale` times (horizontal scaling).
pub fn expand(digits: &str, ctx: &BaseContext) -> Result<String, RenderError> {
    if ctx.scale <= 1 {
        return Ok(digits.to_string());
    }
    let width = ctx.palette.digit_width();
    let mut output = String::with_capacity(digits.len() * ctx.scale as usize);
    for group in digits.as_bytes().chunks(width) {
        for _ in 0..ctx.scale {
            // Groups are ASCII digits, so every chunk is valid UTF-8
            output.extend(group.iter().map(|b| *b as char));
        }
    }
    Ok(output)
}

/// Map each digit group through the palette to 4 RGBA bytes.
pub fn to_pixels(digits: &str, ctx: &BaseContext) -> Result<Vec<u8>, RenderError> {
    let width = ctx.palette.digit_width();
    let mut output = Vec::with_capacity(digits.len() / width * 4);
    let mut offset = 0;
    while offset + width <= digits.len() {
        let index = parse_group(&digits[offset..offset + width], offset)?;
        output.extend_from_slice(&ctx.palette.color(index)?.0);
        offset += width;
    }
    Ok(output)
}

/// Flip flags carried by a request key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flip {
    pub horizontal: bool,
    pub vertical: bool,
}

impl Flip {
    /// Detect flip tokens by substring test on the whole key.
    pub fn from_key(key: &str, flip_horiz: &str, flip_vert: &str) -> Self {
        Self {
            horizontal: !flip_horiz.is_empty() && key.contains(flip_horiz),
            vertical: !flip_vert.is_empty() && key.contains(flip_vert),
        }
    }
}

/// Inputs shared by every dims stage.
#[derive(Debug, Clone, Copy)]
pub struct DimsContext {
    pub attributes: SpriteAttributes,
    pub scale: u32,
    pub flip: Flip,
}

/// A dims stage rewriting a pixel buffer.
pub type PixelStage = fn(Vec<u8>, &DimsContext) -> Result<Vec<u8>, RenderError>;

/// Cache key of the dims stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimsKey {
    pub node: NodeId,
    pub section: Option<Section>,
    pub key: String,
    pub attributes: SpriteAttributes,
}

/// Full-resolution pixels -> pixels sized and flipped for one request.
#[derive(Debug, Clone)]
pub struct DimsPipeline {
    stages: Vec<(&'static str, PixelStage)>,
    cache: HashMap<DimsKey, Rc<[u8]>>,
}

impl Default for DimsPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl DimsPipeline {
    pub fn new() -> Self {
        Self {
            stages: vec![("repeat_rows", repeat_rows), ("flip", flip_dimensions)],
            cache: HashMap::new(),
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|(name, _)| *name).collect()
    }

    pub fn process(
        &mut self,
        key: DimsKey,
        base: &[u8],
        ctx: &DimsContext,
    ) -> Result<Rc<[u8]>, RenderError> {
        if let Some(cached) = self.cache.get(&key) {
            trace!("dims cache hit for {:?}", key);
            return Ok(Rc::clone(cached));
        }
        debug!("dims stage for '{}' at {}x{}", key.key, ctx.attributes.width, ctx.attributes.height);
        let pixels: Rc<[u8]> = self.run(base, ctx)?.into();
        self.cache.insert(key, Rc::clone(&pixels));
        Ok(pixels)
    }

    pub fn run(&self, base: &[u8], ctx: &DimsContext) -> Result<Vec<u8>, RenderError> {
        let mut pixels = base.to_vec();
        for (_, stage) in &self.stages {
            pixels = stage(pixels, ctx)?;
        }
        Ok(pixels)
    }

    pub fn contains(&self, key: &DimsKey) -> bool {
        self.cache.contains_key(key)
    }

    pub fn remove(&mut self, key: &DimsKey) {
        self.cache.remove(key);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn clear_node(&mut self, node: NodeId) {
        self.cache.retain(|key, _| key.node != node);
    }
}

/// Duplicate each pixel row `scale` times (vertical scaling).
///
/// The base buffer must hold exactly `height / scale` rows of `width`
/// pixels.
pub fn repeat_rows(pixels: Vec<u8>, ctx: &DimsContext) -> Result<Vec<u8>, RenderError> {
    let SpriteAttributes { width, height } = ctx.attributes;
    let scale = ctx.scale.max(1) as usize;
    let row_size = width as usize * 4;
    let rows = height as usize / scale;
    let expected = row_size * rows;

    if height as usize % scale != 0 || pixels.len() != expected {
        return Err(RenderError::DimensionMismatch {
            width,
            height,
            expected,
            actual: pixels.len(),
        });
    }
    if scale == 1 {
        return Ok(pixels);
    }

    let mut output = Vec::with_capacity(expected * scale);
    for row in pixels.chunks_exact(row_size.max(1)) {
        for _ in 0..scale {
            output.extend_from_slice(row);
        }
    }
    Ok(output)
}

/// Apply the flips requested by the key.
///
/// Horizontal reverses pixels within each row, vertical reverses the row
/// order and both together reverse the whole buffer pixel by pixel.
pub fn flip_dimensions(pixels: Vec<u8>, ctx: &DimsContext) -> Result<Vec<u8>, RenderError> {
    let width = ctx.attributes.width as usize;
    match (ctx.flip.horizontal, ctx.flip.vertical) {
        (false, false) => Ok(pixels),
        (true, true) => Ok(flip_both(&pixels)),
        (true, false) => Ok(flip_horizontal(&pixels, width)),
        (false, true) => Ok(flip_vertical(&pixels, width)),
    }
}

fn flip_both(pixels: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(pixels.len());
    for pixel in pixels.chunks_exact(4).rev() {
        output.extend_from_slice(pixel);
    }
    output
}

fn flip_horizontal(pixels: &[u8], width: usize) -> Vec<u8> {
    if width == 0 {
        return pixels.to_vec();
    }
    let mut output = Vec::with_capacity(pixels.len());
    for row in pixels.chunks_exact(width * 4) {
        for pixel in row.chunks_exact(4).rev() {
            output.extend_from_slice(pixel);
        }
    }
    output
}

fn flip_vertical(pixels: &[u8], width: usize) -> Vec<u8> {
    if width == 0 {
        return pixels.to_vec();
    }
    let mut output = Vec::with_capacity(pixels.len());
    for row in pixels.chunks_exact(width * 4).rev() {
        output.extend_from_slice(row);
    }
    output
}
