//! Decoded sprites and their drawable surfaces
//!
//! A [`SpriteSingle`] owns one flat RGBA buffer. A [`SpriteMultiple`] owns
//! one buffer per section of a stretchable composite. Both build drawable
//! [`RgbaImage`] surfaces lazily and keep one per requested size.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::error::RenderError;
use crate::models::{Column, Direction, MultipleLayout, Row, Section, SpriteAttributes};
use crate::pipeline::Flip;

type DrawableCache = RefCell<HashMap<(u32, u32), Rc<RgbaImage>>>;

/// A decoded sprite: one buffer or a bundle of sections.
#[derive(Debug)]
pub enum Sprite {
    Single(SpriteSingle),
    Multiple(SpriteMultiple),
}

impl Sprite {
    pub fn as_single(&self) -> Option<&SpriteSingle> {
        match self {
            Sprite::Single(single) => Some(single),
            Sprite::Multiple(_) => None,
        }
    }

    pub fn as_multiple(&self) -> Option<&SpriteMultiple> {
        match self {
            Sprite::Multiple(multiple) => Some(multiple),
            Sprite::Single(_) => None,
        }
    }

    /// Drawable surface of `width` x `height` pixels.
    pub fn drawable(&self, width: u32, height: u32) -> Rc<RgbaImage> {
        match self {
            Sprite::Single(single) => single.drawable(width, height),
            Sprite::Multiple(multiple) => multiple.drawable(width, height),
        }
    }
}

/// A single decoded pixel buffer.
#[derive(Debug)]
pub struct SpriteSingle {
    pixels: Rc<[u8]>,
    width: u32,
    height: u32,
    drawables: DrawableCache,
}

impl SpriteSingle {
    /// Wrap a buffer, which must hold exactly `width * height` pixels.
    pub fn new(pixels: Rc<[u8]>, width: u32, height: u32) -> Result<Self, RenderError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::DimensionMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { pixels, width, height, drawables: RefCell::new(HashMap::new()) })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixel_unchecked(x, y))
    }

    fn pixel_unchecked(&self, x: u32, y: u32) -> Rgba<u8> {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Rgba([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    /// The buffer as an image at its natural size.
    pub fn to_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| self.pixel_unchecked(x, y))
    }

    /// Surface of the requested size, tiling the sprite from the top left.
    pub fn drawable(&self, width: u32, height: u32) -> Rc<RgbaImage> {
        if let Some(cached) = self.drawables.borrow().get(&(width, height)) {
            return Rc::clone(cached);
        }
        let mut canvas = RgbaImage::new(width, height);
        tile(&mut canvas, self, Rect { x: 0, y: 0, w: width, h: height });
        let canvas = Rc::new(canvas);
        self.drawables.borrow_mut().insert((width, height), Rc::clone(&canvas));
        canvas
    }

    /// Number of drawable surfaces built so far.
    pub fn drawable_count(&self) -> usize {
        self.drawables.borrow().len()
    }
}

/// A composite sprite made of independently decoded sections.
#[derive(Debug)]
pub struct SpriteMultiple {
    sections: BTreeMap<Section, SpriteSingle>,
    layout: MultipleLayout,
    scale: u32,
    flip: Flip,
    drawables: DrawableCache,
}

/// Sections are painted in this order; later ones overlap earlier ones.
const DRAW_ORDER: [Section; 9] = [
    Section::Middle,
    Section::Top,
    Section::Bottom,
    Section::Left,
    Section::Right,
    Section::TopLeft,
    Section::TopRight,
    Section::BottomLeft,
    Section::BottomRight,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl SpriteMultiple {
    pub fn new(
        sections: BTreeMap<Section, SpriteSingle>,
        layout: MultipleLayout,
        scale: u32,
        flip: Flip,
    ) -> Self {
        Self { sections, layout, scale: scale.max(1), flip, drawables: RefCell::new(HashMap::new()) }
    }

    pub fn section(&self, section: Section) -> Option<&SpriteSingle> {
        self.sections.get(&section)
    }

    pub fn sections(&self) -> &BTreeMap<Section, SpriteSingle> {
        &self.sections
    }

    pub fn layout(&self) -> &MultipleLayout {
        &self.layout
    }

    /// Composite surface of the requested size.
    ///
    /// Edge sections keep their extents; the middle fills what is left,
    /// tiled or stretched according to the layout.
    pub fn drawable(&self, width: u32, height: u32) -> Rc<RgbaImage> {
        if let Some(cached) = self.drawables.borrow().get(&(width, height)) {
            return Rc::clone(cached);
        }

        let mut canvas = RgbaImage::new(width, height);
        for section in DRAW_ORDER {
            let Some(sprite) = self.sections.get(&section) else {
                continue;
            };
            let rect = self.region(section, width, height);
            if section == Section::Middle && self.layout.middle_stretch {
                stretch(&mut canvas, sprite, rect);
            } else {
                tile(&mut canvas, sprite, rect);
            }
        }

        let canvas = Rc::new(canvas);
        self.drawables.borrow_mut().insert((width, height), Rc::clone(&canvas));
        canvas
    }

    /// Output-pixel extent of a column or row band.
    fn extent(&self, configured: u32, candidates: &[Section], natural: fn(&SpriteSingle) -> u32) -> u32 {
        if configured > 0 {
            // Clamped to the canvas by `region`
            return configured.saturating_mul(self.scale);
        }
        candidates
            .iter()
            .find_map(|s| self.sections.get(s))
            .map(natural)
            .unwrap_or(0)
    }

    fn region(&self, section: Section, width: u32, height: u32) -> Rect {
        let layout = &self.layout;
        let left = self.extent(
            layout.leftwidth,
            &[Section::Left, Section::TopLeft, Section::BottomLeft],
            SpriteSingle::width,
        );
        let right = self.extent(
            layout.rightwidth,
            &[Section::Right, Section::TopRight, Section::BottomRight],
            SpriteSingle::width,
        );
        let top = self.extent(
            layout.topheight,
            &[Section::Top, Section::TopLeft, Section::TopRight],
            SpriteSingle::height,
        );
        let bottom = self.extent(
            layout.bottomheight,
            &[Section::Bottom, Section::BottomLeft, Section::BottomRight],
            SpriteSingle::height,
        );

        // A flipped composite mirrors where sections are placed
        let (left, right) = if self.flip.horizontal { (right, left) } else { (left, right) };
        let (top, bottom) = if self.flip.vertical { (bottom, top) } else { (top, bottom) };
        let column = match (section.column(), self.flip.horizontal) {
            (Column::Left, true) => Column::Right,
            (Column::Right, true) => Column::Left,
            (column, _) => column,
        };
        let row = match (section.row(), self.flip.vertical) {
            (Row::Top, true) => Row::Bottom,
            (Row::Bottom, true) => Row::Top,
            (row, _) => row,
        };

        let left = left.min(width);
        let right = right.min(width - left);
        let top = top.min(height);
        let bottom = bottom.min(height - top);

        let (mut x, mut w) = match column {
            Column::Left => (0, left),
            Column::Right => (width - right, right),
            Column::Center => (left, width - left - right),
        };
        let (mut y, mut h) = match row {
            Row::Top => (0, top),
            Row::Bottom => (height - bottom, bottom),
            Row::Center => (top, height - top - bottom),
        };

        match layout.direction {
            Direction::Horizontal if row == Row::Center => (y, h) = (0, height),
            Direction::Vertical if column == Column::Center => (x, w) = (0, width),
            _ => {}
        }

        Rect { x, y, w, h }
    }
}

/// Repeat `sprite` across `rect`, anchored at its top left corner.
fn tile(canvas: &mut RgbaImage, sprite: &SpriteSingle, rect: Rect) {
    if sprite.width == 0 || sprite.height == 0 {
        return;
    }
    for dy in 0..rect.h {
        for dx in 0..rect.w {
            let color = sprite.pixel_unchecked(dx % sprite.width, dy % sprite.height);
            canvas.put_pixel(rect.x + dx, rect.y + dy, color);
        }
    }
}

/// Scale `sprite` to exactly fill `rect` with nearest-neighbor sampling.
fn stretch(canvas: &mut RgbaImage, sprite: &SpriteSingle, rect: Rect) {
    if rect.w == 0 || rect.h == 0 || sprite.width == 0 || sprite.height == 0 {
        return;
    }
    let scaled = imageops::resize(&sprite.to_image(), rect.w, rect.h, FilterType::Nearest);
    imageops::replace(canvas, &scaled, rect.x as i64, rect.y as i64);
}

/// Dimensions of one decoded section of a composite.
///
/// `base_len` is the byte length of the section's base buffer, which is
/// already scaled horizontally. One dimension comes from the layout (see
/// [`MultipleLayout`]); the other is derived from the buffer and must
/// divide it exactly.
pub fn section_attributes(
    section: Section,
    layout: &MultipleLayout,
    attributes: SpriteAttributes,
    scale: u32,
    base_len: usize,
) -> Result<SpriteAttributes, RenderError> {
    enum Known {
        Width(u32),
        Rows(u32),
    }

    let scale = scale.max(1);
    let too_large = |extent: &str| {
        RenderError::invalid_entry(&[section.name().to_string()], format!("{} is too large", extent))
    };
    let scaled = |extent: u32, name: &str| extent.checked_mul(scale).ok_or_else(|| too_large(name));
    let pixels = u32::try_from(base_len / 4).map_err(|_| too_large("section"))?;

    let known = match (section.column(), section.row()) {
        (Column::Left, _) if layout.leftwidth > 0 => Known::Width(scaled(layout.leftwidth, "leftwidth")?),
        (Column::Right, _) if layout.rightwidth > 0 => Known::Width(scaled(layout.rightwidth, "rightwidth")?),
        (_, Row::Top) if layout.topheight > 0 => Known::Rows(layout.topheight),
        (_, Row::Bottom) if layout.bottomheight > 0 => Known::Rows(layout.bottomheight),
        _ => match layout.direction {
            Direction::Horizontal => Known::Rows(attributes.height / scale),
            Direction::Vertical => Known::Width(attributes.width),
            Direction::Corners => {
                let edges = layout
                    .leftwidth
                    .checked_add(layout.rightwidth)
                    .and_then(|edges| edges.checked_mul(scale))
                    .ok_or_else(|| too_large("leftwidth + rightwidth"))?;
                match attributes.width.saturating_sub(edges) {
                    0 => Known::Width(attributes.width),
                    inner => Known::Width(inner),
                }
            }
        },
    };

    let (width, rows) = match known {
        Known::Width(width) => (width, if width == 0 { 0 } else { pixels / width }),
        Known::Rows(rows) => (if rows == 0 { 0 } else { pixels / rows }, rows),
    };

    let area = width as u64 * rows as u64;
    if width == 0 || rows == 0 || area != pixels as u64 || base_len % 4 != 0 {
        return Err(RenderError::DimensionMismatch {
            width,
            height: rows.saturating_mul(scale),
            expected: width as usize * rows as usize * 4,
            actual: base_len,
        });
    }

    let height = scaled(rows, "height")?;
    Ok(SpriteAttributes::new(width, height))
}
