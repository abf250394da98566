//! The sprite codec facade
//!
//! [`PixelRendr`] owns the palette, the sprite library, the class-token
//! lookup over it and both decode pipelines. Callers ask for sprites by a
//! whitespace-separated key plus the output size; everything generated on
//! the way is cached until the palette or library changes.
//!
//! # Examples
//!
//! ```
//! use pixelrendr::models::SpriteAttributes;
//! use pixelrendr::palette::Palette;
//! use pixelrendr::renderer::{PixelRendr, Settings};
//! use serde_json::json;
//!
//! let palette = Palette::from_arrays(&[[0, 0, 0, 0], [255, 255, 255, 255]]);
//! let mut rendr = PixelRendr::new(Settings::new(palette, json!({"Box": "x016,"}))).unwrap();
//!
//! let sprite = rendr.decode("Box", SpriteAttributes::new(4, 4)).unwrap();
//! let single = sprite.as_single().unwrap();
//! assert_eq!(single.pixels().len(), 64);
//! ```

use log::{debug, trace, warn};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::encoder::Encoder;
use crate::error::RenderError;
use crate::filter::FilterRegistry;
use crate::library::{Entry, NodeId, Source, SourceNode, SourceTree, SpriteKey};
use crate::lookup::ClassLookup;
use crate::models::{Command, SpriteAttributes};
use crate::palette::Palette;
use crate::pipeline::{BaseContext, BaseKey, BasePipeline, DimsContext, DimsKey, DimsPipeline, Flip};
use crate::sprite::{section_attributes, Sprite, SpriteMultiple, SpriteSingle};

/// Default substring marking a horizontally flipped request.
pub const DEFAULT_FLIP_HORIZ: &str = "flip-horiz";
/// Default substring marking a vertically flipped request.
pub const DEFAULT_FLIP_VERT: &str = "flip-vert";
/// Default fallback child name for the class lookup.
pub const DEFAULT_NORMAL: &str = "normal";

/// Everything needed to build a [`PixelRendr`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub palette: Palette,
    /// Raw sprite library
    pub library: Value,
    pub filters: FilterRegistry,
    /// Pixel scale applied in both directions, at least 1
    pub scale: u32,
    pub flip_horiz: String,
    pub flip_vert: String,
    /// Fallback child taken when no key token matches
    pub normal: Option<String>,
    /// Require every library directory to contain the normal child
    pub require_normal: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            library: Value::Object(Map::new()),
            filters: FilterRegistry::new(),
            scale: 1,
            flip_horiz: DEFAULT_FLIP_HORIZ.to_string(),
            flip_vert: DEFAULT_FLIP_VERT.to_string(),
            normal: Some(DEFAULT_NORMAL.to_string()),
            require_normal: false,
        }
    }
}

impl Settings {
    pub fn new(palette: Palette, library: Value) -> Self {
        Self { palette, library, ..Default::default() }
    }

    fn validate(&self) -> Result<(), RenderError> {
        if self.scale == 0 {
            return Err(RenderError::InvalidSettings("scale must be at least 1".to_string()));
        }
        if self.palette.is_empty() {
            return Err(RenderError::InvalidSettings("palette must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Sizes of every cache held by a [`PixelRendr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Full-resolution buffers, per node and section
    pub base: usize,
    /// Sized and flipped buffers, per node, section, key and size
    pub dims: usize,
    /// Generated sprites across all nodes
    pub sprites: usize,
    /// Memoized lookup keys
    pub lookup: usize,
}

impl CacheStats {
    pub fn is_empty(&self) -> bool {
        self.base == 0 && self.dims == 0 && self.sprites == 0 && self.lookup == 0
    }
}

/// Cache entries created by one call, dropped again if the call fails.
#[derive(Debug, Default)]
struct Inserted {
    lookup: Vec<String>,
    base: Vec<BaseKey>,
    dims: Vec<DimsKey>,
}

impl Inserted {
    fn for_key(lookup: &ClassLookup<Entry>, key: &str) -> Self {
        Self { lookup: lookup.uncached_keys(key), ..Default::default() }
    }
}

/// Sprite decoder and encoder over one palette and library.
#[derive(Debug)]
pub struct PixelRendr {
    palette: Palette,
    filters: FilterRegistry,
    tree: SourceTree,
    lookup: ClassLookup<Entry>,
    base: BasePipeline,
    dims: DimsPipeline,
    scale: u32,
    flip_horiz: String,
    flip_vert: String,
    normal: Option<String>,
    require_normal: bool,
}

impl PixelRendr {
    pub fn new(settings: Settings) -> Result<Self, RenderError> {
        settings.validate()?;
        let tree = SourceTree::parse(settings.library)?;
        let lookup = ClassLookup::new(&tree, settings.normal.clone(), settings.require_normal)?;
        Ok(Self {
            palette: settings.palette,
            filters: settings.filters,
            tree,
            lookup,
            base: BasePipeline::new(),
            dims: DimsPipeline::new(),
            scale: settings.scale,
            flip_horiz: settings.flip_horiz,
            flip_vert: settings.flip_vert,
            normal: settings.normal,
            require_normal: settings.require_normal,
        })
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// The raw library currently loaded.
    pub fn library(&self) -> &Value {
        self.tree.raw()
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Decode the sprite for `key` at the requested output size.
    ///
    /// Repeated calls with the same key and attributes return the same
    /// `Rc`. A failed call leaves every cache as it was.
    pub fn decode(&mut self, key: &str, attributes: SpriteAttributes) -> Result<Rc<Sprite>, RenderError> {
        let mut inserted = Inserted::for_key(&self.lookup, key);
        match self.decode_inner(key, attributes, &mut inserted) {
            Ok(sprite) => Ok(sprite),
            Err(err) => {
                self.rollback(inserted);
                Err(err)
            }
        }
    }

    fn decode_inner(
        &mut self,
        key: &str,
        attributes: SpriteAttributes,
        inserted: &mut Inserted,
    ) -> Result<Rc<Sprite>, RenderError> {
        let id = self.locate(key)?;
        let sprite_key = SpriteKey { key: key.to_string(), attributes };
        if let Some(sprite) = self.tree.node(id).and_then(|node| node.sprite(&sprite_key)) {
            trace!("sprite cache hit for '{}'", key);
            return Ok(sprite);
        }

        let sprite = Rc::new(self.generate(id, key, attributes, inserted)?);
        if let Some(node) = self.tree.node_mut(id) {
            node.insert_sprite(sprite_key, Rc::clone(&sprite));
        }
        Ok(sprite)
    }

    /// Full-resolution base buffer for `key`, horizontally scaled.
    ///
    /// Only single sprites have one base buffer; composites fail with
    /// `InvalidEntry`.
    pub fn sprite_base(&mut self, key: &str) -> Result<Rc<[u8]>, RenderError> {
        let mut inserted = Inserted::for_key(&self.lookup, key);
        let result = self.locate(key).and_then(|id| {
            let node = self.tree.node(id).ok_or_else(|| RenderError::UnknownKey(key.to_string()))?;
            let Source::Literal(text) = &node.source else {
                return Err(RenderError::invalid_entry(&node.path, "composite sprites have no single base buffer"));
            };
            let (text, filters) = (text.clone(), node.filters.clone());
            self.base_pixels(BaseKey { node: id, section: None }, &text, &filters, &mut inserted)
        });
        if result.is_err() {
            self.rollback(inserted);
        }
        result
    }

    /// Library path of the source `key` resolves to.
    pub fn resolve_path(&mut self, key: &str) -> Result<Vec<String>, RenderError> {
        let id = self.locate_or_rollback(key)?;
        Ok(self.tree.node(id).map(|node| node.path.clone()).unwrap_or_default())
    }

    /// Number of sprites generated so far from the source `key` resolves to.
    pub fn cached_sprites(&mut self, key: &str) -> Result<usize, RenderError> {
        let id = self.locate_or_rollback(key)?;
        Ok(self.tree.node(id).map_or(0, SourceNode::sprite_count))
    }

    /// Forget everything generated from the source `key` resolves to.
    ///
    /// The raw library is left untouched.
    pub fn reset_render(&mut self, key: &str) -> Result<(), RenderError> {
        let id = self.locate_or_rollback(key)?;
        if let Some(node) = self.tree.node_mut(id) {
            node.clear_sprites();
        }
        self.base.clear_node(id);
        self.dims.clear_node(id);
        debug!("reset render for '{}'", key);
        Ok(())
    }

    /// Replace the library, or reparse the current one with `None`.
    ///
    /// The lookup is rebuilt and every cache cleared. On failure the
    /// previous library stays in place.
    pub fn reset_library(&mut self, library: Option<Value>) -> Result<(), RenderError> {
        let raw = library.unwrap_or_else(|| self.tree.raw().clone());
        let tree = SourceTree::parse(raw)?;
        let lookup = ClassLookup::new(&tree, self.normal.clone(), self.require_normal)?;
        self.tree = tree;
        self.lookup = lookup;
        self.base.clear();
        self.dims.clear();
        debug!("library reset");
        Ok(())
    }

    /// Swap the palette and clear every cache.
    pub fn change_palette(&mut self, palette: Palette) -> Result<(), RenderError> {
        if palette.is_empty() {
            return Err(RenderError::InvalidSettings("palette must not be empty".to_string()));
        }
        debug!("palette changed: {} -> {} colors", self.palette.len(), palette.len());
        self.palette = palette;
        self.clear_caches();
        Ok(())
    }

    /// Encode raw RGBA pixels against the current palette.
    pub fn encode(&self, data: &[u8], width: u32, height: u32) -> Result<String, RenderError> {
        Encoder::new(&self.palette).encode(data, width, height)
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            base: self.base.len(),
            dims: self.dims.len(),
            sprites: self.tree.sprite_count(),
            lookup: self.lookup.cache_len(),
        }
    }

    pub fn is_cache_empty(&self) -> bool {
        self.cache_stats().is_empty()
    }

    fn clear_caches(&mut self) {
        self.base.clear();
        self.dims.clear();
        self.tree.clear_sprites();
        self.lookup.clear_cache();
    }

    fn rollback(&mut self, inserted: Inserted) {
        self.lookup.forget(&inserted.lookup);
        for base in &inserted.base {
            self.base.remove(base);
        }
        for dims in &inserted.dims {
            self.dims.remove(dims);
        }
    }

    fn locate_or_rollback(&mut self, key: &str) -> Result<NodeId, RenderError> {
        let inserted = Inserted::for_key(&self.lookup, key);
        self.locate(key).map_err(|err| {
            self.rollback(inserted);
            err
        })
    }

    /// Find the source node for `key`, resolving pending commands met on
    /// the way.
    fn locate(&mut self, key: &str) -> Result<NodeId, RenderError> {
        loop {
            let entry = self.lookup.get(&self.tree, key);
            match self.tree.resolve_entry(entry) {
                Entry::Directory(_) => {
                    warn!("'{}' resolves to a directory, not a sprite", key);
                    return Err(RenderError::NoSpriteFound(key.to_string()));
                }
                Entry::Node(id) => {
                    if !self.tree.node(id).is_some_and(SourceNode::is_pending) {
                        return Ok(id);
                    }
                    self.tree.resolve(id, &self.filters)?;
                    // The node may now stand for a directory to descend into
                    self.lookup.clear_cached(key);
                }
            }
        }
    }

    fn generate(
        &mut self,
        id: NodeId,
        key: &str,
        attributes: SpriteAttributes,
        inserted: &mut Inserted,
    ) -> Result<Sprite, RenderError> {
        let node = self.tree.node(id).ok_or_else(|| RenderError::UnknownKey(key.to_string()))?;
        let source = node.source.clone();
        let filters = node.filters.clone();
        let flip = Flip::from_key(key, &self.flip_horiz, &self.flip_vert);

        match source {
            Source::Literal(text) => {
                let base = self.base_pixels(BaseKey { node: id, section: None }, &text, &filters, inserted)?;
                let dims_key = DimsKey { node: id, section: None, key: key.to_string(), attributes };
                let pixels = self.dims_pixels(dims_key, &base, flip, inserted)?;
                Ok(Sprite::Single(SpriteSingle::new(pixels, attributes.width, attributes.height)?))
            }
            Source::Command(Command::Multiple { layout, sections }) => {
                let mut singles = BTreeMap::new();
                for (section, text) in &sections {
                    let base_key = BaseKey { node: id, section: Some(*section) };
                    let base = self.base_pixels(base_key, text, &filters, inserted)?;
                    let size = section_attributes(*section, &layout, attributes, self.scale, base.len())?;
                    let dims_key = DimsKey {
                        node: id,
                        section: Some(*section),
                        key: key.to_string(),
                        attributes: size,
                    };
                    let pixels = self.dims_pixels(dims_key, &base, flip, inserted)?;
                    singles.insert(*section, SpriteSingle::new(pixels, size.width, size.height)?);
                }
                Ok(Sprite::Multiple(SpriteMultiple::new(singles, layout, self.scale, flip)))
            }
            Source::Command(_) => Err(RenderError::UnknownKey(key.to_string())),
        }
    }

    fn base_pixels(
        &mut self,
        key: BaseKey,
        source: &str,
        filter_names: &[String],
        inserted: &mut Inserted,
    ) -> Result<Rc<[u8]>, RenderError> {
        let filters = filter_names
            .iter()
            .map(|name| self.filters.get(name))
            .collect::<Result<Vec<_>, _>>()?;
        let ctx = BaseContext { palette: &self.palette, scale: self.scale, filters };
        let fresh = !self.base.contains(&key);
        let pixels = self.base.process(key, source, &ctx)?;
        if fresh {
            inserted.base.push(key);
        }
        Ok(pixels)
    }

    fn dims_pixels(
        &mut self,
        key: DimsKey,
        base: &[u8],
        flip: Flip,
        inserted: &mut Inserted,
    ) -> Result<Rc<[u8]>, RenderError> {
        let ctx = DimsContext { attributes: key.attributes, scale: self.scale, flip };
        let fresh = !self.dims.contains(&key);
        let pixels = self.dims.process(key.clone(), base, &ctx)?;
        if fresh {
            inserted.dims.push(key);
        }
        Ok(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::models::Section;
    use serde_json::json;
    use std::collections::HashMap;

    const CLEAR: [u8; 4] = [0, 0, 0, 0];
    const WHITE: [u8; 4] = [255, 255, 255, 255];

    fn palette() -> Palette {
        Palette::from_arrays(&[CLEAR, WHITE])
    }

    fn library() -> Value {
        json!({
            "Box": "x016,",
            "Pair": "01",
            "Player": {
                "normal": "0000",
                "walking": "1111",
                "big": {"normal": "x116,"},
            },
            "Luigi": ["same", ["Player"]],
            "Ghost": ["filter", ["Box"], "invert"],
            "Loop": ["same", ["Loop"]],
            "Pipe": ["multiple", "horizontal", {
                "left": "0101",
                "middle": "01",
                "right": "1010",
                "leftwidth": 2,
                "rightwidth": 2,
            }],
        })
    }

    fn rendr() -> PixelRendr {
        let mut filters = FilterRegistry::new();
        filters.register(Filter::new("invert", HashMap::from([(0, 1), (1, 0)])));
        let settings = Settings { filters, ..Settings::new(palette(), library()) };
        PixelRendr::new(settings).unwrap()
    }

    fn colors(pixels: &[u8]) -> Vec<[u8; 4]> {
        pixels.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]).collect()
    }

    fn single_pixels(sprite: &Sprite) -> Vec<[u8; 4]> {
        colors(sprite.as_single().unwrap().pixels())
    }

    #[test]
    fn test_decode_repeat_source() {
        let mut rendr = rendr();
        let sprite = rendr.decode("Box", SpriteAttributes::new(4, 4)).unwrap();
        assert_eq!(single_pixels(&sprite), vec![CLEAR; 16]);
    }

    #[test]
    fn test_decode_literal_order() {
        let mut rendr = rendr();
        let sprite = rendr.decode("Pair", SpriteAttributes::new(2, 1)).unwrap();
        assert_eq!(single_pixels(&sprite), vec![CLEAR, WHITE]);
    }

    #[test]
    fn test_decode_is_idempotent() {
        let mut rendr = rendr();
        let attrs = SpriteAttributes::new(2, 2);
        let first = rendr.decode("Player walking", attrs).unwrap();
        let stats = rendr.cache_stats();
        let second = rendr.decode("Player walking", attrs).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(rendr.cache_stats(), stats);
        assert_eq!(stats.base, 1);
    }

    #[test]
    fn test_token_order_independent() {
        let mut rendr = rendr();
        let a = rendr.resolve_path("Player walking flip-horiz").unwrap();
        let b = rendr.resolve_path("flip-horiz walking Player").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, vec!["Player", "walking"]);
    }

    #[test]
    fn test_normal_fallback_descends() {
        let mut rendr = rendr();
        assert_eq!(rendr.resolve_path("Player running").unwrap(), vec!["Player", "normal"]);
        assert_eq!(rendr.resolve_path("Player big").unwrap(), vec!["Player", "big", "normal"]);
    }

    #[test]
    fn test_alias_to_directory() {
        let mut rendr = rendr();
        assert_eq!(rendr.resolve_path("Luigi walking").unwrap(), vec!["Player", "walking"]);
        let luigi = rendr.sprite_base("Luigi walking").unwrap();
        let player = rendr.sprite_base("Player walking").unwrap();
        assert!(Rc::ptr_eq(&luigi, &player));
    }

    #[test]
    fn test_filter_command() {
        let mut rendr = rendr();
        let sprite = rendr.decode("Ghost", SpriteAttributes::new(4, 4)).unwrap();
        assert_eq!(single_pixels(&sprite), vec![WHITE; 16]);
    }

    #[test]
    fn test_flip_horizontal_from_key() {
        let mut rendr = rendr();
        let sprite = rendr.decode("Pair flip-horiz", SpriteAttributes::new(2, 1)).unwrap();
        assert_eq!(single_pixels(&sprite), vec![WHITE, CLEAR]);
    }

    #[test]
    fn test_directory_is_no_sprite() {
        let mut rendr = rendr();
        assert_eq!(
            rendr.decode("Missing", SpriteAttributes::new(1, 1)).unwrap_err(),
            RenderError::NoSpriteFound("Missing".to_string())
        );
        assert!(rendr.is_cache_empty());
    }

    #[test]
    fn test_cyclic_alias_fails() {
        let mut rendr = rendr();
        let err = rendr.decode("Loop", SpriteAttributes::new(1, 1)).unwrap_err();
        assert!(matches!(err, RenderError::CyclicAlias { .. }));
    }

    #[test]
    fn test_failed_decode_leaves_caches() {
        let mut rendr = rendr();
        let err = rendr.decode("Box", SpriteAttributes::new(3, 3)).unwrap_err();
        assert!(matches!(err, RenderError::DimensionMismatch { .. }));
        assert!(rendr.is_cache_empty());
    }

    #[test]
    fn test_failed_decode_keeps_existing_lookup_entries() {
        let mut rendr = rendr();
        rendr.decode("Box", SpriteAttributes::new(4, 4)).unwrap();
        let stats = rendr.cache_stats();

        // Same normalized key, but a size the source cannot fill
        let err = rendr.decode("  Box ", SpriteAttributes::new(3, 3)).unwrap_err();
        assert!(matches!(err, RenderError::DimensionMismatch { .. }));
        assert_eq!(rendr.cache_stats(), stats);
        assert!(rendr.decode("Box", SpriteAttributes::new(4, 4)).is_ok());
    }

    #[test]
    fn test_filter_target_outside_palette_fails() {
        let mut filters = FilterRegistry::new();
        filters.register(Filter::new("wide", HashMap::from([(1, 10)])));
        let library = json!({"Dot": "1", "Wide": ["filter", ["Dot"], "wide"]});
        let mut rendr = PixelRendr::new(Settings { filters, ..Settings::new(palette(), library) }).unwrap();

        assert_eq!(
            rendr.decode("Wide", SpriteAttributes::new(1, 1)).unwrap_err(),
            RenderError::PaletteIndexOutOfRange { index: 10, len: 2 }
        );
        assert!(rendr.is_cache_empty());
        assert_eq!(single_pixels(&rendr.decode("Dot", SpriteAttributes::new(1, 1)).unwrap()), vec![WHITE]);
    }

    #[test]
    fn test_failed_reset_leaves_caches() {
        let mut rendr = rendr();
        assert!(rendr.reset_render("Missing").is_err());
        assert!(rendr.cached_sprites("Nothing here").is_err());
        assert!(rendr.is_cache_empty());
    }

    #[test]
    fn test_reset_render() {
        let mut rendr = rendr();
        rendr.decode("Box", SpriteAttributes::new(4, 4)).unwrap();
        rendr.decode("Box", SpriteAttributes::new(8, 2)).unwrap();
        assert_eq!(rendr.cached_sprites("Box").unwrap(), 2);

        rendr.reset_render("Box").unwrap();
        assert_eq!(rendr.cached_sprites("Box").unwrap(), 0);
        assert!(rendr.library().get("Box").is_some());

        assert_eq!(
            rendr.reset_render("Missing").unwrap_err(),
            RenderError::NoSpriteFound("Missing".to_string())
        );
    }

    #[test]
    fn test_change_palette_invalidates() {
        let mut rendr = rendr();
        let attrs = SpriteAttributes::new(2, 1);
        let before = rendr.decode("Pair", attrs).unwrap();
        assert!(!rendr.is_cache_empty());

        let red = [255, 0, 0, 255];
        rendr.change_palette(Palette::from_arrays(&[CLEAR, red])).unwrap();
        assert!(rendr.is_cache_empty());

        let after = rendr.decode("Pair", attrs).unwrap();
        assert!(!Rc::ptr_eq(&before, &after));
        assert_eq!(single_pixels(&after), vec![CLEAR, red]);
    }

    #[test]
    fn test_change_palette_rejects_empty() {
        let mut rendr = rendr();
        assert!(rendr.change_palette(Palette::default()).is_err());
        assert_eq!(rendr.palette().len(), 2);
    }

    #[test]
    fn test_reset_library() {
        let mut rendr = rendr();
        rendr.decode("Box", SpriteAttributes::new(4, 4)).unwrap();
        rendr.reset_library(Some(json!({"Dot": "1"}))).unwrap();
        assert!(rendr.is_cache_empty());
        assert!(rendr.decode("Box", SpriteAttributes::new(4, 4)).is_err());
        assert_eq!(single_pixels(&rendr.decode("Dot", SpriteAttributes::new(1, 1)).unwrap()), vec![WHITE]);

        // A bad library keeps the old one
        assert!(rendr.reset_library(Some(json!({"Bad": 3}))).is_err());
        assert!(rendr.library().get("Dot").is_some());
    }

    #[test]
    fn test_reset_library_reparses_current() {
        let mut rendr = rendr();
        let attrs = SpriteAttributes::new(2, 2);
        let before = rendr.decode("Luigi walking", attrs).unwrap();
        rendr.decode("Box", SpriteAttributes::new(4, 4)).unwrap();
        assert!(!rendr.is_cache_empty());

        rendr.reset_library(None).unwrap();
        assert!(rendr.is_cache_empty());
        assert_eq!(rendr.library(), &library());

        let after = rendr.decode("Luigi walking", attrs).unwrap();
        assert!(!Rc::ptr_eq(&before, &after));
        assert_eq!(single_pixels(&after), single_pixels(&before));
        assert_eq!(single_pixels(&rendr.decode("Box", SpriteAttributes::new(4, 4)).unwrap()), vec![CLEAR; 16]);
    }

    #[test]
    fn test_multiple_horizontal_sections() {
        let mut rendr = rendr();
        let sprite = rendr.decode("Pipe", SpriteAttributes::new(10, 2)).unwrap();
        let multiple = sprite.as_multiple().unwrap();
        assert_eq!(multiple.section(Section::Left).unwrap().width(), 2);
        assert_eq!(multiple.section(Section::Right).unwrap().width(), 2);
        assert_eq!(multiple.section(Section::Middle).unwrap().height(), 2);

        let image = sprite.drawable(10, 2);
        let top: Vec<[u8; 4]> = (0..10).map(|x| image.get_pixel(x, 0).0).collect();
        assert_eq!(
            top,
            vec![CLEAR, WHITE, CLEAR, CLEAR, CLEAR, CLEAR, CLEAR, CLEAR, WHITE, CLEAR]
        );
        let bottom: Vec<[u8; 4]> = (2..8).map(|x| image.get_pixel(x, 1).0).collect();
        assert_eq!(bottom, vec![WHITE; 6]);
    }

    #[test]
    fn test_scale_doubles_both_axes() {
        let settings = Settings { scale: 2, ..Settings::new(palette(), json!({"Pair": "01"})) };
        let mut rendr = PixelRendr::new(settings).unwrap();
        assert_eq!(rendr.sprite_base("Pair").unwrap().len(), 16);
        let sprite = rendr.decode("Pair", SpriteAttributes::new(4, 2)).unwrap();
        assert_eq!(
            single_pixels(&sprite),
            vec![CLEAR, CLEAR, WHITE, WHITE, CLEAR, CLEAR, WHITE, WHITE]
        );
    }

    #[test]
    fn test_encode_round_trip() {
        let mut rendr = rendr();
        let data: Vec<u8> = [CLEAR, WHITE, WHITE, CLEAR].concat();
        let encoded = rendr.encode(&data, 2, 2).unwrap();
        rendr.reset_library(Some(json!({"Encoded": encoded}))).unwrap();
        let sprite = rendr.decode("Encoded", SpriteAttributes::new(2, 2)).unwrap();
        assert_eq!(sprite.as_single().unwrap().pixels(), data.as_slice());
    }

    #[test]
    fn test_invalid_settings() {
        assert!(PixelRendr::new(Settings::new(Palette::default(), json!({}))).is_err());
        let zero = Settings { scale: 0, ..Settings::new(palette(), json!({})) };
        assert!(matches!(PixelRendr::new(zero), Err(RenderError::InvalidSettings(_))));
    }

    #[test]
    fn test_require_normal_reports_paths() {
        let settings = Settings {
            require_normal: true,
            ..Settings::new(palette(), json!({"normal": "0", "Player": {"walking": "1"}}))
        };
        let err = PixelRendr::new(settings).unwrap_err();
        assert_eq!(
            err,
            RenderError::MissingNormalKey {
                normal: "normal".to_string(),
                paths: vec!["base Player".to_string()],
            }
        );
    }
}
