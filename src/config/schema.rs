//! Configuration schema types for `prendr.toml`
//!
//! ```toml
//! [codec]
//! scale = 2
//! flip_horiz = "flip-horiz"
//! normal = "normal"
//!
//! [palette]
//! colors = [[0, 0, 0, 0], "#FFFFFF", "rgb(128, 0, 0)"]
//!
//! [filters.dark]
//! map = { "1" = "2" }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::color::parse_color;
use crate::filter::{Filter, FilterRegistry};
use crate::palette::Palette;
use crate::renderer::{Settings, DEFAULT_FLIP_HORIZ, DEFAULT_FLIP_VERT, DEFAULT_NORMAL};

use super::loader::ConfigError;

/// Codec settings section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Pixel scale in both directions
    #[serde(default = "default_scale")]
    pub scale: u32,
    #[serde(default = "default_flip_horiz")]
    pub flip_horiz: String,
    #[serde(default = "default_flip_vert")]
    pub flip_vert: String,
    /// Fallback child for the class lookup; an empty string disables it
    #[serde(default = "default_normal")]
    pub normal: String,
    #[serde(default)]
    pub require_normal: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            flip_horiz: default_flip_horiz(),
            flip_vert: default_flip_vert(),
            normal: default_normal(),
            require_normal: false,
        }
    }
}

fn default_scale() -> u32 {
    1
}

fn default_flip_horiz() -> String {
    DEFAULT_FLIP_HORIZ.to_string()
}

fn default_flip_vert() -> String {
    DEFAULT_FLIP_VERT.to_string()
}

fn default_normal() -> String {
    DEFAULT_NORMAL.to_string()
}

/// One palette entry: an RGBA array or a CSS color string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorEntry {
    Rgba([u8; 4]),
    Css(String),
}

/// Palette section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteConfig {
    #[serde(default)]
    pub colors: Vec<ColorEntry>,
}

/// A palette index written as a number or a digit string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexEntry {
    Number(u64),
    Text(String),
}

impl IndexEntry {
    fn index(&self) -> Option<usize> {
        match self {
            IndexEntry::Number(n) => usize::try_from(*n).ok(),
            IndexEntry::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// A named palette filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Source index -> replacement index
    #[serde(default)]
    pub map: BTreeMap<String, IndexEntry>,
}

/// Root `prendr.toml` configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendrConfig {
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub palette: PaletteConfig,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterConfig>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "filters.dark.map")
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "prendr.toml: '{}' {}", self.field, self.message)
    }
}

impl RendrConfig {
    /// Validate the configuration and return every error found
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: String, message: String| errors.push(ConfigValidationError { field, message });

        if self.codec.scale == 0 {
            push("codec.scale".to_string(), "must be a positive integer".to_string());
        }
        if self.codec.require_normal && self.codec.normal.is_empty() {
            push("codec.normal".to_string(), "must be set when require_normal is true".to_string());
        }

        if self.palette.colors.is_empty() {
            push("palette.colors".to_string(), "must contain at least one color".to_string());
        }
        for (i, entry) in self.palette.colors.iter().enumerate() {
            if let ColorEntry::Css(css) = entry {
                if let Err(e) = parse_color(css) {
                    push(format!("palette.colors[{}]", i), e.to_string());
                }
            }
        }

        for (name, filter) in &self.filters {
            let colors = self.palette.colors.len();
            for (from, to) in &filter.map {
                match (from.trim().parse::<usize>(), to.index()) {
                    (Ok(_), Some(index)) if colors > 0 && index >= colors => push(
                        format!("filters.{}.map", name),
                        format!("entry '{}' maps to index {} outside the {}-color palette", from, index, colors),
                    ),
                    (Ok(_), Some(_)) => {}
                    _ => push(
                        format!("filters.{}.map", name),
                        format!("entry '{}' must map a palette index to a palette index", from),
                    ),
                }
            }
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// The configured palette.
    pub fn build_palette(&self) -> Result<Palette, ConfigError> {
        let colors = self
            .palette
            .colors
            .iter()
            .map(|entry| match entry {
                ColorEntry::Rgba(rgba) => Ok(image::Rgba(*rgba)),
                ColorEntry::Css(css) => parse_color(css),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Palette::new(colors))
    }

    /// The configured filters.
    pub fn build_filters(&self) -> Result<FilterRegistry, ConfigError> {
        let mut registry = FilterRegistry::new();
        for (name, config) in &self.filters {
            let mut substitutions = HashMap::new();
            for (from, to) in &config.map {
                let (Ok(from_index), Some(to_index)) = (from.trim().parse::<usize>(), to.index()) else {
                    return Err(ConfigError::Validation(vec![format!(
                        "filters.{}.map: entry '{}' is not a palette index",
                        name, from
                    )]));
                };
                substitutions.insert(from_index, to_index);
            }
            registry.register(Filter::new(name.clone(), substitutions));
        }
        Ok(registry)
    }

    /// Settings for a codec over `library`.
    pub fn into_settings(self, library: serde_json::Value) -> Result<Settings, ConfigError> {
        let palette = self.build_palette()?;
        let filters = self.build_filters()?;
        let normal = Some(self.codec.normal).filter(|n| !n.is_empty());
        Ok(Settings {
            palette,
            library,
            filters,
            scale: self.codec.scale,
            flip_horiz: self.codec.flip_horiz,
            flip_vert: self.codec.flip_vert,
            normal,
            require_normal: self.codec.require_normal,
        })
    }
}
