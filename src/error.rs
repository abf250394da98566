//! Error types for decoding, encoding and library resolution

use thiserror::Error;

/// Error raised by any sprite lookup, decode or encode operation.
///
/// These are data or programming errors in the sprite library, never
/// transient conditions. A call that fails leaves every cache untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// Bad repeat (`x..,`) or palette (`p[..]`) syntax in a compressed source
    #[error("malformed sprite source at offset {offset}: {message}")]
    MalformedSource { offset: usize, message: String },

    /// A digit group referenced a color past the end of the palette
    #[error("palette index {index} out of range for palette of {len} colors")]
    PaletteIndexOutOfRange { index: usize, len: usize },

    /// A filter name that is not registered
    #[error("unknown filter '{0}'")]
    UnknownFilter(String),

    /// A path or key that does not exist in the library
    #[error("unknown key '{0}'")]
    UnknownKey(String),

    /// The key resolved to a directory rather than a sprite source
    #[error("no sprite found for '{0}'")]
    NoSpriteFound(String),

    /// A chain of `same`/`filter` commands refers back to itself
    #[error("cyclic alias in sprite library: {}", chain.join(" -> "))]
    CyclicAlias {
        /// Paths forming the cycle, first and last entries equal
        chain: Vec<String>,
    },

    /// Directories without the configured normal child
    #[error("normal key '{normal}' not found for:\n{}", paths.join("\n"))]
    MissingNormalKey { normal: String, paths: Vec<String> },

    /// Normal-key validation was requested without a normal token
    #[error("require_normal is set but no normal key is configured")]
    NormalKeyRequired,

    /// A raw library leaf had an unsupported shape
    #[error("invalid library entry at '{path}': {message}")]
    InvalidEntry { path: String, message: String },

    /// A pixel buffer does not match the requested dimensions
    #[error("pixel buffer of {actual} bytes does not fit {width}x{height} (expected {expected})")]
    DimensionMismatch { width: u32, height: u32, expected: usize, actual: usize },

    /// Encoder input whose length is not `width * height * 4`
    #[error("pixel data of {len} bytes is not a {width}x{height} RGBA image")]
    InvalidPixelData { width: u32, height: u32, len: usize },

    /// Invalid construction settings
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

impl RenderError {
    pub(crate) fn malformed(offset: usize, message: impl Into<String>) -> Self {
        RenderError::MalformedSource { offset, message: message.into() }
    }

    pub(crate) fn invalid_entry(path: &[String], message: impl Into<String>) -> Self {
        RenderError::InvalidEntry { path: path.join(" "), message: message.into() }
    }
}
