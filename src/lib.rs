//! pixelrendr - compressed pixel-art sprites for 2D games
//!
//! This library provides functionality to:
//! - Decode run-length compressed sprite strings into RGBA buffers
//! - Look sprites up by fuzzy class-token keys such as `"Player walking"`
//! - Resolve aliases, palette filters and multi-section composites
//! - Encode RGBA images back into the compressed format
//!
//! Every decoded result is cached until the palette or library changes.

pub mod cli;
pub mod color;
pub mod config;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod library;
pub mod lookup;
pub mod models;
pub mod output;
pub mod palette;
pub mod pipeline;
pub mod renderer;
pub mod sprite;

pub use error::RenderError;
pub use models::SpriteAttributes;
pub use palette::Palette;
pub use renderer::{PixelRendr, Settings};
pub use sprite::Sprite;
