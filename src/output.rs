//! Image I/O: reading source images and writing decoded sprites

use image::RgbaImage;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for image file operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Save an RGBA image to a PNG file, creating parent directories.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    image.save(path)?;
    Ok(())
}

/// Load any supported image file as 8-bit RGBA.
pub fn load_rgba(path: &Path) -> Result<RgbaImage, OutputError> {
    Ok(image::open(path)?.to_rgba8())
}

/// File-name-safe form of a lookup key: tokens joined with `_`.
pub fn key_slug(key: &str) -> String {
    let tokens: Vec<&str> = key.split_whitespace().collect();
    if tokens.is_empty() {
        "sprite".to_string()
    } else {
        tokens.join("_")
    }
}

/// Where to write the decoded sprite for `key`.
///
/// | Scenario | Output |
/// |----------|--------|
/// | no `-o` | `{library}_{key}.png` next to the library |
/// | `-o out.png` | `out.png` |
/// | `-o dir/` or an existing directory | `dir/{key}.png` |
pub fn generate_output_path(library: &Path, key: &str, output_arg: Option<&Path>) -> PathBuf {
    let slug = key_slug(key);
    match output_arg {
        Some(output) => {
            let is_dir = output.as_os_str().to_string_lossy().ends_with('/') || output.is_dir();
            if is_dir {
                output.join(format!("{}.png", slug))
            } else {
                output.to_path_buf()
            }
        }
        None => {
            let stem = library.file_stem().and_then(|s| s.to_str()).unwrap_or("library");
            let name = format!("{}_{}.png", stem, slug);
            match library.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
                _ => PathBuf::from(name),
            }
        }
    }
}
