//! Command-line interface implementation

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::{load_config, load_library, RendrConfig};
use crate::encoder::Encoder;
use crate::models::SpriteAttributes;
use crate::output::{generate_output_path, load_rgba, save_png};
use crate::palette::generate_palette;
use crate::renderer::PixelRendr;

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

/// prendr - Encode and decode compressed pixel-art sprites
#[derive(Parser)]
#[command(name = "prendr")]
#[command(about = "prendr - Encode and decode compressed pixel-art sprites")]
#[command(version)]
pub struct Cli {
    /// Path to prendr.toml (default: search upward from the working directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the compressed string for an image, using the configured palette
    Encode {
        /// Input image (PNG or any format the image crate reads)
        input: PathBuf,
    },

    /// Print a palette generated from an image's colors as JSON
    Palette {
        input: PathBuf,

        /// Always put transparent black at index 0
        #[arg(long)]
        force_zero: bool,
    },

    /// Decode a sprite from a JSON5 library and save it as PNG
    Decode {
        /// Sprite library (JSON5)
        library: PathBuf,

        /// Lookup key, e.g. "Player walking flip-horiz"
        key: String,

        /// Sprite width in output pixels
        #[arg(long)]
        width: u32,

        /// Sprite height in output pixels
        #[arg(long)]
        height: u32,

        /// Output file or directory (default: {library}_{key}.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Width of the drawn surface (default: sprite width)
        #[arg(long)]
        draw_width: Option<u32>,

        /// Height of the drawn surface (default: sprite height)
        #[arg(long)]
        draw_height: Option<u32>,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Encode { input } => run_encode(&input, config),
        Commands::Palette { input, force_zero } => run_palette(&input, force_zero),
        Commands::Decode { library, key, width, height, output, draw_width, draw_height } => {
            let draw = (draw_width.unwrap_or(width), draw_height.unwrap_or(height));
            run_decode(&library, &key, SpriteAttributes::new(width, height), draw, output.as_deref(), config)
        }
    }
}

fn load_validated_config(path: Option<&Path>) -> Result<RendrConfig, ExitCode> {
    load_config(path).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_ERROR)
    })
}

fn run_encode(input: &Path, config_path: Option<&Path>) -> ExitCode {
    let config = match load_validated_config(config_path) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let palette = match config.build_palette() {
        Ok(palette) => palette,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let image = match load_rgba(input) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error: Cannot read image '{}': {}", input.display(), e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let (width, height) = image.dimensions();
    match Encoder::new(&palette).encode(image.as_raw(), width, height) {
        Ok(encoded) => {
            println!("{}", encoded);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run_palette(input: &Path, force_zero: bool) -> ExitCode {
    let image = match load_rgba(input) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error: Cannot read image '{}': {}", input.display(), e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let palette = generate_palette(image.as_raw(), force_zero);
    match serde_json::to_string(&palette) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run_decode(
    library_path: &Path,
    key: &str,
    attributes: SpriteAttributes,
    (draw_width, draw_height): (u32, u32),
    output: Option<&Path>,
    config_path: Option<&Path>,
) -> ExitCode {
    let config = match load_validated_config(config_path) {
        Ok(config) => config,
        Err(code) => return code,
    };

    let library = match load_library(library_path) {
        Ok(library) => library,
        Err(e) => {
            eprintln!("Error: Cannot load library '{}': {}", library_path.display(), e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let settings = match config.into_settings(library) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let mut rendr = match PixelRendr::new(settings) {
        Ok(rendr) => rendr,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let sprite = match rendr.decode(key, attributes) {
        Ok(sprite) => sprite,
        Err(e) => {
            eprintln!("Error: '{}': {}", key, e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let image = sprite.drawable(draw_width, draw_height);
    let output_path = generate_output_path(library_path, key, output);
    if let Err(e) = save_png(&image, &output_path) {
        eprintln!("Error: Failed to save '{}': {}", output_path.display(), e);
        return ExitCode::from(EXIT_ERROR);
    }

    println!("Saved: {}", output_path.display());
    ExitCode::from(EXIT_SUCCESS)
}
