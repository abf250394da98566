//! CLI integration tests
//!
//! These tests run the built `prendr` binary against the fixture library
//! and check exit codes, printed output and written images.

use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn prendr_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_prendr"))
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

fn run(args: &[&str]) -> Output {
    Command::new(prendr_binary()).args(args).output().expect("Failed to execute prendr")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths should be UTF-8")
}

fn write_image(dir: &Path, name: &str, pixels: &[[u8; 4]], width: u32) -> PathBuf {
    let height = pixels.len() as u32 / width;
    let image = RgbaImage::from_fn(width, height, |x, y| Rgba(pixels[(y * width + x) as usize]));
    let path = dir.join(name);
    image.save(&path).expect("should write test image");
    path
}

#[test]
fn test_decode_writes_png() {
    let temp = TempDir::new().expect("should create temp dir");
    let out = temp.path().join("brick.png");
    let config = fixture("prendr.toml");
    let library = fixture("mario.json5");

    let output = run(&[
        "decode",
        path_str(&library),
        "Brick",
        "--width",
        "4",
        "--height",
        "4",
        "-o",
        path_str(&out),
        "--config",
        path_str(&config),
    ]);
    assert!(output.status.success(), "decode failed: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Saved:"));

    let image = image::open(&out).expect("output should be a PNG").to_rgba8();
    assert_eq!(image.dimensions(), (4, 4));
    assert_eq!(image.get_pixel(0, 0), &Rgba([128, 64, 0, 255]));
    assert_eq!(image.get_pixel(1, 1), &Rgba([200, 0, 0, 255]));
}

#[test]
fn test_decode_draw_size_tiles() {
    let temp = TempDir::new().expect("should create temp dir");
    let out = temp.path().join("pipe.png");

    let output = run(&[
        "decode",
        path_str(&fixture("mario.json5")),
        "Pipe",
        "--width",
        "10",
        "--height",
        "2",
        "--draw-width",
        "16",
        "--draw-height",
        "4",
        "-o",
        path_str(&out),
        "--config",
        path_str(&fixture("prendr.toml")),
    ]);
    assert!(output.status.success(), "decode failed: {}", String::from_utf8_lossy(&output.stderr));

    let image = image::open(&out).expect("output should be a PNG").to_rgba8();
    assert_eq!(image.dimensions(), (16, 4));
    assert_eq!(image.get_pixel(15, 3), &Rgba([200, 0, 0, 255]));
}

#[test]
fn test_decode_unknown_key_fails() {
    let temp = TempDir::new().expect("should create temp dir");
    let output = run(&[
        "decode",
        path_str(&fixture("mario.json5")),
        "Bowser",
        "--width",
        "4",
        "--height",
        "4",
        "-o",
        path_str(&temp.path().join("x.png")),
        "--config",
        path_str(&fixture("prendr.toml")),
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no sprite found"));
}

#[test]
fn test_decode_missing_library_is_invalid_args() {
    let temp = TempDir::new().expect("should create temp dir");
    let output = run(&[
        "decode",
        path_str(&temp.path().join("missing.json5")),
        "Box",
        "--width",
        "1",
        "--height",
        "1",
        "--config",
        path_str(&fixture("prendr.toml")),
    ]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_encode_prints_compressed_string() {
    let temp = TempDir::new().expect("should create temp dir");
    let white = [255, 255, 255, 255];
    let clear = [0, 0, 0, 0];
    let input = write_image(temp.path(), "dots.png", &[white, white, white, white, white, clear], 6);

    let output = run(&["encode", path_str(&input), "--config", path_str(&fixture("prendr.toml"))]);
    assert!(output.status.success(), "encode failed: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "p[0,1]x15,0");
}

#[test]
fn test_encode_bad_config_fails() {
    let temp = TempDir::new().expect("should create temp dir");
    let config = temp.path().join("prendr.toml");
    std::fs::write(&config, "[codec]\nscale = 0\n").expect("should write config");
    let input = write_image(temp.path(), "dot.png", &[[0, 0, 0, 0]], 1);

    let output = run(&["encode", path_str(&input), "--config", path_str(&config)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("codec.scale"));
}

#[test]
fn test_palette_prints_json() {
    let temp = TempDir::new().expect("should create temp dir");
    let input = write_image(
        temp.path(),
        "colors.png",
        &[[255, 0, 0, 255], [0, 0, 0, 0], [90, 90, 90, 255]],
        3,
    );

    let output = run(&["palette", path_str(&input)]);
    assert!(output.status.success(), "palette failed: {}", String::from_utf8_lossy(&output.stderr));
    let palette: Vec<[u8; 4]> =
        serde_json::from_slice(&output.stdout).expect("palette output should be JSON");
    assert_eq!(palette, vec![[0, 0, 0, 0], [90, 90, 90, 255], [255, 0, 0, 255]]);
}

#[test]
fn test_palette_missing_image() {
    let output = run(&["palette", "does/not/exist.png"]);
    assert_eq!(output.status.code(), Some(2));
}
